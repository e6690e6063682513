//! One-time provisioning for the buttoncam service.
//!
//! Sysfs GPIO exports do not survive a reboot, so this runs once per boot
//! before the service: it exports the button pin, configures it as an
//! interrupt-capable input and creates the picture directory.

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use buttoncam::config;
use buttoncam::input::gpio;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = gpio::provision(config::BUTTON_GPIO) {
        error!("provisioning gpio{} failed: {}", config::BUTTON_GPIO, e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = std::fs::create_dir_all(config::PICTURE_DIR) {
        error!("creating {} failed: {}", config::PICTURE_DIR, e);
        return ExitCode::FAILURE;
    }

    info!(
        "gpio{} exported and {} ready",
        config::BUTTON_GPIO,
        config::PICTURE_DIR
    );
    ExitCode::SUCCESS
}
