//! buttoncam service entry point.
//!
//! Opens the camera and the button, then runs the capture loop until a
//! termination signal or a fatal hardware error. Run `buttoncam-setup`
//! once per boot first; it exports the button GPIO and creates the picture
//! directory.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use buttoncam::capture::CaptureSession;
use buttoncam::config;
use buttoncam::control::ControlLoop;
use buttoncam::error::ServiceError;
use buttoncam::input::{Debouncer, GpioPin};
use buttoncam::persist::PersistenceDispatcher;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("buttoncam starting (pid: {})", std::process::id());

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        }) {
            error!("failed to install the signal handler: {}", e);
            return ExitCode::FAILURE;
        }
    }

    match run(shutdown) {
        Ok(()) => {
            info!("buttoncam stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(shutdown: Arc<AtomicBool>) -> Result<(), ServiceError> {
    let session = CaptureSession::open(config::CAMERA_DEVICE)?;
    let button = GpioPin::open(config::BUTTON_GPIO)?;
    let presses = Debouncer::new(button, config::DEBOUNCE_INTERVAL);
    let dispatcher = PersistenceDispatcher::new(config::PICTURE_DIR);

    ControlLoop::new(session, presses, dispatcher, shutdown).run()
}
