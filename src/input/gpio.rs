//! Sysfs GPIO access for the button pin.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ServiceError;
use crate::input::{EdgeSource, Level, Readiness};

const GPIO_SYSFS_ROOT: &str = "/sys/class/gpio";

fn pin_dir(pin: u32) -> PathBuf {
    Path::new(GPIO_SYSFS_ROOT).join(format!("gpio{}", pin))
}

/// One-time sysfs provisioning for the button pin: export it, configure it
/// as an input and ask for interrupts on both edges.
///
/// Sysfs GPIO state does not survive a reboot, so this has to run once per
/// boot before the service starts (see the `buttoncam-setup` binary).
/// Exporting an already-exported pin fails with EBUSY, so the export step
/// is skipped when the pin directory is already present.
pub fn provision(pin: u32) -> std::io::Result<()> {
    if !pin_dir(pin).exists() {
        std::fs::write(Path::new(GPIO_SYSFS_ROOT).join("export"), pin.to_string())?;
    }
    std::fs::write(pin_dir(pin).join("direction"), "in")?;
    std::fs::write(pin_dir(pin).join("edge"), "both")?;
    Ok(())
}

/// The exported pin's `value` file, polled for edge interrupts.
#[derive(Debug)]
pub struct GpioPin {
    file: File,
}

impl GpioPin {
    pub fn open(pin: u32) -> Result<Self, ServiceError> {
        let path = pin_dir(pin).join("value");
        let file = File::open(&path)
            .map_err(|e| ServiceError::Setup(format!("open {}: {}", path.display(), e)))?;
        Ok(Self { file })
    }
}

impl EdgeSource for GpioPin {
    fn wait_ready(&mut self, timeout: Duration) -> Result<Readiness, ServiceError> {
        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLPRI,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pollfd, 1, poll_timeout_ms(timeout)) };
        match rc {
            0 => Ok(Readiness::TimedOut),
            n if n < 0 => Err(ServiceError::Input(format!(
                "poll on gpio value: {}",
                std::io::Error::last_os_error()
            ))),
            _ => {
                // Sysfs attributes report POLLPRI | POLLERR on a change;
                // POLLERR alone means the line went away.
                if pollfd.revents & libc::POLLPRI != 0 {
                    Ok(Readiness::Ready)
                } else {
                    Err(ServiceError::Input(format!(
                        "unexpected poll revents {:#x} on gpio value",
                        pollfd.revents
                    )))
                }
            }
        }
    }

    fn read_level(&mut self) -> Result<Option<Level>, ServiceError> {
        let mut buf = [0u8; 8];
        let n = self
            .file
            .read(&mut buf)
            .map_err(|e| ServiceError::Input(format!("read gpio value: {}", e)))?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(parse_level(buf[0])))
    }

    fn rewind(&mut self) -> Result<(), ServiceError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| ServiceError::Input(format!("seek gpio value: {}", e)))?;
        Ok(())
    }
}

/// poll(2) takes its timeout as a c_int of milliseconds; an over-long
/// duration is clamped rather than wrapped.
fn poll_timeout_ms(timeout: Duration) -> libc::c_int {
    libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX)
}

/// Active-low: the pressed button pulls the line to ground.
fn parse_level(raw: u8) -> Level {
    if raw == b'0' {
        Level::Active
    } else {
        Level::Inactive
    }
}
