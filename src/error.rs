//! Error types for the capture service.

use std::fmt;

/// Failure categories for the capture service.
///
/// `Setup`, `Input` and `Capture` are fatal: the camera and the button are
/// local hardware, so a fault in them is surfaced immediately instead of
/// retried. `Persistence` is confined to the save task that hit it and is
/// reported back through the dispatcher's outcome channel; it never stops
/// the control loop.
#[derive(Debug)]
pub enum ServiceError {
    /// Device open, capability, format or buffer negotiation failed at startup
    Setup(String),
    /// The button input source failed to poll or read
    Input(String),
    /// A buffer queue/dequeue operation failed mid-cycle
    Capture(String),
    /// A background save failed to open or write its file
    Persistence(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Setup(msg) => write!(f, "setup failed: {}", msg),
            ServiceError::Input(msg) => write!(f, "button input failed: {}", msg),
            ServiceError::Capture(msg) => write!(f, "capture failed: {}", msg),
            ServiceError::Persistence(msg) => write!(f, "save failed: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ServiceError> for String {
    fn from(err: ServiceError) -> Self {
        err.to_string()
    }
}
