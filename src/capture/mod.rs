//! Frame acquisition: the mapped buffer slot and the V4L2 capture session.

pub mod buffer;
pub mod session;

pub use buffer::FrameBuffer;
pub use session::CaptureSession;

use crate::error::ServiceError;

/// An immutable captured frame payload.
///
/// The bytes are copied out of the mapped slot while it is process-owned,
/// so the frame stays valid after the slot is handed back to the device.
#[derive(Debug)]
pub struct CapturedFrame {
    data: Vec<u8>,
}

impl CapturedFrame {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Source of captured frames. The production implementation is
/// [`CaptureSession`]; tests substitute a canned one.
pub trait FrameSource {
    /// Runs one acquire/release cycle and returns the completed frame.
    fn capture(&mut self) -> Result<CapturedFrame, ServiceError>;
}
