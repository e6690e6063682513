//! V4L2 capture session: device negotiation and the single-slot
//! acquire/release protocol.

use std::mem;
use std::os::raw::c_void;

use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::memory::Memory;
use v4l::v4l2;
use v4l::v4l_sys::{v4l2_buffer, v4l2_requestbuffers};
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::capture::{CapturedFrame, FrameBuffer, FrameSource};
use crate::config;
use crate::error::ServiceError;

/// Owns the camera device, the mapped buffer slot and the streaming state.
///
/// The session is opened once at startup and held for the process lifetime.
/// Streaming is stopped and the mapping released on drop, on every exit
/// path.
pub struct CaptureSession {
    buffer: FrameBuffer,
    dev: Device,
    streaming: bool,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

impl CaptureSession {
    /// Opens and negotiates the device; any failure here is fatal.
    ///
    /// Sequence: capability check, frame interval, pixel format, one mmap
    /// buffer slot, mapping, stream on.
    pub fn open(path: &str) -> Result<Self, ServiceError> {
        let dev = Device::with_path(path)
            .map_err(|e| ServiceError::Setup(format!("open {}: {}", path, e)))?;

        let caps = dev
            .query_caps()
            .map_err(|e| ServiceError::Setup(format!("VIDIOC_QUERYCAP: {}", e)))?;
        verify_caps(path, caps.capabilities)?;
        debug!("camera: {} ({})", caps.card, caps.driver);

        // The driver clamps to its fastest supported interval when asked
        // for more; that is accepted, not an error.
        dev.set_params(&Parameters::with_fps(config::FRAME_RATE_FPS))
            .map_err(|e| ServiceError::Setup(format!("VIDIOC_S_PARM: {}", e)))?;

        let requested = Format::new(
            config::FRAME_WIDTH,
            config::FRAME_HEIGHT,
            FourCC::new(b"MJPG"),
        );
        let actual = dev
            .set_format(&requested)
            .map_err(|e| ServiceError::Setup(format!("VIDIOC_S_FMT: {}", e)))?;
        debug!(
            "format: {} {}x{}",
            actual.fourcc, actual.width, actual.height
        );

        let (length, offset) = request_single_slot(&dev)?;
        let buffer = FrameBuffer::map(dev.handle().fd(), length as usize, i64::from(offset))
            .map_err(|e| ServiceError::Setup(format!("mmap of buffer slot 0: {}", e)))?;

        let mut session = Self {
            buffer,
            dev,
            streaming: false,
        };
        session.stream_on()?;
        Ok(session)
    }

    fn stream_on(&mut self) -> Result<(), ServiceError> {
        let mut buf_type = Type::VideoCapture as u32;
        unsafe {
            v4l2::ioctl(
                self.dev.handle().fd(),
                v4l2::vidioc::VIDIOC_STREAMON,
                &mut buf_type as *mut _ as *mut c_void,
            )
            .map_err(|e| ServiceError::Setup(format!("VIDIOC_STREAMON: {}", e)))?;
        }
        self.streaming = true;
        info!("stream on");
        Ok(())
    }
}

impl FrameSource for CaptureSession {
    /// One capture cycle: queue the slot, block until the device hands it
    /// back with a completed frame, copy the payload out.
    ///
    /// With a single slot the device only starts filling a frame once the
    /// slot is queued, so the delivered frame is the first one completed
    /// after the press, not one captured at the instant of the press. The
    /// copy happens before the slot can be queued again, so a save still in
    /// flight never races the device overwriting the mapping.
    fn capture(&mut self) -> Result<CapturedFrame, ServiceError> {
        let mut buf = v4l2_buffer {
            index: 0,
            type_: Type::VideoCapture as u32,
            memory: Memory::Mmap as u32,
            ..unsafe { mem::zeroed() }
        };

        self.buffer.mark_queued();
        unsafe {
            v4l2::ioctl(
                self.dev.handle().fd(),
                v4l2::vidioc::VIDIOC_QBUF,
                &mut buf as *mut _ as *mut c_void,
            )
            .map_err(|e| ServiceError::Capture(format!("VIDIOC_QBUF: {}", e)))?;
            v4l2::ioctl(
                self.dev.handle().fd(),
                v4l2::vidioc::VIDIOC_DQBUF,
                &mut buf as *mut _ as *mut c_void,
            )
            .map_err(|e| ServiceError::Capture(format!("VIDIOC_DQBUF: {}", e)))?;
        }
        self.buffer.mark_dequeued();

        // MJPG frames vary in size; bytesused is the real payload length.
        let used = buf.bytesused as usize;
        Ok(CapturedFrame::from_bytes(
            self.buffer.read_slice(used).to_vec(),
        ))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.streaming {
            let mut buf_type = Type::VideoCapture as u32;
            let result = unsafe {
                v4l2::ioctl(
                    self.dev.handle().fd(),
                    v4l2::vidioc::VIDIOC_STREAMOFF,
                    &mut buf_type as *mut _ as *mut c_void,
                )
            };
            match result {
                Ok(()) => info!("stream off"),
                Err(e) => warn!("VIDIOC_STREAMOFF: {}", e),
            }
        }
        // The mapping unmaps and the device closes when the fields drop.
    }
}

/// The device must support both capture and streaming I/O; anything else is
/// a startup-time mismatch the process cannot work around.
fn verify_caps(path: &str, flags: Flags) -> Result<(), ServiceError> {
    if !flags.contains(Flags::VIDEO_CAPTURE) {
        return Err(ServiceError::Setup(format!(
            "{} does not support video capture",
            path
        )));
    }
    if !flags.contains(Flags::STREAMING) {
        return Err(ServiceError::Setup(format!(
            "{} does not support streaming I/O",
            path
        )));
    }
    Ok(())
}

/// Requests exactly one mmap buffer slot and returns its length and offset.
fn request_single_slot(dev: &Device) -> Result<(u32, u32), ServiceError> {
    let mut reqbufs = v4l2_requestbuffers {
        count: 1,
        type_: Type::VideoCapture as u32,
        memory: Memory::Mmap as u32,
        ..unsafe { mem::zeroed() }
    };
    unsafe {
        v4l2::ioctl(
            dev.handle().fd(),
            v4l2::vidioc::VIDIOC_REQBUFS,
            &mut reqbufs as *mut _ as *mut c_void,
        )
        .map_err(|e| ServiceError::Setup(format!("VIDIOC_REQBUFS: {}", e)))?;
    }
    if reqbufs.count < 1 {
        return Err(ServiceError::Setup(
            "driver granted no buffer slots".to_string(),
        ));
    }

    let mut buf = v4l2_buffer {
        index: 0,
        type_: Type::VideoCapture as u32,
        memory: Memory::Mmap as u32,
        ..unsafe { mem::zeroed() }
    };
    unsafe {
        v4l2::ioctl(
            dev.handle().fd(),
            v4l2::vidioc::VIDIOC_QUERYBUF,
            &mut buf as *mut _ as *mut c_void,
        )
        .map_err(|e| ServiceError::Setup(format!("VIDIOC_QUERYBUF: {}", e)))?;
    }
    Ok((buf.length, unsafe { buf.m.offset }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_is_a_setup_failure() {
        let err = CaptureSession::open("/dev/video-does-not-exist").unwrap_err();
        assert!(matches!(err, ServiceError::Setup(_)));
    }

    #[test]
    fn a_device_without_streaming_support_fails_at_startup() {
        let err = verify_caps("/dev/video2", Flags::VIDEO_CAPTURE).unwrap_err();
        assert!(matches!(err, ServiceError::Setup(msg) if msg.contains("streaming")));
    }

    #[test]
    fn a_device_without_capture_support_fails_at_startup() {
        let err = verify_caps("/dev/video2", Flags::STREAMING).unwrap_err();
        assert!(matches!(err, ServiceError::Setup(msg) if msg.contains("video capture")));
    }

    #[test]
    fn a_streaming_capture_device_passes_the_capability_check() {
        verify_caps("/dev/video2", Flags::VIDEO_CAPTURE | Flags::STREAMING).unwrap();
    }
}
