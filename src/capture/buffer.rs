//! The single memory-mapped buffer slot shared with the capture device.

use std::io;
use std::os::unix::io::RawFd;
use std::slice;

/// Who may touch the mapped slot right now.
///
/// The slot is handed back and forth between the process and the device by
/// the queue/dequeue protocol; the two sides must never overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotOwner {
    /// Queued to the driver; the device may be writing into it.
    Device,
    /// Dequeued; safe for the process to read.
    Process,
}

/// The one mmap'd buffer slot backing hardware frame transfer.
///
/// Mapped once at session setup and unmapped on drop. Ownership transfers
/// are recorded explicitly so a read against a device-owned slot fails
/// loudly instead of returning bytes the device may be overwriting.
pub struct FrameBuffer {
    ptr: *mut libc::c_void,
    len: usize,
    owner: SlotOwner,
}

impl FrameBuffer {
    /// Maps the device's buffer slot at the driver-reported offset and
    /// length as a shared read/write region.
    pub fn map(fd: RawFd, len: usize, offset: i64) -> io::Result<Self> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                offset as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        // Don't expose whatever was in the region before the first frame.
        unsafe { std::ptr::write_bytes(ptr as *mut u8, 0, len) };

        Ok(Self {
            ptr,
            len,
            owner: SlotOwner::Process,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn owner(&self) -> SlotOwner {
        self.owner
    }

    /// Records that the slot was queued to the device.
    pub fn mark_queued(&mut self) {
        self.owner = SlotOwner::Device;
    }

    /// Records that the slot was dequeued and is process-owned again.
    pub fn mark_dequeued(&mut self) {
        self.owner = SlotOwner::Process;
    }

    /// Returns the first `len` bytes of the slot.
    ///
    /// The slot must be process-owned. Reading while the device owns it is
    /// a protocol bug in the caller, not a recoverable runtime fault, so it
    /// panics.
    pub fn read_slice(&self, len: usize) -> &[u8] {
        assert_eq!(
            self.owner,
            SlotOwner::Process,
            "read from a device-owned buffer slot"
        );
        assert!(len <= self.len, "read past the end of the mapped slot");
        unsafe { slice::from_raw_parts(self.ptr as *const u8, len) }
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    // An anonymous memfd stands in for the device fd; mmap semantics are
    // the same.
    fn shared_fd(size: usize) -> OwnedFd {
        let name = std::ffi::CString::new("buttoncam-test").unwrap();
        let fd = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_CLOEXEC) };
        assert!(fd >= 0, "memfd_create failed");
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        assert!(unsafe { libc::ftruncate(fd.as_raw_fd(), size as i64) } >= 0);
        fd
    }

    #[test]
    fn mapping_is_zero_initialized() {
        let fd = shared_fd(4096);
        let buf = FrameBuffer::map(fd.as_raw_fd(), 4096, 0).unwrap();
        assert_eq!(buf.len(), 4096);
        assert!(buf.read_slice(4096).iter().all(|&b| b == 0));
    }

    #[test]
    fn ownership_round_trip() {
        let fd = shared_fd(4096);
        let mut buf = FrameBuffer::map(fd.as_raw_fd(), 4096, 0).unwrap();
        assert_eq!(buf.owner(), SlotOwner::Process);
        buf.mark_queued();
        assert_eq!(buf.owner(), SlotOwner::Device);
        buf.mark_dequeued();
        assert_eq!(buf.owner(), SlotOwner::Process);
        assert_eq!(buf.read_slice(16).len(), 16);
    }

    #[test]
    #[should_panic(expected = "device-owned")]
    fn read_while_device_owned_panics() {
        let fd = shared_fd(4096);
        let mut buf = FrameBuffer::map(fd.as_raw_fd(), 4096, 0).unwrap();
        buf.mark_queued();
        let _ = buf.read_slice(1);
    }

    #[test]
    fn map_with_bad_offset_fails() {
        let fd = shared_fd(4096);
        // Offsets must be page-aligned; 3 is rejected by the kernel.
        assert!(FrameBuffer::map(fd.as_raw_fd(), 4096, 3).is_err());
    }
}
