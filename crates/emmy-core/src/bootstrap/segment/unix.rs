//! POSIX shared-memory segment.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::NonNull;

use super::SEGMENT_SIZE;
use crate::bootstrap::error::{BootstrapError, BootstrapResult};
use crate::bootstrap::name::SegmentName;

/// A mapped bootstrap segment.
pub struct SharedSegment
{
    name: SegmentName,
    ptr: NonNull<u8>,
    len: usize,
    // Keeps the descriptor open for the lifetime of the mapping.
    _fd: OwnedFd,
    owner: bool,
}

// SAFETY: the mapping is owned by this value and only reachable through it.
unsafe impl Send for SharedSegment {}

impl SharedSegment
{
    /// Create (or reuse) the segment as its owner. The name is removed when
    /// the owner is dropped.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: `shm_open`, `ftruncate` or `mmap` failed
    pub fn create(name: SegmentName) -> BootstrapResult<Self>
    {
        Self::map(name, libc::O_CREAT | libc::O_RDWR, true, true)
    }

    /// Open the injector's segment from inside the target. The segment must
    /// already exist; it is grown to [`SEGMENT_SIZE`] if the injector left it
    /// empty. Never unlinks the name. Allocation-free.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: no such segment, or `ftruncate`/`mmap` failed
    pub fn attach(name: SegmentName) -> BootstrapResult<Self>
    {
        Self::map(name, libc::O_RDWR, true, false)
    }

    /// Open an existing segment.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: no such segment, or mapping failed
    /// - `SegmentTooSmall`: the segment is smaller than [`SEGMENT_SIZE`]
    pub fn open(name: SegmentName) -> BootstrapResult<Self>
    {
        Self::map(name, libc::O_RDWR, false, false)
    }

    /// Name the segment was opened with.
    pub fn name(&self) -> SegmentName
    {
        self.name
    }

    /// Mapped bytes.
    pub fn as_bytes(&self) -> &[u8]
    {
        // SAFETY: `ptr` maps `len` readable bytes for the lifetime of `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mapped bytes, writable.
    pub fn as_bytes_mut(&mut self) -> &mut [u8]
    {
        // SAFETY: `ptr` maps `len` writable bytes and `&mut self` is exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn map(name: SegmentName, flags: libc::c_int, may_grow: bool, owner: bool) -> BootstrapResult<Self>
    {
        let open_error = |source: io::Error| BootstrapError::SegmentOpen { name, source };

        // SAFETY: the name is a valid NUL-terminated string; the mode is passed
        // as c_uint because shm_open is variadic on some platforms.
        let raw = unsafe { libc::shm_open(name.as_posix_cstr().as_ptr(), flags, 0o600 as libc::c_uint) };
        if raw < 0 {
            return Err(open_error(io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly opened descriptor we now own.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: `stat` is plain data and fully written by fstat on success.
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd.as_raw_fd(), &mut stat) } != 0 {
            return Err(open_error(io::Error::last_os_error()));
        }

        let current = usize::try_from(stat.st_size).unwrap_or(0);
        if current < SEGMENT_SIZE {
            if !may_grow {
                return Err(BootstrapError::SegmentTooSmall {
                    len: current,
                    required: SEGMENT_SIZE,
                });
            }
            // SEGMENT_SIZE is a small constant; the cast cannot truncate.
            if unsafe { libc::ftruncate(fd.as_raw_fd(), SEGMENT_SIZE as libc::off_t) } != 0 {
                return Err(open_error(io::Error::last_os_error()));
            }
        }

        // SAFETY: mapping a shared, read-write view of a descriptor we own.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                SEGMENT_SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(open_error(io::Error::last_os_error()));
        }
        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| open_error(io::Error::other("mmap returned null")))?;

        Ok(Self {
            name,
            ptr,
            len: SEGMENT_SIZE,
            _fd: fd,
            owner,
        })
    }
}

impl Drop for SharedSegment
{
    fn drop(&mut self)
    {
        // Best effort - nothing useful can be done with a failure here
        unsafe {
            let _ = libc::munmap(self.ptr.as_ptr().cast(), self.len);
            if self.owner {
                let _ = libc::shm_unlink(self.name.as_posix_cstr().as_ptr());
            }
        }
    }
}
