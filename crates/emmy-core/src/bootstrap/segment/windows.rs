//! Win32 file-mapping segment.

use std::io;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};

use super::SEGMENT_SIZE;
use crate::bootstrap::error::{BootstrapError, BootstrapResult};
use crate::bootstrap::name::SegmentName;

/// A mapped bootstrap segment.
///
/// Named mappings disappear with their last handle, so `owner` only affects
/// the Unix backend.
pub struct SharedSegment
{
    name: SegmentName,
    handle: HANDLE,
    view: MEMORY_MAPPED_VIEW_ADDRESS,
    len: usize,
}

// SAFETY: the mapping is owned by this value and only reachable through it.
unsafe impl Send for SharedSegment {}

impl SharedSegment
{
    /// Create (or reuse) the segment as its owner.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: `CreateFileMappingW` or `MapViewOfFile` failed
    pub fn create(name: SegmentName) -> BootstrapResult<Self>
    {
        Self::create_mapping(name)
    }

    /// Open the injector's segment from inside the target. The mapping must
    /// already exist. Allocation-free.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: no such mapping, or `MapViewOfFile` failed
    pub fn attach(name: SegmentName) -> BootstrapResult<Self>
    {
        Self::open(name)
    }

    /// Open an existing segment.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: no such mapping, or mapping failed
    pub fn open(name: SegmentName) -> BootstrapResult<Self>
    {
        let wide = name.to_wide();
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let handle = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS.0, false, PCWSTR(wide.as_ptr())) }
            .map_err(|e| BootstrapError::SegmentOpen {
                name,
                source: io::Error::from(e),
            })?;
        Self::map_view(name, handle)
    }

    /// Name the segment was opened with.
    pub fn name(&self) -> SegmentName
    {
        self.name
    }

    /// Mapped bytes.
    pub fn as_bytes(&self) -> &[u8]
    {
        // SAFETY: the view maps `len` readable bytes for the lifetime of `self`.
        unsafe { std::slice::from_raw_parts(self.view.Value.cast::<u8>(), self.len) }
    }

    /// Mapped bytes, writable.
    pub fn as_bytes_mut(&mut self) -> &mut [u8]
    {
        // SAFETY: the view maps `len` writable bytes and `&mut self` is exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.view.Value.cast::<u8>(), self.len) }
    }

    fn create_mapping(name: SegmentName) -> BootstrapResult<Self>
    {
        let wide = name.to_wide();
        // SAFETY: pagefile-backed mapping; `wide` is NUL-terminated and outlives the call.
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                None,
                PAGE_READWRITE,
                0,
                SEGMENT_SIZE as u32,
                PCWSTR(wide.as_ptr()),
            )
        }
        .map_err(|e| BootstrapError::SegmentOpen {
            name,
            source: io::Error::from(e),
        })?;
        Self::map_view(name, handle)
    }

    fn map_view(name: SegmentName, handle: HANDLE) -> BootstrapResult<Self>
    {
        // SAFETY: `handle` is a valid file-mapping handle we own.
        let view = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, SEGMENT_SIZE) };
        if view.Value.is_null() {
            let source = io::Error::last_os_error();
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Err(BootstrapError::SegmentOpen { name, source });
        }

        Ok(Self {
            name,
            handle,
            view,
            len: SEGMENT_SIZE,
        })
    }
}

impl Drop for SharedSegment
{
    fn drop(&mut self)
    {
        // Best effort - nothing useful can be done with a failure here
        unsafe {
            let _ = UnmapViewOfFile(self.view);
            let _ = CloseHandle(self.handle);
        }
    }
}
