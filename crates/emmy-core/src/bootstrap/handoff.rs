//! Writing and reading the descriptor through a segment.
//!
//! [`BootstrapWriter`] is the target side: zero the region, write once.
//! [`BootstrapReader`] is the injector side: read once, then clear the record
//! so a stale descriptor can never be mistaken for a fresh one.

use tracing::debug;

use super::descriptor::{SharedMemoryDescriptor, DESCRIPTOR_LEN};
use super::error::{BootstrapError, BootstrapResult};
use super::name::SegmentName;
use super::segment::SharedSegment;
use crate::types::{Address, ProcessId};

/// Byte region the descriptor is exchanged through.
///
/// Implemented by [`SharedSegment`]; the `Vec<u8>` impl lets the handoff
/// logic run without an OS segment.
pub trait HandoffRegion
{
    /// Region contents.
    fn bytes(&self) -> &[u8];

    /// Region contents, writable.
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl HandoffRegion for SharedSegment
{
    fn bytes(&self) -> &[u8]
    {
        self.as_bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8]
    {
        self.as_bytes_mut()
    }
}

impl HandoffRegion for Vec<u8>
{
    fn bytes(&self) -> &[u8]
    {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8]
    {
        self
    }
}

impl<R: HandoffRegion + ?Sized> HandoffRegion for &mut R
{
    fn bytes(&self) -> &[u8]
    {
        (**self).bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8]
    {
        (**self).bytes_mut()
    }
}

/// Target-side writer. Writes at most one descriptor.
pub struct BootstrapWriter<'a, R: HandoffRegion + ?Sized>
{
    region: &'a mut R,
    announced: bool,
}

impl<'a, R: HandoffRegion + ?Sized> BootstrapWriter<'a, R>
{
    /// Borrow `region` for a single announcement.
    pub fn new(region: &'a mut R) -> Self
    {
        Self {
            region,
            announced: false,
        }
    }

    /// Zero the region and publish the descriptor for `init_entry` inside the
    /// module loaded at `module_handle`.
    ///
    /// Allocation-free on the success path.
    ///
    /// ## Errors
    ///
    /// - `AlreadyAnnounced`: this writer already wrote a descriptor
    /// - `EntryBeforeBase`: `init_entry` is below `module_handle`
    /// - `SegmentTooSmall`: the region cannot hold a descriptor
    pub fn announce(
        &mut self,
        module_handle: Address,
        init_entry: Address,
        process_id: ProcessId,
    ) -> BootstrapResult<SharedMemoryDescriptor>
    {
        if self.announced {
            return Err(BootstrapError::AlreadyAnnounced);
        }

        let descriptor = SharedMemoryDescriptor::compute(module_handle, init_entry, process_id)?;
        let bytes = self.region.bytes_mut();
        bytes.fill(0);
        descriptor.encode_into(bytes)?;
        self.announced = true;
        Ok(descriptor)
    }

    /// Whether a descriptor has been written.
    pub fn is_announced(&self) -> bool
    {
        self.announced
    }
}

/// Injector-side reader. Consumed by [`BootstrapReader::read`].
pub struct BootstrapReader<R: HandoffRegion>
{
    region: R,
}

impl BootstrapReader<SharedSegment>
{
    /// Open the bootstrap segment of the engine injected into `pid`.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: no segment exists for `pid`
    pub fn open(pid: ProcessId) -> BootstrapResult<Self>
    {
        Self::open_named(SegmentName::for_process(pid))
    }

    /// Open a segment by explicit name.
    ///
    /// ## Errors
    ///
    /// - `SegmentOpen`: no such segment
    pub fn open_named(name: SegmentName) -> BootstrapResult<Self>
    {
        Ok(Self::new(SharedSegment::open(name)?))
    }
}

impl<R: HandoffRegion> BootstrapReader<R>
{
    /// Wrap an already opened region.
    pub fn new(region: R) -> Self
    {
        Self { region }
    }

    /// Read the descriptor exactly once and clear it from the region.
    ///
    /// ## Errors
    ///
    /// - `NotAnnounced`: nothing written yet (or already consumed)
    /// - `CorruptDescriptor` / `UnsupportedVersion` / `SegmentTooSmall`
    pub fn read(mut self) -> BootstrapResult<SharedMemoryDescriptor>
    {
        let descriptor = SharedMemoryDescriptor::decode(self.region.bytes())?;
        debug!(
            module_handle = %descriptor.module_handle,
            offset = descriptor.init_entry_offset,
            pid = descriptor.process_id.0,
            "Consumed bootstrap descriptor"
        );
        let bytes = self.region.bytes_mut();
        let end = DESCRIPTOR_LEN.min(bytes.len());
        bytes[..end].fill(0);
        Ok(descriptor)
    }
}
