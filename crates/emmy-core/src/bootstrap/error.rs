//! Bootstrap error types.

use std::io;

use thiserror::Error;

use super::name::SegmentName;
use crate::types::Address;

/// Errors raised while publishing or consuming the bootstrap descriptor.
///
/// Inside the load handler only [`BootstrapError::SegmentOpen`] and
/// [`BootstrapError::ModuleBaseUnavailable`] are expected. The remaining
/// variants belong to the injector side or to misuse of the lifecycle.
#[derive(Error, Debug)]
pub enum BootstrapError
{
    /// The shared-memory segment could not be created, opened or mapped.
    ///
    /// Inside the load handler this aborts the library load on Windows and
    /// is recorded as a failed announce elsewhere.
    #[error("Failed to open bootstrap segment '{name}': {source}")]
    SegmentOpen
    {
        /// Segment name as agreed with the injector
        name: SegmentName,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The mapped region cannot hold a descriptor.
    #[error("Bootstrap segment too small: {len} bytes, need {required}")]
    SegmentTooSmall
    {
        /// Size of the region
        len: usize,
        /// Bytes required
        required: usize,
    },

    /// A segment name does not fit the fixed-capacity name buffer or
    /// contains characters the OS rejects.
    #[error("Invalid bootstrap segment name: {0}")]
    InvalidName(String),

    /// The descriptor was already written for this load instance.
    ///
    /// A second write needs an intervening unload.
    #[error("Bootstrap descriptor already announced for this load")]
    AlreadyAnnounced,

    /// The segment is zero-filled: nothing has been announced yet, or the
    /// descriptor was already consumed.
    #[error("Bootstrap segment holds no descriptor")]
    NotAnnounced,

    /// The segment holds data that is not a descriptor.
    #[error("Corrupt bootstrap descriptor (magic 0x{magic:08x})")]
    CorruptDescriptor
    {
        /// Magic value found at offset 0
        magic: u32,
    },

    /// Descriptor written by an incompatible layout version.
    #[error("Unsupported bootstrap descriptor version {0}")]
    UnsupportedVersion(u16),

    /// The init routine lies below the module base, so no offset exists.
    #[error("Entry {entry} lies before module base {base}")]
    EntryBeforeBase
    {
        /// Module base address
        base: Address,
        /// Init routine address
        entry: Address,
    },

    /// Relocating the offset onto a load base overflowed the address space.
    #[error("Entry offset 0x{offset:x} overflows load base {base}")]
    EntryOverflow
    {
        /// Load base used by the injector
        base: Address,
        /// Offset from the descriptor
        offset: u64,
    },

    /// The loader could not tell which module contains an address.
    #[error("No loaded module contains {0}")]
    ModuleBaseUnavailable(Address),

    /// `initialize` was called before the load handler announced.
    #[error("Engine initialized before the bootstrap descriptor was announced")]
    NotAnnouncedYet,

    /// The load handler ran but could not publish a descriptor, usually
    /// because the injector never created the segment.
    #[error("Bootstrap announce failed in the load handler")]
    AnnounceFailed,

    /// The deferred initialize phase already ran.
    #[error("Engine already initialized")]
    AlreadyInitialized,
}

/// Convenience type alias for `Result<T, BootstrapError>`
pub type BootstrapResult<T> = std::result::Result<T, BootstrapError>;
