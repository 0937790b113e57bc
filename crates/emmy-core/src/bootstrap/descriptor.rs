//! The shared-memory descriptor record.
//!
//! ## Layout
//!
//! Little-endian, 32 bytes at offset 0 of the segment:
//!
//! ```text
//! 0   u32  magic ("EMMY")
//! 4   u16  layout version
//! 6   u16  reserved
//! 8   u32  announcing process id
//! 12  u32  reserved
//! 16  u64  module handle (module base)
//! 24  u64  init entry offset
//! ```
//!
//! The record is serialized field by field instead of copying a `repr(C)`
//! struct, so injector and target agree on the bytes even when they are built
//! for different pointer widths.

use super::error::{BootstrapError, BootstrapResult};
use crate::types::{Address, ProcessId};

/// `b"EMMY"` read as a little-endian `u32`.
pub const DESCRIPTOR_MAGIC: u32 = 0x594D_4D45;

/// Current layout version.
pub const DESCRIPTOR_VERSION: u16 = 1;

/// Encoded size of a descriptor.
pub const DESCRIPTOR_LEN: usize = 32;

/// Where the injected engine's init routine lives, relative to its module.
///
/// `init_entry_offset` is only meaningful for the load instance that produced
/// it; the injector adds it to the base the loader actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedMemoryDescriptor
{
    /// Module handle, i.e. the module's base load address
    pub module_handle: Address,
    /// Byte distance from `module_handle` to the init routine
    pub init_entry_offset: u64,
    /// Process that announced the descriptor
    pub process_id: ProcessId,
}

impl SharedMemoryDescriptor
{
    /// Compute the descriptor for an init routine inside a loaded module.
    ///
    /// ## Errors
    ///
    /// - `EntryBeforeBase`: `init_entry` is below `module_handle`
    ///
    /// ## Example
    ///
    /// ```rust
    /// use emmy_core::bootstrap::SharedMemoryDescriptor;
    /// use emmy_core::types::{Address, ProcessId};
    ///
    /// let descriptor = SharedMemoryDescriptor::compute(
    ///     Address::new(0x1_8000_0000),
    ///     Address::new(0x1_8000_2f40),
    ///     ProcessId::from(7),
    /// )?;
    /// assert_eq!(descriptor.init_entry_offset, 0x2f40);
    /// # Ok::<(), emmy_core::bootstrap::BootstrapError>(())
    /// ```
    pub fn compute(module_handle: Address, init_entry: Address, process_id: ProcessId) -> BootstrapResult<Self>
    {
        let init_entry_offset = init_entry
            .offset_from(module_handle)
            .ok_or(BootstrapError::EntryBeforeBase {
                base: module_handle,
                entry: init_entry,
            })?;

        Ok(Self {
            module_handle,
            init_entry_offset,
            process_id,
        })
    }

    /// Absolute address of the init routine for a module loaded at `load_base`.
    ///
    /// ## Errors
    ///
    /// - `EntryOverflow`: `load_base + offset` does not fit in 64 bits
    pub fn entry_address(&self, load_base: Address) -> BootstrapResult<Address>
    {
        load_base
            .checked_add(self.init_entry_offset)
            .ok_or(BootstrapError::EntryOverflow {
                base: load_base,
                offset: self.init_entry_offset,
            })
    }

    /// Serialize into the first [`DESCRIPTOR_LEN`] bytes of `out`.
    ///
    /// ## Errors
    ///
    /// - `SegmentTooSmall`: `out` is shorter than a descriptor
    pub fn encode_into(&self, out: &mut [u8]) -> BootstrapResult<()>
    {
        let out_len = out.len();
        let record = out
            .get_mut(..DESCRIPTOR_LEN)
            .ok_or_else(|| BootstrapError::SegmentTooSmall {
                len: out_len,
                required: DESCRIPTOR_LEN,
            })?;

        record.fill(0);
        record[0..4].copy_from_slice(&DESCRIPTOR_MAGIC.to_le_bytes());
        record[4..6].copy_from_slice(&DESCRIPTOR_VERSION.to_le_bytes());
        record[8..12].copy_from_slice(&self.process_id.0.to_le_bytes());
        record[16..24].copy_from_slice(&self.module_handle.value().to_le_bytes());
        record[24..32].copy_from_slice(&self.init_entry_offset.to_le_bytes());
        Ok(())
    }

    /// Parse a descriptor from the start of `bytes`.
    ///
    /// ## Errors
    ///
    /// - `SegmentTooSmall`: fewer than [`DESCRIPTOR_LEN`] bytes
    /// - `NotAnnounced`: the magic is zero (segment still zero-filled)
    /// - `CorruptDescriptor`: any other wrong magic
    /// - `UnsupportedVersion`: written by a different layout version
    pub fn decode(bytes: &[u8]) -> BootstrapResult<Self>
    {
        let record: &[u8; DESCRIPTOR_LEN] = bytes
            .get(..DESCRIPTOR_LEN)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| BootstrapError::SegmentTooSmall {
                len: bytes.len(),
                required: DESCRIPTOR_LEN,
            })?;

        let magic = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        match magic {
            0 => return Err(BootstrapError::NotAnnounced),
            DESCRIPTOR_MAGIC => {}
            other => return Err(BootstrapError::CorruptDescriptor { magic: other }),
        }

        let version = u16::from_le_bytes([record[4], record[5]]);
        if version != DESCRIPTOR_VERSION {
            return Err(BootstrapError::UnsupportedVersion(version));
        }

        let pid = u32::from_le_bytes([record[8], record[9], record[10], record[11]]);
        let mut handle = [0u8; 8];
        handle.copy_from_slice(&record[16..24]);
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&record[24..32]);

        Ok(Self {
            module_handle: Address::new(u64::from_le_bytes(handle)),
            init_entry_offset: u64::from_le_bytes(offset),
            process_id: ProcessId::from(pid),
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sample() -> SharedMemoryDescriptor
    {
        SharedMemoryDescriptor::compute(Address::new(0x7ff6_0000_0000), Address::new(0x7ff6_0001_2345), ProcessId::from(99))
            .unwrap()
    }

    #[test]
    fn test_compute_offset()
    {
        assert_eq!(sample().init_entry_offset, 0x1_2345);
    }

    #[test]
    fn test_compute_rejects_entry_before_base()
    {
        let err = SharedMemoryDescriptor::compute(Address::new(0x2000), Address::new(0x1fff), ProcessId::from(1))
            .unwrap_err();
        assert!(matches!(err, BootstrapError::EntryBeforeBase { .. }));
    }

    #[test]
    fn test_entry_address_is_base_independent()
    {
        let descriptor = sample();
        for base in [0x1000_0000u64, 0x7ff6_8000_0000, 0x5555_5555_0000] {
            let base = Address::new(base);
            let entry = descriptor.entry_address(base).unwrap();
            assert_eq!(entry.offset_from(base), Some(descriptor.init_entry_offset));
        }
    }

    #[test]
    fn test_entry_address_overflow()
    {
        let descriptor = sample();
        let err = descriptor.entry_address(Address::new(u64::MAX)).unwrap_err();
        assert!(matches!(err, BootstrapError::EntryOverflow { .. }));
    }

    #[test]
    fn test_encoded_layout()
    {
        let mut bytes = [0xffu8; 40];
        sample().encode_into(&mut bytes).unwrap();

        assert_eq!(&bytes[0..4], b"EMMY");
        assert_eq!(&bytes[4..6], &[1, 0]);
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(&bytes[8..12], &99u32.to_le_bytes());
        assert_eq!(&bytes[16..24], &0x7ff6_0000_0000u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &0x1_2345u64.to_le_bytes());
        // Bytes past the record are left alone.
        assert_eq!(&bytes[32..], &[0xff; 8]);
    }

    #[test]
    fn test_encode_into_short_buffer()
    {
        let mut bytes = [0u8; 20];
        let err = sample().encode_into(&mut bytes).unwrap_err();
        assert!(matches!(err, BootstrapError::SegmentTooSmall { len: 20, required: DESCRIPTOR_LEN }));
        assert_eq!(bytes, [0u8; 20]);
    }

    #[test]
    fn test_decode_distinguishes_empty_and_corrupt()
    {
        assert!(matches!(
            SharedMemoryDescriptor::decode(&[0u8; 64]),
            Err(BootstrapError::NotAnnounced)
        ));

        let mut bytes = [0u8; 32];
        bytes[0] = 0x42;
        assert!(matches!(
            SharedMemoryDescriptor::decode(&bytes),
            Err(BootstrapError::CorruptDescriptor { magic: 0x42 })
        ));

        assert!(matches!(
            SharedMemoryDescriptor::decode(&[0u8; 16]),
            Err(BootstrapError::SegmentTooSmall { len: 16, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_other_versions()
    {
        let mut bytes = [0u8; 32];
        sample().encode_into(&mut bytes).unwrap();
        bytes[4] = 2;
        assert!(matches!(
            SharedMemoryDescriptor::decode(&bytes),
            Err(BootstrapError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_decode_reads_back_encoded_fields()
    {
        let mut bytes = vec![0u8; 4096];
        let descriptor = sample();
        descriptor.encode_into(&mut bytes).unwrap();
        assert_eq!(SharedMemoryDescriptor::decode(&bytes).unwrap(), descriptor);
    }
}
