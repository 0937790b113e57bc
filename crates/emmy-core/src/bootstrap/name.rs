//! Fixed-capacity segment names.
//!
//! The load handler must name the segment without touching the heap, so the
//! name lives in an inline byte buffer that already carries the POSIX leading
//! slash and the trailing NUL the OS calls expect.

use std::ffi::CStr;
use std::fmt;

use super::error::{BootstrapError, BootstrapResult};
use crate::types::ProcessId;

/// Prefix of every per-process bootstrap segment.
pub const SEGMENT_PREFIX: &str = "emmy-bootstrap-";

/// Capacity of the name buffer, including the leading `/` and trailing NUL.
const CAPACITY: usize = 64;

/// Capacity of the UTF-16 form, which adds the `Local\` namespace.
#[cfg(windows)]
pub(crate) const WIDE_CAPACITY: usize = CAPACITY + 8;

/// Name of a bootstrap segment, agreed upon by injector and target.
///
/// Stored as `/<name>\0` so it can be handed to `shm_open` directly.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SegmentName
{
    buf: [u8; CAPACITY],
    // Length of `/<name>`, excluding the NUL.
    len: usize,
}

impl SegmentName
{
    /// Segment name for the engine injected into `pid`.
    ///
    /// Never allocates; safe to call from the load handler.
    ///
    /// ```rust
    /// use emmy_core::bootstrap::SegmentName;
    /// use emmy_core::types::ProcessId;
    ///
    /// let name = SegmentName::for_process(ProcessId::from(4242));
    /// assert_eq!(name.as_str(), "emmy-bootstrap-4242");
    /// ```
    #[must_use]
    pub fn for_process(pid: ProcessId) -> Self
    {
        let mut name = Self {
            buf: [0; CAPACITY],
            len: 1,
        };
        name.buf[0] = b'/';
        name.push(SEGMENT_PREFIX.as_bytes());

        let mut digits = [0u8; 10];
        let mut value = pid.0;
        let mut start = digits.len();
        loop {
            start -= 1;
            // `value % 10` always fits in a u8.
            digits[start] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        name.push(&digits[start..]);
        name
    }

    /// Custom segment name (for tests and out-of-band agreements).
    ///
    /// ## Errors
    ///
    /// - `InvalidName`: empty, too long, or containing `/`, `\` or NUL
    pub fn new(name: &str) -> BootstrapResult<Self>
    {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() + 2 > CAPACITY {
            return Err(BootstrapError::InvalidName(name.to_string()));
        }
        if bytes.iter().any(|b| matches!(b, b'/' | b'\\' | 0)) {
            return Err(BootstrapError::InvalidName(name.to_string()));
        }

        let mut segment = Self {
            buf: [0; CAPACITY],
            len: 1,
        };
        segment.buf[0] = b'/';
        segment.push(bytes);
        Ok(segment)
    }

    /// The name without the POSIX leading slash.
    #[must_use]
    pub fn as_str(&self) -> &str
    {
        // Only ASCII and validated `&str` input ever reach the buffer.
        std::str::from_utf8(&self.buf[1..self.len]).unwrap_or_default()
    }

    /// NUL-terminated POSIX form (`/emmy-bootstrap-<pid>`).
    #[must_use]
    pub fn as_posix_cstr(&self) -> &CStr
    {
        CStr::from_bytes_until_nul(&self.buf).unwrap_or_default()
    }

    /// NUL-terminated UTF-16 form in the session-local namespace
    /// (`Local\emmy-bootstrap-<pid>`).
    #[cfg(windows)]
    #[must_use]
    pub(crate) fn to_wide(&self) -> [u16; WIDE_CAPACITY]
    {
        let mut wide = [0u16; WIDE_CAPACITY];
        let namespaced = b"Local\\".iter().chain(&self.buf[1..self.len]);
        for (slot, byte) in wide.iter_mut().zip(namespaced) {
            *slot = u16::from(*byte);
        }
        wide
    }

    fn push(&mut self, bytes: &[u8])
    {
        let end = self.len + bytes.len();
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }
}

impl fmt::Display for SegmentName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SegmentName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_tuple("SegmentName").field(&self.as_str()).finish()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_for_process_formats_pid()
    {
        assert_eq!(SegmentName::for_process(ProcessId::from(0)).as_str(), "emmy-bootstrap-0");
        assert_eq!(
            SegmentName::for_process(ProcessId::from(u32::MAX)).as_str(),
            "emmy-bootstrap-4294967295"
        );
    }

    #[test]
    fn test_posix_form_has_slash_and_nul()
    {
        let name = SegmentName::for_process(ProcessId::from(17));
        assert_eq!(name.as_posix_cstr().to_bytes(), b"/emmy-bootstrap-17");
    }

    #[test]
    fn test_custom_name_validation()
    {
        assert!(SegmentName::new("emmy-test-segment").is_ok());
        assert!(SegmentName::new("").is_err());
        assert!(SegmentName::new("a/b").is_err());
        assert!(SegmentName::new("a\\b").is_err());
        assert!(SegmentName::new(&"x".repeat(62)).is_ok());
        assert!(SegmentName::new(&"x".repeat(63)).is_err());
    }
}
