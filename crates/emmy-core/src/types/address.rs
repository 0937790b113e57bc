//! Memory address type.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Strongly typed memory address
///
/// Module bases and entry routines are both addresses; the relocation offset
/// between them is a plain `u64`. Keeping the two apart in the type system
/// makes `base + offset` read correctly and turns `base + base` into a
/// compile error.
///
/// ## Example
///
/// ```rust
/// use emmy_core::types::Address;
///
/// let base = Address::new(0x7ff6_1000_0000);
/// let entry = base.checked_add(0x1a30).unwrap();
/// assert_eq!(entry.offset_from(base), Some(0x1a30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Address of a function or static in the current process.
    #[must_use]
    pub fn of_ptr<T>(ptr: *const T) -> Self
    {
        Address(ptr as usize as u64)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use emmy_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Byte distance from `base` up to this address.
    ///
    /// Returns `None` when this address lies below `base`; a relocation offset
    /// is never negative.
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }

    /// Whether this is the null address.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Parses `0x`-prefixed hexadecimal or plain decimal.
impl FromStr for Address
{
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let s = s.trim();
        let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16)?,
            None => s.replace('_', "").parse::<u64>()?,
        };
        Ok(Address(value))
    }
}
