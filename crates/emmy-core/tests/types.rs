//! Tests for platform-agnostic types

use emmy_core::types::{Address, ProcessId};

#[test]
fn test_process_id_conversions()
{
    let pid = ProcessId::from(12345);
    assert_eq!(pid.0, 12345);
    let value: u32 = pid.into();
    assert_eq!(value, 12345);
    assert_eq!(pid.to_string(), "12345");
}

#[test]
fn test_current_process_id()
{
    assert_eq!(ProcessId::current().0, std::process::id());
}

#[test]
fn test_address_display()
{
    assert_eq!(Address::new(0x1000).to_string(), "0x0000000000001000");
}

#[test]
fn test_address_parse()
{
    assert_eq!("0x7ff6_1000".parse::<Address>().unwrap(), Address::new(0x7ff6_1000));
    assert_eq!("0XFF".parse::<Address>().unwrap(), Address::new(0xff));
    assert_eq!("4096".parse::<Address>().unwrap(), Address::new(4096));
    assert!("0xzz".parse::<Address>().is_err());
    assert!("".parse::<Address>().is_err());
}

#[test]
fn test_offset_from()
{
    let base = Address::new(0x4000);
    assert_eq!(Address::new(0x4abc).offset_from(base), Some(0xabc));
    assert_eq!(base.offset_from(base), Some(0));
    assert_eq!(Address::new(0x3fff).offset_from(base), None);
}

#[test]
fn test_address_ordering()
{
    assert!(Address::new(0x1000) < Address::new(0x2000));
    assert!(Address::ZERO.is_null());
}
