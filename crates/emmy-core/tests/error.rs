//! Tests for error handling

use emmy_core::bootstrap::{BootstrapError, SegmentName};
use emmy_core::config::ConfigError;
use emmy_core::error::{EmmyError, EmmyResult};
use emmy_core::types::Address;

#[test]
fn test_bootstrap_error_converts()
{
    let error: EmmyError = BootstrapError::AlreadyAnnounced.into();
    assert!(matches!(error, EmmyError::Bootstrap(BootstrapError::AlreadyAnnounced)));
    assert!(error.to_string().contains("already announced"));
}

#[test]
fn test_segment_open_names_the_segment()
{
    let error = BootstrapError::SegmentOpen {
        name: SegmentName::new("emmy-bootstrap-77").unwrap(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    };
    let message = error.to_string();
    assert!(message.contains("emmy-bootstrap-77"));
}

#[test]
fn test_entry_before_base_message()
{
    let error = BootstrapError::EntryBeforeBase {
        base: Address::new(0x2000),
        entry: Address::new(0x1000),
    };
    let message = error.to_string();
    assert!(message.contains("0x0000000000001000"));
    assert!(message.contains("0x0000000000002000"));
}

#[test]
fn test_config_error_converts()
{
    let error: EmmyError = ConfigError::InvalidValue {
        key: "EMMY_MAX_PAYLOAD",
        value: "lots".to_string(),
    }
    .into();
    let message = error.to_string();
    assert!(message.contains("EMMY_MAX_PAYLOAD"));
    assert!(message.contains("lots"));
}

#[test]
fn test_result_type()
{
    let _result: EmmyResult<()> = Ok(());
    let _error_result: EmmyResult<()> = Err(EmmyError::Io(std::io::Error::other("boom")));
}
