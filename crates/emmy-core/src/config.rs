//! # Engine Configuration
//!
//! The injected engine has no command line, so it is configured through the
//! environment of the host process.
//!
//! ## Environment Variables
//!
//! - `EMMY_PIPE_NAME`: front-end pipe to connect to (default: `emmy`)
//! - `EMMY_CONNECT_TIMEOUT_MS`: bound on a blocking connect (default: `5000`)
//! - `EMMY_MAX_PAYLOAD`: largest accepted frame payload in bytes
//!   (default: 16 MiB)
//! - `EMMY_EVENT_CAPACITY`: inbound events buffered for the session logic
//!   before further events are dropped (default: `1024`)
//!
//! Logging is configured separately by `emmy-utils` (`RUST_LOG`,
//! `EMMY_LOG_FORMAT`, `EMMY_LOG_FILE`).

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Environment variable naming the front-end pipe.
pub const ENV_PIPE_NAME: &str = "EMMY_PIPE_NAME";
/// Environment variable bounding the connect wait, in milliseconds.
pub const ENV_CONNECT_TIMEOUT_MS: &str = "EMMY_CONNECT_TIMEOUT_MS";
/// Environment variable capping frame payloads, in bytes.
pub const ENV_MAX_PAYLOAD: &str = "EMMY_MAX_PAYLOAD";
/// Environment variable bounding the transport event queue.
pub const ENV_EVENT_CAPACITY: &str = "EMMY_EVENT_CAPACITY";

/// Pipe name used when none is configured.
pub const DEFAULT_PIPE_NAME: &str = "emmy";
/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Payload cap used when none is configured.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;
/// Event queue bound used when none is configured.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError
{
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue
    {
        /// Variable name
        key: &'static str,
        /// Raw value found
        value: String,
    },
}

/// Transport tuning shared by every transporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig
{
    /// Upper bound on how long `connect` may block
    pub connect_timeout: Duration,
    /// Frames declaring a longer payload are treated as stream corruption
    pub max_payload: usize,
    /// Undelivered events held for the receiver; newer events are dropped
    /// while the queue is full
    pub event_capacity: usize,
}

impl Default for TransportConfig
{
    fn default() -> Self
    {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_payload: DEFAULT_MAX_PAYLOAD,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl TransportConfig
{
    /// Read from the process environment, falling back to defaults.
    ///
    /// ## Errors
    ///
    /// - `InvalidValue`: a variable is set to something unparsable
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// ## Errors
    ///
    /// - `InvalidValue`: a value is unparsable or zero
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            let millis = parse_positive(ENV_CONNECT_TIMEOUT_MS, &raw)?;
            config.connect_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(ENV_MAX_PAYLOAD) {
            let bytes = parse_positive(ENV_MAX_PAYLOAD, &raw)?;
            config.max_payload = usize::try_from(bytes).map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_PAYLOAD,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_EVENT_CAPACITY) {
            let events = parse_positive(ENV_EVENT_CAPACITY, &raw)?;
            config.event_capacity = usize::try_from(events).map_err(|_| ConfigError::InvalidValue {
                key: ENV_EVENT_CAPACITY,
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }
}

/// Everything the engine needs once it is initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig
{
    /// Front-end pipe name
    pub pipe_name: String,
    /// Transport tuning
    pub transport: TransportConfig,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            pipe_name: DEFAULT_PIPE_NAME.to_string(),
            transport: TransportConfig::default(),
        }
    }
}

impl EngineConfig
{
    /// Read from the process environment, falling back to defaults.
    ///
    /// ## Errors
    ///
    /// - `InvalidValue`: a variable is set to something unparsable
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// ## Errors
    ///
    /// - `InvalidValue`: a value is unparsable, zero, or an empty pipe name
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pipe_name = match lookup(ENV_PIPE_NAME) {
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_PIPE_NAME,
                    value: name,
                })
            }
            Some(name) => name.trim().to_string(),
            None => DEFAULT_PIPE_NAME.to_string(),
        };

        Ok(Self {
            pipe_name,
            transport: TransportConfig::from_lookup(lookup)?,
        })
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError>
{
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String>
    {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset()
    {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.pipe_name, "emmy");
        assert_eq!(config.transport.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides()
    {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_PIPE_NAME, " emmy-test "),
            (ENV_CONNECT_TIMEOUT_MS, "250"),
            (ENV_MAX_PAYLOAD, "1024"),
            (ENV_EVENT_CAPACITY, "8"),
        ]))
        .unwrap();
        assert_eq!(config.pipe_name, "emmy-test");
        assert_eq!(config.transport.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.transport.max_payload, 1024);
        assert_eq!(config.transport.event_capacity, 8);
    }

    #[test]
    fn test_invalid_values()
    {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_CONNECT_TIMEOUT_MS, "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_CONNECT_TIMEOUT_MS,
                value: "soon".to_string()
            }
        );
        assert!(TransportConfig::from_lookup(lookup(&[(ENV_MAX_PAYLOAD, "0")])).is_err());
        assert!(TransportConfig::from_lookup(lookup(&[(ENV_EVENT_CAPACITY, "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_PIPE_NAME, "  ")])).is_err());
    }
}
