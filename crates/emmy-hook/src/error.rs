//! Startup errors and the status codes the injector sees.

use std::io;

use emmy_core::bootstrap::BootstrapError;
use emmy_core::config::ConfigError;
use thiserror::Error;

/// Why the init routine did not start the engine.
#[derive(Error, Debug)]
pub enum HookError
{
    /// Lifecycle refused the initialize phase
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// `EMMY_*` environment variables are malformed
    #[error("Invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    /// The engine thread could not be created
    #[error("Failed to spawn engine thread: {0}")]
    Spawn(#[source] io::Error),

    /// An engine is already installed in this load instance
    #[error("Engine is already running")]
    AlreadyRunning,
}

/// Exit code of the init routine, as read back by the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStatus
{
    Started,
    AlreadyInitialized,
    NotAnnounced,
    InvalidConfig,
    EngineFailed,
    Panicked,
    /// The load handler ran but the bootstrap segment was unusable
    SegmentUnavailable,
}

impl StartupStatus
{
    #[must_use]
    pub const fn code(self) -> u32
    {
        match self {
            Self::Started => 0,
            Self::AlreadyInitialized => 1,
            Self::NotAnnounced => 2,
            Self::InvalidConfig => 3,
            Self::EngineFailed => 4,
            Self::Panicked => 5,
            Self::SegmentUnavailable => 6,
        }
    }
}

impl From<&HookError> for StartupStatus
{
    fn from(error: &HookError) -> Self
    {
        match error {
            HookError::Bootstrap(BootstrapError::AlreadyInitialized) | HookError::AlreadyRunning => {
                Self::AlreadyInitialized
            }
            HookError::Bootstrap(BootstrapError::NotAnnouncedYet) => Self::NotAnnounced,
            HookError::Bootstrap(BootstrapError::AnnounceFailed) => Self::SegmentUnavailable,
            HookError::Config(_) => Self::InvalidConfig,
            HookError::Bootstrap(_) | HookError::Spawn(_) => Self::EngineFailed,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_status_mapping()
    {
        let already = HookError::Bootstrap(BootstrapError::AlreadyInitialized);
        assert_eq!(StartupStatus::from(&already).code(), 1);

        let early = HookError::Bootstrap(BootstrapError::NotAnnouncedYet);
        assert_eq!(StartupStatus::from(&early), StartupStatus::NotAnnounced);

        let config = HookError::Config(ConfigError::InvalidValue {
            key: "EMMY_MAX_PAYLOAD",
            value: "lots".to_string(),
        });
        assert_eq!(StartupStatus::from(&config).code(), 3);
        assert!(config.to_string().contains("EMMY_MAX_PAYLOAD"));
    }
}
