//! # Error Types
//!
//! Top-level error handling for the engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages. Each layer keeps its own error enum; this one wraps
//! them for callers (the hook library, the CLI) that drive several layers.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::config::ConfigError;

/// Main error type for engine operations
///
/// ## Error Categories
///
/// 1. **Bootstrap errors**: segment access, descriptor handoff, lifecycle misuse
/// 2. **Configuration errors**: malformed `EMMY_*` variables
/// 3. **I/O errors**: everything else the OS reports
///
/// Transport failures live in `emmy_protocol::TransportError`; a failed
/// connect is an ordinary, recoverable return value, never a reason to abort
/// the host process.
#[derive(Error, Debug)]
pub enum EmmyError
{
    /// Shared-memory bootstrap failure
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, EmmyError>`
///
/// ```rust
/// use emmy_core::error::EmmyResult;
/// fn foo() -> EmmyResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type EmmyResult<T> = std::result::Result<T, EmmyError>;
