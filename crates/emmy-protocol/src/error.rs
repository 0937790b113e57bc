//! # Transport Errors
//!
//! Connection-level failures are ordinary values: the session logic decides
//! whether to retry, pick another transport, or give up. Nothing here aborts
//! the host process.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::transporter::ConnectionState;

/// Error type for transporter operations
///
/// ## Error Categories
///
/// 1. **Connection errors**: ConnectFailed, Timeout, InvalidEndpoint
/// 2. **Lifecycle errors**: Stopped, InvalidState
/// 3. **Framing errors**: PayloadTooLarge (stream is unusable afterwards)
/// 4. **Environment errors**: Runtime, Io
#[derive(Error, Debug)]
pub enum TransportError
{
    /// The asynchronous connect completed with an error
    ///
    /// Typical causes: no front-end is listening on the pipe, the pipe name is
    /// wrong, or the front-end refused the connection.
    #[error("Failed to connect to pipe '{endpoint}': {reason}")]
    ConnectFailed
    {
        /// Resolved endpoint (path or `\\.\pipe\` name)
        endpoint: String,
        /// What the I/O layer reported
        reason: String,
    },

    /// No completion arrived within the configured bound
    #[error("Timed out after {timeout:?} connecting to pipe '{endpoint}'")]
    Timeout
    {
        /// Resolved endpoint
        endpoint: String,
        /// Bound that elapsed
        timeout: Duration,
    },

    /// The transporter was stopped; it cannot be reused
    #[error("Transporter is stopped")]
    Stopped,

    /// `connect` called while a connection exists or is in progress
    #[error("Cannot connect while {0}")]
    InvalidState(ConnectionState),

    /// The pipe name cannot be turned into an endpoint
    #[error("Invalid pipe name: '{0}'")]
    InvalidEndpoint(String),

    /// A frame declared a payload over the limit
    ///
    /// The byte stream is desynchronized; the only remedy is stop and
    /// reconnect.
    #[error("Frame payload of {len} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge
    {
        /// Declared payload length
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// The asynchronous I/O runtime could not be started
    #[error("Failed to start I/O runtime: {0}")]
    Runtime(#[source] io::Error),

    /// I/O error on an established connection
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience type alias for `Result<T, TransportError>`
pub type TransportResult<T> = std::result::Result<T, TransportError>;
