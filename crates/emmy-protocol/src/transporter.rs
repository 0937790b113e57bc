//! # Transporter Contract
//!
//! The abstraction the debug-session logic talks to. A transporter carries
//! framed messages between the injected engine and a debugger front-end:
//!
//! - `connect` may block the calling thread while the I/O layer works
//!   asynchronously underneath
//! - `send` queues one frame and returns; delivery failures surface as a
//!   [`TransportEvent::Disconnected`](crate::events::TransportEvent)
//! - `stop` tears everything down, is idempotent and callable from any thread

use std::fmt;

use crate::error::TransportResult;

/// Connection lifecycle of one transporter instance.
///
/// `Stopped` is terminal: a stopped transporter never connects again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState
{
    /// No connection, none in progress
    Disconnected,
    /// Connect issued, completion not yet observed
    Connecting,
    /// Frames can be sent
    Connected,
    /// Torn down for good
    Stopped,
}

impl fmt::Display for ConnectionState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Stopped => "stopped",
        };
        f.write_str(text)
    }
}

/// Outcome of [`Transporter::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus
{
    /// This call performed the teardown
    Stopped,
    /// An earlier call already did
    AlreadyStopped,
}

impl StopStatus
{
    /// Numeric status code: `0` for the stopping call, `1` afterwards.
    #[must_use]
    pub const fn code(self) -> i32
    {
        match self {
            Self::Stopped => 0,
            Self::AlreadyStopped => 1,
        }
    }
}

/// Channel carrying framed messages to a debugger front-end.
///
/// Implementations are shared between the session thread, the I/O thread and
/// whoever tears the session down, so they must be `Send + Sync`.
pub trait Transporter: Send + Sync
{
    /// Connect to `target` and block until the connection is usable or a
    /// bounded failure is observed.
    ///
    /// ## Errors
    ///
    /// Returns a [`TransportError`](crate::error::TransportError) whose
    /// `Display` is the human-readable failure reason.
    fn connect(&self, target: &str) -> TransportResult<()>;

    /// Queue one frame. Frames sent from one thread arrive in issue order.
    fn send(&self, command_id: i32, payload: &[u8]);

    /// Tear down the connection and release OS resources.
    fn stop(&self) -> StopStatus;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Whether frames can currently be sent.
    fn is_connected(&self) -> bool
    {
        self.state() == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_stop_status_codes()
    {
        assert_eq!(StopStatus::Stopped.code(), 0);
        assert_eq!(StopStatus::AlreadyStopped.code(), 1);
    }

    #[test]
    fn test_state_display()
    {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Stopped.to_string(), "stopped");
    }
}
