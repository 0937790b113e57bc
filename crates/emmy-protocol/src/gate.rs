//! # Connection Wait Gate
//!
//! The only state shared between the I/O thread and a thread blocked in
//! `connect`. The I/O thread reports the outcome of an attempt with
//! [`ConnectionWaitGate::complete`]; the caller sleeps in
//! [`ConnectionWaitGate::wait_outcome`] until the outcome for *its* attempt is
//! visible.
//!
//! ## Attempts
//!
//! One gate lives as long as its transporter and serves every connect attempt.
//! Each attempt gets a number; the record is reset under the lock when an
//! attempt begins. A completion or disconnect carrying an older number is
//! ignored, so a late callback from an abandoned attempt cannot flip the state
//! of the current one.

use std::time::Duration;

use emmy_core::sync::{Condvar, Mutex};
use tracing::debug;

use crate::transporter::ConnectionState;

#[derive(Debug)]
struct GateState
{
    state: ConnectionState,
    attempt: u64,
    failure: Option<String>,
}

/// What a blocked `connect` observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome
{
    /// The attempt completed successfully
    Connected,
    /// The attempt completed with an error
    Failed(String),
    /// No completion within the bound; the attempt is abandoned
    TimedOut,
    /// The transporter was stopped while waiting
    Stopped,
}

/// Mutex + condition variable + connection record.
#[derive(Debug)]
pub struct ConnectionWaitGate
{
    inner: Mutex<GateState>,
    cond: Condvar,
}

impl Default for ConnectionWaitGate
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl ConnectionWaitGate
{
    /// A gate in the `Disconnected` state.
    pub const fn new() -> Self
    {
        Self {
            inner: Mutex::new(GateState {
                state: ConnectionState::Disconnected,
                attempt: 0,
                failure: None,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn state(&self) -> ConnectionState
    {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool
    {
        self.state() == ConnectionState::Connected
    }

    /// Start a new attempt: `Disconnected → Connecting`.
    ///
    /// ## Errors
    ///
    /// Returns the current state when it is not `Disconnected`.
    pub fn begin_attempt(&self) -> Result<u64, ConnectionState>
    {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Disconnected {
            return Err(inner.state);
        }
        inner.attempt += 1;
        inner.state = ConnectionState::Connecting;
        inner.failure = None;
        debug!(attempt = inner.attempt, "Connect attempt started");
        Ok(inner.attempt)
    }

    /// Record the outcome of `attempt` and wake every waiter.
    ///
    /// Returns `false` when the attempt is stale (abandoned, superseded or the
    /// gate is stopped); the caller must then discard whatever it connected.
    pub fn complete(&self, attempt: u64, outcome: Result<(), String>) -> bool
    {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt || inner.state != ConnectionState::Connecting {
            debug!(attempt, current = inner.attempt, state = %inner.state, "Ignoring stale completion");
            return false;
        }
        match outcome {
            Ok(()) => {
                inner.state = ConnectionState::Connected;
            }
            Err(reason) => {
                inner.state = ConnectionState::Disconnected;
                inner.failure = Some(reason);
            }
        }
        debug!(attempt, state = %inner.state, "Connect attempt completed");
        self.cond.notify_all();
        true
    }

    /// Block until `attempt` has an outcome or `timeout` elapses.
    pub fn wait_outcome(&self, attempt: u64, timeout: Duration) -> AttemptOutcome
    {
        let mut inner = self.inner.unique();
        let settled = self.cond.wait_timeout(&mut inner, timeout, |gate| {
            gate.attempt != attempt || gate.state != ConnectionState::Connecting
        });

        if !settled {
            inner.state = ConnectionState::Disconnected;
            inner.failure = None;
            debug!(attempt, "Connect attempt abandoned after timeout");
            return AttemptOutcome::TimedOut;
        }

        match inner.state {
            ConnectionState::Connected if inner.attempt == attempt => AttemptOutcome::Connected,
            ConnectionState::Stopped => AttemptOutcome::Stopped,
            _ => {
                AttemptOutcome::Failed(inner.failure.clone().unwrap_or_else(|| "attempt superseded".to_string()))
            }
        }
    }

    /// `Connected → Disconnected` for the connection made by `attempt`.
    ///
    /// Returns `true` when the transition happened, so the caller reports the
    /// drop exactly once.
    pub fn mark_disconnected(&self, attempt: u64) -> bool
    {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt || inner.state != ConnectionState::Connected {
            return false;
        }
        inner.state = ConnectionState::Disconnected;
        debug!(attempt, "Connection lost");
        true
    }

    /// Move to the terminal state and wake every waiter.
    ///
    /// Returns `false` if the gate was already stopped.
    pub fn stop(&self) -> bool
    {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Stopped {
            return false;
        }
        inner.state = ConnectionState::Stopped;
        self.cond.notify_all();
        true
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_successful_attempt()
    {
        let gate = ConnectionWaitGate::new();
        let attempt = gate.begin_attempt().unwrap();
        assert_eq!(gate.state(), ConnectionState::Connecting);
        assert!(gate.complete(attempt, Ok(())));
        assert_eq!(gate.wait_outcome(attempt, Duration::from_secs(1)), AttemptOutcome::Connected);
        assert!(gate.is_connected());
    }

    #[test]
    fn test_failed_attempt_keeps_reason()
    {
        let gate = ConnectionWaitGate::new();
        let attempt = gate.begin_attempt().unwrap();
        assert!(gate.complete(attempt, Err("refused".to_string())));
        assert_eq!(
            gate.wait_outcome(attempt, Duration::from_secs(1)),
            AttemptOutcome::Failed("refused".to_string())
        );
        assert_eq!(gate.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_begin_rejected_unless_disconnected()
    {
        let gate = ConnectionWaitGate::new();
        let attempt = gate.begin_attempt().unwrap();
        assert_eq!(gate.begin_attempt(), Err(ConnectionState::Connecting));
        gate.complete(attempt, Ok(()));
        assert_eq!(gate.begin_attempt(), Err(ConnectionState::Connected));
        gate.stop();
        assert_eq!(gate.begin_attempt(), Err(ConnectionState::Stopped));
    }

    #[test]
    fn test_timeout_abandons_attempt()
    {
        let gate = ConnectionWaitGate::new();
        let first = gate.begin_attempt().unwrap();
        assert_eq!(gate.wait_outcome(first, Duration::from_millis(20)), AttemptOutcome::TimedOut);
        assert_eq!(gate.state(), ConnectionState::Disconnected);

        // A late completion of the abandoned attempt must not connect.
        assert!(!gate.complete(first, Ok(())));
        assert_eq!(gate.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stale_completion_ignored_on_reconnect()
    {
        let gate = ConnectionWaitGate::new();
        let first = gate.begin_attempt().unwrap();
        gate.complete(first, Err("refused".to_string()));

        let second = gate.begin_attempt().unwrap();
        assert!(!gate.complete(first, Ok(())));
        assert_eq!(gate.state(), ConnectionState::Connecting);
        assert!(gate.complete(second, Ok(())));
        assert!(!gate.mark_disconnected(first));
        assert!(gate.mark_disconnected(second));
        assert!(!gate.mark_disconnected(second));
    }

    #[test]
    fn test_stop_wakes_waiter()
    {
        let gate = Arc::new(ConnectionWaitGate::new());
        let attempt = gate.begin_attempt().unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_outcome(attempt, Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(gate.stop());
        assert!(!gate.stop());
        assert_eq!(waiter.join().unwrap(), AttemptOutcome::Stopped);
    }

    #[test]
    fn test_completion_from_other_thread()
    {
        let gate = Arc::new(ConnectionWaitGate::new());
        let attempt = gate.begin_attempt().unwrap();

        let io = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.complete(attempt, Ok(())))
        };
        assert_eq!(gate.wait_outcome(attempt, Duration::from_secs(5)), AttemptOutcome::Connected);
        assert!(io.join().unwrap());
    }
}
