//! # Pipe Transporter
//!
//! [`Transporter`] over a local named pipe (a Unix-domain socket on Unix).
//!
//! ## Threads
//!
//! The transporter owns a Tokio runtime with a single worker thread,
//! `emmy-io`, created on the first `connect`. All pipe I/O happens there:
//!
//! - the connect itself, which reports back through
//!   [`ConnectionWaitGate`] (the `on_pipe_connection` callback)
//! - a reader that decodes inbound frames into [`TransportEvent`]s
//! - a single writer draining the outbound queue, so frames sent from one
//!   thread leave in issue order
//!
//! The calling thread only ever blocks inside `connect`, waiting on the gate.
//!
//! ## State machine
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!      ^                        |                  |
//!      +-------failure----------+------drop--------+
//!
//! any state --stop--> Stopped (terminal)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::TrySendError;
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;

use emmy_core::sync::Mutex;
use emmy_core::TransportConfig;
use tokio::io::{AsyncWrite, ReadHalf};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::endpoint::{ClientStream, PipeEndpoint};
use crate::error::{TransportError, TransportResult};
use crate::events::{event_channel, TransportEvent, TransportEventReceiver, TransportEventSender};
use crate::frame::{write_frame, Frame, FrameReader};
use crate::gate::{AttemptOutcome, ConnectionWaitGate};
use crate::transporter::{ConnectionState, StopStatus, Transporter};

/// Name of the I/O worker thread.
pub const IO_THREAD_NAME: &str = "emmy-io";

/// Extra time the connect task gets beyond the caller's bound before it
/// gives up on its own.
const ABANDON_GRACE: Duration = Duration::from_millis(500);

/// State reachable from the I/O thread.
struct Shared
{
    gate: ConnectionWaitGate,
    events: TransportEventSender,
    // Set once the receiver has been handed out.
    subscribed: AtomicBool,
}

impl Shared
{
    /// Queue an event without blocking the I/O thread.
    fn publish(&self, event: TransportEvent) -> bool
    {
        if !self.subscribed.load(Ordering::Acquire) {
            debug!(event = %event.describe(), "No event receiver; event dropped");
            return false;
        }
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(event = %event.describe(), "Event queue full; event dropped");
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                debug!(event = %event.describe(), "Event receiver gone; event dropped");
                false
            }
        }
    }

    /// Completion of the asynchronous connect. Never blocks beyond the gate
    /// lock and performs no handshake.
    fn on_pipe_connection(&self, attempt: u64, status: Result<(), String>) -> bool
    {
        if let Err(reason) = &status {
            debug!(attempt, %reason, "Pipe connect failed");
        }
        self.gate.complete(attempt, status)
    }

    fn on_disconnect(&self, attempt: u64, reason: String)
    {
        if !self.gate.mark_disconnected(attempt) {
            return;
        }
        warn!(attempt, %reason, "Pipe connection lost");
        self.publish(TransportEvent::Disconnected { reason });
    }
}

/// Item on the outbound queue.
enum Outbound
{
    Frame(Frame),
    /// Acknowledged once every earlier frame has been written.
    Flush(std_mpsc::Sender<()>),
}

#[derive(Default)]
struct IoState
{
    runtime: Option<Runtime>,
    outbound: Option<UnboundedSender<Outbound>>,
    endpoint: Option<PipeEndpoint>,
}

/// Transporter over a local named pipe.
///
/// ## Example
///
/// ```rust,no_run
/// use emmy_protocol::{PipeTransporter, Transporter};
///
/// let transporter = PipeTransporter::new();
/// transporter.connect("emmy")?;
/// transporter.send(1, b"ping");
/// transporter.stop();
/// # Ok::<(), emmy_protocol::TransportError>(())
/// ```
pub struct PipeTransporter
{
    config: TransportConfig,
    shared: Arc<Shared>,
    io: Mutex<IoState>,
    events: Mutex<Option<TransportEventReceiver>>,
}

impl Default for PipeTransporter
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl PipeTransporter
{
    /// Transporter with the default [`TransportConfig`].
    pub fn new() -> Self
    {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self
    {
        let (sender, receiver) = event_channel(config.event_capacity);
        Self {
            config,
            shared: Arc::new(Shared {
                gate: ConnectionWaitGate::new(),
                events: sender,
                subscribed: AtomicBool::new(false),
            }),
            io: Mutex::new(IoState::default()),
            events: Mutex::new(Some(receiver)),
        }
    }

    pub fn config(&self) -> &TransportConfig
    {
        &self.config
    }

    /// Take the receiver of inbound frames and disconnect notices.
    ///
    /// Events arriving before the first call are dropped. Returns `None` after
    /// the first call.
    pub fn take_events(&self) -> Option<TransportEventReceiver>
    {
        let receiver = self.events.lock().take();
        if receiver.is_some() {
            self.shared.subscribed.store(true, Ordering::Release);
        }
        receiver
    }

    /// Endpoint of the last connect attempt, until `stop`.
    pub fn endpoint(&self) -> Option<String>
    {
        self.io.lock().endpoint.as_ref().map(ToString::to_string)
    }

    /// Block until every frame queued so far has been written to the pipe.
    ///
    /// Returns `false` if the connection went away or `timeout` elapsed first.
    pub fn flush(&self, timeout: Duration) -> bool
    {
        let (ack_tx, ack_rx) = std_mpsc::channel();
        let queued = {
            let io = self.io.lock();
            io.outbound
                .as_ref()
                .is_some_and(|queue| queue.send(Outbound::Flush(ack_tx)).is_ok())
        };
        queued && ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Start the I/O runtime if needed and spawn the connection task.
    fn launch(&self, endpoint: &PipeEndpoint, attempt: u64) -> TransportResult<()>
    {
        let mut io = self.io.lock();
        // `stop` marks the gate before taking this lock.
        if self.shared.gate.state() == ConnectionState::Stopped {
            return Err(TransportError::Stopped);
        }
        if io.runtime.is_none() {
            io.runtime = Some(build_runtime()?);
            debug!(thread = IO_THREAD_NAME, "I/O runtime started");
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = ConnectionTask {
            endpoint: endpoint.clone(),
            attempt,
            shared: Arc::clone(&self.shared),
            outbound: outbound_rx,
            max_payload: self.config.max_payload,
            connect_bound: self.config.connect_timeout + ABANDON_GRACE,
        };
        if let Some(runtime) = io.runtime.as_ref() {
            runtime.spawn(task.run());
        }
        io.outbound = Some(outbound_tx);
        io.endpoint = Some(endpoint.clone());
        Ok(())
    }
}

impl Transporter for PipeTransporter
{
    fn connect(&self, target: &str) -> TransportResult<()>
    {
        let endpoint = PipeEndpoint::new(target)?;
        let attempt = self.shared.gate.begin_attempt().map_err(|state| match state {
            ConnectionState::Stopped => TransportError::Stopped,
            other => TransportError::InvalidState(other),
        })?;
        info!(%endpoint, attempt, "Connecting to front-end");

        if let Err(e) = self.launch(&endpoint, attempt) {
            self.shared.on_pipe_connection(attempt, Err(e.to_string()));
            error!(%endpoint, error = %e, "Failed to start connect");
            return Err(e);
        }

        match self.shared.gate.wait_outcome(attempt, self.config.connect_timeout) {
            AttemptOutcome::Connected => {
                info!(%endpoint, "Connected to front-end");
                Ok(())
            }
            AttemptOutcome::Failed(reason) => {
                warn!(%endpoint, %reason, "Connect failed");
                Err(TransportError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason,
                })
            }
            AttemptOutcome::TimedOut => {
                warn!(%endpoint, timeout = ?self.config.connect_timeout, "Connect timed out");
                Err(TransportError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout: self.config.connect_timeout,
                })
            }
            AttemptOutcome::Stopped => Err(TransportError::Stopped),
        }
    }

    fn send(&self, command_id: i32, payload: &[u8])
    {
        if !self.shared.gate.is_connected() {
            warn!(command_id, len = payload.len(), "Not connected; frame dropped");
            return;
        }
        let io = self.io.lock();
        let queued = io
            .outbound
            .as_ref()
            .is_some_and(|queue| queue.send(Outbound::Frame(Frame::new(command_id, payload))).is_ok());
        if !queued {
            warn!(command_id, "Outbound queue closed; frame dropped");
        }
    }

    fn stop(&self) -> StopStatus
    {
        if !self.shared.gate.stop() {
            return StopStatus::AlreadyStopped;
        }

        let (runtime, endpoint) = {
            let mut io = self.io.lock();
            io.outbound = None;
            (io.runtime.take(), io.endpoint.take())
        };
        // Dropping the tasks closes the pipe handle.
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
        info!(endpoint = ?endpoint.map(|e| e.to_string()), "Pipe transporter stopped");
        StopStatus::Stopped
    }

    fn state(&self) -> ConnectionState
    {
        self.shared.gate.state()
    }
}

impl Drop for PipeTransporter
{
    fn drop(&mut self)
    {
        let _ = self.stop();
    }
}

fn build_runtime() -> TransportResult<Runtime>
{
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(IO_THREAD_NAME)
        .enable_all()
        .build()
        .map_err(TransportError::Runtime)
}

/// One connect attempt and, if it succeeds, the life of its connection.
struct ConnectionTask
{
    endpoint: PipeEndpoint,
    attempt: u64,
    shared: Arc<Shared>,
    outbound: UnboundedReceiver<Outbound>,
    max_payload: usize,
    connect_bound: Duration,
}

impl ConnectionTask
{
    async fn run(self)
    {
        let Self {
            endpoint,
            attempt,
            shared,
            mut outbound,
            max_payload,
            connect_bound,
        } = self;

        let stream = match tokio::time::timeout(connect_bound, endpoint.connect()).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                shared.on_pipe_connection(attempt, Err(e.to_string()));
                return;
            }
            Err(_) => {
                debug!(attempt, %endpoint, "Connect abandoned");
                return;
            }
        };

        if !shared.on_pipe_connection(attempt, Ok(())) {
            debug!(attempt, "Closing connection of an abandoned attempt");
            return;
        }

        let (read_half, mut write_half) = tokio::io::split(stream);
        let reason = tokio::select! {
            reason = read_loop(FrameReader::new(read_half, max_payload), &shared) => reason,
            reason = write_loop(&mut write_half, &mut outbound) => reason,
        };
        shared.on_disconnect(attempt, reason);
    }
}

async fn read_loop(mut reader: FrameReader<ReadHalf<ClientStream>>, shared: &Shared) -> String
{
    loop {
        match reader.next().await {
            Ok(Some(frame)) => {
                debug!(command_id = frame.command_id, len = frame.payload.len(), "Frame received");
                shared.publish(TransportEvent::Message(frame));
            }
            Ok(None) => return "pipe closed by peer".to_string(),
            Err(e) => {
                error!(error = %e, "Pipe read failed");
                return e.to_string();
            }
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(writer: &mut W, outbound: &mut UnboundedReceiver<Outbound>) -> String
{
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(frame) => {
                if let Err(e) = write_frame(writer, &frame).await {
                    error!(command_id = frame.command_id, error = %e, "Pipe write failed");
                    return e.to_string();
                }
            }
            Outbound::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    "outbound queue closed".to_string()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_send_before_connect_is_dropped()
    {
        let transporter = PipeTransporter::new();
        transporter.send(1, b"lost");
        assert_eq!(transporter.state(), ConnectionState::Disconnected);
        assert!(transporter.endpoint().is_none());
    }

    #[test]
    fn test_stop_without_connect()
    {
        let transporter = PipeTransporter::new();
        assert_eq!(transporter.stop(), StopStatus::Stopped);
        assert_eq!(transporter.stop(), StopStatus::AlreadyStopped);
        assert!(matches!(transporter.connect("emmy"), Err(TransportError::Stopped)));
    }

    #[test]
    fn test_flush_without_connection()
    {
        let transporter = PipeTransporter::new();
        assert!(!transporter.flush(Duration::from_millis(10)));
    }

    #[test]
    fn test_take_events_once()
    {
        let transporter = PipeTransporter::new();
        assert!(transporter.take_events().is_some());
        assert!(transporter.take_events().is_none());
    }

    #[test]
    fn test_invalid_name_leaves_state_untouched()
    {
        let transporter = PipeTransporter::new();
        assert!(matches!(transporter.connect(""), Err(TransportError::InvalidEndpoint(_))));
        assert_eq!(transporter.state(), ConnectionState::Disconnected);
    }
}
