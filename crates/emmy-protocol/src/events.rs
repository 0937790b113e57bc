//! Transport event types and helpers.
//!
//! The session logic consumes these events to react to inbound frames and
//! connection drops without polling the transporter. The I/O thread publishes
//! an event for every decoded frame and exactly one `Disconnected` per lost
//! connection.
//!
//! The channel is bounded. The I/O thread never blocks on it: while the queue
//! is full, or before anyone has taken the receiver, new events are dropped.

use std::sync::mpsc;

use crate::frame::Frame;

/// Event emitted by a transporter's I/O thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent
{
    /// A complete frame arrived from the front-end.
    Message(Frame),
    /// An established connection was lost without `stop` being called.
    Disconnected
    {
        /// End-of-stream, read/write error, or framing corruption.
        reason: String,
    },
}

impl TransportEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::Message(frame) => {
                format!("Command {} ({} bytes)", frame.command_id, frame.payload.len())
            }
            Self::Disconnected { reason } => format!("Disconnected: {reason}"),
        }
    }
}

/// Sender side of the transport event channel.
pub type TransportEventSender = mpsc::SyncSender<TransportEvent>;
/// Receiver side of the transport event channel.
pub type TransportEventReceiver = mpsc::Receiver<TransportEvent>;

/// Create a transport event channel holding at most `capacity` undelivered
/// events.
#[must_use]
pub fn event_channel(capacity: usize) -> (TransportEventSender, TransportEventReceiver)
{
    mpsc::sync_channel(capacity)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_describe()
    {
        let message = TransportEvent::Message(Frame::new(12, b"abc".to_vec()));
        assert_eq!(message.describe(), "Command 12 (3 bytes)");

        let dropped = TransportEvent::Disconnected {
            reason: "pipe closed by peer".to_string(),
        };
        assert_eq!(dropped.describe(), "Disconnected: pipe closed by peer");
    }

    #[test]
    fn test_channel_is_bounded()
    {
        let (sender, receiver) = event_channel(2);
        for id in 0..2 {
            sender.try_send(TransportEvent::Message(Frame::new(id, Vec::new()))).unwrap();
        }
        assert!(matches!(
            sender.try_send(TransportEvent::Message(Frame::new(2, Vec::new()))),
            Err(mpsc::TrySendError::Full(_))
        ));
        assert_eq!(receiver.try_iter().count(), 2);
    }
}
