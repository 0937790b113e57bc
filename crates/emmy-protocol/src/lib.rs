//! # emmy-protocol
//!
//! Communication layer between the injected Emmy engine and a debugger
//! front-end.
//!
//! ## Layers
//!
//! - [`transporter`]: the contract the session logic programs against
//! - [`pipe`]: the named-pipe implementation, driven by a single-threaded
//!   Tokio I/O runtime
//! - [`frame`]: `{command_id, length, payload}` wire framing
//! - [`listener`]: the front-end side of the pipe
//!
//! Inbound frames and connection drops reach the session logic as
//! [`TransportEvent`]s on a channel.

pub mod endpoint;
pub mod error;
pub mod events;
pub mod frame;
pub mod gate;
pub mod listener;
pub mod pipe;
pub mod transporter;

pub use endpoint::PipeEndpoint;
pub use error::{TransportError, TransportResult};
pub use events::{TransportEvent, TransportEventReceiver};
pub use frame::Frame;
pub use listener::{PipeConnection, PipeListener};
pub use pipe::PipeTransporter;
pub use transporter::{ConnectionState, StopStatus, Transporter};
