//! # Front-end Listener
//!
//! The other end of a [`PipeTransporter`](crate::pipe::PipeTransporter): binds
//! the same endpoint name and accepts one engine connection at a time. Used by
//! the `emmy listen` command and by tests.
//!
//! Must be bound from inside a Tokio runtime.

use emmy_core::config::DEFAULT_MAX_PAYLOAD;
use tokio::io::{ReadHalf, WriteHalf};
use tracing::{debug, info};

use crate::endpoint::{PipeEndpoint, ServerStream};
use crate::error::TransportResult;
use crate::frame::{write_frame, Frame, FrameReader};

/// Listening side of a pipe endpoint.
pub struct PipeListener
{
    endpoint: PipeEndpoint,
    max_payload: usize,
    #[cfg(unix)]
    listener: tokio::net::UnixListener,
    #[cfg(windows)]
    pending: Option<tokio::net::windows::named_pipe::NamedPipeServer>,
}

impl PipeListener
{
    /// Bind `name`.
    ///
    /// ## Errors
    ///
    /// - `InvalidEndpoint`: unusable name
    /// - `Io`: the OS refused the endpoint (permissions, another front-end
    ///   already owns a Windows pipe of that name)
    pub fn bind(name: &str) -> TransportResult<Self>
    {
        let endpoint = PipeEndpoint::new(name)?;

        #[cfg(unix)]
        let listener = crate::endpoint::unix::bind(endpoint.location())?;
        #[cfg(windows)]
        let pending = Some(crate::endpoint::win::create(endpoint.location(), true)?);

        info!(%endpoint, "Listening for engine connections");
        Ok(Self {
            endpoint,
            max_payload: DEFAULT_MAX_PAYLOAD,
            #[cfg(unix)]
            listener,
            #[cfg(windows)]
            pending,
        })
    }

    /// Reject inbound frames larger than `max_payload`.
    #[must_use]
    pub fn with_max_payload(mut self, max_payload: usize) -> Self
    {
        self.max_payload = max_payload;
        self
    }

    pub fn endpoint(&self) -> &PipeEndpoint
    {
        &self.endpoint
    }

    /// Wait for the next engine to connect.
    ///
    /// ## Errors
    ///
    /// - `Io`: accept failed
    pub async fn accept(&mut self) -> TransportResult<PipeConnection>
    {
        #[cfg(unix)]
        let stream = {
            let (stream, _) = self.listener.accept().await?;
            stream
        };

        #[cfg(windows)]
        let stream = {
            let server = match self.pending.take() {
                Some(server) => server,
                None => crate::endpoint::win::create(self.endpoint.location(), false)?,
            };
            server.connect().await?;
            // Keep an instance open so the name stays reachable.
            self.pending = Some(crate::endpoint::win::create(self.endpoint.location(), false)?);
            server
        };

        debug!(endpoint = %self.endpoint, "Engine connected");
        Ok(PipeConnection::new(stream, self.max_payload))
    }
}

#[cfg(unix)]
impl Drop for PipeListener
{
    fn drop(&mut self)
    {
        let _ = std::fs::remove_file(self.endpoint.location());
    }
}

/// One accepted engine connection.
pub struct PipeConnection
{
    reader: FrameReader<ReadHalf<ServerStream>>,
    writer: WriteHalf<ServerStream>,
}

impl PipeConnection
{
    fn new(stream: ServerStream, max_payload: usize) -> Self
    {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read_half, max_payload),
            writer,
        }
    }

    /// Next frame from the engine, `None` once it disconnects.
    ///
    /// ## Errors
    ///
    /// - `Io`: read failed or the stream ended inside a frame
    /// - `PayloadTooLarge`: corrupted length prefix
    pub async fn read_frame(&mut self) -> TransportResult<Option<Frame>>
    {
        self.reader.next().await
    }

    /// Send one frame to the engine.
    ///
    /// ## Errors
    ///
    /// - `Io`: write failed
    pub async fn write_frame(&mut self, frame: &Frame) -> TransportResult<()>
    {
        write_frame(&mut self.writer, frame).await
    }
}
