//! # Wire Framing
//!
//! Every message is a fixed header followed by the payload:
//!
//! ```text
//! +----------------+-------------------+------------------+
//! | command_id i32 | payload_len u32   | payload bytes    |
//! | little-endian  | little-endian     | payload_len long |
//! +----------------+-------------------+------------------+
//! ```
//!
//! Frames are written back to back on one ordered byte stream. The length
//! prefix is the only boundary information: a corrupted length desynchronizes
//! the stream for good, so the decoder refuses lengths over the configured
//! limit instead of trying to resynchronize.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{TransportError, TransportResult};

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 8;

/// One framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame
{
    /// Command identifier, interpreted by the session logic
    pub command_id: i32,
    /// Opaque payload
    pub payload: Vec<u8>,
}

impl Frame
{
    /// Create a frame.
    pub fn new(command_id: i32, payload: impl Into<Vec<u8>>) -> Self
    {
        Self {
            command_id,
            payload: payload.into(),
        }
    }

    /// Append the encoded frame to `out`.
    ///
    /// ## Errors
    ///
    /// - `PayloadTooLarge`: the payload length does not fit the `u32` prefix
    pub fn encode_into(&self, out: &mut Vec<u8>) -> TransportResult<()>
    {
        encode_parts(self.command_id, &self.payload, out)
    }

    /// Encode into a fresh buffer.
    ///
    /// ## Errors
    ///
    /// - `PayloadTooLarge`: the payload length does not fit the `u32` prefix
    pub fn to_bytes(&self) -> TransportResult<Vec<u8>>
    {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        self.encode_into(&mut out)?;
        Ok(out)
    }
}

/// Encode a frame from borrowed parts.
///
/// ## Errors
///
/// - `PayloadTooLarge`: the payload length does not fit the `u32` prefix
pub fn encode_parts(command_id: i32, payload: &[u8], out: &mut Vec<u8>) -> TransportResult<()>
{
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::PayloadTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    out.reserve(HEADER_LEN + payload.len());
    out.extend_from_slice(&command_id.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// Incremental decoder for a byte stream of frames.
#[derive(Debug)]
pub struct FrameDecoder
{
    buf: Vec<u8>,
    max_payload: usize,
}

impl FrameDecoder
{
    /// Decoder rejecting payloads over `max_payload` bytes.
    pub fn new(max_payload: usize) -> Self
    {
        Self {
            buf: Vec::new(),
            max_payload,
        }
    }

    /// Feed bytes received from the stream.
    pub fn push(&mut self, bytes: &[u8])
    {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize
    {
        self.buf.len()
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// ## Errors
    ///
    /// - `PayloadTooLarge`: the header declares more than `max_payload` bytes
    pub fn next_frame(&mut self) -> TransportResult<Option<Frame>>
    {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let command_id = i32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        let declared = u32::from_le_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]);
        let len = usize::try_from(declared).unwrap_or(usize::MAX);
        if len > self.max_payload {
            return Err(TransportError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }

        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        let payload = self.buf[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.buf.drain(..HEADER_LEN + len);
        Ok(Some(Frame { command_id, payload }))
    }
}

/// Reads whole frames from an async byte stream.
pub struct FrameReader<R>
{
    reader: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R>
{
    /// Wrap `reader`, rejecting payloads over `max_payload` bytes.
    pub fn new(reader: R, max_payload: usize) -> Self
    {
        Self {
            reader,
            decoder: FrameDecoder::new(max_payload),
            chunk: vec![0; 8 * 1024],
        }
    }

    /// Next frame, or `None` on a clean end of stream.
    ///
    /// ## Errors
    ///
    /// - `Io`: read failure, or the stream ended inside a frame
    /// - `PayloadTooLarge`: corrupted length prefix
    pub async fn next(&mut self) -> TransportResult<Option<Frame>>
    {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(Some(frame));
            }

            let read = self.reader.read(&mut self.chunk).await?;
            if read == 0 {
                if self.decoder.buffered() == 0 {
                    return Ok(None);
                }
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("stream ended with {} bytes of a partial frame", self.decoder.buffered()),
                )));
            }
            self.decoder.push(&self.chunk[..read]);
        }
    }
}

/// Write one frame and flush it.
///
/// ## Errors
///
/// - `Io`: write failure
/// - `PayloadTooLarge`: payload does not fit the `u32` prefix
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> TransportResult<()>
{
    let bytes = frame.to_bytes()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
