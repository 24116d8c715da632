use std::fmt;
use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::http::parser::ParseError;
use crate::http::request::Request;
use crate::http::response::{HandlerError, StatusCode, default_headers};
use crate::http::writer::{ResponseWriter, WriterState};
use crate::server::handler::Handler;

/// Starting size of a connection's read buffer.
pub const INITIAL_BUFFER_SIZE: usize = 1024;

/// Growable read arena owned by a single connection.
///
/// Reads land after the filled prefix. [`ReadBuffer::consume`] drops parsed
/// bytes from the front so the unparsed remainder always starts at offset 0.
/// The logical capacity doubles only when a read is attempted on a full
/// buffer, i.e. when the parser could not make room by consuming.
#[derive(Debug)]
pub struct ReadBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// The bytes read but not yet consumed.
    pub fn filled(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    /// Drops the first `n` filled bytes; the remainder moves to the front.
    pub fn consume(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Removes and returns the first `n` filled bytes.
    pub fn split_to(&mut self, n: usize) -> Bytes {
        self.buf.split_to(n).freeze()
    }

    /// Reads once from `reader` into the unfilled tail, doubling the capacity
    /// first if there is no room left. Returns the number of bytes read; 0
    /// means end of stream.
    pub async fn fill_from<R>(&mut self, reader: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if self.is_full() {
            self.capacity *= 2;
        }
        let room = self.capacity - self.buf.len();
        self.buf.reserve(room);

        let mut tail = (&mut self.buf).limit(room);
        reader.read_buf(&mut tail).await
    }
}

/// Why no request could be read from a connection.
#[derive(Debug)]
pub enum ReadError {
    /// The transport failed.
    Io(io::Error),
    /// The peer closed the connection before sending anything.
    ConnectionClosed,
    /// The peer closed the connection in the middle of a request.
    Incomplete,
    /// The bytes received do not form a valid request.
    Parse(ParseError),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Io(e) => write!(f, "read failed: {e}"),
            ReadError::ConnectionClosed => write!(f, "connection closed before a request was sent"),
            ReadError::Incomplete => write!(f, "connection closed in the middle of a request"),
            ReadError::Parse(e) => write!(f, "HTTP parse error: {e}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(e) => Some(e),
            ReadError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        ReadError::Io(e)
    }
}

impl From<ParseError> for ReadError {
    fn from(e: ParseError) -> Self {
        ReadError::Parse(e)
    }
}

/// Reads exactly one request from `reader`, however the bytes are split
/// across reads.
pub async fn request_from_reader<R>(reader: &mut R) -> Result<Request, ReadError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = ReadBuffer::new();
    read_request(reader, &mut buffer).await
}

async fn read_request<R>(reader: &mut R, buffer: &mut ReadBuffer) -> Result<Request, ReadError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut request = Request::new();
    let mut received = 0;

    while !request.is_done() {
        let n = buffer.fill_from(reader).await?;
        if n == 0 {
            return Err(if received == 0 {
                ReadError::ConnectionClosed
            } else {
                ReadError::Incomplete
            });
        }
        received += n;

        let consumed = request.parse(buffer.filled())?;
        buffer.consume(consumed);
    }

    Ok(request)
}

/// One accepted connection: read a request, run the handler, close.
pub struct Connection<S> {
    stream: S,
    buffer: ReadBuffer,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: ReadBuffer::new(),
        }
    }

    pub async fn read_request(&mut self) -> Result<Request, ReadError> {
        read_request(&mut self.stream, &mut self.buffer).await
    }

    /// Handles the single request this connection carries.
    ///
    /// A malformed or truncated request is answered with a bare 400. Only
    /// transport failures are returned as errors.
    pub async fn run<H: Handler>(&mut self, handler: &H) -> anyhow::Result<()> {
        let request = match self.read_request().await {
            Ok(request) => request,
            Err(ReadError::ConnectionClosed) => {
                debug!("Peer closed connection without sending a request");
                return Ok(());
            }
            Err(ReadError::Io(e)) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Rejecting malformed request");
                self.reject().await?;
                return self.close().await;
            }
        };

        debug!(
            method = %request.method(),
            target = %request.target(),
            body_len = request.body.len(),
            "Request received"
        );

        let mut writer = ResponseWriter::new(&mut self.stream);
        if let Err(err) = handler.handle(&mut writer, &request).await {
            if writer.state() == WriterState::NeedStatusLine {
                debug!(status = err.status.as_u16(), error = %err.message, "Handler returned an error");
                write_handler_error(&mut writer, &err).await?;
            } else {
                warn!(
                    status = err.status.as_u16(),
                    error = %err.message,
                    state = %writer.state(),
                    "Handler failed after the response was started"
                );
            }
        }
        writer.flush().await?;

        self.close().await
    }

    async fn reject(&mut self) -> anyhow::Result<()> {
        let mut writer = ResponseWriter::new(&mut self.stream);
        writer.write_status_line(StatusCode::BadRequest).await?;
        writer.write_headers(&default_headers(0)).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "Shutdown after response failed");
        }
        Ok(())
    }
}

async fn write_handler_error<W>(
    writer: &mut ResponseWriter<W>,
    err: &HandlerError,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut headers = default_headers(0);
    headers.replace("Content-Length", &err.message.len().to_string());

    writer.write_status_line(err.status).await?;
    writer.write_headers(&headers).await?;
    writer.write_body(err.message.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffer_doubles_only_when_full() {
        let mut buffer = ReadBuffer::with_capacity(4);
        let mut input: &[u8] = b"abcdefghij";

        assert_eq!(buffer.fill_from(&mut input).await.unwrap(), 4);
        assert_eq!(buffer.capacity(), 4);
        assert!(buffer.is_full());

        assert_eq!(buffer.fill_from(&mut input).await.unwrap(), 4);
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.filled(), b"abcdefgh");
    }

    #[tokio::test]
    async fn consume_keeps_remainder_at_front() {
        let mut buffer = ReadBuffer::with_capacity(8);
        let mut input: &[u8] = b"GET /x";

        buffer.fill_from(&mut input).await.unwrap();
        buffer.consume(4);

        assert_eq!(buffer.filled(), b"/x");
        assert_eq!(buffer.capacity(), 8);
    }
}
