use std::fmt;
use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;
use crate::http::response::{HandlerError, StatusCode};

/// Which part of the response the writer expects next.
///
/// ```text
/// NeedStatusLine → NeedHeaders → NeedBody ─ write_chunked_body* ─ write_chunked_body_done
///                                    ↺ write_body                         ↓
///                                              Done ← write_trailers ← NeedTrailers
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriterState {
    NeedStatusLine,
    NeedHeaders,
    NeedBody,
    NeedTrailers,
    Done,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::NeedStatusLine => "need status line",
            WriterState::NeedHeaders => "need headers",
            WriterState::NeedBody => "need body",
            WriterState::NeedTrailers => "need trailers",
            WriterState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum WriteError {
    /// The call does not fit the current state. Nothing was written.
    OutOfOrder {
        operation: &'static str,
        state: WriterState,
    },
    /// No status line is known for this code. Nothing was written.
    UnknownStatus(u16),
    Io(io::Error),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::OutOfOrder { operation, state } => {
                write!(f, "cannot {operation} while writer is in state '{state}'")
            }
            WriteError::UnknownStatus(code) => write!(f, "unknown status code {code}"),
            WriteError::Io(e) => write!(f, "write failed: {e}"),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        WriteError::Io(e)
    }
}

/// Serializes one response onto `W`, enforcing HTTP/1.1 framing order.
///
/// Every operation checks the current [`WriterState`] first; a call that does
/// not fit returns [`WriteError::OutOfOrder`] without touching the sink.
pub struct ResponseWriter<W> {
    conn: W,
    state: WriterState,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(conn: W) -> Self {
        Self {
            conn,
            state: WriterState::NeedStatusLine,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn get_ref(&self) -> &W {
        &self.conn
    }

    pub fn into_inner(self) -> W {
        self.conn
    }

    fn expect(&self, state: WriterState, operation: &'static str) -> Result<(), WriteError> {
        if self.state != state {
            return Err(WriteError::OutOfOrder {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Writes `HTTP/1.1 <code> <reason>\r\n`.
    pub async fn write_status_line(&mut self, code: impl Into<u16>) -> Result<(), WriteError> {
        self.expect(WriterState::NeedStatusLine, "write status line")?;
        let code = code.into();
        let status = StatusCode::from_u16(code).ok_or(WriteError::UnknownStatus(code))?;

        let line = format!("{}\r\n", status.status_line());
        self.conn.write_all(line.as_bytes()).await?;
        self.state = WriterState::NeedHeaders;
        Ok(())
    }

    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        self.expect(WriterState::NeedHeaders, "write headers")?;
        headers.write_to(&mut self.conn).await?;
        self.state = WriterState::NeedBody;
        Ok(())
    }

    /// Writes a plain body verbatim. Framing relies on a `Content-Length`
    /// header sent earlier; the length is not checked here, and the writer
    /// stays in [`WriterState::NeedBody`].
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.expect(WriterState::NeedBody, "write body")?;
        self.conn.write_all(body).await?;
        Ok(body.len())
    }

    /// Writes one `<hex-len>\r\n<bytes>\r\n` chunk and returns the payload
    /// length. An empty slice writes nothing, since a zero-size chunk would
    /// end the stream.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriteError> {
        self.expect(WriterState::NeedBody, "write chunked body")?;
        if chunk.is_empty() {
            return Ok(0);
        }

        let size = format!("{:X}\r\n", chunk.len());
        let mut frame = Vec::with_capacity(size.len() + chunk.len() + 2);
        frame.extend_from_slice(size.as_bytes());
        frame.extend_from_slice(chunk);
        frame.extend_from_slice(b"\r\n");

        self.conn.write_all(&frame).await?;
        Ok(chunk.len())
    }

    /// Writes the `0\r\n` last-chunk marker. The response is not complete
    /// until [`ResponseWriter::write_trailers`] adds the closing blank line,
    /// with an empty table when there are no trailers.
    ///
    /// Only valid in [`WriterState::NeedBody`]; from any other state this
    /// returns [`WriteError::OutOfOrder`], writes nothing and keeps the state.
    pub async fn write_chunked_body_done(&mut self) -> Result<(), WriteError> {
        self.expect(WriterState::NeedBody, "finish chunked body")?;
        self.conn.write_all(b"0\r\n").await?;
        self.state = WriterState::NeedTrailers;
        Ok(())
    }

    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        self.expect(WriterState::NeedTrailers, "write trailers")?;
        trailers.write_to(&mut self.conn).await?;
        self.state = WriterState::Done;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), WriteError> {
        self.conn.flush().await?;
        Ok(())
    }
}

impl From<WriteError> for HandlerError {
    fn from(e: WriteError) -> Self {
        HandlerError::internal(e.to_string())
    }
}
