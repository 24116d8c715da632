//! Upstream request forwarding
//!
//! Fetches a resource from a plain-HTTP upstream and relays its body to the
//! client as a chunked response with digest trailers.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use url::Url;

use crate::http::connection::ReadBuffer;
use crate::http::headers::{Headers, find_crlf};
use crate::http::response::{HandlerError, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::routes::{BodyDigest, chunked_headers};

/// Largest chunk relayed to the client in one `write_chunked_body` call.
pub const MAX_CHUNK_SIZE: usize = 1024;

/// Status line and headers of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamHead {
    pub status: u16,
    pub headers: Headers,
}

/// Relays requests to one upstream base URL.
#[derive(Debug, Clone)]
pub struct ProxyHandler {
    upstream: Url,
    connection_timeout: Duration,
    request_timeout: Duration,
}

impl ProxyHandler {
    pub fn new(upstream: &str, connection_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let mut upstream = Url::parse(upstream).context("Invalid upstream URL")?;
        if upstream.scheme() != "http" {
            bail!("Unsupported upstream scheme '{}', only http is supported", upstream.scheme());
        }
        if upstream.host_str().is_none() {
            bail!("Upstream URL missing host");
        }
        // join() replaces the last segment unless the base ends with '/'
        if !upstream.path().ends_with('/') {
            let path = format!("{}/", upstream.path());
            upstream.set_path(&path);
        }

        Ok(Self {
            upstream,
            connection_timeout,
            request_timeout,
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Resolves a client path (relative to the proxy prefix) against the upstream base.
    pub fn upstream_url(&self, path: &str) -> Result<Url> {
        self.upstream
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid upstream path '{}'", path))
    }

    /// Build the GET request sent upstream.
    pub fn build_http_request(&self, url: &Url) -> Vec<u8> {
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let mut buffer = format!("GET {} HTTP/1.1\r\n", target).into_bytes();

        let mut headers = Headers::new();
        if let Some(host) = url.host_str() {
            let host_value = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            headers.set("Host", &host_value);
        }
        headers.set("Accept", "*/*");
        headers.set("Connection", "close");
        buffer.extend_from_slice(&headers.to_bytes());

        buffer
    }

    /// Relays `path` from the upstream to `w`.
    ///
    /// Failures before the status line is written come back as a
    /// [`HandlerError`] (502, or 504 on timeout). Once streaming has started an
    /// upstream failure ends the body early; the trailers still report the
    /// length and digest of what was relayed.
    pub async fn forward<W>(&self, w: &mut ResponseWriter<W>, path: &str) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let url = self
            .upstream_url(path)
            .map_err(|e| HandlerError::bad_request(e.to_string()))?;

        debug!(upstream = %url, "Forwarding request to upstream");

        let (head, mut body) = match timeout(self.request_timeout, self.open(&url)).await {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                warn!(upstream = %url, error = %e, "Upstream request failed");
                return Err(HandlerError::new(
                    StatusCode::BadGateway,
                    format!("Failed to fetch {}: {}", url, e),
                ));
            }
            Err(_) => {
                warn!(upstream = %url, "Upstream request timed out");
                return Err(HandlerError::new(
                    StatusCode::GatewayTimeout,
                    "The upstream server did not respond in time.",
                ));
            }
        };

        let status = StatusCode::from_u16(head.status).ok_or_else(|| {
            HandlerError::new(
                StatusCode::BadGateway,
                format!("Upstream answered with unsupported status {}", head.status),
            )
        })?;
        let content_type = head.headers.get("content-type").unwrap_or("text/plain");

        w.write_status_line(status).await?;
        w.write_headers(&chunked_headers(content_type)).await?;

        let mut digest = BodyDigest::new();
        loop {
            match body.next_chunk().await {
                Ok(Some(chunk)) => {
                    trace!(len = chunk.len(), "Relaying chunk");
                    w.write_chunked_body(&chunk).await?;
                    digest.update(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(upstream = %url, error = %e, "Upstream body ended early");
                    break;
                }
            }
        }

        debug!(upstream = %url, status = status.as_u16(), len = digest.len(), "Upstream body relayed");

        w.write_chunked_body_done().await?;
        w.write_trailers(&digest.trailers()).await?;
        Ok(())
    }

    async fn open(&self, url: &Url) -> Result<(UpstreamHead, UpstreamBody)> {
        let host = url.host_str().context("Upstream URL missing host")?;
        let port = url.port_or_known_default().unwrap_or(80);

        let mut stream = timeout(self.connection_timeout, TcpStream::connect((host, port)))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to upstream")?;
        trace!(upstream = %url, "Connected to upstream");

        stream.write_all(&self.build_http_request(url)).await?;
        stream.flush().await?;

        let mut buffer = ReadBuffer::new();
        let head = read_head(&mut stream, &mut buffer).await?;
        let framing = Framing::from_headers(&head.headers)?;

        Ok((
            head,
            UpstreamBody {
                stream,
                buffer,
                framing,
            },
        ))
    }
}

/// Reads the status line and header block of an upstream response.
pub async fn read_head<R>(stream: &mut R, buffer: &mut ReadBuffer) -> Result<UpstreamHead>
where
    R: tokio::io::AsyncRead + Unpin + ?Sized,
{
    let status = loop {
        if let Some(end) = find_crlf(buffer.filled()) {
            let status = parse_status_line(&buffer.filled()[..end])?;
            buffer.consume(end + 2);
            break status;
        }
        if buffer.fill_from(stream).await? == 0 {
            bail!("Upstream closed before sending a status line");
        }
    };

    let mut headers = Headers::new();
    loop {
        let (n, done) = headers.parse_line(buffer.filled())?;
        if n == 0 {
            if buffer.fill_from(stream).await? == 0 {
                bail!("Upstream closed in the middle of its headers");
            }
            continue;
        }
        buffer.consume(n);
        if done {
            break;
        }
    }

    Ok(UpstreamHead { status, headers })
}

fn parse_status_line(line: &[u8]) -> Result<u16> {
    let line = std::str::from_utf8(line).context("Invalid UTF-8 in upstream status line")?;
    let mut parts = line.splitn(3, ' ');

    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        bail!("Invalid upstream status line: {}", line);
    }
    parts
        .next()
        .and_then(|code| code.parse().ok())
        .with_context(|| format!("Invalid upstream status line: {}", line))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length(usize),
    Chunked(ChunkState),
    UntilEof,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(usize),
    DataEnd,
    Trailers,
}

impl Framing {
    fn from_headers(headers: &Headers) -> Result<Self> {
        if let Some(te) = headers.get("transfer-encoding") {
            if te
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            {
                return Ok(Framing::Chunked(ChunkState::Size));
            }
        }
        match headers.get("content-length") {
            Some(cl) => {
                let len = cl
                    .parse()
                    .with_context(|| format!("Invalid upstream Content-Length '{}'", cl))?;
                Ok(Framing::Length(len))
            }
            None => Ok(Framing::UntilEof),
        }
    }
}

/// Decodes an upstream body (Content-Length, chunked, or read-to-close)
/// into pieces of at most [`MAX_CHUNK_SIZE`] bytes.
pub struct UpstreamBody {
    stream: TcpStream,
    buffer: ReadBuffer,
    framing: Framing,
}

impl UpstreamBody {
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.framing {
                Framing::Done | Framing::Length(0) => {
                    self.framing = Framing::Done;
                    return Ok(None);
                }

                Framing::Length(remaining) => {
                    self.ensure_data().await?;
                    let n = remaining.min(self.buffer.len()).min(MAX_CHUNK_SIZE);
                    self.framing = Framing::Length(remaining - n);
                    return Ok(Some(self.buffer.split_to(n)));
                }

                Framing::UntilEof => {
                    if self.buffer.is_empty() && self.fill().await? == 0 {
                        self.framing = Framing::Done;
                        return Ok(None);
                    }
                    let n = self.buffer.len().min(MAX_CHUNK_SIZE);
                    return Ok(Some(self.buffer.split_to(n)));
                }

                Framing::Chunked(ChunkState::Size) => {
                    let line = self.read_line().await?;
                    let size = parse_chunk_size(&line)?;
                    self.framing = if size == 0 {
                        Framing::Chunked(ChunkState::Trailers)
                    } else {
                        Framing::Chunked(ChunkState::Data(size))
                    };
                }

                Framing::Chunked(ChunkState::Data(remaining)) => {
                    self.ensure_data().await?;
                    let n = remaining.min(self.buffer.len()).min(MAX_CHUNK_SIZE);
                    self.framing = if n == remaining {
                        Framing::Chunked(ChunkState::DataEnd)
                    } else {
                        Framing::Chunked(ChunkState::Data(remaining - n))
                    };
                    return Ok(Some(self.buffer.split_to(n)));
                }

                Framing::Chunked(ChunkState::DataEnd) => {
                    if !self.read_line().await?.is_empty() {
                        bail!("Missing CRLF after upstream chunk data");
                    }
                    self.framing = Framing::Chunked(ChunkState::Size);
                }

                // upstream trailers are not relayed
                Framing::Chunked(ChunkState::Trailers) => {
                    if self.read_line().await?.is_empty() {
                        self.framing = Framing::Done;
                    }
                }
            }
        }
    }

    async fn fill(&mut self) -> Result<usize> {
        Ok(self.buffer.fill_from(&mut self.stream).await?)
    }

    async fn ensure_data(&mut self) -> Result<()> {
        if self.buffer.is_empty() && self.fill().await? == 0 {
            bail!("Upstream closed before the body was complete");
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Bytes> {
        loop {
            if let Some(end) = find_crlf(self.buffer.filled()) {
                let line = self.buffer.split_to(end);
                self.buffer.consume(2);
                return Ok(line);
            }
            if self.fill().await? == 0 {
                bail!("Upstream closed in the middle of a chunk line");
            }
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize> {
    let line = std::str::from_utf8(line).context("Invalid UTF-8 in chunk size")?;
    // drop chunk extensions
    let size = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(size, 16).with_context(|| format!("Invalid chunk size '{}'", size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_with_extension() {
        assert_eq!(parse_chunk_size(b"1A").unwrap(), 26);
        assert_eq!(parse_chunk_size(b"ff;name=value").unwrap(), 255);
        assert!(parse_chunk_size(b"zz").is_err());
    }

    #[test]
    fn status_line() {
        assert_eq!(parse_status_line(b"HTTP/1.1 200 OK").unwrap(), 200);
        assert_eq!(parse_status_line(b"HTTP/1.0 404 Not Found").unwrap(), 404);
        assert!(parse_status_line(b"SPDY/3 200 OK").is_err());
        assert!(parse_status_line(b"HTTP/1.1 abc").is_err());
    }

    #[test]
    fn framing_prefers_chunked() {
        let mut headers = Headers::new();
        headers.set("Content-Length", "10");
        headers.set("Transfer-Encoding", "gzip, chunked");
        assert_eq!(
            Framing::from_headers(&headers).unwrap(),
            Framing::Chunked(ChunkState::Size)
        );

        headers.remove("transfer-encoding");
        assert_eq!(Framing::from_headers(&headers).unwrap(), Framing::Length(10));

        assert_eq!(Framing::from_headers(&Headers::new()).unwrap(), Framing::UntilEof);
    }
}
