//! Demo application served by the `rawhttp` binary.
//!
//! | target           | response                                           |
//! |------------------|----------------------------------------------------|
//! | `/yourproblem`   | 400 HTML page                                      |
//! | `/myproblem`     | 500 HTML page                                      |
//! | `/video`         | configured file, chunked, with digest trailers     |
//! | `/httpbin/<rest>`| `<upstream>/<rest>`, chunked, with digest trailers |
//! | anything else    | 200 HTML page                                      |

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite};
use tracing::{debug, warn};

use crate::config::Config;
use crate::digest::{self, Sha256};
use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::{HandlerError, StatusCode, default_headers};
use crate::http::writer::ResponseWriter;
use crate::proxy::upstream::{MAX_CHUNK_SIZE, ProxyHandler};
use crate::server::handler::Handler;

pub const PROXY_PREFIX: &str = "/httpbin/";

pub const SUCCESS_PAGE: &str = "<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>
";

pub const BAD_REQUEST_PAGE: &str = "<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>
";

pub const INTERNAL_ERROR_PAGE: &str = "<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>
";

pub const SHA256_TRAILER: &str = "X-Content-SHA256";
pub const LENGTH_TRAILER: &str = "X-Content-Length";

/// Headers for a chunked response that announces the digest trailers.
pub fn chunked_headers(content_type: &str) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Type", content_type);
    headers.set("Transfer-Encoding", "chunked");
    headers.set("Connection", "close");
    headers.set("Trailers", SHA256_TRAILER);
    headers.set("Trailers", LENGTH_TRAILER);
    headers
}

/// Running digest and length of a streamed body.
#[derive(Debug, Clone, Default)]
pub struct BodyDigest {
    hasher: Sha256,
}

impl BodyDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn len(&self) -> u64 {
        self.hasher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hasher.is_empty()
    }

    /// `X-Content-SHA256` (lowercase hex) and `X-Content-Length` trailers.
    pub fn trailers(self) -> Headers {
        let len = self.hasher.len();
        let mut trailers = Headers::new();
        trailers.set(SHA256_TRAILER, &digest::hex(&self.hasher.finalize()));
        trailers.set(LENGTH_TRAILER, &len.to_string());
        trailers
    }
}

pub struct DemoHandler {
    proxy: ProxyHandler,
    video_path: PathBuf,
}

impl DemoHandler {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let proxy = ProxyHandler::new(
            &cfg.upstream,
            Duration::from_secs(5),
            Duration::from_secs(30),
        )?;

        Ok(Self {
            proxy,
            video_path: cfg.video_path.clone(),
        })
    }

    async fn video<W>(&self, w: &mut ResponseWriter<W>) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut file = match File::open(&self.video_path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.video_path.display(), error = %e, "Cannot open video");
                return write_page(w, StatusCode::InternalServerError, INTERNAL_ERROR_PAGE).await;
            }
        };

        w.write_status_line(StatusCode::Ok).await?;
        w.write_headers(&chunked_headers("video/mp4")).await?;

        let mut digest = BodyDigest::new();
        let mut chunk = vec![0u8; MAX_CHUNK_SIZE];
        loop {
            let n = match file.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(path = %self.video_path.display(), error = %e, "Video read failed");
                    break;
                }
            };
            w.write_chunked_body(&chunk[..n]).await?;
            digest.update(&chunk[..n]);
        }

        debug!(len = digest.len(), "Video streamed");

        w.write_chunked_body_done().await?;
        w.write_trailers(&digest.trailers()).await?;
        Ok(())
    }
}

impl Handler for DemoHandler {
    async fn handle<W>(&self, w: &mut ResponseWriter<W>, req: &Request) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let target = req.target();
        if let Some(rest) = target.strip_prefix(PROXY_PREFIX) {
            return self.proxy.forward(w, rest).await;
        }

        match target {
            "/yourproblem" => write_page(w, StatusCode::BadRequest, BAD_REQUEST_PAGE).await,
            "/myproblem" => write_page(w, StatusCode::InternalServerError, INTERNAL_ERROR_PAGE).await,
            "/video" => self.video(w).await,
            _ => write_page(w, StatusCode::Ok, SUCCESS_PAGE).await,
        }
    }
}

async fn write_page<W>(
    w: &mut ResponseWriter<W>,
    status: StatusCode,
    page: &str,
) -> Result<(), HandlerError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut headers = default_headers(page.len());
    headers.replace("Content-Type", "text/html");

    w.write_status_line(status).await?;
    w.write_headers(&headers).await?;
    w.write_body(page.as_bytes()).await?;
    Ok(())
}
