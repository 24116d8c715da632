//! HTTP/1.1 protocol implementation.
//!
//! One request and one response per connection; the connection is closed
//! once the response has been written.
//!
//! # Architecture
//!
//! - **`headers`**: case-insensitive field table and the field-line parser
//! - **`request`**: request line and request types
//! - **`parser`**: incremental request parser fed from partial reads
//! - **`connection`**: read buffer, request reader and per-connection driver
//! - **`response`**: status code table, default headers, handler errors
//! - **`writer`**: ordered response writer (status, headers, body or chunks, trailers)
//!
//! # Request parsing
//!
//! ```text
//!        ┌─────────────┐
//!        │    Init     │ ← Wait for "<method> <target> HTTP/1.1\r\n"
//!        └──────┬──────┘
//!               │ Request line parsed
//!               ▼
//!        ┌──────────────────┐
//!        │  ParsingHeaders  │ ← One field line per step, until the blank line
//!        └──────┬───────────┘
//!               │ Blank line
//!               ▼
//!        ┌──────────────────┐
//!        │   ParsingBody    │ ← Collect Content-Length bytes (none if absent)
//!        └──────┬───────────┘
//!               │ Body complete
//!               ▼
//!        ┌──────────────────┐
//!        │       Done       │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rawhttp::server::{Buffered, Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::serve(42069, Buffered(|req, body| {
//!         body.extend_from_slice(req.target().as_bytes());
//!         Ok(())
//!     }))
//!     .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.close().await
//! }
//! ```

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

pub use headers::Headers;
pub use request::{ParserState, Request, RequestLine};
pub use response::{HandlerError, StatusCode};
pub use writer::{ResponseWriter, WriteError, WriterState};
