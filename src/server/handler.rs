//! The boundary between the connection core and application logic.

use std::future::Future;

use tokio::io::AsyncWrite;

use crate::http::request::Request;
use crate::http::response::{HandlerError, StatusCode, default_headers};
use crate::http::writer::ResponseWriter;

/// Application logic invoked once per connection, after the request has been
/// fully parsed.
///
/// The handler drives the [`ResponseWriter`] itself, so it can stream a
/// chunked body and trailers. Returning `Ok(())` with a complete response is
/// the common case. Returning a [`HandlerError`] before anything was written
/// makes the connection answer with that status and message instead.
///
/// ```ignore
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn handle<W>(&self, w: &mut ResponseWriter<W>, _req: &Request) -> Result<(), HandlerError>
///     where
///         W: AsyncWrite + Unpin + Send,
///     {
///         w.write_status_line(StatusCode::Ok).await?;
///         w.write_headers(&default_headers(6)).await?;
///         w.write_body(b"hello\n").await?;
///         Ok(())
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle<W>(
        &self,
        w: &mut ResponseWriter<W>,
        req: &Request,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}

/// Adapts a synchronous handler that fills a body buffer.
///
/// On success the buffer is sent as `200 OK` with the default headers and a
/// matching `Content-Length`. On error nothing is written and the connection
/// reports the error's status and message.
pub struct Buffered<F>(pub F);

impl<F> Handler for Buffered<F>
where
    F: Fn(&Request, &mut Vec<u8>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    async fn handle<W>(&self, w: &mut ResponseWriter<W>, req: &Request) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut body = Vec::new();
        (self.0)(req, &mut body)?;

        w.write_status_line(StatusCode::Ok).await?;
        w.write_headers(&default_headers(body.len())).await?;
        w.write_body(&body).await?;
        Ok(())
    }
}
