use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::http::connection::Connection;
use crate::server::handler::Handler;

/// A running server: one accept loop plus one task per accepted connection.
///
/// Dropping the handle leaves the accept loop running; call
/// [`Server::close`] to stop it.
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    accept_loop: JoinHandle<()>,
}

impl Server {
    /// Listens on `port` on all interfaces and starts accepting in the background.
    pub async fn serve<H: Handler>(port: u16, handler: H) -> std::io::Result<Server> {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], port)), handler).await
    }

    pub async fn bind<H: Handler>(addr: impl ToSocketAddrs, handler: H) -> std::io::Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let accept_loop = tokio::spawn(accept_loop(
            listener,
            Arc::new(handler),
            Arc::clone(&closed),
            Arc::clone(&shutdown),
        ));

        Ok(Server {
            local_addr,
            closed,
            shutdown,
            accept_loop,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting and closes the listening socket.
    ///
    /// Returns once the accept loop has exited. Connections already accepted
    /// keep running until their response is written.
    pub async fn close(self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
        self.accept_loop.await?;

        info!("Server on {} closed", self.local_addr);
        Ok(())
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            res = listener.accept() => res,
        };

        match accepted {
            Ok((socket, peer)) => {
                debug!("Accepted connection from {}", peer);

                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let mut conn = Connection::new(socket);
                    if let Err(e) = conn.run(handler.as_ref()).await {
                        error!("Connection error from {}: {}", peer, e);
                    }
                });
            }
            Err(e) => {
                if closed.load(Ordering::SeqCst) {
                    break;
                }
                error!(error = %e, "Error accepting connection");
            }
        }
    }

    // listener is dropped here, which closes the socket
    debug!("Accept loop stopped");
}
