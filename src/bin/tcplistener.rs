//! Prints every request received on the configured port.

use rawhttp::config::Config;
use rawhttp::http::connection::request_from_reader;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let listener = TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        match request_from_reader(&mut socket).await {
            Ok(request) => println!("{}", request),
            Err(e) => error!("Failed to read request from {}: {}", peer, e),
        }
        info!("Connection from {} closed", peer);
    }
}
