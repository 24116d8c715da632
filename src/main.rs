use rawhttp::config::Config;
use rawhttp::routes::DemoHandler;
use rawhttp::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let handler = DemoHandler::new(&cfg)?;

    let server = Server::serve(cfg.port, handler).await?;
    tracing::info!("Server started on port {}", cfg.port);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.close().await?;
    tracing::info!("Server gracefully stopped");

    Ok(())
}
