use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use testtrack_core::config::ConfigOverrides;
use testtrack_core::TestTrackConfig;
use testtrack_server::router;
use testtrack_server::state::AppState;
use tracing_subscriber::EnvFilter;

/// Local stand-in for the split registry and visitor-override endpoints a
/// real TestTrack deployment serves, so app code can run against a fixed
/// schema and ad-hoc overrides without a network round trip.
#[derive(Parser)]
#[command(name = "testtrack-server", about = "Local TestTrack serving plane")]
struct Cli {
    /// Bind address, e.g. 127.0.0.1:7474 (overrides --port, TESTTRACK_LISTEN, PORT)
    #[arg(long, value_name = "HOST:PORT")]
    listen: Option<String>,

    /// Bind port on 127.0.0.1 (overrides TESTTRACK_LISTEN, PORT)
    #[arg(long, value_name = "N")]
    port: Option<u16>,

    /// Emit a tracing span for every inbound request at info level
    #[arg(long)]
    log_requests: bool,
}

fn listen_addr(cli: &Cli) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    if let Some(listen) = &cli.listen {
        return Ok(listen.parse()?);
    }
    if let Some(port) = cli.port {
        return Ok(SocketAddr::from(([127, 0, 0, 1], port)));
    }
    if let Ok(listen) = std::env::var("TESTTRACK_LISTEN") {
        return Ok(listen.parse()?);
    }
    if let Ok(port) = std::env::var("PORT") {
        return Ok(SocketAddr::from(([127, 0, 0, 1], port.parse()?)));
    }
    Ok(SocketAddr::from(([127, 0, 0, 1], 7474)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.log_requests { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let addr = listen_addr(&cli)?;
    let config = TestTrackConfig::load(&ConfigOverrides::default());
    let state = Arc::new(AppState::new(config));
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "testtrack-server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}
