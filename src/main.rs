//! mailcow-exporter — on-demand Prometheus exporter for mailcow.
//!
//! Listens for scrape requests and polls the mailcow management API of the
//! requested host on each one. Host, API key and scheme can come from the
//! request, from flags or from the environment.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use mailcow_exporter::server;

#[derive(Parser, Debug)]
#[command(author, version, about = "Prometheus exporter for mailcow mail server instances")]
struct Args {
    /// Default mailcow host to scrape when the request does not name one.
    #[arg(long, env = "MAILCOW_EXPORTER_HOST")]
    host: Option<String>,

    /// Default API key for the mailcow management API.
    #[arg(long = "apikey", env = "MAILCOW_EXPORTER_API_KEY")]
    api_key: Option<String>,

    /// Default connection scheme for API requests.
    #[arg(long, env = "MAILCOW_EXPORTER_SCHEME", default_value = "https")]
    scheme: String,

    /// Host and port to listen on.
    #[arg(long, env = "MAILCOW_EXPORTER_LISTEN", default_value = "0.0.0.0:9099")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailcow_exporter=info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    info!("mailcow-exporter v{}", env!("CARGO_PKG_VERSION"));
    if args.host.is_none() {
        info!("no default host configured; scrape requests must carry ?host=");
    }

    let state = server::AppState::new(args.host, args.api_key, args.scheme);
    let app = server::router(state);

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("could not bind {}", args.listen))?;
    info!(listen = %args.listen, "starting to listen");
    axum::serve(listener, app).await.context("server terminated")?;

    Ok(())
}
