mod api;
mod config;
mod delivery;
mod error;
mod listing;
mod openapi;
mod resolver;
mod startup;
mod state;
mod transcode;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recording-browser")]
struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:8080
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Root directory of the recordings to expose
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Mount every route under this path prefix, e.g. /recordings
    #[arg(long)]
    url_prefix: Option<String>,

    /// Optional server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,recording_browser=info")
        }))
        .init();

    startup::run(args).await
}
