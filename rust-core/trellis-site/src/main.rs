//! `trellis` - serve a Trellis site over HTTP.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trellis_core::{Server, ServerConfig};

/// Serve a Trellis site
#[derive(Debug, Parser)]
#[command(name = "trellis", version, about)]
struct Args {
    /// Site root containing config/, layouts/, templates/ and errors/
    #[arg(long, default_value_os_t = trellis_site::default_root())]
    root: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Largest accepted request body, in bytes
    #[arg(long, default_value_t = ServerConfig::default().max_body_size)]
    max_body_size: usize,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trellis=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let framework = trellis_site::framework(&args.root)
        .with_context(|| format!("failed to load site at {}", args.root.display()))?;
    info!(root = %args.root.display(), "Site loaded");

    let config = ServerConfig {
        address: args.bind,
        max_body_size: args.max_body_size,
        ..ServerConfig::default()
    };
    Server::new(Arc::new(framework))
        .with_config(config)
        .serve()
        .await?;
    Ok(())
}
