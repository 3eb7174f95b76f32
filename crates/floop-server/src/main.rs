//! floop-server binary
//!
//! Opens the behavior graph store, starts the activation server on
//! localhost, prints the assigned address, and runs until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use floop_server::server;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floop_core::GraphStore;

#[derive(Debug, Parser)]
#[command(name = "floop-server", version, about = "Behavior graph activation server")]
struct Args {
    /// Custom graph database path (defaults to ~/.floop/graph.db)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Port to bind on localhost; 0 lets the OS assign one
    #[arg(long, default_value_t = 0)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store = Arc::new(GraphStore::open(args.db_path)?);

    let cancel = CancellationToken::new();
    let handle = server::start(store.clone(), args.port, cancel.clone()).await?;
    println!("http://{}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Received ctrl-c, shutting down");
    cancel.cancel();
    handle.wait().await;

    store.close()?;
    Ok(())
}
