//! UDP messenger node.
//!
//! Runs a directory node: other nodes advertise themselves with
//! `PUT /advertise`, and anyone can list the known nodes with `GET /nodes`.
//!
//! ```text
//!   datagram ──▶ socket ──▶ codec ──▶ router ──▶ handler
//!                                                  │
//!   datagram ◀── neighbor ◀── codec ◀── commit ◀───┘
//!
//!   local events (terminate, forget temporary node) interleave with datagrams
//!   on the same loop
//! ```

use std::path::PathBuf;

use clap::Parser;

use udp_messenger::config::load_config;
use udp_messenger::lifecycle::terminate_on_ctrl_c;
use udp_messenger::observability::{init_logging, init_metrics};
use udp_messenger::services::DirectoryService;
use udp_messenger::Messenger;

#[derive(Parser)]
#[command(name = "messenger-node")]
#[command(about = "Run a UDP messenger directory node", long_about = None)]
struct Cli {
    /// Path to the node's TOML configuration.
    #[arg(short, long, default_value = "node.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    init_logging(config.log_level());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "messenger-node starting"
    );

    if let Some(address) = config.metrics_address() {
        match address.parse() {
            Ok(addr) => {
                init_metrics(addr);
            }
            Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
        }
    }

    let mut messenger = Messenger::new(config)?;
    tracing::info!(
        tag = %messenger.node_self().tag(),
        address = %messenger.node_self().address(),
        "Configuration loaded"
    );

    let node = messenger.node_self().clone();
    tokio::spawn(async move {
        if let Err(e) = terminate_on_ctrl_c(node).await {
            tracing::error!(error = %e, "Failed to stop node on signal");
        }
    });

    messenger.run(&mut DirectoryService::new()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
