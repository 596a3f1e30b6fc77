//! Load-balancing reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌──────────────┐    ┌──────────────┐    ┌───────────────┐
//!     ──────────────────▶│ http::server │───▶│  Dispatcher  │───▶│ load_balancer │
//!                        └──────────────┘    └──────┬───────┘    │  round robin  │
//!                                                   │            └───────────────┘
//!                                                   ▼                    ▲
//!     Client Response    ┌──────────────┐    ┌──────────────┐            │
//!     ◀──────────────────│ status capture│◀──│ upstream     │◀── Backend │
//!                        └──────────────┘    │ client       │            │
//!                                            └──────────────┘    ┌───────┴───────┐
//!                                                                │ admin API /   │
//!                                                                │ config reload │
//!                                                                └───────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use lb_proxy::config::load_config;
use lb_proxy::lifecycle::{self, Shutdown};
use lb_proxy::observability::init_logging;

#[derive(Parser, Debug)]
#[command(name = "lb-proxy", version, about = "Load-balancing HTTP reverse proxy")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Do not reload the backend list when the config file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(&config.logging)?;

    tracing::info!(
        config_path = %args.config.display(),
        listen_addr = %config.server.listen_addr,
        target_addr = %config.proxy.target_addr,
        load_balancing = config.load_balancing.enabled,
        backends = config.load_balancing.backends.len(),
        log_level = %config.logging.level,
        "lb-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let watch_path = (!args.no_watch).then_some(args.config.as_path());
    lifecycle::start(config, watch_path, Shutdown::new()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
