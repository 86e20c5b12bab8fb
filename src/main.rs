//! framekv: a minimal key-value server
//!
//! Speaks a length-prefixed binary protocol over TCP:
//! - Requests are argument vectors (get, set, del)
//! - Responses carry a status code and an opaque body
//!
//! A single thread drives every connection through a readiness-multiplexed
//! event loop; all socket I/O is non-blocking.

use framekv::config::Config;
use framekv::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_frame_size = config.max_frame_size,
        max_connections = config.max_connections,
        "Starting framekv server"
    );

    runtime::run(&config)?;
    Ok(())
}
