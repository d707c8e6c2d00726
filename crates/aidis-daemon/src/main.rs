//! AIDIS daemon entrypoint: loads configuration, runs the Lifecycle
//! Manager's startup sequence, waits for a termination signal, then runs
//! its shutdown sequence.

use anyhow::Result;
use tracing::{error, info};

use aidis_core::config::Config;
use aidis_daemon::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    aidis_telemetry::logging::init_logging("aidis-daemon", "info");

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        Config::default()
    });

    info!(pid = std::process::id(), version = env!("CARGO_PKG_VERSION"), "aidis daemon starting");

    let daemon = match Daemon::start(config).await {
        Ok(d) => d,
        Err(e) => {
            // Singleton conflicts and unrecoverable startup errors both
            // exit 1 (spec section 6); the PidLock's own error message
            // already names the live PID when that's the cause.
            error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    info!(port = ?daemon.http_port(), "aidis daemon ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c; shutting down anyway");
    }
    info!("shutdown signal received");

    daemon.shutdown().await;
    info!("aidis daemon exited cleanly");
    Ok(())
}
