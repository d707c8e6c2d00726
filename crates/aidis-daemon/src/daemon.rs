//! Lifecycle Manager: singleton enforcement, the five-step startup
//! sequence, and the five-step shutdown sequence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use aidis_bridge::{HttpState, StdioTransport};
use aidis_core::cache::StorageGateway;
use aidis_core::config::Config;
use aidis_core::lockfile::PidLock;
use aidis_core::port_manager::PortManager;
use aidis_handlers::AppState;
use aidis_harness::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use aidis_harness::shutdown::ShutdownSignal;

const DAEMON_SESSION_CALLER: &str = "aidis-daemon";
const SERVICE_NAME: &str = "aidis-mcp";
const SERVICE_HEALTH_PATH: &str = "/healthz";

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// A running daemon instance: owns the singleton lock, the bound HTTP port,
/// and the background task handles, so shutdown can unwind them in order.
pub struct Daemon {
    app: Arc<AppState>,
    shutdown: ShutdownSignal,
    db_circuit: CircuitBreaker,
    pid_lock: Option<PidLock>,
    port_manager: PortManager,
    http_port: Option<u16>,
    http_handle: Option<tokio::task::JoinHandle<()>>,
    stdio_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Daemon {
    /// Runs the five-step startup sequence and returns a handle to the
    /// running daemon. Each step honors its documented skip flag.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let mut pid_lock = PidLock::new(expand_tilde(&config.daemon.pid_path));
        pid_lock
            .acquire_or_fail()
            .map_err(|e| anyhow::anyhow!(e))?;
        info!(pid = std::process::id(), "acquired singleton lock");

        let shutdown = ShutdownSignal::new();
        let db_circuit = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.retry.circuit_failure_threshold,
            success_threshold: 1,
            timeout: Duration::from_secs(config.retry.circuit_recovery_secs),
            call_timeout: Duration::from_secs(10),
        });

        // Step 1: storage pool, with retry + circuit breaker.
        let storage = if config.daemon.skip_database {
            warn!("AIDIS_SKIP_DATABASE set; starting with an in-memory store");
            StorageGateway::new_in_memory().await?
        } else {
            Self::init_storage_with_retry(&config, &db_circuit).await?
        };
        let app = Arc::new(AppState::new(storage));

        // Step 2: ensure an active session exists for this process.
        app.ambient.ensure_session(DAEMON_SESSION_CALLER, &app.storage).await?;

        // Step 3: background workers. The queue, git tracker, and
        // pattern/metrics/complexity services are external collaborators
        // this specification does not contract; the daemon degrades to
        // running without them rather than failing startup.
        if config.daemon.skip_background {
            info!("AIDIS_SKIP_BACKGROUND set; no background workers started");
        } else {
            info!("no background workers are wired into this build; continuing without them");
        }

        // Step 4: HTTP server + Port Manager registration.
        let port_manager = PortManager::new(expand_tilde(&config.daemon.port_registry_path));
        let port = match config.daemon.port {
            Some(p) => p,
            None => port_manager.assign_port(&config.daemon.host)?,
        };
        let http_state = HttpState::new(Arc::clone(&app), db_circuit.clone());
        let listener = tokio::net::TcpListener::bind((config.daemon.host.as_str(), port)).await?;
        let bound_port = listener.local_addr()?.port();
        let router = aidis_bridge::router(http_state);
        let http_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!(error = %e, "http server exited with an error");
            }
        });
        port_manager.register_service(SERVICE_NAME, bound_port, SERVICE_HEALTH_PATH)?;
        info!(port = bound_port, "http transport listening");

        // Step 5: stdio transport, unless suppressed.
        let stdio_handle = if config.daemon.skip_stdio {
            info!("AIDIS_SKIP_STDIO set; stdio transport not attached");
            None
        } else {
            let stdio_app = Arc::clone(&app);
            Some(tokio::spawn(async move {
                let transport = StdioTransport::new(stdio_app);
                if let Err(e) = transport.run().await {
                    warn!(error = %e, "stdio transport exited with an error");
                }
            }))
        };

        Ok(Self {
            app,
            shutdown,
            db_circuit,
            pid_lock: Some(pid_lock),
            port_manager,
            http_port: Some(bound_port),
            http_handle: Some(http_handle),
            stdio_handle,
        })
    }

    async fn init_storage_with_retry(config: &Config, circuit: &CircuitBreaker) -> anyhow::Result<StorageGateway> {
        let path = expand_tilde(&config.database.path);
        let max_attempts = config.retry.max_attempts.max(1);
        let mut backoff = Duration::from_millis(config.retry.initial_backoff_ms);

        for attempt in 1..=max_attempts {
            let path = path.clone();
            match circuit.call(|| async move { StorageGateway::new(path).await }).await {
                Ok(gateway) => {
                    info!("database pool initialized");
                    return Ok(gateway);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(attempt, error = %e, "database init failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    return Err(anyhow::anyhow!("database init failed after {attempt} attempts: {e}"));
                }
            }
        }
        unreachable!("loop always returns on the final attempt")
    }

    pub fn app(&self) -> Arc<AppState> {
        Arc::clone(&self.app)
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn http_port(&self) -> Option<u16> {
        self.http_port
    }

    /// Runs the five-step shutdown sequence. Each step is best-effort: a
    /// failure is logged and the sequence continues so later steps (in
    /// particular, releasing the singleton lock) still run.
    pub async fn shutdown(mut self) {
        self.shutdown.trigger();

        // Step 1: end the active session.
        if let Err(e) = self.app.ambient.end_session(DAEMON_SESSION_CALLER, &self.app.storage).await {
            warn!(error = %e, "failed to end daemon session during shutdown");
        }

        // Step 2: stop background workers in reverse order. None are wired
        // into this build (see step 3 of startup).

        // Step 3: close the HTTP server, unregister from the Port Manager.
        if let Some(handle) = self.http_handle.take() {
            handle.abort();
        }
        if let Err(e) = self.port_manager.unregister_service(SERVICE_NAME) {
            warn!(error = %e, "failed to unregister service from port manager");
        }
        if let Some(handle) = self.stdio_handle.take() {
            handle.abort();
        }

        // Step 4: close the storage pool. The gateway has no explicit close
        // handle; dropping the last `Arc<AppState>` reference releases the
        // underlying connection. `dbHealthy` tracking lives in the circuit
        // breaker, which we leave in whatever state it last observed.
        drop(self.db_circuit.clone());

        // Step 5: release the singleton lock.
        if let Some(mut lock) = self.pid_lock.take() {
            lock.release();
        }

        info!("shutdown sequence complete");
    }
}
