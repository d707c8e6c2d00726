//! Lifecycle Manager integration tests: singleton enforcement and
//! startup/shutdown ordering, exercised in-process against a temporary pid
//! file and port registry the way the source's `at-daemon/tests/` directory
//! drives its orchestrator in-process rather than through a spawned binary.

use aidis_core::config::Config;
use aidis_daemon::Daemon;

fn test_config(dir: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.daemon.skip_database = true;
    cfg.daemon.skip_stdio = true;
    cfg.daemon.pid_path = dir.join("aidis.pid").to_string_lossy().into_owned();
    cfg.daemon.port_registry_path = dir.join("aidis.ports.json").to_string_lossy().into_owned();
    cfg
}

#[tokio::test]
async fn second_instance_is_rejected_while_first_holds_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());

    let daemon = Daemon::start(cfg.clone()).await.expect("first instance starts");
    assert!(daemon.http_port().is_some());

    let err = Daemon::start(cfg).await.unwrap_err();
    assert!(err.to_string().contains("already running"));

    daemon.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_the_lock_for_a_later_instance() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let pid_path = std::path::PathBuf::from(&cfg.daemon.pid_path);

    let daemon = Daemon::start(cfg.clone()).await.expect("starts");
    assert!(pid_path.exists());
    daemon.shutdown().await;
    assert!(!pid_path.exists(), "shutdown should release the pid lock");

    // The lock is free again, so a second instance now starts cleanly.
    let daemon2 = Daemon::start(cfg).await.expect("restarts after clean shutdown");
    assert!(daemon2.http_port().is_some());
    daemon2.shutdown().await;
}

#[tokio::test]
async fn app_state_is_reachable_after_startup() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());

    let daemon = Daemon::start(cfg).await.expect("starts");
    let app = daemon.app();
    let health = app.storage.healthz().await;
    assert!(health.healthy);

    daemon.shutdown().await;
}
