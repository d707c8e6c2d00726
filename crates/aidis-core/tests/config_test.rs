use aidis_core::config::Config;

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.project_name, "aidis");
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.daemon.pid_path, "./run/aidis.pid");
    assert_eq!(cfg.retry.max_attempts, 3);
    assert_eq!(cfg.retry.circuit_failure_threshold, 5);
    assert_eq!(cfg.retry.circuit_recovery_secs, 30);
}

#[test]
fn config_roundtrip() {
    let cfg = Config::default();
    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("aidis"));

    let parsed: Config = toml::from_str(&toml_str).expect("parse toml back");
    assert_eq!(parsed.general.project_name, cfg.general.project_name);
    assert_eq!(parsed.database.pool_max, cfg.database.pool_max);
}

#[test]
fn config_partial_toml_fills_in_defaults() {
    let partial = r#"
[general]
project_name = "my-project"

[daemon]
pid_path = "/tmp/custom.pid"
"#;
    let cfg: Config = toml::from_str(partial).expect("parse partial");
    assert_eq!(cfg.general.project_name, "my-project");
    assert_eq!(cfg.daemon.pid_path, "/tmp/custom.pid");
    // defaults fill in the rest
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.database.pool_max, 10);
}

#[test]
fn load_from_file_then_overridden_by_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[database]
host = "from-file"
"#,
    )
    .unwrap();

    // SAFETY: single-threaded test, no other test touches this var.
    unsafe {
        std::env::set_var("AIDIS_DATABASE_HOST", "from-env");
        std::env::set_var("AIDIS_CONFIG_PATH", &path);
    }
    let cfg = Config::load().unwrap();
    unsafe {
        std::env::remove_var("AIDIS_DATABASE_HOST");
        std::env::remove_var("AIDIS_CONFIG_PATH");
    }

    assert_eq!(cfg.database.host, "from-env");
}
