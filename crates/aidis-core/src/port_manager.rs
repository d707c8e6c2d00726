//! Port Manager: assigns and persists `service name -> {port, healthPath}`
//! so peers (a pre-flight check, a CLI) can discover a running instance
//! without guessing a port.
//!
//! Persistence follows the same pattern as [`crate::lockfile`]: a JSON file
//! next to the PID file, read-modify-written under a process-wide mutex.

use std::collections::HashMap;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PortManagerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not bind an ephemeral port: {0}")]
    NoPortAvailable(std::io::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, PortManagerError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub port: u16,
    pub health_path: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Registry {
    services: HashMap<String, ServiceEntry>,
}

pub struct PortManager {
    registry_path: PathBuf,
    lock: Mutex<()>,
}

impl PortManager {
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Ask the OS for an unused ephemeral TCP port by binding to port 0 and
    /// immediately releasing it. There is an inherent (small) race between
    /// release and the caller's own bind, acceptable for a single local
    /// daemon instance.
    pub fn assign_port(&self, host: &str) -> Result<u16> {
        let listener =
            TcpListener::bind((host, 0)).map_err(PortManagerError::NoPortAvailable)?;
        Ok(listener.local_addr()?.port())
    }

    pub fn register_service(
        &self,
        name: &str,
        port: u16,
        health_path: &str,
    ) -> Result<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let mut registry = self.read_registry()?;
        registry.services.insert(
            name.to_string(),
            ServiceEntry {
                port,
                health_path: health_path.to_string(),
            },
        );
        self.write_registry(&registry)
    }

    pub fn discover_service_port(&self, name: &str) -> Result<Option<u16>> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let registry = self.read_registry()?;
        Ok(registry.services.get(name).map(|e| e.port))
    }

    pub fn discover_service(&self, name: &str) -> Result<Option<ServiceEntry>> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let registry = self.read_registry()?;
        Ok(registry.services.get(name).cloned())
    }

    pub fn unregister_service(&self, name: &str) -> Result<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let mut registry = self.read_registry()?;
        registry.services.remove(name);
        self.write_registry(&registry)
    }

    fn read_registry(&self) -> Result<Registry> {
        match std::fs::read_to_string(&self.registry_path) {
            Ok(text) => Ok(serde_json::from_str(&text).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Registry::default()),
            Err(e) => Err(PortManagerError::Io(e)),
        }
    }

    fn write_registry(&self, registry: &Registry) -> Result<()> {
        if let Some(parent) = self.registry_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(registry)?;
        std::fs::write(&self.registry_path, text)?;
        Ok(())
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_port_returns_a_usable_ephemeral_port() {
        let mgr = PortManager::new("/tmp/does-not-matter.json");
        let port = mgr.assign_port("127.0.0.1").unwrap();
        assert!(port > 0);
    }

    #[test]
    fn register_then_discover_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ports.json");
        let mgr = PortManager::new(&path);

        mgr.register_service("aidis-mcp", 4317, "/healthz").unwrap();
        let found = mgr.discover_service_port("aidis-mcp").unwrap();
        assert_eq!(found, Some(4317));
    }

    #[test]
    fn unregister_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ports.json");
        let mgr = PortManager::new(&path);

        mgr.register_service("aidis-mcp", 4317, "/healthz").unwrap();
        mgr.unregister_service("aidis-mcp").unwrap();
        assert_eq!(mgr.discover_service_port("aidis-mcp").unwrap(), None);
    }

    #[test]
    fn discover_on_missing_registry_file_is_none_not_error() {
        let mgr = PortManager::new("/tmp/aidis-registry-that-does-not-exist.json");
        assert_eq!(mgr.discover_service_port("aidis-mcp").unwrap(), None);
    }
}
