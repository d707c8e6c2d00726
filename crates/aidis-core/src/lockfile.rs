//! Singleton PID lock for the daemon process.
//!
//! On startup the daemon tries to exclusively create a one-line PID file at
//! a configured path (default `./run/aidis.pid`). A second instance that
//! finds a live PID in the file exits with an instructive error instead of
//! starting a competing process.
//!
//! ## Race safety
//!
//! `acquire()` uses `O_CREAT | O_EXCL`, so if two processes race to start,
//! exactly one wins the create; the loser sees `AlreadyExists` and checks
//! whether the recorded PID is still alive.
//!
//! ## Stale lock recovery
//!
//! If the PID in the file is no longer alive (crash, `SIGKILL`), the file is
//! stale and is removed automatically before one retry.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of an `acquire()` attempt.
pub enum AcquireResult {
    /// We created the PID file — we own the lock.
    Acquired,
    /// Another live process holds the lock.
    AlreadyRunning(u32),
    /// A stale PID file was removed; caller should retry.
    StaleRemoved,
}

/// Holds the lock for as long as it's alive; `Drop` removes the PID file so
/// every exit path (including panics that unwind) releases the singleton.
pub struct PidLock {
    path: PathBuf,
    held: bool,
}

impl PidLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire(&self) -> std::io::Result<AcquireResult> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                file.sync_all()?;
                Ok(AcquireResult::Acquired)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match read_pid(&self.path) {
                    Some(pid) if pid_alive(pid) => Ok(AcquireResult::AlreadyRunning(pid)),
                    _ => {
                        tracing::info!(path = %self.path.display(), "removing stale pid file");
                        let _ = std::fs::remove_file(&self.path);
                        Ok(AcquireResult::StaleRemoved)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Acquire with one retry after stale-lock cleanup. Returns `Ok(())` if
    /// this process now owns the lock, `Err` with a message naming the live
    /// PID otherwise.
    pub fn acquire_or_fail(&mut self) -> Result<(), String> {
        for attempt in 0..2 {
            match self.acquire().map_err(|e| format!("pid file I/O error: {e}"))? {
                AcquireResult::Acquired => {
                    self.held = true;
                    return Ok(());
                }
                AcquireResult::AlreadyRunning(pid) => {
                    return Err(format!(
                        "aidis is already running (pid={pid}, lock={})",
                        self.path.display()
                    ));
                }
                AcquireResult::StaleRemoved if attempt == 0 => continue,
                AcquireResult::StaleRemoved => {
                    return Err("failed to acquire pid lock after stale cleanup".into());
                }
            }
        }
        Err("pid lock acquire failed".into())
    }

    /// Release the lock early (used by the shutdown sequence so the file is
    /// gone before the process actually exits).
    pub fn release(&mut self) {
        if self.held {
            let _ = std::fs::remove_file(&self.path);
            self.held = false;
        }
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    // SAFETY: kill with signal 0 only checks existence, no signal is sent.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_pid_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn bogus_pid_is_dead() {
        assert!(!pid_alive(4_000_000));
    }

    #[test]
    fn acquire_then_second_instance_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aidis.pid");

        let mut lock1 = PidLock::new(&path);
        lock1.acquire_or_fail().unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));

        let mut lock2 = PidLock::new(&path);
        let err = lock2.acquire_or_fail().unwrap_err();
        assert!(err.contains(&std::process::id().to_string()));
    }

    #[test]
    fn stale_lock_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aidis.pid");
        std::fs::write(&path, "4000000").unwrap();

        let mut lock = PidLock::new(&path);
        lock.acquire_or_fail().unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
    }

    #[test]
    fn drop_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aidis.pid");
        {
            let mut lock = PidLock::new(&path);
            lock.acquire_or_fail().unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
