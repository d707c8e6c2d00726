//! Lifecycle Manager: singleton enforcement, startup sequencing, and
//! graceful shutdown for the AIDIS daemon process.

pub mod daemon;

pub use daemon::Daemon;
