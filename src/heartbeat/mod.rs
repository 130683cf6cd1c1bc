//! Scheduled background cycles.

pub mod daemon;

pub use daemon::HeartbeatDaemon;
