//! Aura: an autonomous agent that runs bounded cognitive cycles.
//!
//! Each cycle builds context from the vault, asks a reasoning oracle for one
//! action, executes it inside a filesystem sandbox, reflects on the outcome
//! and appends everything to a journal that seeds the next cycle.

pub mod agent;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod oracle;
pub mod sandbox;
pub mod setup;
pub mod tools;
pub mod types;
pub mod vault;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
