//! Listener seam towards the annotation platform.
//!
//! The platform owns storage and scheduling; this module models the contract
//! plugins rely on: a `RecordStore` to load and log records, a `Listener`
//! callback with a mutable context, and a runner that triggers it.

/// In-memory record store.
pub mod memory;
/// Listener trait, context and runner.
pub mod runner;
/// Record store trait and queries.
pub mod store;

pub use memory::InMemoryRecordStore;
pub use runner::{
    BatchReport, Listener, ListenerContext, ListenerRunner, ListenerRunnerConfig, RunnerHandle, RunnerStats,
};
pub use store::{RecordQuery, RecordStore};
