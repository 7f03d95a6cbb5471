//! Lookup orchestrator.
//!
//! Owns the work queue and drives one run: a producer thread per input
//! source, a fixed pool of resolver threads, and the termination handshake
//! between them.

mod runner;
mod types;

pub use runner::{detected_parallelism, resolver_pool_size, Orchestrator};
pub use types::{OrchestratorError, RunReport, ShutdownHandle};
