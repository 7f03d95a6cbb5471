//! Types for the lookup orchestrator.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::config::ConfigError;
use crate::queue::{QueueError, QueueStats, WorkQueue};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Queue construction or termination failed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The output could not be flushed at the end of the run.
    #[error("failed to flush output: {0}")]
    Output(#[source] std::io::Error),
}

/// Totals for one complete run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Input sources that had a producer.
    pub sources: usize,
    /// Size of the resolver pool.
    pub resolver_threads: usize,
    pub items_enqueued: u64,
    pub blank_lines: u64,
    pub oversized_lines: u64,
    /// Records written with an address.
    pub items_resolved: u64,
    /// Records written with an empty address field.
    pub lookups_failed: u64,
    pub producers_failed: usize,
    pub consumers_failed: usize,
    /// Items left in the queue when the run ended.
    pub items_abandoned: u64,
    /// Items a resolver held when its output write failed.
    pub items_unwritten: u64,
    pub cancelled: bool,
    pub queue: QueueStats,
    pub elapsed: Duration,
}

impl RunReport {
    /// Records written to the output.
    pub fn records_written(&self) -> u64 {
        self.items_resolved + self.lookups_failed
    }

    /// Every source was read to the end and every item written.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.producers_failed == 0
            && self.consumers_failed == 0
            && self.items_abandoned == 0
            && self.items_unwritten == 0
    }

    /// Every enqueued item was written, abandoned or lost with a failed write.
    pub fn is_accounted(&self) -> bool {
        self.items_enqueued
            == self.records_written() + self.items_abandoned + self.items_unwritten
    }
}

/// Cancels a run from outside the orchestrator, e.g. from a signal handler.
///
/// Blocked producers and resolvers wake up and exit; items still queued are
/// reported as abandoned.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    queue: Arc<WorkQueue>,
}

impl ShutdownHandle {
    pub(crate) fn new(queue: Arc<WorkQueue>) -> Self {
        Self { queue }
    }

    /// Request cancellation. Returns `false` if the run was already cancelled.
    pub fn cancel(&self) -> bool {
        let first = self.queue.cancel();
        if first {
            info!("Cancellation requested");
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.queue.is_cancelled()
    }
}
