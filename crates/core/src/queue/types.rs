//! Types shared by the queue and its termination protocol.

use std::fmt;

use thiserror::Error;

/// Producer-side state observed by resolvers.
///
/// Starts as `Processing` and moves to `Finished` exactly once, after every
/// producer has been joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Processing,
    Finished,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Processing => write!(f, "processing"),
            Status::Finished => write!(f, "finished"),
        }
    }
}

/// Errors from queue construction and the termination transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A queue must be able to hold at least one item.
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    /// `finish` was called a second time.
    #[error("queue was already marked finished")]
    AlreadyFinished,
}

/// The queue was full; the rejected item is handed back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

/// Errors returned by a blocking push. The item is always handed back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    /// The run was cancelled while waiting for space.
    #[error("queue cancelled, dropping item {0:?}")]
    Cancelled(String),

    /// Push after the `Finished` transition.
    #[error("queue already finished, refusing item {0:?}")]
    Finished(String),
}

impl PushError {
    /// Recover the item that could not be enqueued.
    pub fn into_item(self) -> String {
        match self {
            PushError::Cancelled(item) | PushError::Finished(item) => item,
        }
    }
}
