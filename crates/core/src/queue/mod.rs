//! Bounded work queue shared by producers and resolvers.
//!
//! - [`BoundedQueue`]: unsynchronized fixed-capacity FIFO ring buffer
//! - [`WorkQueue`]: the shared queue; one lock over buffer and [`Status`],
//!   blocking push/pop, and the `Finished` transition
//! - [`Backoff`]: jittered sleep for the polling wait strategy

mod backoff;
mod ring;
mod shared;
mod types;

pub use backoff::Backoff;
pub use ring::BoundedQueue;
pub use shared::{QueueStats, WorkQueue};
pub use types::{PushError, QueueError, QueueFull, Status};
