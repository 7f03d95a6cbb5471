//! The shared work queue and its termination protocol.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::{QueueConfig, WaitStrategy};

use super::backoff::Backoff;
use super::ring::BoundedQueue;
use super::types::{PushError, QueueError, QueueFull, Status};

/// State guarded by the single queue lock.
///
/// The buffer and the status live under one mutex: resolvers must observe
/// "empty" and "finished" in the same critical section.
#[derive(Debug)]
struct QueueState {
    items: BoundedQueue<String>,
    status: Status,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct QueueCounters {
    pushed: AtomicU64,
    popped: AtomicU64,
    producer_waits: AtomicU64,
    consumer_waits: AtomicU64,
}

/// Point-in-time counters for a [`WorkQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pushed: u64,
    pub popped: u64,
    /// Times a producer found the queue full and had to wait.
    pub producer_waits: u64,
    /// Times a resolver found the queue empty and had to wait.
    pub consumer_waits: u64,
}

/// Bounded multi-producer, multi-consumer queue of hostnames.
///
/// Producers block in [`push`](Self::push) while the queue is full. Resolvers
/// block in [`pop`](Self::pop) while the queue is empty and the status is
/// still `Processing`; `pop` returns `None` once the queue is empty and
/// [`finish`](Self::finish) has been called.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
    strategy: WaitStrategy,
    backoff: Backoff,
    counters: QueueCounters,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` items.
    pub fn new(
        capacity: usize,
        strategy: WaitStrategy,
        backoff: Backoff,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            state: Mutex::new(QueueState {
                items: BoundedQueue::new(capacity)?,
                status: Status::Processing,
                cancelled: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            strategy,
            backoff,
            counters: QueueCounters::default(),
        })
    }

    /// Create a queue from the `[queue]` config section.
    pub fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
        Self::new(
            config.capacity,
            config.wait_strategy,
            Backoff::from(&config.backoff),
        )
    }

    /// Enqueue an item, waiting while the queue is full.
    ///
    /// The fullness check and the insert happen under one guard. On error the
    /// item is handed back inside the [`PushError`].
    pub fn push(&self, item: String) -> Result<(), PushError> {
        let mut item = item;
        let mut state = self.state.lock();

        loop {
            if state.cancelled {
                return Err(PushError::Cancelled(item));
            }
            if state.status == Status::Finished {
                return Err(PushError::Finished(item));
            }

            match state.items.push(item) {
                Ok(()) => {
                    drop(state);
                    self.counters.pushed.fetch_add(1, Ordering::Relaxed);
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(QueueFull(rejected)) => {
                    item = rejected;
                    self.counters.producer_waits.fetch_add(1, Ordering::Relaxed);
                    self.wait(&mut state, &self.not_full);
                }
            }
        }
    }

    /// Dequeue the next item, waiting while the queue is empty.
    ///
    /// Returns `None` when the queue is empty and finished, or when the run
    /// has been cancelled. Either way no further item will ever be returned.
    pub fn pop(&self) -> Option<String> {
        let mut state = self.state.lock();

        loop {
            if state.cancelled {
                return None;
            }

            if let Some(item) = state.items.pop() {
                drop(state);
                self.counters.popped.fetch_add(1, Ordering::Relaxed);
                self.not_full.notify_one();
                return Some(item);
            }

            if state.status == Status::Finished {
                return None;
            }

            self.counters.consumer_waits.fetch_add(1, Ordering::Relaxed);
            self.wait(&mut state, &self.not_empty);
        }
    }

    /// Mark the producers as done. Must be called exactly once, after every
    /// producer has returned.
    pub fn finish(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if state.status == Status::Finished {
            return Err(QueueError::AlreadyFinished);
        }
        state.status = Status::Finished;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        Ok(())
    }

    /// Cancel the run. Blocked producers get their item back and blocked
    /// resolvers return `None`. Returns `false` if already cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.cancelled {
            return false;
        }
        state.cancelled = true;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    /// Cancel only while still `Processing`. Once finished nothing can block
    /// on a full buffer, so leftovers are left for `drain_remaining`.
    /// Returns `true` if this call cancelled the queue.
    pub fn cancel_unless_finished(&self) -> bool {
        let mut state = self.state.lock();
        if state.cancelled || state.status == Status::Finished {
            return false;
        }
        state.cancelled = true;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    /// Remove every item still buffered. Used after a cancelled run to
    /// account for work that was never resolved.
    pub fn drain_remaining(&self) -> Vec<String> {
        let mut state = self.state.lock();
        let mut remaining = Vec::with_capacity(state.items.len());
        while let Some(item) = state.items.pop() {
            remaining.push(item);
        }
        drop(state);

        self.not_full.notify_all();
        remaining
    }

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().items.capacity()
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.strategy
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            popped: self.counters.popped.load(Ordering::Relaxed),
            producer_waits: self.counters.producer_waits.load(Ordering::Relaxed),
            consumer_waits: self.counters.consumer_waits.load(Ordering::Relaxed),
        }
    }

    /// Suspend until the state may have changed. The guard is released while
    /// waiting and held again on return; callers re-check their predicate.
    fn wait(&self, state: &mut MutexGuard<'_, QueueState>, condvar: &Condvar) {
        match self.strategy {
            WaitStrategy::Condvar => condvar.wait(state),
            WaitStrategy::Backoff => MutexGuard::unlocked(state, || self.backoff.wait()),
        }
    }
}
