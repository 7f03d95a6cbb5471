//! Consumer worker: resolves queued hostnames and writes the results.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, error};

use crate::queue::WorkQueue;
use crate::resolver::Resolver;

use super::sink::OutputSink;

/// Errors that end a single resolver thread early.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Failed to write result for {item}: {source}")]
    Output {
        item: String,
        #[source]
        source: std::io::Error,
        /// Items this thread completed before the failure.
        report: ConsumerReport,
    },
}

/// What one resolver thread processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Items written with an address.
    pub resolved: u64,
    /// Items written with an empty address field.
    pub failed: u64,
}

impl ConsumerReport {
    pub fn processed(&self) -> u64 {
        self.resolved + self.failed
    }
}

/// Live counters for one resolver thread, readable after the thread is gone.
///
/// The orchestrator keeps one per resolver so that a thread that panics
/// still accounts for the records it wrote and the item it was holding.
#[derive(Debug, Default)]
pub struct ConsumerProgress {
    resolved: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicBool,
}

impl ConsumerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts of records written so far.
    pub fn snapshot(&self) -> ConsumerReport {
        ConsumerReport {
            resolved: self.resolved.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }

    /// Whether an item was popped but its record not yet written.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) {
        self.in_flight.store(true, Ordering::Release);
    }

    fn complete(&self, resolved: bool) {
        let counter = if resolved { &self.resolved } else { &self.failed };
        counter.fetch_add(1, Ordering::AcqRel);
        self.in_flight.store(false, Ordering::Release);
    }

    fn abandon(&self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Pops hostnames, resolves them and appends a record to the sink.
pub struct Consumer<'a> {
    id: usize,
    queue: &'a WorkQueue,
    resolver: &'a dyn Resolver,
    sink: &'a OutputSink,
    progress: Option<&'a ConsumerProgress>,
}

impl<'a> Consumer<'a> {
    pub fn new(
        id: usize,
        queue: &'a WorkQueue,
        resolver: &'a dyn Resolver,
        sink: &'a OutputSink,
    ) -> Self {
        Self {
            id,
            queue,
            resolver,
            sink,
            progress: None,
        }
    }

    /// Publish per-item progress to `progress` while running.
    pub fn with_progress(mut self, progress: &'a ConsumerProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Loop until the queue reports that no more work will arrive.
    ///
    /// The resolver is called with no lock held. A failed lookup becomes an
    /// empty address field; a failed write ends this thread.
    pub fn run(&self) -> Result<ConsumerReport, ConsumerError> {
        let local = ConsumerProgress::default();
        let progress = self.progress.unwrap_or(&local);

        while let Some(item) = self.queue.pop() {
            progress.begin();
            let address = match self.resolver.resolve(&item) {
                Ok(addr) => {
                    debug!("Resolver {}: {} -> {}", self.id, item, addr);
                    Some(addr)
                }
                Err(e) => {
                    debug!("Resolver {}: {}", self.id, e);
                    None
                }
            };

            if let Err(source) = self.sink.write_record(&item, address) {
                error!("Resolver {} failed to write output: {}", self.id, source);
                progress.abandon();
                return Err(ConsumerError::Output {
                    item,
                    source,
                    report: progress.snapshot(),
                });
            }

            progress.complete(address.is_some());
        }

        let report = progress.snapshot();
        debug!(
            "Resolver {} exiting after {} items",
            self.id,
            report.processed()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaitStrategy;
    use crate::queue::Backoff;
    use crate::testing::{MockResolver, SharedBuffer};
    use std::io::{self, Write};
    use std::thread;

    fn queue(capacity: usize) -> WorkQueue {
        WorkQueue::new(capacity, WaitStrategy::Condvar, Backoff::default()).unwrap()
    }

    #[test]
    fn test_resolves_and_writes_until_finished() {
        let queue = queue(4);
        let resolver = MockResolver::new()
            .with_address("a.example", [10, 0, 0, 1])
            .with_address("b.example", [10, 0, 0, 2]);
        let buffer = SharedBuffer::new();
        let sink = OutputSink::new(buffer.clone());

        queue.push("a.example".to_string()).unwrap();
        queue.push("b.example".to_string()).unwrap();
        queue.finish().unwrap();

        let report = Consumer::new(0, &queue, &resolver, &sink).run().unwrap();

        assert_eq!(report, ConsumerReport { resolved: 2, failed: 0 });
        assert_eq!(
            buffer.lines(),
            vec!["a.example, 10.0.0.1", "b.example, 10.0.0.2"]
        );
    }

    #[test]
    fn test_failed_lookup_writes_empty_field() {
        let queue = queue(2);
        let resolver = MockResolver::failing();
        let buffer = SharedBuffer::new();
        let sink = OutputSink::new(buffer.clone());

        queue.push("nowhere.example".to_string()).unwrap();
        queue.finish().unwrap();

        let report = Consumer::new(0, &queue, &resolver, &sink).run().unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(buffer.lines(), vec!["nowhere.example, "]);
        assert_eq!(resolver.call_count(), 1);
    }

    #[test]
    fn test_waits_for_items_while_processing() {
        let queue = queue(1);
        let resolver = MockResolver::failing();
        let sink = OutputSink::new(io::sink());

        let report = thread::scope(|s| {
            let consumer = s.spawn(|| Consumer::new(1, &queue, &resolver, &sink).run());

            for i in 0..20 {
                queue.push(format!("h{i}")).unwrap();
            }
            queue.finish().unwrap();
            consumer.join().unwrap()
        })
        .unwrap();

        assert_eq!(report.processed(), 20);
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_ends_consumer() {
        let queue = queue(2);
        let resolver = MockResolver::failing();
        let sink = OutputSink::new(BrokenWriter);

        queue.push("first.example".to_string()).unwrap();
        queue.push("second.example".to_string()).unwrap();
        queue.finish().unwrap();

        let err = Consumer::new(0, &queue, &resolver, &sink).run().unwrap_err();
        let ConsumerError::Output { item, report, .. } = err;
        assert_eq!(item, "first.example");
        assert_eq!(report.processed(), 0);
        // The second item is left for the remaining resolvers
        assert_eq!(queue.len(), 1);
    }

    struct PanickingResolver;

    impl Resolver for PanickingResolver {
        fn name(&self) -> &str {
            "panicking"
        }

        fn resolve(&self, hostname: &str) -> Result<std::net::IpAddr, crate::ResolveError> {
            if hostname == "boom" {
                panic!("resolver blew up on {hostname}");
            }
            Ok(std::net::IpAddr::from([10, 0, 0, 9]))
        }
    }

    #[test]
    fn test_progress_survives_panic() {
        let queue = queue(4);
        let buffer = SharedBuffer::new();
        let sink = OutputSink::new(buffer.clone());
        let progress = ConsumerProgress::new();

        for item in ["ok.example", "boom", "later.example"] {
            queue.push(item.to_string()).unwrap();
        }
        queue.finish().unwrap();

        let joined = thread::scope(|s| {
            s.spawn(|| {
                Consumer::new(0, &queue, &PanickingResolver, &sink)
                    .with_progress(&progress)
                    .run()
            })
            .join()
        });

        assert!(joined.is_err());
        assert_eq!(progress.snapshot(), ConsumerReport { resolved: 1, failed: 0 });
        assert!(progress.has_in_flight());
        assert_eq!(buffer.lines(), vec!["ok.example, 10.0.0.9"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_progress_tracks_completed_items() {
        let queue = queue(4);
        let resolver = MockResolver::new().with_address("a.example", [10, 0, 0, 1]);
        let sink = OutputSink::new(io::sink());
        let progress = ConsumerProgress::new();

        queue.push("a.example".to_string()).unwrap();
        queue.push("b.example".to_string()).unwrap();
        queue.finish().unwrap();

        let report = Consumer::new(0, &queue, &resolver, &sink)
            .with_progress(&progress)
            .run()
            .unwrap();

        assert_eq!(report, progress.snapshot());
        assert_eq!(report, ConsumerReport { resolved: 1, failed: 1 });
        assert!(!progress.has_in_flight());
    }
}
