//! Lookup orchestrator implementation.
//!
//! A run is strictly sequenced:
//! - Spawn one producer per input source and the resolver pool
//! - Join every producer
//! - Mark the queue finished, exactly once
//! - Join every resolver, then flush the output

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::{validate_config, Config};
use crate::input::InputSource;
use crate::queue::WorkQueue;
use crate::resolver::Resolver;
use crate::worker::{
    Consumer, ConsumerError, ConsumerProgress, ConsumerReport, OutputSink, Producer, ProducerError,
    ProducerReport,
};

use super::types::{OrchestratorError, RunReport, ShutdownHandle};

/// Number of resolver threads for a host with `detected` cores.
///
/// Never fewer than `min_threads`; falls back to `min_threads` when the core
/// count is unknown.
pub fn resolver_pool_size(min_threads: usize, detected: Option<usize>) -> usize {
    min_threads.max(detected.unwrap_or(min_threads))
}

/// Core count reported by the OS, if any.
pub fn detected_parallelism() -> Option<usize> {
    thread::available_parallelism()
        .ok()
        .map(NonZeroUsize::get)
}

/// Borrowed state shared by every worker thread of one run.
///
/// `live_resolvers` starts at the full pool size; a failed spawn cancels the
/// queue, so the count never has to be corrected.
struct RunContext<'a> {
    queue: &'a WorkQueue,
    resolver: &'a dyn Resolver,
    sink: &'a OutputSink,
    max_name_length: usize,
    live_resolvers: AtomicUsize,
    /// One entry per resolver id.
    progress: &'a [ConsumerProgress],
}

impl RunContext<'_> {
    fn run_producer(&self, id: usize, source: InputSource) -> Result<ProducerReport, ProducerError> {
        Producer::new(id, self.queue, self.max_name_length).run(source)
    }

    fn run_resolver(&self, id: usize) -> Result<ConsumerReport, ConsumerError> {
        let mut slot = ResolverSlot {
            ctx: self,
            clean_exit: false,
        };
        let result = Consumer::new(id, self.queue, self.resolver, self.sink)
            .with_progress(&self.progress[id])
            .run();
        slot.clean_exit = result.is_ok();
        result
    }

    /// Cancel the queue so already-started threads can exit, then build the
    /// spawn error.
    fn abort_spawn(&self, role: &'static str, source: std::io::Error) -> OrchestratorError {
        error!("Failed to spawn {} thread: {}", role, source);
        self.queue.cancel();
        OrchestratorError::Spawn { role, source }
    }
}

/// Tracks one live resolver thread.
///
/// Dropped on every exit path, unwinding included. When the last resolver
/// leaves abnormally while producers may still be pushing, the queue is
/// cancelled so producers blocked on a full buffer do not wait forever.
struct ResolverSlot<'a, 'b> {
    ctx: &'b RunContext<'a>,
    clean_exit: bool,
}

impl Drop for ResolverSlot<'_, '_> {
    fn drop(&mut self) {
        let remaining = self.ctx.live_resolvers.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 && !self.clean_exit && self.ctx.queue.cancel_unless_finished() {
            error!("Last resolver thread failed, cancelling run");
        }
    }
}

/// Join threads left running after a failed spawn. The queue is already
/// cancelled, so each one returns promptly; outcomes are only logged.
fn join_abandoned<T>(role: &str, handles: Vec<thread::ScopedJoinHandle<'_, T>>) {
    for (id, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() {
            error!("{} {} panicked during shutdown", role, id);
        }
    }
}

/// Runs producers and resolvers over a shared bounded queue.
pub struct Orchestrator {
    config: Config,
    queue: Arc<WorkQueue>,
    resolver: Arc<dyn Resolver>,
    resolver_threads: usize,
}

impl Orchestrator {
    /// Validate `config` and build the queue. The resolver pool is sized from
    /// the host core count.
    pub fn new(config: Config, resolver: Arc<dyn Resolver>) -> Result<Self, OrchestratorError> {
        validate_config(&config)?;
        let queue = WorkQueue::from_config(&config.queue)?;
        let resolver_threads = resolver_pool_size(
            config.workers.min_resolver_threads,
            detected_parallelism(),
        );

        Ok(Self {
            config,
            queue: Arc::new(queue),
            resolver,
            resolver_threads,
        })
    }

    /// Use exactly `threads` resolvers instead of the detected pool size.
    /// Values below one are raised to one.
    pub fn with_resolver_threads(mut self, threads: usize) -> Self {
        self.resolver_threads = threads.max(1);
        self
    }

    pub fn resolver_threads(&self) -> usize {
        self.resolver_threads
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle that cancels this run from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.queue))
    }

    /// Process every source to completion and write one record per item.
    ///
    /// Returns once every thread has been joined. Failures of individual
    /// workers are counted in the report; only setup errors and a failed
    /// final flush abort the run.
    pub fn run(
        self,
        sources: Vec<InputSource>,
        sink: OutputSink,
    ) -> Result<RunReport, OrchestratorError> {
        let started = Instant::now();
        let mut report = RunReport {
            sources: sources.len(),
            resolver_threads: self.resolver_threads,
            ..Default::default()
        };

        if sources.is_empty() {
            warn!("No input sources, resolvers will exit immediately");
        }
        info!(
            "Starting run: {} sources, {} resolver threads, queue capacity {} ({:?} wait), resolver {}",
            report.sources,
            self.resolver_threads,
            self.queue.capacity(),
            self.queue.wait_strategy(),
            self.resolver.name()
        );

        let progress: Vec<ConsumerProgress> = (0..self.resolver_threads)
            .map(|_| ConsumerProgress::new())
            .collect();
        let ctx = RunContext {
            queue: &self.queue,
            resolver: self.resolver.as_ref(),
            sink: &sink,
            max_name_length: self.config.input.max_name_length,
            live_resolvers: AtomicUsize::new(self.resolver_threads),
            progress: &progress,
        };
        let resolver_threads = self.resolver_threads;

        thread::scope(|s| -> Result<(), OrchestratorError> {
            let ctx = &ctx;

            let mut producers = Vec::with_capacity(report.sources);
            for (id, source) in sources.into_iter().enumerate() {
                let spawned = thread::Builder::new()
                    .name(format!("producer-{id}"))
                    .spawn_scoped(s, move || ctx.run_producer(id, source));
                match spawned {
                    Ok(handle) => producers.push(handle),
                    Err(e) => {
                        let err = ctx.abort_spawn("producer", e);
                        join_abandoned("Producer", producers);
                        return Err(err);
                    }
                }
            }

            let mut resolvers = Vec::with_capacity(resolver_threads);
            for id in 0..resolver_threads {
                let spawned = thread::Builder::new()
                    .name(format!("resolver-{id}"))
                    .spawn_scoped(s, move || ctx.run_resolver(id));
                match spawned {
                    Ok(handle) => resolvers.push(handle),
                    Err(e) => {
                        let err = ctx.abort_spawn("resolver", e);
                        join_abandoned("Producer", producers);
                        join_abandoned("Resolver", resolvers);
                        return Err(err);
                    }
                }
            }

            for (id, handle) in producers.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(produced)) => {
                        debug!(
                            "Producer {} finished {}: {} items",
                            id, produced.source, produced.items_enqueued
                        );
                        report.blank_lines += produced.blank_lines;
                        report.oversized_lines += produced.oversized_lines;
                    }
                    Ok(Err(e)) => {
                        error!("Producer {} failed: {}", id, e);
                        report.producers_failed += 1;
                    }
                    Err(_) => {
                        error!("Producer {} panicked", id);
                        report.producers_failed += 1;
                    }
                }
            }

            debug!("All producers joined, marking queue finished");
            ctx.queue.finish()?;

            for (id, handle) in resolvers.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(resolved)) => {
                        report.items_resolved += resolved.resolved;
                        report.lookups_failed += resolved.failed;
                    }
                    Ok(Err(ConsumerError::Output { report: partial, .. })) => {
                        report.items_resolved += partial.resolved;
                        report.lookups_failed += partial.failed;
                        report.items_unwritten += 1;
                        report.consumers_failed += 1;
                    }
                    Err(_) => {
                        let partial = ctx.progress[id].snapshot();
                        let held = u64::from(ctx.progress[id].has_in_flight());
                        error!(
                            "Resolver {} panicked after {} items ({} in flight)",
                            id,
                            partial.processed(),
                            held
                        );
                        report.items_resolved += partial.resolved;
                        report.lookups_failed += partial.failed;
                        report.items_unwritten += held;
                        report.consumers_failed += 1;
                    }
                }
            }

            Ok(())
        })?;

        let abandoned = self.queue.drain_remaining();
        if !abandoned.is_empty() {
            warn!("{} items were never resolved", abandoned.len());
            for item in &abandoned {
                debug!("Abandoned: {}", item);
            }
        }

        report.items_abandoned = abandoned.len() as u64;
        report.cancelled = self.queue.is_cancelled();
        report.queue = self.queue.stats();
        report.items_enqueued = report.queue.pushed;

        sink.flush().map_err(OrchestratorError::Output)?;
        report.elapsed = started.elapsed();

        info!(
            "Run finished in {:.2?}: {} enqueued, {} resolved, {} failed lookups, {} abandoned",
            report.elapsed,
            report.items_enqueued,
            report.items_resolved,
            report.lookups_failed,
            report.items_abandoned
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaitStrategy;
    use crate::testing::fixtures::{hostnames, source_from_lines, source_from_text};
    use crate::testing::{MockResolver, SharedBuffer};
    use std::collections::HashSet;

    fn orchestrator(resolver: MockResolver, threads: usize) -> Orchestrator {
        Orchestrator::new(Config::default(), Arc::new(resolver))
            .unwrap()
            .with_resolver_threads(threads)
    }

    #[test]
    fn test_pool_size_respects_minimum() {
        assert_eq!(resolver_pool_size(2, Some(8)), 8);
        assert_eq!(resolver_pool_size(2, Some(1)), 2);
        assert_eq!(resolver_pool_size(3, None), 3);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.queue.capacity = 0;
        let result = Orchestrator::new(config, Arc::new(MockResolver::new()));
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[test]
    fn test_new_uses_minimum_resolver_threads() {
        let mut config = Config::default();
        config.workers.min_resolver_threads = 64;
        let orchestrator = Orchestrator::new(config, Arc::new(MockResolver::new())).unwrap();
        assert!(orchestrator.resolver_threads() >= 64);
    }

    #[test]
    fn test_single_source_all_written() {
        let buffer = SharedBuffer::new();
        let names = hostnames("h", 50);
        let lines: Vec<&str> = names.iter().map(String::as_str).collect();

        let report = orchestrator(MockResolver::constant([10, 0, 0, 1]), 3)
            .run(
                vec![source_from_lines("one.txt", &lines)],
                OutputSink::new(buffer.clone()),
            )
            .unwrap();

        assert_eq!(report.items_enqueued, 50);
        assert_eq!(report.items_resolved, 50);
        assert!(report.is_complete());
        assert!(report.is_accounted());

        let written: HashSet<String> = buffer.lines().into_iter().collect();
        let expected: HashSet<String> = names.iter().map(|n| format!("{n}, 10.0.0.1")).collect();
        assert_eq!(written, expected);
    }

    #[test]
    fn test_zero_sources_terminates() {
        let buffer = SharedBuffer::new();
        let report = orchestrator(MockResolver::new(), 4)
            .run(Vec::new(), OutputSink::new(buffer.clone()))
            .unwrap();

        assert_eq!(report.sources, 0);
        assert_eq!(report.records_written(), 0);
        assert!(report.is_complete());
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_blank_lines_counted_not_written() {
        let buffer = SharedBuffer::new();
        let report = orchestrator(MockResolver::failing(), 2)
            .run(
                vec![source_from_text("blank.txt", "a\n\n\nb\n")],
                OutputSink::new(buffer.clone()),
            )
            .unwrap();

        assert_eq!(report.blank_lines, 2);
        assert_eq!(report.lookups_failed, 2);
        assert_eq!(buffer.lines().len(), 2);
    }

    #[test]
    fn test_last_resolver_failure_cancels_run() {
        struct BrokenWriter;

        impl std::io::Write for BrokenWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("read-only"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut config = Config::default();
        config.queue.capacity = 1;
        let names = hostnames("h", 100);
        let lines: Vec<&str> = names.iter().map(String::as_str).collect();

        let report = Orchestrator::new(config, Arc::new(MockResolver::failing()))
            .unwrap()
            .with_resolver_threads(1)
            .run(
                vec![source_from_lines("many.txt", &lines)],
                OutputSink::new(BrokenWriter),
            )
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.consumers_failed, 1);
        assert_eq!(report.items_unwritten, 1);
        assert!(report.items_enqueued < 100);
        assert!(report.is_accounted());
        assert!(!report.is_complete());
    }

    struct PanickingResolver;

    impl Resolver for PanickingResolver {
        fn name(&self) -> &str {
            "panicking"
        }

        fn resolve(&self, hostname: &str) -> Result<std::net::IpAddr, crate::ResolveError> {
            if hostname == "boom" {
                panic!("lookup of {hostname} blew up");
            }
            Ok(std::net::IpAddr::from([10, 0, 0, 7]))
        }
    }

    #[test]
    fn test_resolver_panic_is_accounted() {
        let buffer = SharedBuffer::new();

        let report = Orchestrator::new(Config::default(), Arc::new(PanickingResolver))
            .unwrap()
            .with_resolver_threads(2)
            .run(
                vec![source_from_lines("mixed.txt", &["x", "boom", "y"])],
                OutputSink::new(buffer.clone()),
            )
            .unwrap();

        assert_eq!(report.items_enqueued, 3);
        assert_eq!(report.consumers_failed, 1);
        assert_eq!(report.items_resolved, 2);
        assert_eq!(report.items_unwritten, 1);
        assert_eq!(report.items_abandoned, 0);
        assert!(!report.cancelled);
        assert!(report.is_accounted(), "{report:?}");

        let written: HashSet<String> = buffer.lines().into_iter().collect();
        assert_eq!(
            written,
            HashSet::from(["x, 10.0.0.7".to_string(), "y, 10.0.0.7".to_string()])
        );
    }

    #[test]
    fn test_only_resolver_panic_is_accounted() {
        let buffer = SharedBuffer::new();

        let report = Orchestrator::new(Config::default(), Arc::new(PanickingResolver))
            .unwrap()
            .with_resolver_threads(1)
            .run(
                vec![source_from_lines("tail.txt", &["x", "boom", "y"])],
                OutputSink::new(buffer.clone()),
            )
            .unwrap();

        assert_eq!(report.consumers_failed, 1);
        assert_eq!(report.items_resolved + report.items_unwritten, 2);
        assert!(report.is_accounted(), "{report:?}");
        assert!(!report.is_complete());
        assert_eq!(buffer.lines().first().map(String::as_str), Some("x, 10.0.0.7"));
    }

    #[test]
    fn test_spawn_failure_joins_started_threads() {
        let queue = WorkQueue::new(1, WaitStrategy::Condvar, crate::queue::Backoff::default())
            .unwrap();
        queue.push("occupant".to_string()).unwrap();
        let resolver = MockResolver::new();
        let sink = OutputSink::new(std::io::sink());
        let ctx = RunContext {
            queue: &queue,
            resolver: &resolver,
            sink: &sink,
            max_name_length: 64,
            live_resolvers: AtomicUsize::new(1),
            progress: &[],
        };

        let err = thread::scope(|s| {
            let ctx = &ctx;
            // Blocked on the full queue until the abort cancels it
            let blocked = s.spawn(move || ctx.run_producer(0, source_from_lines("a.txt", &["a"])));
            let crashed = s.spawn(|| -> Result<ProducerReport, ProducerError> {
                panic!("producer crashed")
            });

            let err = ctx.abort_spawn("resolver", std::io::Error::other("no threads left"));
            join_abandoned("Producer", vec![blocked, crashed]);
            err
        });

        assert!(matches!(err, OrchestratorError::Spawn { role: "resolver", .. }));
        assert!(queue.is_cancelled());
        assert_eq!(queue.drain_remaining(), vec!["occupant".to_string()]);
    }

    #[test]
    fn test_backoff_strategy_run() {
        let mut config = Config::default();
        config.queue.capacity = 2;
        config.queue.wait_strategy = WaitStrategy::Backoff;
        let buffer = SharedBuffer::new();

        let sources = (0..3)
            .map(|i| {
                let names = hostnames(&format!("s{i}-"), 40);
                let lines: Vec<&str> = names.iter().map(String::as_str).collect();
                source_from_lines(&format!("s{i}.txt"), &lines)
            })
            .collect();

        let report = Orchestrator::new(config, Arc::new(MockResolver::failing()))
            .unwrap()
            .with_resolver_threads(2)
            .run(sources, OutputSink::new(buffer.clone()))
            .unwrap();

        assert_eq!(report.items_enqueued, 120);
        assert_eq!(report.lookups_failed, 120);
        assert_eq!(buffer.lines().len(), 120);
        assert!(report.is_complete());
    }
}
