use serde::{Deserialize, Serialize};

use crate::resolver::AddressFamily;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shared work queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Maximum number of hostnames buffered between producers and resolvers.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// How blocked producers and resolvers wait for the queue to change.
    #[serde(default)]
    pub wait_strategy: WaitStrategy,
    /// Jitter range used by the `backoff` wait strategy.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            wait_strategy: WaitStrategy::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

fn default_capacity() -> usize {
    5
}

/// How a worker waits while the queue is full (producers) or empty but not
/// finished (resolvers).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Block on a condition variable until the queue changes.
    #[default]
    Condvar,
    /// Release the lock, sleep a short random interval, then re-check.
    Backoff,
}

/// Bounds of the randomized backoff sleep, in microseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default)]
    pub min_micros: u64,
    #[serde(default = "default_max_micros")]
    pub max_micros: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_micros: 0,
            max_micros: default_max_micros(),
        }
    }
}

fn default_max_micros() -> u64 {
    100
}

/// Resolver pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Lower bound on the resolver pool size. The pool is
    /// `max(min_resolver_threads, available_parallelism)`.
    #[serde(default = "default_min_resolver_threads")]
    pub min_resolver_threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_resolver_threads: default_min_resolver_threads(),
        }
    }
}

fn default_min_resolver_threads() -> usize {
    2
}

/// Input source handling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// What to do with an input path that cannot be opened.
    #[serde(default)]
    pub on_unreadable: UnreadablePolicy,
    /// Longest accepted hostname line, in bytes, after the line terminator
    /// is stripped.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            on_unreadable: UnreadablePolicy::default(),
            max_name_length: default_max_name_length(),
        }
    }
}

fn default_max_name_length() -> usize {
    1024
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnreadablePolicy {
    /// Log and continue with the remaining sources.
    #[default]
    Skip,
    /// Abort the whole run.
    Abort,
}

/// Resolver configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Which address family to report for each hostname.
    #[serde(default)]
    pub family: AddressFamily,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
