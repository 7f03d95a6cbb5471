//! Jittered sleep used by the polling wait strategy.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::BackoffConfig;

/// Randomized short sleep shared by all workers.
///
/// The generator sits behind its own lock, independent of the queue lock.
/// The lock is held only while drawing a sample, never while sleeping.
#[derive(Debug)]
pub struct Backoff {
    rng: Mutex<StdRng>,
    min_micros: u64,
    max_micros: u64,
}

impl Backoff {
    /// Create a backoff sleeping between `min_micros` and `max_micros`
    /// (inclusive). Inverted bounds are swapped.
    pub fn new(min_micros: u64, max_micros: u64) -> Self {
        let (min_micros, max_micros) = if min_micros <= max_micros {
            (min_micros, max_micros)
        } else {
            (max_micros, min_micros)
        };

        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            min_micros,
            max_micros,
        }
    }

    /// Same as [`Backoff::new`] with a fixed seed.
    pub fn with_seed(min_micros: u64, max_micros: u64, seed: u64) -> Self {
        let backoff = Self::new(min_micros, max_micros);
        *backoff.rng.lock() = StdRng::seed_from_u64(seed);
        backoff
    }

    /// Draw the next sleep interval.
    pub fn next_delay(&self) -> Duration {
        let micros = self
            .rng
            .lock()
            .gen_range(self.min_micros..=self.max_micros);
        Duration::from_micros(micros)
    }

    /// Sleep for a freshly drawn interval.
    pub fn wait(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(delay);
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(config.min_micros, config.max_micros)
    }
}
