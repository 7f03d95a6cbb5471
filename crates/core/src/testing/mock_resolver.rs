//! Mock resolver for testing.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::resolver::{ResolveError, Resolver};

/// Mock implementation of the Resolver trait.
///
/// Provides controllable behavior for testing:
/// - Fixed host to address table
/// - Optional fallback address for every other host
/// - Simulated lookup latency
/// - Call counting for assertions
///
/// # Example
///
/// ```rust
/// use multilookup_core::testing::MockResolver;
/// use multilookup_core::Resolver;
///
/// let resolver = MockResolver::new().with_address("alpha", [10, 0, 0, 1]);
/// assert_eq!(resolver.resolve("alpha").unwrap().to_string(), "10.0.0.1");
/// assert!(resolver.resolve("beta").is_err());
/// assert_eq!(resolver.call_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockResolver {
    addresses: HashMap<String, IpAddr>,
    fallback: Option<IpAddr>,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl MockResolver {
    /// A resolver that knows no hosts.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver that fails every lookup.
    pub fn failing() -> Self {
        Self::new()
    }

    /// A resolver that answers every lookup with `addr`.
    pub fn constant(addr: impl Into<IpAddr>) -> Self {
        Self {
            fallback: Some(addr.into()),
            ..Self::default()
        }
    }

    /// Answer `host` with `addr`.
    pub fn with_address(mut self, host: &str, addr: impl Into<IpAddr>) -> Self {
        self.addresses.insert(host.to_string(), addr.into());
        self
    }

    /// Sleep this long inside every lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of lookups performed so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    fn resolve(&self, hostname: &str) -> Result<IpAddr, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        self.addresses
            .get(hostname)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| ResolveError::NoAddress {
                host: hostname.to_string(),
            })
    }
}
