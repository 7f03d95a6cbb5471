//! Trait definitions for the resolver module.

use std::net::IpAddr;

use super::error::ResolveError;

/// Turns a hostname into a single address.
///
/// `resolve` may block for as long as the underlying lookup takes. It is
/// called concurrently from every resolver thread, never with a queue or
/// output lock held.
pub trait Resolver: Send + Sync {
    /// Returns the name of this resolver implementation.
    fn name(&self) -> &str;

    /// Resolves `hostname` to one address.
    fn resolve(&self, hostname: &str) -> Result<IpAddr, ResolveError>;
}
