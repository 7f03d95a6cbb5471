//! Error types for the resolver module.

use thiserror::Error;

use super::types::AddressFamily;

/// Errors that can occur while resolving a single hostname.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The system lookup itself failed.
    #[error("Lookup failed for {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The lookup succeeded but returned no addresses.
    #[error("No addresses found for {host}")]
    NoAddress { host: String },

    /// Addresses were found, none of the requested family.
    #[error("No {family} address found for {host}")]
    NoMatchingAddress { host: String, family: AddressFamily },
}

impl ResolveError {
    /// The hostname the failed lookup was for.
    pub fn host(&self) -> &str {
        match self {
            ResolveError::Lookup { host, .. }
            | ResolveError::NoAddress { host }
            | ResolveError::NoMatchingAddress { host, .. } => host,
        }
    }
}
