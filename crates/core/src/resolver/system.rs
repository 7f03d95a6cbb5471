//! Resolver backed by the platform's `getaddrinfo`.

use std::net::{IpAddr, ToSocketAddrs};

use tracing::trace;

use super::error::ResolveError;
use super::traits::Resolver;
use super::types::AddressFamily;

/// Resolves through the operating system's resolver.
///
/// IP literals are answered without a lookup. Otherwise the first address
/// of the configured family, in the order the system returns them, is used.
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    family: AddressFamily,
}

impl SystemResolver {
    pub fn new(family: AddressFamily) -> Self {
        Self { family }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    fn pick(
        &self,
        host: &str,
        addrs: impl IntoIterator<Item = IpAddr>,
    ) -> Result<IpAddr, ResolveError> {
        let mut found_any = false;
        for addr in addrs {
            found_any = true;
            if self.family.matches(&addr) {
                return Ok(addr);
            }
        }

        if found_any {
            Err(ResolveError::NoMatchingAddress {
                host: host.to_string(),
                family: self.family,
            })
        } else {
            Err(ResolveError::NoAddress {
                host: host.to_string(),
            })
        }
    }
}

impl Resolver for SystemResolver {
    fn name(&self) -> &str {
        "system"
    }

    fn resolve(&self, hostname: &str) -> Result<IpAddr, ResolveError> {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return self.pick(hostname, [ip]);
        }

        let addrs = (hostname, 0u16)
            .to_socket_addrs()
            .map_err(|source| ResolveError::Lookup {
                host: hostname.to_string(),
                source,
            })?;

        let resolved = self.pick(hostname, addrs.map(|sa| sa.ip()));
        trace!("{} -> {:?}", hostname, resolved);
        resolved
    }
}
