use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Which kind of address a resolver reports.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    /// First IPv4 address only.
    #[default]
    Ipv4,
    /// First IPv6 address only.
    Ipv6,
    /// First address of either family, in system order.
    Any,
}

impl AddressFamily {
    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::Ipv4 => addr.is_ipv4(),
            AddressFamily::Ipv6 => addr.is_ipv6(),
            AddressFamily::Any => true,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
            AddressFamily::Any => write!(f, "IP"),
        }
    }
}
