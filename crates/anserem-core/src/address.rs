//! Published address model
//!
//! An [`Address`] is an IP address plus an optional prefix length. Its
//! canonical text form is `ip` or `ip/prefix`, and equality follows that
//! form exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

/// Largest prefix length for an IPv6 address
pub const MAX_IPV6_PREFIX: u8 = 128;

/// Largest prefix length for an IPv4 address
pub const MAX_IPV4_PREFIX: u8 = 32;

/// An address as published to providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    ip: IpAddr,
    prefix: Option<u8>,
}

impl Address {
    /// Create an address without a prefix length
    pub fn new(ip: IpAddr) -> Self {
        Self { ip, prefix: None }
    }

    /// Create an address with a prefix length
    ///
    /// Fails if the prefix is longer than the address family allows.
    pub fn with_prefix(ip: IpAddr, prefix: u8) -> Result<Self, crate::Error> {
        let max = match ip {
            IpAddr::V4(_) => MAX_IPV4_PREFIX,
            IpAddr::V6(_) => MAX_IPV6_PREFIX,
        };
        if prefix > max {
            return Err(crate::Error::invalid_input(format!(
                "prefix /{} is too long for {} (max /{})",
                prefix, ip, max
            )));
        }
        Ok(Self {
            ip,
            prefix: Some(prefix),
        })
    }

    /// The bare IP address
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// The prefix length, if one was attached
    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }

    /// Whether this is an IPv6 address
    pub fn is_ipv6(&self) -> bool {
        self.ip.is_ipv6()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}/{}", self.ip, prefix),
            None => write!(f, "{}", self.ip),
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl From<Ipv6Addr> for Address {
    fn from(ip: Ipv6Addr) -> Self {
        Self::new(IpAddr::V6(ip))
    }
}

impl FromStr for Address {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            Some((ip, prefix)) => {
                let ip: IpAddr = ip
                    .parse()
                    .map_err(|_| crate::Error::invalid_input(format!("invalid IP address: {}", ip)))?;
                let prefix: u8 = prefix.parse().map_err(|_| {
                    crate::Error::invalid_input(format!("invalid prefix length: {}", prefix))
                })?;
                Self::with_prefix(ip, prefix)
            }
            None => s
                .parse::<IpAddr>()
                .map(Self::new)
                .map_err(|_| crate::Error::invalid_input(format!("invalid IP address: {}", s))),
        }
    }
}

/// Whether an IPv6 address is globally routable enough to publish
///
/// Rejects loopback, unspecified, multicast, link-local (fe80::/10) and
/// unique-local (fc00::/7) addresses, plus IPv4-mapped addresses.
pub fn is_public_ipv6(ip: &Ipv6Addr) -> bool {
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unicast_link_local()
        || ip.is_unique_local()
        || ip.to_ipv4_mapped().is_some())
}
