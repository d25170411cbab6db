// # Interface-Scan Resolver
//
// Discovers the public address by looking at the host's own interfaces.
//
// ## Selection
//
// Interface addresses are taken in enumeration order. The first one that
// survives every filter wins:
//
// 1. IPv6 only
// 2. Globally routable: no loopback, link-local, unique-local, multicast
// 3. Text form starts with the configured prefix (if any), e.g. `2a02:`
// 4. Has a PTR record (if the reverse-DNS check is enabled)
//
// The cheap filters run first so reverse lookups are only issued for real
// candidates. The winner keeps its on-link prefix length, so dynv6 receives
// `2a02:810d:1:2::5/64`.
//
// PTR lookups go to the host's configured name servers, or to Cloudflare
// when that configuration cannot be read.

use anserem_core::address::is_public_ipv6;
use anserem_core::config::ResolverConfig;
use anserem_core::traits::{AddressResolver, ResolverFactory};
use anserem_core::{Address, ComponentRegistry, Error, ResolveError, Result};

use hickory_resolver::config::{ResolverConfig as DnsConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolverBuilder, TokioResolver};
use std::fmt::Display;
use std::net::IpAddr;
use std::time::Duration;

/// One address assigned to an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    /// Interface name, e.g. "eth0"
    pub name: String,
    pub ip: IpAddr,
    /// On-link prefix length, e.g. 64
    pub prefix_len: u8,
}

impl InterfaceAddress {
    pub fn new(name: impl Into<String>, ip: IpAddr, prefix_len: u8) -> Self {
        Self {
            name: name.into(),
            ip,
            prefix_len,
        }
    }
}

/// Source of interface addresses
pub trait InterfaceAddresses: Send + Sync {
    fn list(&self) -> std::result::Result<Vec<InterfaceAddress>, ResolveError>;
}

/// The host's interfaces, as reported by the OS
pub struct SystemInterfaces;

impl InterfaceAddresses for SystemInterfaces {
    fn list(&self) -> std::result::Result<Vec<InterfaceAddress>, ResolveError> {
        let interfaces = netdev::get_interfaces();
        if interfaces.is_empty() {
            return Err(ResolveError::enumeration("the OS reported no interfaces"));
        }

        let mut addrs = Vec::new();
        for iface in interfaces {
            for net in &iface.ipv4 {
                addrs.push(InterfaceAddress::new(&iface.name, IpAddr::V4(net.addr()), net.prefix_len()));
            }
            for net in &iface.ipv6 {
                addrs.push(InterfaceAddress::new(&iface.name, IpAddr::V6(net.addr()), net.prefix_len()));
            }
        }
        Ok(addrs)
    }
}

/// Reverse-DNS check
#[async_trait::async_trait]
pub trait ReverseDns: Send + Sync {
    /// Whether `ip` has at least one PTR record
    async fn has_ptr(&self, ip: IpAddr) -> bool;
}

/// Name servers used for PTR lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameServers {
    /// The host's configuration (`/etc/resolv.conf` or the platform equivalent)
    System,
    /// Cloudflare's public resolvers, used when the host configuration is unreadable
    Cloudflare,
}

/// Prefer the host's resolver configuration, else Cloudflare
fn select_name_servers<E: Display>(
    system: std::result::Result<ResolverBuilder<TokioConnectionProvider>, E>,
) -> (ResolverBuilder<TokioConnectionProvider>, NameServers) {
    match system {
        Ok(builder) => (builder, NameServers::System),
        Err(e) => {
            tracing::warn!("Cannot read system resolver configuration ({}); using Cloudflare", e);
            let builder =
                TokioResolver::builder_with_config(DnsConfig::cloudflare(), TokioConnectionProvider::default());
            (builder, NameServers::Cloudflare)
        }
    }
}

/// PTR lookups through hickory
pub struct HickoryReverseDns {
    resolver: TokioResolver,
    name_servers: NameServers,
}

impl HickoryReverseDns {
    pub fn new(timeout: Duration) -> Self {
        Self::from_builder(TokioResolver::builder_tokio(), timeout)
    }

    fn from_builder<E: Display>(
        system: std::result::Result<ResolverBuilder<TokioConnectionProvider>, E>,
        timeout: Duration,
    ) -> Self {
        let (mut builder, name_servers) = select_name_servers(system);
        builder.options_mut().timeout = timeout;

        Self {
            resolver: builder.build(),
            name_servers,
        }
    }

    /// Which name servers the lookups go to
    pub fn name_servers(&self) -> NameServers {
        self.name_servers
    }
}

#[async_trait::async_trait]
impl ReverseDns for HickoryReverseDns {
    async fn has_ptr(&self, ip: IpAddr) -> bool {
        match self.resolver.reverse_lookup(ip).await {
            Ok(lookup) => lookup.iter().next().is_some(),
            Err(e) => {
                tracing::debug!("Reverse lookup for {} failed: {}", ip, e);
                false
            }
        }
    }
}

/// Interface-scan resolver
pub struct InterfaceResolver {
    /// Required text prefix, e.g. "2a02:"
    ip_prefix: Option<String>,

    /// Interface enumeration
    interfaces: Box<dyn InterfaceAddresses>,

    /// PTR check; `None` disables it
    reverse_dns: Option<Box<dyn ReverseDns>>,
}

impl InterfaceResolver {
    /// Create a resolver over the host's interfaces
    ///
    /// # Parameters
    ///
    /// - `ip_prefix`: keep only addresses starting with this text; empty means no filter
    /// - `reverse_dns_check`: keep only addresses with a PTR record
    /// - `timeout`: per-lookup timeout for the PTR check
    pub fn new(ip_prefix: Option<String>, reverse_dns_check: bool, timeout: Duration) -> Self {
        let reverse_dns: Option<Box<dyn ReverseDns>> = if reverse_dns_check {
            Some(Box::new(HickoryReverseDns::new(timeout)))
        } else {
            None
        };

        Self::with_parts(ip_prefix, Box::new(SystemInterfaces), reverse_dns)
    }

    /// Create a resolver from explicit parts
    pub fn with_parts(
        ip_prefix: Option<String>,
        interfaces: Box<dyn InterfaceAddresses>,
        reverse_dns: Option<Box<dyn ReverseDns>>,
    ) -> Self {
        Self {
            ip_prefix: ip_prefix.filter(|p| !p.is_empty()),
            interfaces,
            reverse_dns,
        }
    }

    fn matches_prefix(&self, ip: &IpAddr) -> bool {
        match &self.ip_prefix {
            Some(prefix) => ip.to_string().starts_with(prefix.as_str()),
            None => true,
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for InterfaceResolver {
    async fn discover(&self) -> std::result::Result<Address, ResolveError> {
        let addrs = self.interfaces.list()?;
        let candidates: Vec<String> = addrs
            .iter()
            .map(|a| format!("{}/{}", a.ip, a.prefix_len))
            .collect();

        for InterfaceAddress { name, ip, prefix_len } in addrs {
            let IpAddr::V6(v6) = ip else {
                continue;
            };
            if !is_public_ipv6(&v6) {
                tracing::trace!("Skipping non-public {} on {}", ip, name);
                continue;
            }
            if !self.matches_prefix(&ip) {
                tracing::trace!("Skipping {} on {}: prefix mismatch", ip, name);
                continue;
            }
            if let Some(reverse_dns) = &self.reverse_dns
                && !reverse_dns.has_ptr(ip).await
            {
                tracing::debug!("Skipping {} on {}: no reverse DNS", ip, name);
                continue;
            }

            let address = Address::with_prefix(ip, prefix_len)
                .map_err(|e| ResolveError::enumeration(format!("{} on {}: {}", ip, name, e)))?;
            tracing::debug!("Selected {} on {}", address, name);
            return Ok(address);
        }

        Err(ResolveError::NoPublicAddressFound { candidates })
    }

    fn strategy_name(&self) -> &'static str {
        "interface"
    }
}

/// Factory for creating interface-scan resolvers
pub struct InterfaceFactory;

impl ResolverFactory for InterfaceFactory {
    fn create(&self, config: &ResolverConfig, request_timeout: Duration) -> Result<Box<dyn AddressResolver>> {
        match config {
            ResolverConfig::Interface {
                ip_prefix,
                reverse_dns_check,
            } => Ok(Box::new(InterfaceResolver::new(
                ip_prefix.clone(),
                *reverse_dns_check,
                request_timeout,
            ))),
            _ => Err(Error::config("Invalid config for interface resolver")),
        }
    }
}

/// Register the interface-scan resolver with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_resolver("interface", Box::new(InterfaceFactory));
}
