//! Configuration types for the refresh agent
//!
//! The daemon builds an [`AgentConfig`] from flags and environment variables;
//! embedders can deserialize one from any serde format.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default "client-ip" lookup service for the external-lookup resolver
pub const DEFAULT_LOOKUP_URL: &str = "https://api-bdc.net/data/client-ip";

/// Default address prefix for the interface-scan resolver
pub const DEFAULT_IP_PREFIX: &str = "2a02:";

/// Default prefix length attached by the external-lookup resolver
pub const DEFAULT_SUBNET_MASK: u8 = 128;

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Address resolver configuration
    pub resolver: ResolverConfig,

    /// Providers to publish to, in publish order
    pub providers: Vec<ProviderConfig>,

    /// Optional scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AgentConfig {
    /// Create a configuration with the given resolver and no providers
    pub fn new(resolver: ResolverConfig) -> Self {
        Self {
            resolver,
            providers: Vec::new(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Add a provider
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.providers.is_empty() {
            return Err(crate::Error::config(
                "at least one dyn dns provider has to be configured",
            ));
        }

        for provider in &self.providers {
            provider.validate()?;
        }
        self.resolver.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }
}

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// Scan local interfaces for a public address
    Interface {
        /// Keep only addresses whose text starts with this prefix
        ip_prefix: Option<String>,
        /// Keep only addresses with a PTR record
        #[serde(default = "default_reverse_dns_check")]
        reverse_dns_check: bool,
    },

    /// Ask an external "client-ip" service
    Http {
        /// URL of the lookup service
        url: String,
        /// Prefix length attached to the discovered address
        #[serde(default = "default_subnet_mask")]
        subnet_mask: u8,
    },
}

impl ResolverConfig {
    /// Interface-scan resolver with the default prefix filter
    pub fn interface() -> Self {
        ResolverConfig::Interface {
            ip_prefix: Some(DEFAULT_IP_PREFIX.to_string()),
            reverse_dns_check: default_reverse_dns_check(),
        }
    }

    /// External-lookup resolver against the default service
    pub fn http() -> Self {
        ResolverConfig::Http {
            url: DEFAULT_LOOKUP_URL.to_string(),
            subnet_mask: DEFAULT_SUBNET_MASK,
        }
    }

    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ResolverConfig::Interface { .. } => Ok(()),
            ResolverConfig::Http { url, subnet_mask } => {
                if url.is_empty() {
                    return Err(crate::Error::config("lookup URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "lookup URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if *subnet_mask > crate::address::MAX_IPV6_PREFIX {
                    return Err(crate::Error::config(format!(
                        "subnet mask must be between 0 and 128. Got: {}",
                        subnet_mask
                    )));
                }
                Ok(())
            }
        }
    }

    /// Registry name of the resolver variant
    pub fn type_name(&self) -> &'static str {
        match self {
            ResolverConfig::Interface { .. } => "interface",
            ResolverConfig::Http { .. } => "http",
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::interface()
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// dynv6.com
    Dynv6 {
        /// Hostname to update
        host: String,
        /// HTTP token for the host
        token: String,
        /// Override of the update endpoint
        #[serde(default)]
        base_url: Option<String>,
    },

    /// duckdns.org
    DuckDns {
        /// Subdomain to update
        host: String,
        /// Account token
        token: String,
        /// Override of the update endpoint
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl ProviderConfig {
    pub fn dynv6(host: impl Into<String>, token: impl Into<String>) -> Self {
        ProviderConfig::Dynv6 {
            host: host.into(),
            token: token.into(),
            base_url: None,
        }
    }

    pub fn duckdns(host: impl Into<String>, token: impl Into<String>) -> Self {
        ProviderConfig::DuckDns {
            host: host.into(),
            token: token.into(),
            base_url: None,
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let (host, token, base_url) = match self {
            ProviderConfig::Dynv6 {
                host,
                token,
                base_url,
            }
            | ProviderConfig::DuckDns {
                host,
                token,
                base_url,
            } => (host, token, base_url),
        };

        if host.is_empty() {
            return Err(crate::Error::config(format!(
                "{} host cannot be empty",
                self.type_name()
            )));
        }
        if token.is_empty() {
            return Err(crate::Error::config(format!(
                "{} token cannot be empty",
                self.type_name()
            )));
        }
        if let Some(url) = base_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "{} base URL must use HTTP or HTTPS scheme",
                self.type_name()
            )));
        }
        Ok(())
    }

    /// Registry name of the provider
    pub fn type_name(&self) -> &'static str {
        match self {
            ProviderConfig::Dynv6 { .. } => "dynv6",
            ProviderConfig::DuckDns { .. } => "duckdns",
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick period (in seconds)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Maximum time between publishes, even without an address change (in seconds)
    #[serde(default = "default_forced_refresh_interval_secs")]
    pub forced_refresh_interval_secs: u64,

    /// Timeout applied to every outbound request (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the scheduler event channel
    ///
    /// When full, events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn forced_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.forced_refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.refresh_interval_secs == 0 {
            return Err(crate::Error::config("refresh interval must be > 0"));
        }
        if self.forced_refresh_interval_secs == 0 {
            return Err(crate::Error::config("forced refresh interval must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("request timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        if self.forced_refresh_interval_secs < self.refresh_interval_secs {
            tracing::warn!(
                "forced refresh interval ({}s) is shorter than the refresh interval ({}s); every tick will publish",
                self.forced_refresh_interval_secs,
                self.refresh_interval_secs
            );
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            forced_refresh_interval_secs: default_forced_refresh_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_reverse_dns_check() -> bool {
    true
}

fn default_subnet_mask() -> u8 {
    DEFAULT_SUBNET_MASK
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_forced_refresh_interval_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Parse a duration such as `90`, `20s`, `5m`, `1h30m` or `2d`
///
/// A bare number is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, crate::Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(crate::Error::invalid_input("empty duration"));
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => {
                return Err(crate::Error::invalid_input(format!(
                    "invalid duration unit '{}' in '{}'",
                    c, input
                )));
            }
        };
        let value: u64 = digits.parse().map_err(|_| {
            crate::Error::invalid_input(format!("missing number before '{}' in '{}'", c, input))
        })?;
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| crate::Error::invalid_input(format!("duration overflow: {}", input)))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(crate::Error::invalid_input(format!(
            "missing unit after '{}' in '{}'",
            digits, input
        )));
    }

    Ok(Duration::from_secs(total))
}
