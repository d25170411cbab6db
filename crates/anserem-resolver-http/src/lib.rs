// # External-Lookup Resolver
//
// Discovers the public address by asking a "client-ip" service which
// address the request came from.
//
// ## Protocol
//
// `GET <url>` returning JSON:
//
// ```json
// { "ipString": "2a02:810d:1:2::5", "ipType": "IPv6", "isBehindProxy": false }
// ```
//
// The configured subnet mask is attached as the prefix length, so with the
// default of 128 the resolver yields `2a02:810d:1:2::5/128`.
//
// ## Failure Mapping
//
// - request failed, timed out, or non-2xx → `ResolveError::NetworkError`
// - body not JSON, `ipString` not an IPv6 address → `ResolveError::DecodeError`

use anserem_core::config::ResolverConfig;
use anserem_core::traits::{AddressResolver, ResolverFactory};
use anserem_core::{Address, ComponentRegistry, Error, ResolveError, Result};

use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Response body of the client-ip service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIpResponse {
    /// The observed address
    pub ip_string: String,
    /// "IPv4" or "IPv6"
    #[serde(default)]
    pub ip_type: String,
    /// Whether the service thinks a proxy sits in front of the caller
    #[serde(default)]
    pub is_behind_proxy: bool,
}

/// Decode a client-ip response body into the address to publish
pub fn decode_client_ip(body: &str, subnet_mask: u8) -> std::result::Result<Address, ResolveError> {
    let response: ClientIpResponse = serde_json::from_str(body)
        .map_err(|e| ResolveError::decode(format!("error while decoding public ip response: {}", e)))?;
    response.into_address(subnet_mask)
}

impl ClientIpResponse {
    /// The observed address with `subnet_mask` attached
    ///
    /// Only IPv6 is accepted.
    pub fn into_address(self, subnet_mask: u8) -> std::result::Result<Address, ResolveError> {
        if self.is_behind_proxy {
            tracing::warn!(
                "Lookup service reports a proxy in front of {}; the address may not be ours",
                self.ip_string
            );
        }

        let ip: IpAddr = self
            .ip_string
            .trim()
            .parse()
            .map_err(|_| ResolveError::decode(format!("invalid IP address: {:?}", self.ip_string)))?;

        if !ip.is_ipv6() {
            return Err(ResolveError::decode(format!(
                "expected an IPv6 address, got {} ({})",
                ip, self.ip_type
            )));
        }

        Address::with_prefix(ip, subnet_mask).map_err(|e| ResolveError::decode(e.to_string()))
    }
}

/// External-lookup resolver
pub struct HttpResolver {
    /// URL of the client-ip service
    url: String,

    /// Prefix length attached to the discovered address
    subnet_mask: u8,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpResolver {
    /// Create a new external-lookup resolver
    ///
    /// # Parameters
    ///
    /// - `url`: client-ip service URL
    /// - `subnet_mask`: prefix length to attach (0..=128)
    /// - `timeout`: request timeout
    pub fn new(url: impl Into<String>, subnet_mask: u8, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("anserem/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            subnet_mask,
            client,
        })
    }

    /// Create a resolver around a pre-built HTTP client
    pub fn with_client(url: impl Into<String>, subnet_mask: u8, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            subnet_mask,
            client,
        }
    }

    /// The lookup URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl AddressResolver for HttpResolver {
    async fn discover(&self) -> std::result::Result<Address, ResolveError> {
        tracing::debug!("Looking up public address at {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ResolveError::network(format!("error while getting public ip: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::network(format!(
                "lookup service answered {}",
                status
            )));
        }

        let body: ClientIpResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                ResolveError::decode(format!("error while decoding public ip response: {}", e))
            } else {
                ResolveError::network(format!("failed to read response: {}", e))
            }
        })?;

        body.into_address(self.subnet_mask)
    }

    fn strategy_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating external-lookup resolvers
pub struct HttpFactory;

impl ResolverFactory for HttpFactory {
    fn create(&self, config: &ResolverConfig, request_timeout: Duration) -> Result<Box<dyn AddressResolver>> {
        match config {
            ResolverConfig::Http { url, subnet_mask } => {
                config.validate()?;
                Ok(Box::new(HttpResolver::new(url.clone(), *subnet_mask, request_timeout)?))
            }
            _ => Err(Error::config("Invalid config for HTTP resolver")),
        }
    }
}

/// Register the external-lookup resolver with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_resolver("http", Box::new(HttpFactory));
}
