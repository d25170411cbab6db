// # DuckDNS Provider
//
// Publishes the address through the DuckDNS update API.
//
// ## API Reference
//
// - Update: `GET https://www.duckdns.org/update?domains=<host>&token=<token>&ip=&ipv6=<address>`
// - The address is sent bare, DuckDNS does not accept a prefix length
// - `ip=` is left empty so DuckDNS does not fill in the caller's IPv4 address
// - The body is `OK` on success and `KO` when the update was refused, both with status 200

use anserem_core::config::ProviderConfig;
use anserem_core::traits::{DnsProvider, DnsProviderFactory, PublishResponse};
use anserem_core::{Address, ComponentRegistry, Error, PublishError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// DuckDNS update endpoint
pub const DUCKDNS_UPDATE_URL: &str = "https://www.duckdns.org/update";

/// Body DuckDNS returns when it refuses an update
const REJECTED_BODY: &str = "KO";

/// DuckDNS provider
pub struct DuckDnsProvider {
    /// Subdomain to update, e.g. "myhost"
    host: String,

    /// Account token
    /// ⚠️ NEVER log this value
    token: String,

    /// Update endpoint
    update_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for DuckDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDnsProvider")
            .field("host", &self.host)
            .field("token", &"<REDACTED>")
            .field("update_url", &self.update_url)
            .finish()
    }
}

impl DuckDnsProvider {
    pub fn new(host: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("anserem/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Self::with_client(host, token, client)
    }

    pub fn with_client(host: impl Into<String>, token: impl Into<String>, client: reqwest::Client) -> Result<Self> {
        let host = host.into();
        let token = token.into();

        if host.is_empty() {
            return Err(Error::config("DuckDNS host cannot be empty"));
        }
        if token.is_empty() {
            return Err(Error::config("DuckDNS token cannot be empty"));
        }

        Ok(Self {
            host,
            token,
            update_url: DUCKDNS_UPDATE_URL.to_string(),
            client,
        })
    }

    pub fn with_update_url(mut self, url: impl Into<String>) -> Self {
        self.update_url = url.into();
        self
    }

    /// Build the update request for `address`
    pub fn build_request(&self, address: &Address) -> std::result::Result<reqwest::Request, PublishError> {
        self.client
            .get(&self.update_url)
            .query(&[
                ("domains", self.host.as_str()),
                ("token", self.token.as_str()),
                ("ip", ""),
                ("ipv6", address.ip().to_string().as_str()),
            ])
            .build()
            .map_err(|e| PublishError::request(e.without_url().to_string()))
    }
}

#[async_trait]
impl DnsProvider for DuckDnsProvider {
    async fn publish(&self, address: &Address) -> std::result::Result<PublishResponse, PublishError> {
        tracing::debug!(
            "Updating {} to {} via {}",
            self.host,
            address.ip(),
            self.update_url
        );

        let request = self.build_request(address)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| PublishError::request(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::body(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(PublishError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let response = PublishResponse::new(status.as_u16(), body);
        if response.body == REJECTED_BODY {
            return Err(PublishError::rejected(format!(
                "DuckDNS refused the update for {}",
                self.host
            )));
        }

        Ok(response)
    }

    fn provider_name(&self) -> &'static str {
        "duckdns"
    }
}

/// Factory for creating DuckDNS providers
pub struct DuckDnsFactory;

impl DnsProviderFactory for DuckDnsFactory {
    fn create(&self, config: &ProviderConfig, request_timeout: Duration) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::DuckDns { host, token, base_url } => {
                config.validate()?;

                let mut provider = DuckDnsProvider::new(host.clone(), token.clone(), request_timeout)?;
                if let Some(url) = base_url {
                    provider = provider.with_update_url(url.clone());
                }
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for DuckDNS provider")),
        }
    }
}

/// Register the DuckDNS provider with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_provider("duckdns", Box::new(DuckDnsFactory));
}
