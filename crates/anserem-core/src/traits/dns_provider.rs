// # DNS Provider Trait
//
// Defines the interface for publishing an address to a dynamic-DNS service.
//
// ## Implementations
//
// - dynv6: `anserem-provider-dynv6` crate
// - DuckDNS: `anserem-provider-duckdns` crate

use async_trait::async_trait;

use crate::address::Address;
use crate::error::PublishError;

/// Body returned by a provider's update endpoint
///
/// Opaque text, kept only so operators can read it in the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResponse {
    /// HTTP status code of the update call
    pub status: u16,
    /// Raw response body, trimmed
    pub body: String,
}

impl PublishResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into().trim().to_string(),
        }
    }
}

/// Trait for dynamic-DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers are isolated and single-shot:
/// - ✅ One HTTP call to their own endpoint per `publish()`
/// - ✅ Return success or failure
/// - ❌ No retries or backoff (the scheduler re-evaluates on the next tick)
/// - ❌ No knowledge of other providers or of the refresh state
/// - ❌ Secrets must never be logged or shown in `Debug`
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Publish an address
    ///
    /// # Returns
    ///
    /// - `Ok(PublishResponse)`: the provider accepted the request
    /// - `Err(PublishError)`: the request failed or was rejected
    async fn publish(&self, address: &Address) -> Result<PublishResponse, PublishError>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a provider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        request_timeout: std::time::Duration,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
