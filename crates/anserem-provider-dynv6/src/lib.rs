// # dynv6 DNS Provider
//
// Publishes the address through the dynv6 update API.
//
// ## API Reference
//
// - Update: `GET https://dynv6.com/api/update?hostname=<host>&token=<token>&ipv6=<address>`
// - The address is sent with its prefix when it has one (`2a02:810d::5/128`)
// - The response is a short text body ("addresses updated", "addresses unchanged")
//
// ## Security Requirements
//
// - The HTTP token NEVER appears in logs or `Debug` output
// - URLs are logged without their query string

use anserem_core::config::ProviderConfig;
use anserem_core::traits::{DnsProvider, DnsProviderFactory, PublishResponse};
use anserem_core::{Address, ComponentRegistry, Error, PublishError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// dynv6 update endpoint
pub const DYNV6_UPDATE_URL: &str = "https://dynv6.com/api/update";

/// dynv6 DNS provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the token.
pub struct Dynv6Provider {
    /// Hostname to update, e.g. "myhost.dynv6.net"
    host: String,

    /// HTTP token
    /// ⚠️ NEVER log this value
    token: String,

    /// Update endpoint
    update_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for Dynv6Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynv6Provider")
            .field("host", &self.host)
            .field("token", &"<REDACTED>")
            .field("update_url", &self.update_url)
            .finish()
    }
}

impl Dynv6Provider {
    /// Create a new dynv6 provider
    ///
    /// # Parameters
    ///
    /// - `host`: hostname to update
    /// - `token`: HTTP token of the zone
    /// - `timeout`: request timeout
    pub fn new(host: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("anserem/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Self::with_client(host, token, client)
    }

    /// Create a provider around a pre-built HTTP client
    pub fn with_client(host: impl Into<String>, token: impl Into<String>, client: reqwest::Client) -> Result<Self> {
        let host = host.into();
        let token = token.into();

        if host.is_empty() {
            return Err(Error::config("dynv6 host cannot be empty"));
        }
        if token.is_empty() {
            return Err(Error::config("dynv6 token cannot be empty"));
        }

        Ok(Self {
            host,
            token,
            update_url: DYNV6_UPDATE_URL.to_string(),
            client,
        })
    }

    /// Point the provider at another update endpoint
    pub fn with_update_url(mut self, url: impl Into<String>) -> Self {
        self.update_url = url.into();
        self
    }

    /// Build the update request for `address`
    pub fn build_request(&self, address: &Address) -> std::result::Result<reqwest::Request, PublishError> {
        self.client
            .get(&self.update_url)
            .query(&[
                ("hostname", self.host.as_str()),
                ("token", self.token.as_str()),
                ("ipv6", address.to_string().as_str()),
            ])
            .build()
            .map_err(|e| PublishError::request(e.without_url().to_string()))
    }
}

#[async_trait]
impl DnsProvider for Dynv6Provider {
    async fn publish(&self, address: &Address) -> std::result::Result<PublishResponse, PublishError> {
        tracing::debug!(
            "Updating {} to {} via {}",
            self.host,
            address,
            self.update_url
        );

        let request = self.build_request(address)?;

        // Drop the URL from errors, it carries the token
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

        Ok(PublishResponse::new(status.as_u16(), body))
    }

    fn provider_name(&self) -> &'static str {
        "dynv6"
    }
}

/// Factory for creating dynv6 providers
pub struct Dynv6Factory;

impl DnsProviderFactory for Dynv6Factory {
    fn create(&self, config: &ProviderConfig, request_timeout: Duration) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Dynv6 { host, token, base_url } => {
                config.validate()?;

                let mut provider = Dynv6Provider::new(host.clone(), token.clone(), request_timeout)?;
                if let Some(url) = base_url {
                    provider = provider.with_update_url(url.clone());
                }
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for dynv6 provider")),
        }
    }
}

/// Register the dynv6 provider with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_provider("dynv6", Box::new(Dynv6Factory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    fn provider() -> Dynv6Provider {
        Dynv6Provider::with_client("myhost.dynv6.net", "secret_token_12345", local_client()).unwrap()
    }

    /// Serve one response and report the request line that was received
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let _ = tx.send(request.lines().next().unwrap_or_default().to_string());

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        (format!("http://{}/api/update", addr), rx)
    }

    #[test]
    fn test_request_carries_host_token_and_prefixed_address() {
        let address = Address::with_prefix("2a02:810d:1:2::5".parse::<IpAddr>().unwrap(), 128).unwrap();
        let request = provider().build_request(&address).unwrap();

        let url = request.url();
        assert_eq!(url.host_str(), Some("dynv6.com"));
        assert_eq!(url.path(), "/api/update");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("hostname".to_string(), "myhost.dynv6.net".to_string()),
                ("token".to_string(), "secret_token_12345".to_string()),
                ("ipv6".to_string(), "2a02:810d:1:2::5/128".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_without_prefix_sends_bare_address() {
        let address = Address::new("2001:db8::1".parse::<IpAddr>().unwrap());
        let request = provider().build_request(&address).unwrap();

        let ipv6 = request
            .url()
            .query_pairs()
            .find(|(k, _)| k == "ipv6")
            .map(|(_, v)| v.into_owned());
        assert_eq!(ipv6.as_deref(), Some("2001:db8::1"));
    }

    #[tokio::test]
    async fn test_publish_returns_body() {
        let (url, request_line) = serve_once("200 OK", "addresses updated\n").await;
        let provider = provider().with_update_url(url);
        let address = Address::new("2001:db8::1".parse::<IpAddr>().unwrap());

        let response = provider.publish(&address).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "addresses updated");

        let line = request_line.await.unwrap();
        assert!(line.starts_with("GET /api/update?hostname=myhost.dynv6.net&token=secret_token_12345&ipv6="));
    }

    #[tokio::test]
    async fn test_publish_maps_error_status() {
        let (url, _) = serve_once("401 Unauthorized", "invalid authentication token").await;
        let provider = provider().with_update_url(url);
        let address = Address::new("2001:db8::1".parse::<IpAddr>().unwrap());

        let err = provider.publish(&address).await.unwrap_err();
        assert_eq!(
            err,
            PublishError::Status {
                status: 401,
                body: "invalid authentication token".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_hides_token() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let provider = provider().with_update_url(format!("http://127.0.0.1:{}/api/update", port));
        let address = Address::new("2001:db8::1".parse::<IpAddr>().unwrap());

        let err = provider.publish(&address).await.unwrap_err();
        assert!(matches!(err, PublishError::Request(_)));
        assert!(!err.to_string().contains("secret_token_12345"));
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let debug_str = format!("{:?}", provider());
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("Dynv6Provider"));
        assert!(debug_str.contains("myhost.dynv6.net"));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(Dynv6Provider::with_client("", "token", local_client()).is_err());
        assert!(Dynv6Provider::with_client("host", "", local_client()).is_err());
    }

    #[test]
    fn test_factory_creation() {
        let factory = Dynv6Factory;
        let provider = factory
            .create(&ProviderConfig::dynv6("myhost.dynv6.net", "token"), Duration::from_secs(5))
            .unwrap();
        assert_eq!(provider.provider_name(), "dynv6");
    }

    #[test]
    fn test_factory_rejects_other_variant() {
        let factory = Dynv6Factory;
        let config = ProviderConfig::duckdns("myhost", "token");
        assert!(factory.create(&config, Duration::from_secs(5)).is_err());
    }
}
