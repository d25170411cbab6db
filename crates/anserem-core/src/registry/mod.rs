//! Plugin-based component registry
//!
//! Resolver strategies and DNS providers register a factory under a name;
//! the registry then builds whatever the configuration asks for, avoiding
//! hardcoded if-else chains in the daemon.
//!
//! ## Registration
//!
//! Plugin crates expose a `register()` function:
//!
//! ```rust,ignore
//! // In anserem-provider-dynv6
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_provider("dynv6", Box::new(Dynv6Factory));
//! }
//! ```

use crate::config::{AgentConfig, ProviderConfig, ResolverConfig};
use crate::error::{Error, Result};
use crate::scheduler::{RefreshScheduler, SchedulerEvent};
use crate::traits::{AddressResolver, DnsProvider, DnsProviderFactory, ResolverFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

/// Registry of resolver and provider factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered resolver factories
    resolvers: RwLock<HashMap<String, Box<dyn ResolverFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under `name` (e.g. "dynv6")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Register a resolver factory under `name` (e.g. "interface", "http")
    pub fn register_resolver(&self, name: impl Into<String>, factory: Box<dyn ResolverFactory>) {
        let mut resolvers = self.resolvers.write().unwrap_or_else(PoisonError::into_inner);
        resolvers.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_provider(
        &self,
        config: &ProviderConfig,
        request_timeout: Duration,
    ) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config, request_timeout)
    }

    /// Create a resolver from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn AddressResolver>)`: Created resolver instance
    /// - `Err(Error)`: If the resolver type is not registered or creation fails
    pub fn create_resolver(
        &self,
        config: &ResolverConfig,
        request_timeout: Duration,
    ) -> Result<Box<dyn AddressResolver>> {
        let resolver_type = config.type_name();
        let resolvers = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = resolvers
            .get(resolver_type)
            .ok_or_else(|| Error::config(format!("Unknown resolver type: {}", resolver_type)))?;

        factory.create(config, request_timeout)
    }

    /// Validate `config` and build a scheduler from it
    pub fn build_scheduler(
        &self,
        config: &AgentConfig,
    ) -> Result<(RefreshScheduler, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;

        let timeout = config.scheduler.request_timeout();
        let resolver = self.create_resolver(&config.resolver, timeout)?;
        let providers = config
            .providers
            .iter()
            .map(|provider| self.create_provider(provider, timeout))
            .collect::<Result<Vec<_>>>()?;

        RefreshScheduler::new(resolver, providers, &config.scheduler)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered resolver types
    pub fn list_resolvers(&self) -> Vec<String> {
        let resolvers = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);
        resolvers.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a resolver type is registered
    pub fn has_resolver(&self, name: &str) -> bool {
        let resolvers = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);
        resolvers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::error::{PublishError, ResolveError};
    use crate::traits::PublishResponse;

    struct FixedResolver;

    #[async_trait::async_trait]
    impl AddressResolver for FixedResolver {
        async fn discover(&self) -> std::result::Result<Address, ResolveError> {
            Ok("2001:db8::1".parse().expect("valid address"))
        }

        fn strategy_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FixedResolverFactory;

    impl ResolverFactory for FixedResolverFactory {
        fn create(&self, _config: &ResolverConfig, _timeout: Duration) -> Result<Box<dyn AddressResolver>> {
            Ok(Box::new(FixedResolver))
        }
    }

    struct NullProvider;

    #[async_trait::async_trait]
    impl DnsProvider for NullProvider {
        async fn publish(&self, _address: &Address) -> std::result::Result<PublishResponse, PublishError> {
            Ok(PublishResponse::new(200, "ok"))
        }

        fn provider_name(&self) -> &'static str {
            "null"
        }
    }

    struct NullProviderFactory;

    impl DnsProviderFactory for NullProviderFactory {
        fn create(&self, _config: &ProviderConfig, _timeout: Duration) -> Result<Box<dyn DnsProvider>> {
            Ok(Box::new(NullProvider))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ComponentRegistry::new();

        assert!(!registry.has_provider("dynv6"));
        assert!(!registry.has_resolver("http"));

        registry.register_provider("dynv6", Box::new(NullProviderFactory));
        registry.register_resolver("http", Box::new(FixedResolverFactory));

        assert!(registry.has_provider("dynv6"));
        assert!(registry.has_resolver("http"));
        assert!(registry.list_providers().contains(&"dynv6".to_string()));
        assert!(registry.list_resolvers().contains(&"http".to_string()));
    }

    #[test]
    fn test_unknown_resolver_is_config_error() {
        let registry = ComponentRegistry::new();
        let result = registry.create_resolver(&ResolverConfig::interface(), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_scheduler_requires_registered_provider() {
        let registry = ComponentRegistry::new();
        registry.register_resolver("http", Box::new(FixedResolverFactory));

        let config = AgentConfig::new(ResolverConfig::http())
            .with_provider(ProviderConfig::duckdns("home", "token"));

        assert!(registry.build_scheduler(&config).is_err());

        registry.register_provider("duckdns", Box::new(NullProviderFactory));
        assert!(registry.build_scheduler(&config).is_ok());
    }
}
