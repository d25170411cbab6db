// # Address Resolver Trait
//
// Defines the interface for discovering the current public address.
//
// ## Implementations
//
// - Interface scan: `anserem-resolver-interface` crate
// - External lookup: `anserem-resolver-http` crate
//
// ## Usage
//
// ```rust,ignore
// use anserem_core::AddressResolver;
//
// let resolver = /* AddressResolver implementation */;
// match resolver.discover().await {
//     Ok(address) => println!("public address: {}", address),
//     Err(e) => eprintln!("discovery failed: {}", e),
// }
// ```

use async_trait::async_trait;

use crate::address::Address;
use crate::error::ResolveError;

/// Trait for address discovery strategies
///
/// A resolver is an **observer**: it reports what the current address is
/// and nothing else.
///
/// ## Allowed
/// - Enumerate local interfaces, issue lookup requests, perform reverse DNS
///
/// ## Forbidden
/// - Caching the previous answer (the scheduler owns the last-known state)
/// - Retrying on failure (the next tick is the retry)
/// - Deciding whether a publish is needed
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Discover the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(Address)`: the address to publish
    /// - `Err(ResolveError)`: discovery failed this time round
    async fn discover(&self) -> Result<Address, ResolveError>;

    /// Strategy name, for logging
    fn strategy_name(&self) -> &'static str;
}

/// Helper trait for constructing resolvers from configuration
pub trait ResolverFactory: Send + Sync {
    /// Create a resolver instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: the resolver section of the agent configuration
    /// - `request_timeout`: upper bound for any outbound request the resolver makes
    fn create(
        &self,
        config: &crate::config::ResolverConfig,
        request_timeout: std::time::Duration,
    ) -> Result<Box<dyn AddressResolver>, crate::Error>;
}
