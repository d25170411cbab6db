//! Core traits for the refresh agent
//!
//! - [`AddressResolver`]: discover the current public address
//! - [`DnsProvider`]: publish an address to a dynamic-DNS service

pub mod dns_provider;
pub mod resolver;

pub use dns_provider::{DnsProvider, DnsProviderFactory, PublishResponse};
pub use resolver::{AddressResolver, ResolverFactory};
