// # anserem-core
//
// Core library for the anserem dynamic-DNS refresh agent.
//
// ## Architecture Overview
//
// - **AddressResolver**: discovers the current public address
// - **DnsProvider**: publishes an address to a dynamic-DNS service
// - **RefreshScheduler**: decides when to publish and what to publish
// - **RefreshState**: last published address and refresh time, owned by the run loop
// - **ComponentRegistry**: factories that build resolvers and providers from configuration
//
// ## Design Principles
//
// 1. **Separation of Concerns**: refresh policy lives here, HTTP plumbing lives in plugin crates
// 2. **Explicit State**: the scheduler never holds hidden mutable state
// 3. **Plugin-Based**: resolvers and providers are registered by name, no hard-coded if-else
// 4. **Library-First**: the daemon is a thin layer over this crate

pub mod address;
pub mod config;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use address::Address;
pub use config::{AgentConfig, ProviderConfig, ResolverConfig, SchedulerConfig};
pub use error::{Error, PublishError, ResolveError, Result};
pub use registry::ComponentRegistry;
pub use scheduler::{RefreshDecision, RefreshScheduler, SchedulerEvent};
pub use state::RefreshState;
pub use traits::{AddressResolver, DnsProvider, PublishResponse};
