//! Error types for the refresh agent
//!
//! Three families, matching how far an error may travel:
//! - [`Error::Config`] stops the process at startup
//! - [`ResolveError`] skips a single tick
//! - [`PublishError`] is logged for one provider and goes no further

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Address discovery failed
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// A provider rejected or failed a publish
    #[error("Publish error ({provider}): {source}")]
    Publish {
        /// Provider name
        provider: String,
        /// Underlying failure
        #[source]
        source: PublishError,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// OS-level I/O errors (signal handlers, runtime)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap a publish failure with the provider it came from
    pub fn publish(provider: impl Into<String>, source: PublishError) -> Self {
        Self::Publish {
            provider: provider.into(),
            source,
        }
    }
}

/// Address discovery failures
///
/// All variants are transient: the scheduler logs them and tries again on
/// the next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No enumerated address passed the filters
    #[error("no public address found among {candidates:?}")]
    NoPublicAddressFound {
        /// Every address that was looked at, in enumeration order
        candidates: Vec<String>,
    },

    /// The OS refused to list interface addresses
    #[error("interface enumeration failed: {0}")]
    InterfaceEnumerationFailed(String),

    /// Lookup request failed or returned a non-success status
    #[error("network error: {0}")]
    NetworkError(String),

    /// Lookup response could not be decoded
    #[error("decode error: {0}")]
    DecodeError(String),
}

impl ResolveError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }

    pub fn enumeration(msg: impl Into<String>) -> Self {
        Self::InterfaceEnumerationFailed(msg.into())
    }
}

/// Per-provider publish failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The request never produced a response (connect, TLS, timeout)
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for operator visibility
        body: String,
    },

    /// The provider answered 2xx but the body says the update was refused
    #[error("update rejected: {0}")]
    Rejected(String),

    /// The response body could not be read
    #[error("failed to read response: {0}")]
    Body(String),
}

impl PublishError {
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    pub fn body(msg: impl Into<String>) -> Self {
        Self::Body(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
