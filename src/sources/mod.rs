//! Fetcher boundary: turning a rendered [`Query`] into a raw provider response.
//!
//! The search engine only depends on the [`Fetcher`] trait. [`IscFetcher`]
//! talks to the ISC web forms over HTTP; [`MockFetcher`] answers from a
//! closure and is used by tests and offline tooling.
//!
//! # Implementing a New Fetcher
//!
//! 1. Create a struct that implements `Fetcher`
//! 2. Return [`RawResponse::Lines`] for the bibliography endpoints (body text
//!    split the way [`markup::extract_body_lines`] splits it) and
//!    [`RawResponse::Bytes`] for the hypocenter endpoint
//! 3. Map transport failures to [`FetchError`]; only transient variants are
//!    retried by the controller

mod isc;
pub mod markup;
pub mod mock;

pub use isc::IscFetcher;
pub use mock::MockFetcher;

use async_trait::async_trait;

use crate::query::Query;

/// Undecoded provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// Text lines of an HTML page body
    Lines(Vec<String>),
    /// Raw document bytes (QuakeML)
    Bytes(Vec<u8>),
}

/// Source of raw catalog responses
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Issue `query` and return the provider's response body
    async fn fetch(&self, query: &Query) -> Result<RawResponse, FetchError>;
}

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS or protocol failure
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Non-success HTTP status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Body could not be read or decoded
    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout => true,
            FetchError::Status(code) => *code == 429 || (500..600).contains(code),
            FetchError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() || err.is_body() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
