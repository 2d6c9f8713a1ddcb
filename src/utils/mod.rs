//! Utility modules shared by the fetchers and the search controller.
//!
//! - [`merge_deduplicated`]: Merge partial catalogs, keeping one copy per event key
//! - [`HttpClient`]: Shared reqwest client with timeouts and user agent
//! - [`RetryConfig`]: Configuration for retry logic with exponential backoff
//! - [`with_retry`]: Execute a fetch with automatic retry on transient errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use eq_fetch::sources::FetchError;
//! use eq_fetch::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_page() -> Result<String, FetchError> { Ok("page".to_string()) }
//! # #[tokio::main]
//! # async fn main() {
//! let result = with_retry(RetryConfig::default(), || fetch_page()).await;
//! if let Err(failure) = result {
//!     eprintln!("gave up after {} attempts: {}", failure.attempts, failure.error);
//! }
//! # }
//! ```

mod dedup;
mod http;
mod retry;

pub use dedup::merge_deduplicated;
pub use http::{default_user_agent, HttpClient, DEFAULT_TIMEOUT};
pub use retry::{with_retry, RetryConfig, RetryFailure};
