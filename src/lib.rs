//! # eq-fetch
//!
//! Retrieve seismic events and their bibliographies from the International
//! Seismological Centre (ISC) catalog and normalise them into typed records.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (SearchRequest, EarthquakeEvent, Catalog, etc.)
//! - [`query`]: Rendering search criteria into ISC request URLs
//! - [`sources`]: The fetcher boundary and its HTTP and mock implementations
//! - [`parse`]: Response classification and the bibliography/QuakeML parsers
//! - [`search`]: Overflow splitting, merging, de-duplication and filtering
//! - [`utils`]: HTTP client, retries and de-duplication helpers
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use eq_fetch::{CancelSignal, Config, IscFetcher, SearchController, SearchRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let fetcher = IscFetcher::new(config.endpoints.clone(), &config.http)?;
//! let controller = SearchController::new(Arc::new(fetcher), config.search_options());
//!
//! let request = SearchRequest::on_date("1969-07-29").magnitude(Some(5.0), None);
//! let outcome = controller
//!     .bibliography_search(&request, &CancelSignal::never())
//!     .await?;
//! if let Some(catalog) = outcome.catalog() {
//!     println!("{} events", catalog.event_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod parse;
pub mod query;
pub mod search;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use models::{Catalog, EarthquakeEvent, SearchCriteria, SearchRequest};
pub use search::{
    CancelHandle, CancelSignal, CatalogError, SearchController, SearchKind, SearchOutcome,
    SearchResult,
};
pub use sources::{Fetcher, IscFetcher, MockFetcher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
