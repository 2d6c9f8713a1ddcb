//! Search orchestration: splitting, merging and filtering.
//!
//! [`SearchController`] drives one logical search over as many physical
//! queries as the provider's result cap requires.

mod cancel;
mod controller;
pub mod filter;

pub use cancel::{CancelHandle, CancelSignal};
pub use controller::{SearchController, SearchKind};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{Catalog, CriteriaError, DateRange, SearchCriteria};
use crate::parse::{MalformedPolicy, ParseError};
use crate::query::Query;
use crate::sources::FetchError;
use crate::utils::RetryConfig;

/// How an overflowing date range is cut into sub-ranges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "strategy")]
pub enum SplitStrategy {
    /// Halve the range on a whole-day boundary
    #[default]
    Bisect,
    /// Cut into fixed chunks of `days`; ranges no longer than one chunk are
    /// bisected instead
    Step { days: u32 },
}

impl SplitStrategy {
    /// Sub-ranges for an overflowing `range`, or `None` when it cannot be cut
    /// any further
    pub fn split(&self, range: &DateRange) -> Option<Vec<DateRange>> {
        if range.is_minimal() {
            return None;
        }
        if let SplitStrategy::Step { days } = self {
            let chunks = range.step(*days);
            if chunks.len() > 1 {
                return Some(chunks);
            }
        }
        range.bisect().map(|(first, second)| vec![first, second])
    }
}

/// Controller tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub retry: RetryConfig,
    /// Limit for a single fetch attempt
    pub timeout: Duration,
    /// Sub-range fetches in flight at once
    pub max_concurrent: usize,
    pub split: SplitStrategy,
    pub malformed: MalformedPolicy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeout: crate::utils::DEFAULT_TIMEOUT,
            max_concurrent: 4,
            split: SplitStrategy::default(),
            malformed: MalformedPolicy::default(),
        }
    }
}

/// Counters describing how a search was carried out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    /// Physical queries issued, not counting retries
    pub queries: usize,
    /// Overflowing ranges that were split
    pub splits: usize,
    /// Sub-ranges the provider reported as empty
    pub empty_ranges: usize,
    /// Blocks dropped under [`MalformedPolicy::Skip`]
    pub blocks_skipped: usize,
    pub duplicates_dropped: usize,
    /// Events removed by the depth/magnitude filter
    pub filtered_out: usize,
}

/// A completed search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Resolved criteria, kept for provenance
    pub criteria: SearchCriteria,
    pub catalog: Catalog,
    pub report: SearchReport,
}

/// Successful outcome of a logical search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(SearchResult),
    /// Every queried range was reported empty by the provider
    Empty { criteria: SearchCriteria, report: SearchReport },
}

impl SearchOutcome {
    pub fn catalog(&self) -> Option<&Catalog> {
        match self {
            SearchOutcome::Found(result) => Some(&result.catalog),
            SearchOutcome::Empty { .. } => None,
        }
    }

    pub fn report(&self) -> &SearchReport {
        match self {
            SearchOutcome::Found(result) => &result.report,
            SearchOutcome::Empty { report, .. } => report,
        }
    }
}

/// Fatal search failures, each carrying what is needed to reproduce it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(#[from] CriteriaError),

    #[error("fetching {query} failed after {attempts} attempts: {source}")]
    Transport {
        query: Query,
        attempts: u32,
        source: FetchError,
    },

    #[error("catalog service unavailable for {range} ({reason}); try again later: {query}")]
    Unavailable {
        query: Query,
        range: DateRange,
        reason: String,
    },

    #[error("more events than the provider returns in one response within a single day {range}: {query}")]
    Overflow { query: Query, range: DateRange },

    #[error("could not parse response{}: {source} ({query})", in_range(.range))]
    Parse {
        query: Query,
        range: Option<DateRange>,
        source: ParseError,
    },

    #[error("search cancelled")]
    Cancelled,
}

fn in_range(range: &Option<DateRange>) -> String {
    range
        .map(|range| format!(" for {}", range))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        let day = |(y, m, d): (i32, u32, u32)| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        DateRange::new(day(start), day(end)).unwrap()
    }

    #[test]
    fn test_bisect_split() {
        let parts = SplitStrategy::Bisect
            .split(&range((2020, 1, 1), (2020, 2, 1)))
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].end, parts[1].start);
        assert_eq!(parts[0].start, range((2020, 1, 1), (2020, 1, 2)).start);
        assert_eq!(parts[1].end, range((2020, 1, 1), (2020, 2, 1)).end);
    }

    #[test]
    fn test_step_split_falls_back_to_bisect() {
        let month = range((2020, 1, 1), (2020, 2, 1));
        let parts = SplitStrategy::Step { days: 7 }.split(&month).unwrap();
        assert_eq!(parts.len(), 5);

        let week = range((2020, 1, 1), (2020, 1, 8));
        let parts = SplitStrategy::Step { days: 7 }.split(&week).unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_minimal_range_cannot_split() {
        let day = range((2020, 1, 1), (2020, 1, 2));
        assert_eq!(SplitStrategy::Bisect.split(&day), None);
        assert_eq!(SplitStrategy::Step { days: 1 }.split(&day), None);
    }

    #[test]
    fn test_error_messages_carry_context() {
        let query = crate::query::event_bibliography_query(1);
        let err = CatalogError::Parse {
            query,
            range: Some(range((2020, 1, 1), (2020, 1, 2))),
            source: ParseError::malformed(3, "missing info line"),
        };
        let message = err.to_string();
        assert!(message.contains("2020-01-01T00:00:00 .. 2020-01-02T00:00:00"));
        assert!(message.contains("block 3"));
        assert!(message.contains("evid=1"));
    }
}
