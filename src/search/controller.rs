//! The search controller.

use chrono::NaiveDateTime;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use super::{filter, CancelSignal, CatalogError, SearchOptions, SearchOutcome, SearchReport, SearchResult};
use crate::models::{Catalog, CriteriaError, DateRange, SearchCriteria, SearchRequest};
use crate::parse::{
    classify_lines, classify_quakeml, parse_bibliography, parse_event_bibliography, parse_quakeml, Classified,
    ParsedPage,
};
use crate::query::{bibliography_query, event_bibliography_query, hypocenter_query, Query};
use crate::sources::{FetchError, Fetcher, RawResponse};
use crate::utils::{merge_deduplicated, with_retry};

/// Which ISC search a logical search runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Event bibliography (`bibsearch.pl`), line-oriented HTML
    Bibliography,
    /// Bulletin hypocenters (`web-db-run`), QuakeML
    Hypocenter,
}

impl SearchKind {
    fn build(&self, criteria: &SearchCriteria) -> Result<Query, CriteriaError> {
        match self {
            SearchKind::Bibliography => bibliography_query(criteria),
            SearchKind::Hypocenter => hypocenter_query(criteria),
        }
    }
}

/// What one sub-range returned
enum RangeOutcome {
    Found(ParsedPage),
    Empty,
    Overflow(Query),
}

/// Runs logical searches against a [`Fetcher`].
///
/// Each call owns its merged results; a controller can serve several
/// searches at once.
#[derive(Debug, Clone)]
pub struct SearchController {
    fetcher: Arc<dyn Fetcher>,
    options: SearchOptions,
}

impl SearchController {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: SearchOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Search the event bibliography
    pub async fn bibliography_search(
        &self,
        request: &SearchRequest,
        cancel: &CancelSignal,
    ) -> Result<SearchOutcome, CatalogError> {
        self.search(SearchKind::Bibliography, request.resolve()?, cancel)
            .await
    }

    /// Search the bulletin for hypocenters
    pub async fn hypocenter_search(
        &self,
        request: &SearchRequest,
        cancel: &CancelSignal,
    ) -> Result<SearchOutcome, CatalogError> {
        self.search(SearchKind::Hypocenter, request.resolve()?, cancel)
            .await
    }

    /// Every citation recorded for one ISC event id
    pub async fn event_bibliography(
        &self,
        event_id: u64,
        cancel: &CancelSignal,
    ) -> Result<Vec<String>, CatalogError> {
        let query = event_bibliography_query(event_id);

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
            raw = self.fetch(&query) => raw?,
        };

        let lines = expect_lines(&query, raw)?;
        parse_event_bibliography(&lines).map_err(|source| CatalogError::Parse {
            query,
            range: None,
            source,
        })
    }

    /// Run one logical search over already resolved criteria.
    ///
    /// Overflowing ranges are split and re-queued until every piece answers
    /// or a one-day range still overflows. Results are merged in range order,
    /// de-duplicated keeping the first copy, then filtered.
    pub async fn search(
        &self,
        kind: SearchKind,
        criteria: SearchCriteria,
        cancel: &CancelSignal,
    ) -> Result<SearchOutcome, CatalogError> {
        // surface criteria errors before the first request
        kind.build(&criteria)?;

        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }

        let limit = self.options.max_concurrent.max(1);
        let mut pending: VecDeque<DateRange> = VecDeque::from([criteria.range]);
        let mut in_flight = FuturesUnordered::new();
        let mut parts: BTreeMap<NaiveDateTime, Catalog> = BTreeMap::new();
        let mut report = SearchReport::default();

        tracing::info!("Starting {:?} search over {}", kind, criteria.range);

        loop {
            while in_flight.len() < limit {
                let Some(range) = pending.pop_front() else {
                    break;
                };
                report.queries += 1;
                in_flight.push(self.fetch_range(kind, &criteria, range));
            }

            if in_flight.is_empty() {
                break;
            }

            let (range, outcome) = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Search cancelled with {} fetches in flight", in_flight.len());
                    return Err(CatalogError::Cancelled);
                }
                Some(done) = in_flight.next() => done,
                else => break,
            };

            match outcome? {
                RangeOutcome::Found(page) => {
                    report.blocks_skipped += page.skipped.len();
                    parts.insert(range.start, page.catalog);
                }
                RangeOutcome::Empty => {
                    report.empty_ranges += 1;
                }
                RangeOutcome::Overflow(query) => {
                    let pieces = self
                        .options
                        .split
                        .split(&range)
                        .ok_or(CatalogError::Overflow { query, range })?;
                    tracing::info!("Range {} overflowed, splitting into {} parts", range, pieces.len());
                    report.splits += 1;
                    pending.extend(pieces);
                }
            }
        }

        drop(in_flight);

        if parts.is_empty() {
            tracing::info!("No events found after {} queries", report.queries);
            return Ok(SearchOutcome::Empty { criteria, report });
        }

        let parts: Vec<Catalog> = parts.into_values().collect();
        let total: usize = parts.iter().map(Catalog::event_count).sum();
        let merged = merge_deduplicated(parts);
        report.duplicates_dropped = total - merged.event_count();

        let before = merged.event_count();
        let catalog = filter::apply(merged, &criteria.depth, &criteria.magnitude);
        report.filtered_out = before - catalog.event_count();

        tracing::info!(
            "Search finished: {} events, {} articles from {} queries",
            catalog.event_count(),
            catalog.articles.len(),
            report.queries
        );

        Ok(SearchOutcome::Found(SearchResult {
            criteria,
            catalog,
            report,
        }))
    }

    async fn fetch_range(
        &self,
        kind: SearchKind,
        criteria: &SearchCriteria,
        range: DateRange,
    ) -> (DateRange, Result<RangeOutcome, CatalogError>) {
        let outcome = self.fetch_range_outcome(kind, criteria, range).await;
        (range, outcome)
    }

    async fn fetch_range_outcome(
        &self,
        kind: SearchKind,
        criteria: &SearchCriteria,
        range: DateRange,
    ) -> Result<RangeOutcome, CatalogError> {
        let query = kind.build(&criteria.with_range(range))?;
        tracing::debug!("Querying {} for {}", query.endpoint.name(), range);

        let raw = self.fetch(&query).await?;
        let policy = self.options.malformed;

        let classified = match (kind, raw) {
            (SearchKind::Bibliography, RawResponse::Lines(lines)) => match classify_lines(lines) {
                Classified::Ok(lines) => Classified::Ok(parse_bibliography(&lines, policy)),
                other => other.map_status(),
            },
            (SearchKind::Hypocenter, RawResponse::Bytes(bytes)) => match classify_quakeml(bytes) {
                Classified::Ok(bytes) => Classified::Ok(parse_quakeml(&bytes, policy)),
                other => other.map_status(),
            },
            (_, other) => {
                return Err(CatalogError::Transport {
                    query,
                    attempts: 1,
                    source: FetchError::Decode(format!("unexpected response shape: {}", shape(&other))),
                })
            }
        };

        match classified {
            Classified::Ok(parsed) => parsed.map(RangeOutcome::Found).map_err(|source| CatalogError::Parse {
                query,
                range: Some(range),
                source,
            }),
            Classified::Empty => Ok(RangeOutcome::Empty),
            Classified::Overflow => Ok(RangeOutcome::Overflow(query)),
            Classified::Unavailable(reason) => Err(CatalogError::Unavailable { query, range, reason }),
        }
    }

    /// Fetch with a per-attempt timeout, retrying transient failures
    async fn fetch(&self, query: &Query) -> Result<RawResponse, CatalogError> {
        let timeout = self.options.timeout;
        let fetcher = &self.fetcher;

        with_retry(self.options.retry, move || async move {
            match tokio::time::timeout(timeout, fetcher.fetch(query)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            }
        })
        .await
        .map_err(|failure| CatalogError::Transport {
            query: query.clone(),
            attempts: failure.attempts,
            source: failure.error,
        })
    }
}

fn shape(raw: &RawResponse) -> &'static str {
    match raw {
        RawResponse::Lines(_) => "text lines",
        RawResponse::Bytes(_) => "raw bytes",
    }
}

fn expect_lines(query: &Query, raw: RawResponse) -> Result<Vec<String>, CatalogError> {
    match raw {
        RawResponse::Lines(lines) => Ok(lines),
        other => Err(CatalogError::Transport {
            query: query.clone(),
            attempts: 1,
            source: FetchError::Decode(format!("unexpected response shape: {}", shape(&other))),
        }),
    }
}
