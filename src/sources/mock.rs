//! Mock fetcher for tests and offline runs.

use async_trait::async_trait;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::query::Query;
use crate::sources::{FetchError, Fetcher, RawResponse};

type Responder = Box<dyn Fn(&Query) -> Result<RawResponse, FetchError> + Send + Sync>;

/// A fetcher that answers every query from a closure and records what it was
/// asked.
pub struct MockFetcher {
    responder: Responder,
    delay: Option<Duration>,
    queries: Mutex<Vec<Query>>,
}

impl MockFetcher {
    /// Create a mock answering with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Query) -> Result<RawResponse, FetchError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A mock that returns the same lines for every query.
    pub fn with_lines(lines: Vec<String>) -> Self {
        Self::new(move |_| Ok(RawResponse::Lines(lines.clone())))
    }

    /// Sleep this long before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received so far, in arrival order.
    pub fn queries(&self) -> Vec<Query> {
        self.log().clone()
    }

    pub fn call_count(&self) -> usize {
        self.log().len()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Query>> {
        self.queries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for MockFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockFetcher")
            .field("delay", &self.delay)
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, query: &Query) -> Result<RawResponse, FetchError> {
        self.log().push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::event_bibliography_query;

    #[tokio::test]
    async fn test_records_queries() {
        let mock = MockFetcher::with_lines(vec!["a".to_string()]);
        let query = event_bibliography_query(7);

        let response = mock.fetch(&query).await.unwrap();

        assert_eq!(response, RawResponse::Lines(vec!["a".to_string()]));
        assert_eq!(mock.queries(), vec![query]);
    }

    #[test]
    fn test_responder_sees_each_query() {
        let mock = MockFetcher::new(|query| Ok(RawResponse::Bytes(query.params.clone().into_bytes())));

        let response = tokio_test::block_on(mock.fetch(&event_bibliography_query(42))).unwrap();

        assert_eq!(response, RawResponse::Bytes(b"?evid=42".to_vec()));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_responder_errors_pass_through() {
        let mock = MockFetcher::new(|_| Err(FetchError::Timeout));
        let err = mock.fetch(&event_bibliography_query(7)).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout);
        assert_eq!(mock.call_count(), 1);
    }
}
