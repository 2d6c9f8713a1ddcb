//! ISC web form fetcher.
//!
//! The bibliography endpoints answer with HTML pages whose body text is the
//! payload; the hypocenter endpoint answers with QuakeML.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EndpointConfig, HttpConfig};
use crate::query::{Endpoint, Query};
use crate::sources::markup::{extract_body_lines, extract_text_lines};
use crate::sources::{FetchError, Fetcher, RawResponse};
use crate::utils::HttpClient;

/// Fetcher for the International Seismological Centre web forms
#[derive(Debug, Clone)]
pub struct IscFetcher {
    client: Arc<HttpClient>,
    endpoints: EndpointConfig,
}

impl IscFetcher {
    pub fn new(endpoints: EndpointConfig, http: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: Arc::new(HttpClient::with_settings(&http.user_agent, http.timeout())?),
            endpoints,
        })
    }
}

#[async_trait]
impl Fetcher for IscFetcher {
    fn name(&self) -> &str {
        "isc"
    }

    async fn fetch(&self, query: &Query) -> Result<RawResponse, FetchError> {
        let url = query.url(self.endpoints.url_for(query.endpoint));
        tracing::debug!("GET {}", url);

        let response = self.client.client().get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        tracing::debug!("{} returned {} bytes", query.endpoint.name(), bytes.len());

        match query.endpoint {
            Endpoint::Hypocenter => Ok(RawResponse::Bytes(bytes.to_vec())),
            Endpoint::Bibliography => {
                let html = String::from_utf8_lossy(&bytes);
                Ok(RawResponse::Lines(extract_body_lines(&html)))
            }
            Endpoint::EventBibliography => {
                let html = String::from_utf8_lossy(&bytes);
                Ok(RawResponse::Lines(extract_text_lines(&html)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::event_bibliography_query;

    fn fetcher_for(server: &mockito::Server) -> IscFetcher {
        IscFetcher::new(EndpointConfig::with_base(&server.url()), &HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_event_bibliography_lines() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/cgi-bin/FormatBibprint.pl")
            .match_query(mockito::Matcher::UrlEncoded("evid".into(), "600516".into()))
            .with_status(200)
            .with_body("<html><body><pre>one\ntwo</pre></body></html>")
            .create_async()
            .await;

        let response = fetcher_for(&server)
            .fetch(&event_bibliography_query(600516))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            response,
            RawResponse::Lines(vec!["one".to_string(), "two".to_string()])
        );
    }

    #[tokio::test]
    async fn test_fetch_maps_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cgi-bin/FormatBibprint.pl")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = fetcher_for(&server)
            .fetch(&event_bibliography_query(1))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Status(503));
        assert!(err.is_transient());
    }
}
