//! The merged catalog aggregate.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::event::{BibliographyArticle, EarthquakeEvent, EventKey};

/// Ordered events plus the articles that reference them by [`EventKey`].
///
/// Articles never point at an event in memory, so dropping an event together
/// with all of its articles is a filter on keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub events: Vec<EarthquakeEvent>,
    pub articles: Vec<BibliographyArticle>,
}

/// One joined (event, article) row; events without articles yield one row
/// with no article
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogRow<'a> {
    #[serde(flatten)]
    pub event: &'a EarthquakeEvent,
    pub article_number: Option<u32>,
    pub article: Option<&'a str>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Append an event and its citations, numbered from 1 in the given order
    pub fn push_event<I, S>(&mut self, event: EarthquakeEvent, citations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = event.key();
        self.articles.extend(
            citations
                .into_iter()
                .enumerate()
                .map(|(i, citation)| BibliographyArticle {
                    event: key.clone(),
                    sequence: i as u32 + 1,
                    citation: citation.into(),
                }),
        );
        self.events.push(event);
    }

    /// Articles attached to `key`, in sequence order
    pub fn articles_for<'a>(
        &'a self,
        key: &'a EventKey,
    ) -> impl Iterator<Item = &'a BibliographyArticle> + 'a {
        self.articles.iter().filter(move |a| &a.event == key)
    }

    /// Keep the events matching `keep`, dropping the articles of every
    /// removed event
    pub fn retain_events<F>(self, mut keep: F) -> Catalog
    where
        F: FnMut(&EarthquakeEvent) -> bool,
    {
        let events: Vec<EarthquakeEvent> = self.events.into_iter().filter(|e| keep(e)).collect();
        let kept: HashSet<EventKey> = events.iter().map(EarthquakeEvent::key).collect();
        let articles = self
            .articles
            .into_iter()
            .filter(|a| kept.contains(&a.event))
            .collect();
        Catalog { events, articles }
    }

    /// Joined rows, one per article
    pub fn rows(&self) -> Vec<CatalogRow<'_>> {
        let mut by_event: HashMap<&EventKey, Vec<&BibliographyArticle>> = HashMap::new();
        for article in &self.articles {
            by_event.entry(&article.event).or_default().push(article);
        }

        let mut rows = Vec::with_capacity(self.articles.len().max(self.events.len()));
        for event in &self.events {
            let key = event.key();
            match by_event.get(&key) {
                Some(articles) if !articles.is_empty() => {
                    let mut articles = articles.clone();
                    articles.sort_by_key(|a| a.sequence);
                    rows.extend(articles.into_iter().map(|a| CatalogRow {
                        event,
                        article_number: Some(a.sequence),
                        article: Some(a.citation.as_str()),
                    }));
                }
                _ => rows.push(CatalogRow {
                    event,
                    article_number: None,
                    article: None,
                }),
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceCatalog;
    use chrono::{TimeZone, Utc};

    fn event(code: &str, hour: u32) -> EarthquakeEvent {
        EarthquakeEvent::new(
            Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap(),
            1.0,
            2.0,
            SourceCatalog::IscBibliography,
        )
        .code(code)
    }

    #[test]
    fn test_push_event_numbers_articles() {
        let mut catalog = Catalog::new();
        catalog.push_event(event("1", 0), ["a", "b", "c"]);

        let key = EventKey::Code("1".to_string());
        let sequences: Vec<u32> = catalog.articles_for(&key).map(|a| a.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_rows_include_zero_article_events() {
        let mut catalog = Catalog::new();
        catalog.push_event(event("1", 0), ["first", "second"]);
        catalog.push_event(event("2", 1), Vec::<String>::new());

        let rows = catalog.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].article, Some("first"));
        assert_eq!(rows[1].article_number, Some(2));
        assert_eq!(rows[2].event.event_code.as_deref(), Some("2"));
        assert_eq!(rows[2].article, None);
    }

    #[test]
    fn test_retain_events_drops_articles_atomically() {
        let mut catalog = Catalog::new();
        catalog.push_event(event("1", 0), ["a", "b"]);
        catalog.push_event(event("2", 1), ["c"]);

        let kept = catalog.retain_events(|e| e.event_code.as_deref() == Some("2"));
        assert_eq!(kept.event_count(), 1);
        assert_eq!(kept.articles.len(), 1);
        assert_eq!(kept.articles[0].citation, "c");
    }

    #[test]
    fn test_row_serialization_flattens_event() {
        let mut catalog = Catalog::new();
        catalog.push_event(event("9", 0), ["cite"]);
        let json = serde_json::to_value(catalog.rows()).unwrap();
        assert_eq!(json[0]["event_code"], "9");
        assert_eq!(json[0]["article"], "cite");
        assert_eq!(json[0]["article_number"], 1);
    }
}
