//! Deduplication of events merged from several sub-range responses.

use std::collections::{HashMap, HashSet};

use crate::models::{Catalog, EventKey};

/// Merge ordered partial catalogs into one, keeping the earliest part's copy
/// of every event key.
///
/// An event's articles always come from the same part as the surviving
/// event, so a duplicated event never ends up with its citations twice.
/// Survivors keep the relative order of the parts they came from.
pub fn merge_deduplicated(parts: Vec<Catalog>) -> Catalog {
    let mut owner: HashMap<EventKey, usize> = HashMap::new();
    for (index, part) in parts.iter().enumerate() {
        for event in &part.events {
            owner.entry(event.key()).or_insert(index);
        }
    }

    let total: usize = parts.iter().map(Catalog::event_count).sum();
    let mut merged = Catalog::new();
    let mut placed: HashSet<EventKey> = HashSet::new();

    for (index, part) in parts.into_iter().enumerate() {
        let owned = |key: &EventKey| owner.get(key) == Some(&index);

        for event in part.events {
            let key = event.key();
            if owned(&key) && placed.insert(key) {
                merged.events.push(event);
            }
        }
        merged
            .articles
            .extend(part.articles.into_iter().filter(|a| owned(&a.event)));
    }

    let dropped = total - merged.event_count();
    if dropped > 0 {
        tracing::debug!("Dropped {} duplicate events while merging", dropped);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EarthquakeEvent, SourceCatalog};
    use chrono::{TimeZone, Utc};

    fn event(code: &str, day: u32) -> EarthquakeEvent {
        EarthquakeEvent::new(
            Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap(),
            10.0,
            20.0,
            SourceCatalog::IscBibliography,
        )
        .code(code)
    }

    fn part(events: &[(&str, u32, &str)]) -> Catalog {
        let mut catalog = Catalog::new();
        for (code, day, citation) in events {
            catalog.push_event(event(code, *day), [*citation]);
        }
        catalog
    }

    #[test]
    fn test_no_duplicates_concatenates() {
        let merged = merge_deduplicated(vec![part(&[("1", 1, "a")]), part(&[("2", 2, "b")])]);
        let codes: Vec<_> = merged.events.iter().map(|e| e.event_code.clone()).collect();
        assert_eq!(codes, vec![Some("1".to_string()), Some("2".to_string())]);
        assert_eq!(merged.articles.len(), 2);
    }

    #[test]
    fn test_boundary_event_kept_once() {
        let merged = merge_deduplicated(vec![
            part(&[("1", 1, "a"), ("2", 2, "first copy")]),
            part(&[("2", 2, "second copy"), ("3", 3, "c")]),
        ]);

        assert_eq!(merged.event_count(), 3);
        let citations: Vec<_> = merged.articles.iter().map(|a| a.citation.as_str()).collect();
        assert_eq!(citations, vec!["a", "first copy", "c"]);
    }

    #[test]
    fn test_later_copy_articles_dropped() {
        let merged = merge_deduplicated(vec![
            part(&[("2", 2, "first copy")]),
            part(&[("4", 4, "d")]),
            part(&[("2", 2, "second copy")]),
        ]);

        assert_eq!(merged.event_count(), 2);
        let citations: Vec<_> = merged.articles.iter().map(|a| a.citation.as_str()).collect();
        assert_eq!(citations, vec!["first copy", "d"]);
    }

    #[test]
    fn test_empty_parts() {
        let merged = merge_deduplicated(vec![Catalog::new(), Catalog::new()]);
        assert!(merged.is_empty());
    }
}
