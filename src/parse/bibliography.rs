//! Event bibliography text parser.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::layout::{
    header_has_event_code, is_event_header, BibprintBanner, InfoLine, ARTICLE_LINE_OFFSET,
    BIBPRINT_BANNER_LINE, BIBPRINT_FIRST_CITATION_LINE, BIBPRINT_TRAILER_LINES, INFO_LINE_OFFSET,
};
use super::{MalformedPolicy, ParseError, ParsedPage};
use crate::models::{EarthquakeEvent, SourceCatalog};

const ORIGIN_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse the body lines of a bibliography search result.
///
/// Event blocks run from one header line to the next; the final block ends
/// with the page.
pub fn parse_bibliography(lines: &[String], policy: MalformedPolicy) -> Result<ParsedPage, ParseError> {
    let mut bounds: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_event_header(line))
        .map(|(n, _)| n)
        .collect();
    bounds.push(lines.len());

    let mut page = ParsedPage::default();
    for (block, window) in bounds.windows(2).enumerate() {
        match parse_block(lines, block, window[0], window[1]) {
            Ok((event, citations)) => page.accept(block, event, citations, policy)?,
            Err(error) => page.reject(error, policy)?,
        }
    }

    tracing::debug!(
        "Parsed {} events and {} articles from {} blocks",
        page.catalog.event_count(),
        page.catalog.articles.len(),
        bounds.len() - 1
    );
    Ok(page)
}

fn parse_block(
    lines: &[String],
    block: usize,
    start: usize,
    end: usize,
) -> Result<(EarthquakeEvent, Vec<String>), ParseError> {
    let info_at = start + INFO_LINE_OFFSET;
    if info_at >= end {
        return Err(ParseError::malformed(block, "missing info line"));
    }

    let info = InfoLine::split(&lines[info_at]).map_err(|reason| ParseError::malformed(block, reason))?;

    let origin_time = parse_origin_time(info.date, info.time)
        .ok_or_else(|| ParseError::malformed(block, format!("bad origin time {} {}", info.date, info.time)))?;
    let latitude = number(block, "latitude", info.latitude)?;
    let longitude = number(block, "longitude", info.longitude)?;
    let depth = number(block, "depth", info.depth)?;
    let declared: usize = info.article_count.parse().map_err(|_| {
        ParseError::malformed(block, format!("bad article count {:?}", info.article_count))
    })?;

    let mut event = EarthquakeEvent::new(origin_time, latitude, longitude, SourceCatalog::IscBibliography)
        .depth(depth)
        .reported_by(info.agency);

    if let Some(magnitude) = info.magnitude {
        event.magnitude_type = magnitude.kind.to_string();
        event.magnitude_reporting_agency = magnitude.agency.to_string();
        event.magnitude_value = magnitude.value.parse().ok();
    }

    if header_has_event_code(&lines[start]) {
        event = event.code(info.last);
    }

    let body = lines[(start + ARTICLE_LINE_OFFSET).min(end)..end].concat();
    let fragments: Vec<&str> = body
        .split('\n')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect();

    if fragments.len() < declared {
        return Err(ParseError::TruncatedBlock {
            block,
            declared,
            available: fragments.len(),
        });
    }

    let citations = fragments[..declared].iter().map(|s| s.to_string()).collect();
    Ok((event, citations))
}

fn number(block: usize, field: &str, token: &str) -> Result<f64, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::malformed(block, format!("bad {} {:?}", field, token)))
}

fn parse_origin_time(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let joined = format!("{}T{}", date, time);
    ORIGIN_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&joined, format).ok())
        .map(|naive| naive.and_utc())
}

/// Citations from the per-event bibliography page (`FormatBibprint.pl`).
///
/// The banner's token count tells how much page chrome precedes the first
/// citation; the page ends with a fixed footer.
pub fn parse_event_bibliography(lines: &[String]) -> Result<Vec<String>, ParseError> {
    let Some(banner) = lines.get(BIBPRINT_BANNER_LINE) else {
        return Err(ParseError::malformed(
            0,
            format!("page has {} lines, no banner at line {}", lines.len(), BIBPRINT_BANNER_LINE),
        ));
    };

    let layout = BibprintBanner::from_line(banner)
        .map_err(|count| ParseError::malformed(0, format!("unexpected banner with {} tokens", count)))?;

    let stop = lines.len().saturating_sub(BIBPRINT_TRAILER_LINES);
    let citations = lines
        .iter()
        .enumerate()
        .take(stop)
        .skip(BIBPRINT_FIRST_CITATION_LINE)
        .map(|(n, line)| {
            if n == BIBPRINT_FIRST_CITATION_LINE {
                line.chars().skip(layout.citation_prefix()).collect::<String>()
            } else {
                line.clone()
            }
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    Ok(citations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::layout::BANNER_LINE;
    use chrono::TimeZone;

    fn page(blocks: &[(&str, &str, &[&str])]) -> Vec<String> {
        let mut lines: Vec<String> = (0..BANNER_LINE).map(|i| format!("chrome {}", i)).collect();
        lines.push("Events found".to_string());
        for (header, info, articles) in blocks {
            lines.push(header.to_string());
            lines.push("\n".to_string());
            lines.push(info.to_string());
            lines.push(format!("\n{}\n", articles.join("\n")));
        }
        lines
    }

    const PLAIN_HEADER: &str = " ISC  Date       Time        Lat      Lon     Depth  Refs";
    const CODE_HEADER: &str = " ISC  Date       Time        Lat      Lon     Depth  Mag  Refs  code";

    #[test]
    fn test_nine_token_info_line_has_no_magnitude() {
        let lines = page(&[(
            PLAIN_HEADER,
            "ISC 1969-07-29 02:01:16.00 -5.12 150.23 10.0 2 refs listed",
            &["Smith (1970) BSSA 60", "Jones (1971) GJI 22"],
        )]);

        let parsed = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap();
        let event = &parsed.catalog.events[0];

        assert_eq!(event.magnitude_value, None);
        assert_eq!(event.magnitude_type, "");
        assert_eq!(event.event_code, None);
        assert_eq!(event.depth, Some(10.0));
        assert_eq!(event.event_reporting_agency, "ISC");
        assert_eq!(
            event.origin_time,
            Utc.with_ymd_and_hms(1969, 7, 29, 2, 1, 16).unwrap()
        );

        let articles: Vec<_> = parsed
            .catalog
            .articles
            .iter()
            .map(|a| (a.sequence, a.citation.as_str()))
            .collect();
        assert_eq!(articles, vec![(1, "Smith (1970) BSSA 60"), (2, "Jones (1971) GJI 22")]);
    }

    #[test]
    fn test_magnitude_info_line_with_event_code() {
        let lines = page(&[(
            CODE_HEADER,
            "ISC 1969-07-29 12:00:00.00 10.5 20.3 33.0 Ms(NEIC) ISC 6.1 1 123",
            &["Doe (1969) Nature 1"],
        )]);

        let parsed = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap();
        let event = &parsed.catalog.events[0];

        assert_eq!(event.magnitude_type, "Ms");
        assert_eq!(event.magnitude_reporting_agency, "NEIC");
        assert_eq!(event.magnitude_value, Some(6.1));
        assert_eq!(event.event_code.as_deref(), Some("123"));
        assert_eq!(parsed.catalog.articles.len(), 1);
    }

    #[test]
    fn test_articles_beyond_declared_count_are_ignored() {
        let lines = page(&[(
            PLAIN_HEADER,
            "ISC 2001-01-01 00:00:00 1 2 3 1",
            &["first", "second"],
        )]);
        let parsed = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap();
        assert_eq!(parsed.catalog.articles.len(), 1);
        assert_eq!(parsed.catalog.articles[0].citation, "first");
    }

    #[test]
    fn test_truncated_block() {
        let lines = page(&[(PLAIN_HEADER, "ISC 2001-01-01 00:00:00 1 2 3 3", &["only one"])]);
        let err = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap_err();
        assert_eq!(
            err,
            ParseError::TruncatedBlock {
                block: 0,
                declared: 3,
                available: 1
            }
        );
    }

    #[test]
    fn test_malformed_block_policy() {
        let lines = page(&[
            (PLAIN_HEADER, "ISC 2001-01-01 00:00:00 north 2 3 1", &["bad"]),
            (PLAIN_HEADER, "ISC 2001-01-02 00:00:00 1 2 3 1", &["good"]),
        ]);

        let err = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap_err();
        assert_eq!(err.block(), Some(0));
        assert!(err.to_string().contains("latitude"));

        let parsed = parse_bibliography(&lines, MalformedPolicy::Skip).unwrap();
        assert_eq!(parsed.catalog.event_count(), 1);
        assert_eq!(parsed.catalog.articles[0].citation, "good");
        assert_eq!(parsed.skipped.len(), 1);
    }

    #[test]
    fn test_repeated_event_code_in_one_page() {
        let lines = page(&[
            (
                CODE_HEADER,
                "ISC 1969-07-29 12:00:00.00 10.5 20.3 33.0 Ms(NEIC) ISC 6.1 2 123",
                &["first a", "first b"],
            ),
            (
                CODE_HEADER,
                "ISC 1969-07-29 12:00:05.00 10.5 20.3 33.0 Ms(NEIC) ISC 6.1 1 123",
                &["second a"],
            ),
        ]);

        let err = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap_err();
        assert_eq!(err.block(), Some(1));
        assert!(err.to_string().contains("duplicate event 123"));

        let parsed = parse_bibliography(&lines, MalformedPolicy::Skip).unwrap();
        assert_eq!(parsed.catalog.event_count(), 1);
        assert_eq!(parsed.skipped.len(), 1);
        let rows: Vec<_> = parsed
            .catalog
            .rows()
            .into_iter()
            .map(|row| (row.article_number, row.article))
            .collect();
        assert_eq!(rows, vec![(Some(1), Some("first a")), (Some(2), Some("first b"))]);
    }

    #[test]
    fn test_missing_info_line() {
        let mut lines = page(&[]);
        lines.push(PLAIN_HEADER.to_string());
        let err = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap_err();
        assert_eq!(err, ParseError::malformed(0, "missing info line"));
    }

    #[test]
    fn test_zero_article_event() {
        let lines = page(&[(PLAIN_HEADER, "ISC 2001-01-01 00:00:00 1 2 3 0", &[])]);
        let parsed = parse_bibliography(&lines, MalformedPolicy::Abort).unwrap();
        assert_eq!(parsed.catalog.event_count(), 1);
        assert!(parsed.catalog.articles.is_empty());
        assert_eq!(parsed.catalog.rows().len(), 1);
    }

    fn bibprint_page(banner_tokens: usize, prefix: usize, citations: &[&str]) -> Vec<String> {
        let mut lines: Vec<String> = (0..BIBPRINT_BANNER_LINE).map(|i| format!("nav {}", i)).collect();
        lines.push(vec!["w"; banner_tokens].join(" "));
        lines.push(format!("{}{}", "x".repeat(prefix), citations[0]));
        lines.extend(citations[1..].iter().map(|c| format!("  {}  ", c)));
        lines.push(String::new());
        lines.extend((0..BIBPRINT_TRAILER_LINES).map(|i| format!("footer {}", i)));
        lines
    }

    #[test]
    fn test_event_bibliography_layouts() {
        for (tokens, prefix) in [(17, 91), (19, 107)] {
            let lines = bibprint_page(tokens, prefix, &["First (2001)", "Second (2002)"]);
            let citations = parse_event_bibliography(&lines).unwrap();
            assert_eq!(citations, vec!["First (2001)", "Second (2002)"], "{} tokens", tokens);
        }
    }

    #[test]
    fn test_event_bibliography_unknown_banner() {
        let lines = bibprint_page(18, 91, &["First (2001)"]);
        let err = parse_event_bibliography(&lines).unwrap_err();
        assert!(err.to_string().contains("18 tokens"));

        let err = parse_event_bibliography(&["short".to_string()]).unwrap_err();
        assert_eq!(err.block(), Some(0));
    }
}
