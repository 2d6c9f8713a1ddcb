//! Response classification.

use super::layout::{
    is_event_header, BANNER_LINE, NO_EVENTS_PHRASE, OVERFLOW_PHRASE, XML_NO_EVENTS_PHRASE,
    XML_OVERFLOW_MARKER, XML_PAYLOAD_MARKER, XML_UNAVAILABLE_PHRASE,
};

/// Status of a raw response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<P> {
    /// The provider reported zero matching events
    Empty,
    /// The provider capped the result set
    Overflow,
    /// The provider could not answer, or the page did not have the expected
    /// shape
    Unavailable(String),
    Ok(P),
}

impl<P> Classified<P> {
    pub fn label(&self) -> &'static str {
        match self {
            Classified::Empty => "empty",
            Classified::Overflow => "overflow",
            Classified::Unavailable(_) => "unavailable",
            Classified::Ok(_) => "ok",
        }
    }

    /// Carry a status over to another payload type; `Ok` is only passed
    /// through by callers that handle it first
    pub(crate) fn map_status<Q>(self) -> Classified<Q> {
        match self {
            Classified::Empty => Classified::Empty,
            Classified::Overflow => Classified::Overflow,
            Classified::Unavailable(reason) => Classified::Unavailable(reason),
            Classified::Ok(_) => Classified::Unavailable("unexpected payload".to_string()),
        }
    }
}

/// Classify bibliography body lines by the banner at [`BANNER_LINE`]
pub fn classify_lines(lines: Vec<String>) -> Classified<Vec<String>> {
    let Some(banner) = lines.get(BANNER_LINE) else {
        return Classified::Unavailable(format!(
            "response has {} lines, no status banner at line {}",
            lines.len(),
            BANNER_LINE
        ));
    };

    if banner.contains(NO_EVENTS_PHRASE) {
        return Classified::Empty;
    }
    if banner.contains(OVERFLOW_PHRASE) {
        return Classified::Overflow;
    }
    if banner.contains(XML_UNAVAILABLE_PHRASE) {
        return Classified::Unavailable(banner.trim().to_string());
    }
    if !lines.iter().any(|line| is_event_header(line)) {
        return Classified::Unavailable(format!(
            "unrecognised status banner: {:?}",
            banner.trim()
        ));
    }

    Classified::Ok(lines)
}

/// Classify a bulletin QuakeML document by its status phrases
pub fn classify_quakeml(bytes: Vec<u8>) -> Classified<Vec<u8>> {
    let text = String::from_utf8_lossy(&bytes);

    if text.contains(XML_UNAVAILABLE_PHRASE) {
        return Classified::Unavailable(XML_UNAVAILABLE_PHRASE.to_string());
    }
    if text.contains(XML_NO_EVENTS_PHRASE) {
        return Classified::Empty;
    }
    if text.contains(XML_OVERFLOW_MARKER) {
        return Classified::Overflow;
    }
    if !text.contains(XML_PAYLOAD_MARKER) {
        return Classified::Unavailable("response carries no eventParameters".to_string());
    }

    Classified::Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(banner: &str, body: &[&str]) -> Vec<String> {
        let mut lines: Vec<String> = (0..BANNER_LINE).map(|i| format!("chrome {}", i)).collect();
        lines.push(banner.to_string());
        lines.extend(body.iter().map(|s| s.to_string()));
        lines
    }

    #[test]
    fn test_line_statuses() {
        let empty = page("No events with references were found for this search", &[]);
        assert_eq!(classify_lines(empty), Classified::Empty);

        let overflow = page("Your search was limited to 500 seismic events", &[" ISC x"]);
        assert_eq!(classify_lines(overflow), Classified::Overflow);

        let ok = page("Found 2 events", &[" ISC header", "\n", "info"]);
        assert!(matches!(classify_lines(ok), Classified::Ok(lines) if lines.len() == 27));
    }

    #[test]
    fn test_line_missing_banner_is_unavailable() {
        let short = vec!["<title>".to_string(); 5];
        assert_eq!(classify_lines(short).label(), "unavailable");

        let no_blocks = page("Service maintenance", &["nothing here"]);
        assert!(matches!(classify_lines(no_blocks), Classified::Unavailable(msg) if msg.contains("Service maintenance")));
    }

    #[test]
    fn test_quakeml_statuses() {
        let busy = b"<html>Sorry, your request cannot be processed at the present time</html>".to_vec();
        assert_eq!(classify_quakeml(busy).label(), "unavailable");

        let empty = b"<html>No events were found.</html>".to_vec();
        assert_eq!(classify_quakeml(empty), Classified::Empty);

        let overflow = b"<q:quakeml><eventParameters publicID=\"OVERFILLED\"/></q:quakeml>".to_vec();
        assert_eq!(classify_quakeml(overflow), Classified::Overflow);

        let ok = b"<q:quakeml><eventParameters publicID=\"smi:ISC/bulletin\"/></q:quakeml>".to_vec();
        assert_eq!(classify_quakeml(ok).label(), "ok");

        assert_eq!(classify_quakeml(b"<html/>".to_vec()).label(), "unavailable");
    }
}
