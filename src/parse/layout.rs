//! Positional layout of the ISC text pages.
//!
//! Every offset and token index the parsers rely on lives here. The ISC
//! pages have no structure beyond "this line, that token", so these values
//! are tied to the provider's current templates.

/// Body text node carrying the search status banner
pub const BANNER_LINE: usize = 23;

/// Text that starts every event header line
pub const EVENT_HEADER_PREFIX: &str = " ISC";

/// Info line position relative to its header
pub const INFO_LINE_OFFSET: usize = 2;

/// First article fragment relative to the header
pub const ARTICLE_LINE_OFFSET: usize = 3;

/// Info lines with at least this many tokens carry a magnitude
pub const MAGNITUDE_TOKEN_THRESHOLD: usize = 10;

/// Header token announcing a trailing event code column
pub const EVENT_CODE_HEADER_TOKEN: &str = "code";

pub const AGENCY_TOKEN: usize = 0;
pub const DATE_TOKEN: usize = 1;
pub const TIME_TOKEN: usize = 2;
pub const LATITUDE_TOKEN: usize = 3;
pub const LONGITUDE_TOKEN: usize = 4;
pub const DEPTH_TOKEN: usize = 5;
/// Article count without magnitude, magnitude type with one
pub const TAIL_TOKEN: usize = 6;
pub const MAGNITUDE_AGENCY_TOKEN: usize = 7;
pub const MAGNITUDE_VALUE_TOKEN: usize = 8;
pub const MAGNITUDE_ARTICLE_COUNT_TOKEN: usize = 9;

/// Bibliography search status phrases
pub const NO_EVENTS_PHRASE: &str = "No events with references were found";
pub const OVERFLOW_PHRASE: &str = "limited to 500 seismic events";

/// Bulletin (QuakeML) status phrases
pub const XML_UNAVAILABLE_PHRASE: &str = "your request cannot be processed at the present time";
pub const XML_NO_EVENTS_PHRASE: &str = "No events were found";
pub const XML_OVERFLOW_MARKER: &str = "OVERFILLED\"";
pub const XML_PAYLOAD_MARKER: &str = "eventParameters";

/// Per-event bibliography page: banner line, first citation line and the
/// number of trailing footer lines
pub const BIBPRINT_BANNER_LINE: usize = 24;
pub const BIBPRINT_FIRST_CITATION_LINE: usize = 25;
pub const BIBPRINT_TRAILER_LINES: usize = 10;

/// Layout variants of the per-event bibliography banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BibprintBanner {
    /// 17 banner tokens
    Short,
    /// 19 banner tokens
    Long,
}

impl BibprintBanner {
    pub fn from_line(line: &str) -> Result<Self, usize> {
        match line.split_whitespace().count() {
            17 => Ok(BibprintBanner::Short),
            19 => Ok(BibprintBanner::Long),
            other => Err(other),
        }
    }

    /// Characters of page chrome in front of the first citation
    pub fn citation_prefix(&self) -> usize {
        match self {
            BibprintBanner::Short => 91,
            BibprintBanner::Long => 107,
        }
    }
}

/// Magnitude columns of an info line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagnitudeTokens<'a> {
    /// Token 6 before its first `(`
    pub kind: &'a str,
    /// Parenthesized suffix of token 6, else token 7
    pub agency: &'a str,
    pub value: &'a str,
}

/// The whitespace-split info line of one event block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine<'a> {
    pub agency: &'a str,
    pub date: &'a str,
    pub time: &'a str,
    pub latitude: &'a str,
    pub longitude: &'a str,
    pub depth: &'a str,
    pub magnitude: Option<MagnitudeTokens<'a>>,
    pub article_count: &'a str,
    pub last: &'a str,
}

impl<'a> InfoLine<'a> {
    pub fn split(line: &'a str) -> Result<Self, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() <= TAIL_TOKEN {
            return Err(format!(
                "info line has {} tokens, expected at least {}",
                tokens.len(),
                TAIL_TOKEN + 1
            ));
        }

        let (magnitude, article_count) = if tokens.len() < MAGNITUDE_TOKEN_THRESHOLD {
            (None, tokens[TAIL_TOKEN])
        } else {
            let labelled = tokens[TAIL_TOKEN];
            let (kind, suffix) = match labelled.split_once('(') {
                Some((kind, rest)) => (kind, rest.trim_end_matches(')')),
                None => (labelled, ""),
            };
            let agency = if suffix.is_empty() {
                tokens[MAGNITUDE_AGENCY_TOKEN]
            } else {
                suffix
            };
            let magnitude = MagnitudeTokens {
                kind,
                agency,
                value: tokens[MAGNITUDE_VALUE_TOKEN],
            };
            (Some(magnitude), tokens[MAGNITUDE_ARTICLE_COUNT_TOKEN])
        };

        Ok(Self {
            agency: tokens[AGENCY_TOKEN],
            date: tokens[DATE_TOKEN],
            time: tokens[TIME_TOKEN],
            latitude: tokens[LATITUDE_TOKEN],
            longitude: tokens[LONGITUDE_TOKEN],
            depth: tokens[DEPTH_TOKEN],
            magnitude,
            article_count,
            last: tokens[tokens.len() - 1],
        })
    }
}

/// Whether an event header announces the event code column
pub fn header_has_event_code(header: &str) -> bool {
    header
        .split_whitespace()
        .any(|token| token == EVENT_CODE_HEADER_TOKEN)
}

pub fn is_event_header(line: &str) -> bool {
    line.starts_with(EVENT_HEADER_PREFIX)
}
