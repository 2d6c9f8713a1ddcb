//! Response classification and event parsing.
//!
//! A raw response is first classified ([`classify_lines`],
//! [`classify_quakeml`]); only an [`Classified::Ok`] payload reaches a
//! parser. Status outcomes never turn into an empty catalog.

mod bibliography;
mod classify;
pub mod layout;
mod quakeml;
pub mod xml;

pub use bibliography::{parse_bibliography, parse_event_bibliography};
pub use classify::{classify_lines, classify_quakeml, Classified};
pub use quakeml::parse_quakeml;

use serde::{Deserialize, Serialize};

use crate::models::{Catalog, EarthquakeEvent};

/// Errors raised while decoding an already classified payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A positional assumption failed inside one event block
    #[error("malformed event block {block}: {reason}")]
    MalformedBlock { block: usize, reason: String },

    /// A block declared more articles than it carries
    #[error("event block {block} declares {declared} articles but only {available} are present")]
    TruncatedBlock {
        block: usize,
        declared: usize,
        available: usize,
    },

    /// The document is not well-formed XML
    #[error("XML error: {0}")]
    Xml(String),
}

impl ParseError {
    pub(crate) fn malformed(block: usize, reason: impl Into<String>) -> Self {
        ParseError::MalformedBlock {
            block,
            reason: reason.into(),
        }
    }

    /// Ordinal of the offending block, when the error is local to one
    pub fn block(&self) -> Option<usize> {
        match self {
            ParseError::MalformedBlock { block, .. } | ParseError::TruncatedBlock { block, .. } => {
                Some(*block)
            }
            ParseError::Xml(_) => None,
        }
    }
}

/// What to do with a block that fails to parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Fail the whole search
    #[default]
    Abort,
    /// Log the block, drop it and keep going
    Skip,
}

/// Events parsed from one response, plus the blocks dropped under
/// [`MalformedPolicy::Skip`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub catalog: Catalog,
    pub skipped: Vec<ParseError>,
}

impl ParsedPage {
    /// Add a parsed block, treating a second event with an existing key as
    /// malformed
    pub(crate) fn accept(
        &mut self,
        block: usize,
        event: EarthquakeEvent,
        citations: Vec<String>,
        policy: MalformedPolicy,
    ) -> Result<(), ParseError> {
        let key = event.key();
        if self.catalog.events.iter().any(|seen| seen.key() == key) {
            return self.reject(ParseError::malformed(block, format!("duplicate event {}", key)), policy);
        }
        self.catalog.push_event(event, citations);
        Ok(())
    }

    /// Apply `policy` to a block-level failure
    pub(crate) fn reject(&mut self, error: ParseError, policy: MalformedPolicy) -> Result<(), ParseError> {
        match policy {
            MalformedPolicy::Abort => Err(error),
            MalformedPolicy::Skip => {
                tracing::warn!("Skipping {}", error);
                self.skipped.push(error);
                Ok(())
            }
        }
    }
}
