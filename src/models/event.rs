//! Seismic event and bibliography records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The catalog a record was retrieved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCatalog {
    /// ISC Event Bibliography
    IscBibliography,
    /// ISC Bulletin (hypocenters)
    IscBulletin,
}

impl SourceCatalog {
    /// Returns the display name of the catalog
    pub fn name(&self) -> &'static str {
        match self {
            SourceCatalog::IscBibliography => "ISC Event Bibliography",
            SourceCatalog::IscBulletin => "ISC Bulletin",
        }
    }
}

impl std::fmt::Display for SourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identifier of an event in some other agency's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalId {
    pub kind: String,
    pub value: String,
}

/// Identity of an event across merged fetches.
///
/// The provider's event code wins when present; otherwise origin time and
/// position stand in for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKey {
    Code(String),
    Origin {
        time: DateTime<Utc>,
        /// Latitude in micro-degrees
        lat: i64,
        /// Longitude in micro-degrees
        lon: i64,
    },
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKey::Code(code) => write!(f, "{}", code),
            EventKey::Origin { time, lat, lon } => write!(
                f,
                "{}@{:.6},{:.6}",
                time.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                *lat as f64 / 1e6,
                *lon as f64 / 1e6
            ),
        }
    }
}

/// A located seismic event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeEvent {
    pub origin_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Depth in km; only the hypocenter path can leave it unknown
    pub depth: Option<f64>,
    /// Empty when no magnitude was reported
    pub magnitude_type: String,
    pub magnitude_value: Option<f64>,
    pub magnitude_reporting_agency: String,
    pub event_reporting_agency: String,
    pub event_code: Option<String>,
    pub source_catalog: SourceCatalog,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_ids: Vec<ExternalId>,
}

impl EarthquakeEvent {
    /// Create an event with the required location fields
    pub fn new(
        origin_time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        source_catalog: SourceCatalog,
    ) -> Self {
        Self {
            origin_time,
            latitude,
            longitude,
            depth: None,
            magnitude_type: String::new(),
            magnitude_value: None,
            magnitude_reporting_agency: String::new(),
            event_reporting_agency: String::new(),
            event_code: None,
            source_catalog,
            external_ids: Vec::new(),
        }
    }

    /// Identity used for de-duplication and for linking articles
    pub fn key(&self) -> EventKey {
        match self.event_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => EventKey::Code(code.to_string()),
            _ => EventKey::Origin {
                time: self.origin_time,
                lat: micro_degrees(self.latitude),
                lon: micro_degrees(self.longitude),
            },
        }
    }

    pub fn depth(mut self, depth: f64) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn magnitude(
        mut self,
        magnitude_type: impl Into<String>,
        value: f64,
        agency: impl Into<String>,
    ) -> Self {
        self.magnitude_type = magnitude_type.into();
        self.magnitude_value = Some(value);
        self.magnitude_reporting_agency = agency.into();
        self
    }

    pub fn reported_by(mut self, agency: impl Into<String>) -> Self {
        self.event_reporting_agency = agency.into();
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.event_code = Some(code.into());
        self
    }
}

fn micro_degrees(degrees: f64) -> i64 {
    (degrees * 1e6).round() as i64
}

/// One citation attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographyArticle {
    pub event: EventKey,
    /// 1-based position within the parent event
    pub sequence: u32,
    pub citation: String,
}
