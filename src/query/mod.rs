//! Query construction for the ISC CGI endpoints.
//!
//! The endpoints are legacy CGI forms: every parameter is always emitted, in
//! the order the form submits them, with unset values left empty. Dropping an
//! empty parameter or reordering them changes what the provider returns.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{CriteriaError, DistanceUnits, Region, SearchCriteria};

/// Default base URL for ISC bibliography search
pub const BIBLIOGRAPHY_URL: &str = "https://www.isc.ac.uk/cgi-bin/bibsearch.pl";
/// Default base URL for ISC bulletin (hypocenter) search
pub const HYPOCENTER_URL: &str = "https://www.isc.ac.uk/cgi-bin/web-db-run";
/// Default base URL for a single event's bibliography listing
pub const EVENT_BIBLIOGRAPHY_URL: &str = "https://www.isc.ac.uk/cgi-bin/FormatBibprint.pl";

/// The provider form a query is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Bibliography,
    Hypocenter,
    EventBibliography,
}

impl Endpoint {
    pub fn default_url(&self) -> &'static str {
        match self {
            Endpoint::Bibliography => BIBLIOGRAPHY_URL,
            Endpoint::Hypocenter => HYPOCENTER_URL,
            Endpoint::EventBibliography => EVENT_BIBLIOGRAPHY_URL,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Bibliography => "bibliography",
            Endpoint::Hypocenter => "hypocenter",
            Endpoint::EventBibliography => "event bibliography",
        }
    }
}

/// A fully rendered query: the endpoint plus its `?key=value&...` string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub endpoint: Endpoint,
    pub params: String,
}

impl Query {
    /// Complete URL against `base`
    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base, self.params)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url(self.endpoint.default_url()))
    }
}

/// Ordered parameter accumulator
#[derive(Default)]
struct Params(String);

impl Params {
    fn push(&mut self, key: &str, value: impl AsRef<str>) -> &mut Self {
        self.0.push(if self.0.is_empty() { '?' } else { '&' });
        self.0.push_str(key);
        self.0.push('=');
        self.0.push_str(&urlencoding::encode(value.as_ref()));
        self
    }

    fn push_opt<T: ToString>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        self.push(key, value)
    }

    fn flag(&mut self, key: &str, on: bool) -> &mut Self {
        self.push(key, if on { "on" } else { "" })
    }

    fn date(&mut self, prefix: &str, at: &NaiveDateTime) -> &mut Self {
        self.push(&format!("{}_year", prefix), at.year().to_string())
            .push(&format!("{}_month", prefix), at.month().to_string())
            .push(&format!("{}_day", prefix), at.day().to_string())
    }

    fn finish(self, endpoint: Endpoint) -> Query {
        Query {
            endpoint,
            params: self.0,
        }
    }
}

fn clock(at: &NaiveDateTime) -> String {
    at.format("%H:%M:%S").to_string()
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the bibliography search query.
///
/// Order: shape, coordinates, start date/time, end date/time, published
/// years, sort, publisher, author.
pub fn bibliography_query(criteria: &SearchCriteria) -> Result<Query, CriteriaError> {
    let (shape, coords) = match &criteria.region {
        Region::Global => ("POLY", String::new()),
        Region::Rectangle {
            bottom_lat,
            top_lat,
            left_lon,
            right_lon,
        } => ("RECT", join(&[*bottom_lat, *top_lat, *left_lon, *right_lon])),
        Region::Circle {
            lat, lon, radius, ..
        } => ("CIRC", join(&[*lat, *lon, *radius])),
        Region::Polygon { vertices } => {
            let flat: Vec<f64> = vertices.iter().flat_map(|(lat, lon)| [*lat, *lon]).collect();
            ("POLY", join(&flat))
        }
        Region::SeismicRegion { .. } | Region::GeographicRegion { .. } => {
            return Err(CriteriaError::BadRegion(
                "bibliography search does not accept Flinn-Engdahl regions".to_string(),
            ))
        }
    };

    let range = &criteria.range;
    let mut params = Params::default();
    params
        .push("searchshape", shape)
        .push("coordvals", coords)
        .date("start", &range.start)
        .push("stime", clock(&range.start))
        .date("end", &range.end)
        .push("etime", clock(&range.end))
        .push("minyear", &criteria.published_min_year)
        .push("maxyear", &criteria.published_max_year)
        .push("sortby", criteria.sort_by.as_param())
        .push("publisher", &criteria.publisher)
        .push("authors", &criteria.author);
    Ok(params.finish(Endpoint::Bibliography))
}

/// Build the bulletin (hypocenter) search query, requesting QuakeML output.
///
/// Order: request mode, output format, region, date/time bounds,
/// depth/magnitude/phase bounds, inclusion flags.
pub fn hypocenter_query(criteria: &SearchCriteria) -> Result<Query, CriteriaError> {
    let mut rect: [Option<f64>; 4] = [None; 4];
    let mut circle: [Option<f64>; 3] = [None; 3];
    let mut units = DistanceUnits::Deg;
    let mut srn = None;
    let mut grn = None;
    let mut coords = String::new();

    let shape = match &criteria.region {
        Region::Global => "GLOBAL",
        Region::Rectangle {
            bottom_lat,
            top_lat,
            left_lon,
            right_lon,
        } => {
            rect = [
                Some(*bottom_lat),
                Some(*top_lat),
                Some(*left_lon),
                Some(*right_lon),
            ];
            "RECT"
        }
        Region::Circle {
            lat,
            lon,
            radius,
            units: u,
        } => {
            circle = [Some(*lat), Some(*lon), Some(*radius)];
            units = *u;
            "CIRC"
        }
        Region::Polygon { vertices } => {
            let flat: Vec<f64> = vertices.iter().flat_map(|(lat, lon)| [*lat, *lon]).collect();
            coords = join(&flat);
            "POLY"
        }
        Region::SeismicRegion { number } => {
            srn = Some(*number);
            "FE"
        }
        Region::GeographicRegion { number } => {
            grn = Some(*number);
            "FE"
        }
    };

    let range = &criteria.range;
    let outputs = &criteria.outputs;
    let mut params = Params::default();
    params
        .push("request", criteria.bulletin.as_param())
        .push("out_format", "QuakeML")
        .push("searchshape", shape)
        .push_opt("bot_lat", rect[0])
        .push_opt("top_lat", rect[1])
        .push_opt("left_lon", rect[2])
        .push_opt("right_lon", rect[3])
        .push_opt("ctr_lat", circle[0])
        .push_opt("ctr_lon", circle[1])
        .push_opt("radius", circle[2])
        .push("max_dist_units", units.as_param())
        .push_opt("srn", srn)
        .push_opt("grn", grn)
        .push("coordvals", coords)
        .date("start", &range.start)
        .push("start_time", clock(&range.start))
        .date("end", &range.end)
        .push("end_time", clock(&range.end))
        .push_opt("min_dep", criteria.depth.min)
        .push_opt("max_dep", criteria.depth.max)
        .push_opt("min_mag", criteria.magnitude.min)
        .push_opt("max_mag", criteria.magnitude.max)
        .push("req_mag_type", &criteria.magnitude_type)
        .push("req_mag_agcy", &criteria.magnitude_agency)
        .push_opt("min_def", criteria.min_defining_phases)
        .push_opt("max_def", criteria.max_defining_phases)
        .flag("null_dep", outputs.null_depth)
        .flag("null_mag", outputs.null_magnitude)
        .flag("null_phs", outputs.null_phases)
        .flag("prime_only", outputs.prime_only)
        .flag("include_phases", outputs.phases)
        .flag("include_magnitudes", outputs.magnitudes)
        .flag("include_links", outputs.weblinks)
        .flag("include_headers", outputs.headers)
        .flag("include_comments", outputs.comments);
    Ok(params.finish(Endpoint::Hypocenter))
}

/// Query for the full bibliography listing of one ISC event
pub fn event_bibliography_query(event_id: u64) -> Query {
    let mut params = Params::default();
    params.push("evid", event_id.to_string());
    params.finish(Endpoint::EventBibliography)
}
