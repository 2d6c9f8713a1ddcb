//! Search criteria: the sparse request a caller hands in and the resolved,
//! validated form every other stage consumes.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical depth limits in km, used when a depth bound is unset
pub const DEPTH_LIMITS: (f64, f64) = (0.0, 6371.0);

/// Magnitude limits, used when a magnitude bound is unset
pub const MAGNITUDE_LIMITS: (f64, f64) = (-10.0, 10.0);

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Errors raised while resolving a [`SearchRequest`] into [`SearchCriteria`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaError {
    #[error("no date range: give a single date or both a start and an end date")]
    MissingDates,

    #[error("a single date cannot be combined with start/end dates")]
    ConflictingDates,

    #[error("unrecognised date '{0}' (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    BadDate(String),

    #[error("end {end} is not after start {start}")]
    EmptyRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("invalid published year '{0}' (expected YYYY)")]
    BadYear(String),

    #[error("invalid region: {0}")]
    BadRegion(String),

    #[error("{field} bound {value} is not a finite number")]
    NonFiniteBound { field: &'static str, value: f64 },

    #[error("{field} minimum {min} exceeds maximum {max}")]
    InvertedBounds {
        field: &'static str,
        min: f64,
        max: f64,
    },
}

/// Half-open origin-time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Create a range, rejecting empty or inverted windows
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, CriteriaError> {
        if end <= start {
            return Err(CriteriaError::EmptyRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The one-day window starting at midnight of `date`
    pub fn single_day(date: NaiveDate) -> Result<Self, CriteriaError> {
        let start = date.and_time(NaiveTime::MIN);
        let end = start
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| CriteriaError::BadDate(date.to_string()))?;
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the range is already at the smallest size the provider can be
    /// queried with (one day)
    pub fn is_minimal(&self) -> bool {
        self.duration() <= Duration::days(1)
    }

    /// Split into two halves on a whole-day boundary.
    ///
    /// The halves share the split instant: the first ends where the second
    /// starts. Returns `None` once the range is minimal.
    pub fn bisect(&self) -> Option<(DateRange, DateRange)> {
        if self.is_minimal() {
            return None;
        }
        let days = self.duration().num_days().max(1);
        let mid = self.start + Duration::days((days + 1) / 2);
        if mid >= self.end {
            return None;
        }
        Some((
            DateRange {
                start: self.start,
                end: mid,
            },
            DateRange {
                start: mid,
                end: self.end,
            },
        ))
    }

    /// Cut into consecutive chunks of `days` days; the last chunk is clipped
    pub fn step(&self, days: u32) -> Vec<DateRange> {
        let step = Duration::days(i64::from(days.max(1)));
        let mut chunks = Vec::new();
        let mut start = self.start;
        while start < self.end {
            let end = start
                .checked_add_signed(step)
                .map_or(self.end, |next| next.min(self.end));
            chunks.push(DateRange { start, end });
            start = end;
        }
        chunks
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

/// Parse a calendar date or date-time; bare dates resolve to midnight
pub fn parse_date_time(value: &str) -> Result<NaiveDateTime, CriteriaError> {
    let value = value.trim();
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    parse_date(value).map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_date(value: &str) -> Result<NaiveDate, CriteriaError> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| CriteriaError::BadDate(value.to_string()))
}

/// Distance units for a circular search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnits {
    #[default]
    Deg,
    Km,
}

impl DistanceUnits {
    pub fn as_param(&self) -> &'static str {
        match self {
            DistanceUnits::Deg => "deg",
            DistanceUnits::Km => "km",
        }
    }
}

/// Geographic restriction of a search
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Region {
    #[default]
    Global,
    Rectangle {
        bottom_lat: f64,
        top_lat: f64,
        left_lon: f64,
        right_lon: f64,
    },
    Circle {
        lat: f64,
        lon: f64,
        radius: f64,
        units: DistanceUnits,
    },
    /// Closed polygon given as (lat, lon) vertices
    Polygon { vertices: Vec<(f64, f64)> },
    /// Flinn-Engdahl seismic region (1-50)
    SeismicRegion { number: u32 },
    /// Flinn-Engdahl geographic region (1-757)
    GeographicRegion { number: u32 },
}

impl Region {
    /// Parse a shape name and its coordinate list.
    ///
    /// Coordinates may be separated by commas or whitespace. Every shape other
    /// than `global` requires coordinates.
    pub fn parse(shape: Option<&str>, coords: Option<&str>) -> Result<Self, CriteriaError> {
        let shape = match shape.map(str::trim).filter(|s| !s.is_empty()) {
            Some(shape) => shape.to_lowercase(),
            None => return Ok(Region::Global),
        };
        let tokens: Vec<&str> = coords
            .unwrap_or("")
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        let region = match shape.as_str() {
            "global" => Region::Global,
            "rect" | "rectangle" => {
                let v = numbers(&shape, &tokens, 4)?;
                Region::Rectangle {
                    bottom_lat: v[0],
                    top_lat: v[1],
                    left_lon: v[2],
                    right_lon: v[3],
                }
            }
            "circ" | "circle" => {
                let (values, units) = match tokens.len() {
                    3 => (&tokens[..], DistanceUnits::Deg),
                    4 => {
                        let units = match tokens[3].to_lowercase().as_str() {
                            "deg" => DistanceUnits::Deg,
                            "km" => DistanceUnits::Km,
                            other => {
                                return Err(CriteriaError::BadRegion(format!(
                                    "unknown distance unit '{}'",
                                    other
                                )))
                            }
                        };
                        (&tokens[..3], units)
                    }
                    _ => {
                        return Err(CriteriaError::BadRegion(
                            "circ needs lat, lon, radius and an optional unit".to_string(),
                        ))
                    }
                };
                let v = numbers(&shape, values, 3)?;
                if v[2] <= 0.0 {
                    return Err(CriteriaError::BadRegion(
                        "circle radius must be positive".to_string(),
                    ));
                }
                Region::Circle {
                    lat: v[0],
                    lon: v[1],
                    radius: v[2],
                    units,
                }
            }
            "poly" | "polygon" => {
                if tokens.len() < 6 || tokens.len() % 2 != 0 {
                    return Err(CriteriaError::BadRegion(
                        "poly needs at least three lat/lon pairs".to_string(),
                    ));
                }
                let v = numbers(&shape, &tokens, tokens.len())?;
                Region::Polygon {
                    vertices: v.chunks(2).map(|p| (p[0], p[1])).collect(),
                }
            }
            "seis" | "seismic" => Region::SeismicRegion {
                number: region_number(&shape, &tokens, 50)?,
            },
            "geo" | "geographic" => Region::GeographicRegion {
                number: region_number(&shape, &tokens, 757)?,
            },
            other => {
                return Err(CriteriaError::BadRegion(format!(
                    "unknown shape '{}'",
                    other
                )))
            }
        };
        region.validate()?;
        Ok(region)
    }

    fn validate(&self) -> Result<(), CriteriaError> {
        let points: Vec<(f64, f64)> = match self {
            Region::Rectangle {
                bottom_lat,
                top_lat,
                left_lon,
                right_lon,
            } => {
                if bottom_lat > top_lat {
                    return Err(CriteriaError::BadRegion(
                        "bottom latitude is north of top latitude".to_string(),
                    ));
                }
                vec![(*bottom_lat, *left_lon), (*top_lat, *right_lon)]
            }
            Region::Circle { lat, lon, .. } => vec![(*lat, *lon)],
            Region::Polygon { vertices } => vertices.clone(),
            _ => Vec::new(),
        };
        for (lat, lon) in points {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(CriteriaError::BadRegion(format!(
                    "latitude {} outside [-90, 90]",
                    lat
                )));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(CriteriaError::BadRegion(format!(
                    "longitude {} outside [-180, 180]",
                    lon
                )));
            }
        }
        Ok(())
    }
}

fn numbers(shape: &str, tokens: &[&str], expected: usize) -> Result<Vec<f64>, CriteriaError> {
    if tokens.len() != expected {
        return Err(CriteriaError::BadRegion(format!(
            "{} needs {} coordinates, got {}",
            shape,
            expected,
            tokens.len()
        )));
    }
    tokens
        .iter()
        .map(|t| {
            t.parse::<f64>().map_err(|_| {
                CriteriaError::BadRegion(format!("'{}' is not a number", t))
            })
        })
        .collect()
}

fn region_number(shape: &str, tokens: &[&str], max: u32) -> Result<u32, CriteriaError> {
    let [token] = tokens else {
        return Err(CriteriaError::BadRegion(format!(
            "{} needs exactly one region number",
            shape
        )));
    };
    match token.parse::<u32>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => Err(CriteriaError::BadRegion(format!(
            "{} region number must be 1-{}, got '{}'",
            shape, max, token
        ))),
    }
}

/// Sort order of bibliography results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Day,
    Year,
}

impl SortBy {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortBy::Day => "day",
            SortBy::Year => "year",
        }
    }
}

/// Which hypocenter bulletin to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulletinMode {
    Reviewed,
    #[default]
    Comprehensive,
}

impl BulletinMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            BulletinMode::Reviewed => "REVIEWED",
            BulletinMode::Comprehensive => "COMPREHENSIVE",
        }
    }
}

/// Optional sections and null-value inclusion for hypocenter output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputFlags {
    pub null_depth: bool,
    pub null_magnitude: bool,
    pub null_phases: bool,
    pub prime_only: bool,
    pub phases: bool,
    pub magnitudes: bool,
    pub weblinks: bool,
    pub headers: bool,
    pub comments: bool,
}

/// Optional numeric bounds; unset sides fall back to a limit pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Concrete `(min, max)` with unset sides taken from `limits`
    pub fn resolve(&self, limits: (f64, f64)) -> (f64, f64) {
        (self.min.unwrap_or(limits.0), self.max.unwrap_or(limits.1))
    }

    /// Whether these bounds are tighter than `limits` on either side
    pub fn narrows(&self, limits: (f64, f64)) -> bool {
        let (lo, hi) = self.resolve(limits);
        lo > limits.0 || hi < limits.1
    }

    /// Whether `value` satisfies the bounds.
    ///
    /// A missing value only passes while the bounds do not narrow `limits`.
    pub fn admits(&self, value: Option<f64>, limits: (f64, f64)) -> bool {
        let (lo, hi) = self.resolve(limits);
        match value {
            Some(v) => lo <= v && v <= hi,
            None => !self.narrows(limits),
        }
    }

    fn check(&self, field: &'static str) -> Result<(), CriteriaError> {
        if let Some(value) = [self.min, self.max].into_iter().flatten().find(|v| !v.is_finite()) {
            return Err(CriteriaError::NonFiniteBound { field, value });
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(CriteriaError::InvertedBounds { field, min, max });
            }
        }
        Ok(())
    }
}

/// Raw search input as supplied by a caller (CLI, config, library user)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Single origin date; expands to a one-day window
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub published_min_year: Option<String>,
    pub published_max_year: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub shape: Option<String>,
    pub coords: Option<String>,
    pub sort_by: Option<SortBy>,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub min_mag: Option<f64>,
    pub max_mag: Option<f64>,
    pub mag_type: Option<String>,
    pub mag_agency: Option<String>,
    pub min_defining_phases: Option<u32>,
    pub max_defining_phases: Option<u32>,
    pub reviewed: bool,
    pub outputs: OutputFlags,
}

impl SearchRequest {
    /// Request covering a single origin date
    pub fn on_date(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..Default::default()
        }
    }

    /// Request covering `[start, end)`
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            ..Default::default()
        }
    }

    pub fn depth(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_depth = min;
        self.max_depth = max;
        self
    }

    pub fn magnitude(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_mag = min;
        self.max_mag = max;
        self
    }

    pub fn region(mut self, shape: impl Into<String>, coords: impl Into<String>) -> Self {
        self.shape = Some(shape.into());
        self.coords = Some(coords.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn published_years(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.published_min_year = Some(min.into());
        self.published_max_year = Some(max.into());
        self
    }

    pub fn reviewed(mut self, reviewed: bool) -> Self {
        self.reviewed = reviewed;
        self
    }

    pub fn outputs(mut self, outputs: OutputFlags) -> Self {
        self.outputs = outputs;
        self
    }

    /// Validate and normalise into [`SearchCriteria`]
    pub fn resolve(&self) -> Result<SearchCriteria, CriteriaError> {
        SearchCriteria::resolve(self)
    }
}

/// Normalised search parameters.
///
/// Built once from a [`SearchRequest`] and passed by value afterwards; sub-range
/// queries derive new criteria with [`SearchCriteria::with_range`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub range: DateRange,
    pub published_min_year: String,
    pub published_max_year: String,
    pub author: String,
    pub publisher: String,
    pub region: Region,
    pub sort_by: SortBy,
    pub depth: Bounds,
    pub magnitude: Bounds,
    pub magnitude_type: String,
    pub magnitude_agency: String,
    pub min_defining_phases: Option<u32>,
    pub max_defining_phases: Option<u32>,
    pub bulletin: BulletinMode,
    pub outputs: OutputFlags,
}

impl SearchCriteria {
    pub fn resolve(request: &SearchRequest) -> Result<Self, CriteriaError> {
        let range = match (&request.date, &request.start_date, &request.end_date) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(CriteriaError::ConflictingDates)
            }
            (Some(date), None, None) => DateRange::single_day(parse_date(date)?)?,
            (None, Some(start), Some(end)) => {
                DateRange::new(parse_date_time(start)?, parse_date_time(end)?)?
            }
            _ => return Err(CriteriaError::MissingDates),
        };

        let published_min_year = year(&request.published_min_year)?;
        let published_max_year = year(&request.published_max_year)?;

        let depth = Bounds::new(request.min_depth, request.max_depth);
        depth.check("depth")?;
        let magnitude = Bounds::new(request.min_mag, request.max_mag);
        magnitude.check("magnitude")?;

        Ok(Self {
            range,
            published_min_year,
            published_max_year,
            author: text(&request.author),
            publisher: text(&request.publisher),
            region: Region::parse(request.shape.as_deref(), request.coords.as_deref())?,
            sort_by: request.sort_by.unwrap_or_default(),
            depth,
            magnitude,
            magnitude_type: text(&request.mag_type),
            magnitude_agency: text(&request.mag_agency),
            min_defining_phases: request.min_defining_phases,
            max_defining_phases: request.max_defining_phases,
            bulletin: if request.reviewed {
                BulletinMode::Reviewed
            } else {
                BulletinMode::Comprehensive
            },
            outputs: request.outputs,
        })
    }

    /// Same criteria restricted to another origin-time window
    pub fn with_range(&self, range: DateRange) -> Self {
        Self {
            range,
            ..self.clone()
        }
    }
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or("").to_string()
}

fn year(value: &Option<String>) -> Result<String, CriteriaError> {
    let value = text(value);
    if value.is_empty() || (value.len() == 4 && value.chars().all(|c| c.is_ascii_digit())) {
        Ok(value)
    } else {
        Err(CriteriaError::BadYear(value))
    }
}
