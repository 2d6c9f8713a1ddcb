//! Bulletin QuakeML parser.
//!
//! Each field starts at the `NA` sentinel and is overwritten only when its
//! XML path resolves, so missing optional structure degrades to "unknown"
//! instead of failing.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::xml::{parse_xml, Element};
use super::{MalformedPolicy, ParseError, ParsedPage};
use crate::models::{EarthquakeEvent, ExternalId, SourceCatalog};

const SENTINEL: &str = "NA";

/// Event attributes copied into [`ExternalId`]s
const EXTERNAL_ID_ATTRIBUTES: &[&str] = &["eventid", "eventsource", "datasource"];

fn overwrite(field: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        *field = value.to_string();
    }
}

fn known(field: &str) -> Option<&str> {
    (field != SENTINEL).then_some(field)
}

#[derive(Debug)]
struct OriginRecord {
    public_id: String,
    time: String,
    latitude: String,
    longitude: String,
    depth: String,
    agency: String,
}

impl Default for OriginRecord {
    fn default() -> Self {
        Self {
            public_id: SENTINEL.to_string(),
            time: SENTINEL.to_string(),
            latitude: SENTINEL.to_string(),
            longitude: SENTINEL.to_string(),
            depth: SENTINEL.to_string(),
            agency: SENTINEL.to_string(),
        }
    }
}

impl OriginRecord {
    fn from_element(origin: &Element) -> Self {
        let mut record = Self::default();
        overwrite(&mut record.public_id, origin.attr("publicID"));
        overwrite(&mut record.time, origin.text_at(&["time", "value"]));
        overwrite(&mut record.latitude, origin.text_at(&["latitude", "value"]));
        overwrite(&mut record.longitude, origin.text_at(&["longitude", "value"]));
        overwrite(&mut record.depth, origin.text_at(&["depth", "value"]));
        overwrite(&mut record.agency, origin.text_at(&["creationInfo", "agencyID"]));
        record
    }
}

#[derive(Debug)]
struct MagnitudeRecord {
    value: String,
    kind: String,
    agency: String,
}

impl Default for MagnitudeRecord {
    fn default() -> Self {
        Self {
            value: SENTINEL.to_string(),
            kind: SENTINEL.to_string(),
            agency: SENTINEL.to_string(),
        }
    }
}

impl MagnitudeRecord {
    fn from_element(magnitude: &Element) -> Self {
        let mut record = Self::default();
        overwrite(&mut record.value, magnitude.text_at(&["mag", "value"]));
        overwrite(&mut record.kind, magnitude.text_at(&["type"]));
        overwrite(&mut record.agency, magnitude.text_at(&["creationInfo", "agencyID"]));
        record
    }
}

/// Parse a classified QuakeML document.
///
/// The preferred origin and magnitude are used when the event names them,
/// otherwise the first of each. Depths arrive in metres and are stored in
/// km.
pub fn parse_quakeml(bytes: &[u8], policy: MalformedPolicy) -> Result<ParsedPage, ParseError> {
    let root = parse_xml(bytes)?;
    let parameters = if root.name == "eventParameters" {
        &root
    } else {
        root.child("eventParameters")
            .ok_or_else(|| ParseError::Xml("document has no eventParameters".to_string()))?
    };

    let mut page = ParsedPage::default();
    for (block, element) in parameters.children_named("event").enumerate() {
        match parse_event(block, element) {
            Ok(event) => page.accept(block, event, Vec::new(), policy)?,
            Err(error) => page.reject(error, policy)?,
        }
    }

    tracing::debug!("Parsed {} QuakeML events", page.catalog.event_count());
    Ok(page)
}

fn parse_event(block: usize, element: &Element) -> Result<EarthquakeEvent, ParseError> {
    let preferred_origin = element.text_at(&["preferredOriginID"]);
    let origin = pick(element, "origin", preferred_origin)
        .map(OriginRecord::from_element)
        .ok_or_else(|| ParseError::malformed(block, "event has no origin"))?;

    let origin_time = known(&origin.time)
        .and_then(parse_time)
        .ok_or_else(|| ParseError::malformed(block, format!("bad origin time {:?}", origin.time)))?;
    let latitude = required(block, "latitude", &origin.latitude)?;
    let longitude = required(block, "longitude", &origin.longitude)?;

    let mut event = EarthquakeEvent::new(origin_time, latitude, longitude, SourceCatalog::IscBulletin);
    event.depth = match known(&origin.depth) {
        Some(depth) => Some(required(block, "depth", depth)? / 1000.0),
        None => None,
    };

    let preferred_magnitude = element.text_at(&["preferredMagnitudeID"]);
    if let Some(magnitude) = pick(element, "magnitude", preferred_magnitude).map(MagnitudeRecord::from_element) {
        event.magnitude_type = known(&magnitude.kind).unwrap_or_default().to_string();
        event.magnitude_value = known(&magnitude.value).and_then(|v| v.parse().ok());
        event.magnitude_reporting_agency = known(&magnitude.agency).unwrap_or_default().to_string();
    }

    event.event_reporting_agency = element
        .attr("eventsource")
        .or_else(|| known(&origin.agency))
        .unwrap_or_default()
        .to_string();
    event.event_code = event_code(element);
    event.external_ids = EXTERNAL_ID_ATTRIBUTES
        .iter()
        .chain(std::iter::once(&"publicID"))
        .filter_map(|kind| {
            element.attr(kind).map(|value| ExternalId {
                kind: kind.to_string(),
                value: value.to_string(),
            })
        })
        .collect();

    if known(&origin.public_id).is_none() {
        tracing::debug!("Event block {} origin has no publicID", block);
    }

    Ok(event)
}

/// Child named `name` whose publicID matches `preferred`, else the first one
fn pick<'a>(element: &'a Element, name: &'a str, preferred: Option<&str>) -> Option<&'a Element> {
    preferred
        .and_then(|id| element.children_named(name).find(|c| c.attr("publicID") == Some(id)))
        .or_else(|| element.child(name))
}

/// `catalog:eventid`, else the `evid=` suffix of the publicID, else the
/// publicID itself
fn event_code(element: &Element) -> Option<String> {
    if let Some(id) = element.attr("eventid") {
        return Some(id.to_string());
    }
    let public_id = element.attr("publicID")?;
    match public_id.rsplit_once("evid=") {
        Some((_, evid)) if !evid.is_empty() => Some(evid.to_string()),
        _ => Some(public_id.to_string()),
    }
}

fn required(block: usize, field: &str, value: &str) -> Result<f64, ParseError> {
    known(value)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ParseError::malformed(block, format!("bad {} {:?}", field, value)))
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document(events: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<q:quakeml xmlns:q="http://quakeml.org/xmlns/quakeml/1.2"
           xmlns="http://quakeml.org/xmlns/bed/1.2"
           xmlns:catalog="http://anss.org/xmlns/catalog/0.1">
  <eventParameters publicID="smi:ISC/bulletin">{}</eventParameters>
</q:quakeml>"#,
            events
        )
        .into_bytes()
    }

    const FULL_EVENT: &str = r#"
    <event publicID="smi:ISC/evid=600516" catalog:eventsource="ISC" catalog:datasource="ISC">
      <preferredOriginID>smi:ISC/origid=2</preferredOriginID>
      <preferredMagnitudeID>smi:ISC/magid=2</preferredMagnitudeID>
      <origin publicID="smi:ISC/origid=1">
        <time><value>1969-07-29T00:00:00Z</value></time>
        <latitude><value>0</value></latitude>
        <longitude><value>0</value></longitude>
      </origin>
      <origin publicID="smi:ISC/origid=2">
        <time><value>1969-07-29T02:01:16.50Z</value></time>
        <latitude><value>-5.12</value></latitude>
        <longitude><value>150.23</value></longitude>
        <depth><value>33000</value></depth>
        <creationInfo><agencyID>ISC</agencyID></creationInfo>
      </origin>
      <magnitude publicID="smi:ISC/magid=1">
        <mag><value>4.0</value></mag><type>mb</type>
      </magnitude>
      <magnitude publicID="smi:ISC/magid=2">
        <mag><value>6.1</value></mag><type>Ms</type>
        <originID>smi:ISC/origid=2</originID>
        <creationInfo><agencyID>NEIC</agencyID></creationInfo>
      </magnitude>
    </event>"#;

    #[test]
    fn test_preferred_origin_and_magnitude() {
        let page = parse_quakeml(&document(FULL_EVENT), MalformedPolicy::Abort).unwrap();
        let event = &page.catalog.events[0];

        assert_eq!(
            event.origin_time,
            Utc.with_ymd_and_hms(1969, 7, 29, 2, 1, 16).unwrap() + chrono::Duration::milliseconds(500)
        );
        assert_eq!(event.latitude, -5.12);
        assert_eq!(event.depth, Some(33.0));
        assert_eq!(event.magnitude_type, "Ms");
        assert_eq!(event.magnitude_value, Some(6.1));
        assert_eq!(event.magnitude_reporting_agency, "NEIC");
        assert_eq!(event.event_reporting_agency, "ISC");
        assert_eq!(event.event_code.as_deref(), Some("600516"));
        assert_eq!(event.source_catalog, SourceCatalog::IscBulletin);

        let kinds: Vec<_> = event.external_ids.iter().map(|id| id.kind.as_str()).collect();
        assert_eq!(kinds, vec!["eventsource", "datasource", "publicID"]);
        assert!(page.catalog.articles.is_empty());
    }

    #[test]
    fn test_sparse_event_degrades_to_sentinels() {
        let sparse = r#"
        <event publicID="quakeml:example/event/42">
          <origin>
            <time><value>2001-01-01T00:00:00</value></time>
            <latitude><value>1.5</value></latitude>
            <longitude><value>2.5</value></longitude>
          </origin>
        </event>"#;

        let page = parse_quakeml(&document(sparse), MalformedPolicy::Abort).unwrap();
        let event = &page.catalog.events[0];

        assert_eq!(event.depth, None);
        assert_eq!(event.magnitude_value, None);
        assert_eq!(event.magnitude_type, "");
        assert_eq!(event.event_reporting_agency, "");
        assert_eq!(event.event_code.as_deref(), Some("quakeml:example/event/42"));
    }

    #[test]
    fn test_catalog_eventid_wins() {
        let doc = r#"
        <event publicID="smi:ISC/evid=1" catalog:eventid="usp000abcd">
          <origin>
            <time><value>2001-01-01T00:00:00Z</value></time>
            <latitude><value>1</value></latitude>
            <longitude><value>2</value></longitude>
          </origin>
        </event>"#;
        let page = parse_quakeml(&document(doc), MalformedPolicy::Abort).unwrap();
        assert_eq!(page.catalog.events[0].event_code.as_deref(), Some("usp000abcd"));
    }

    #[test]
    fn test_event_without_origin() {
        let docs = format!(r#"<event publicID="smi:ISC/evid=9"/>{}"#, FULL_EVENT);

        let err = parse_quakeml(&document(&docs), MalformedPolicy::Abort).unwrap_err();
        assert_eq!(err, ParseError::malformed(0, "event has no origin"));

        let page = parse_quakeml(&document(&docs), MalformedPolicy::Skip).unwrap();
        assert_eq!(page.catalog.event_count(), 1);
        assert_eq!(page.skipped.len(), 1);
    }

    #[test]
    fn test_repeated_event_in_one_document() {
        let docs = format!("{}{}", FULL_EVENT, FULL_EVENT);

        let err = parse_quakeml(&document(&docs), MalformedPolicy::Abort).unwrap_err();
        assert_eq!(err.block(), Some(1));

        let page = parse_quakeml(&document(&docs), MalformedPolicy::Skip).unwrap();
        assert_eq!(page.catalog.event_count(), 1);
        assert_eq!(page.skipped.len(), 1);
    }

    #[test]
    fn test_empty_event_parameters() {
        let page = parse_quakeml(&document(""), MalformedPolicy::Abort).unwrap();
        assert!(page.catalog.is_empty());
    }
}
