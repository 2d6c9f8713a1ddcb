//! Core data models for search criteria, events and catalogs.

mod catalog;
mod criteria;
mod event;

pub use catalog::{Catalog, CatalogRow};
pub use criteria::{
    parse_date_time, BulletinMode, Bounds, CriteriaError, DateRange, DistanceUnits, OutputFlags,
    Region, SearchCriteria, SearchRequest, SortBy, DEPTH_LIMITS, MAGNITUDE_LIMITS,
};
pub use event::{BibliographyArticle, EarthquakeEvent, EventKey, ExternalId, SourceCatalog};
