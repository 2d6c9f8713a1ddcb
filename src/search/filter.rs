//! Post-fetch depth and magnitude filtering.

use crate::models::{Bounds, Catalog, DEPTH_LIMITS, MAGNITUDE_LIMITS};

/// Keep events whose depth and magnitude fall inside the bounds.
///
/// Unset sides default to the physical limits. An event with a missing value
/// is dropped as soon as the corresponding bound narrows those limits.
/// Articles of dropped events go with them. Applying the same bounds twice
/// changes nothing.
pub fn apply(catalog: Catalog, depth: &Bounds, magnitude: &Bounds) -> Catalog {
    catalog.retain_events(|event| {
        depth.admits(event.depth, DEPTH_LIMITS) && magnitude.admits(event.magnitude_value, MAGNITUDE_LIMITS)
    })
}
