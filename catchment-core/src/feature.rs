use std::collections::HashMap;

use geo::Coord;
use thiserror::Error;

/// OpenStreetMap-style key/value properties attached to a feature.
pub type Tags = HashMap<String, String>;

/// A point feature fetched from the feature source.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
/// Tags mirror OpenStreetMap's free-form key/value structure.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use catchment_core::{PointFeature, Tags};
///
/// let feature = PointFeature::new(
///     7,
///     Coord { x: 8.69, y: 49.41 },
///     Tags::from([("leisure".into(), "park".into())]),
/// )?;
///
/// assert_eq!(feature.id, 7);
/// assert_eq!(feature.tag("leisure"), Some("park"));
/// # Ok::<(), catchment_core::PointFeatureError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// Identifier assigned by the feature source.
    pub id: u64,
    /// Geospatial position.
    pub location: Coord<f64>,
    /// OpenStreetMap-style tags.
    pub tags: Tags,
}

/// Errors returned by [`PointFeature::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PointFeatureError {
    /// The coordinate contained NaN or infinite components.
    #[error("feature {id} has a non-finite coordinate ({x}, {y})")]
    NonFiniteLocation {
        /// Identifier of the rejected feature.
        id: u64,
        /// Longitude as supplied.
        x: f64,
        /// Latitude as supplied.
        y: f64,
    },
}

impl PointFeature {
    /// Validates and constructs a [`PointFeature`].
    pub fn new(id: u64, location: Coord<f64>, tags: Tags) -> Result<Self, PointFeatureError> {
        if !(location.x.is_finite() && location.y.is_finite()) {
            return Err(PointFeatureError::NonFiniteLocation {
                id,
                x: location.x,
                y: location.y,
            });
        }
        Ok(Self { id, location, tags })
    }

    /// Return the value stored under `key`, if any.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests use expect for readable failures")]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn feature_exposes_tags() {
        let feature = PointFeature::new(
            1,
            Coord { x: 0.0, y: 0.0 },
            Tags::from([("key".into(), "value".into())]),
        )
        .expect("finite coordinate");
        assert_eq!(feature.tag("key"), Some("value"));
        assert_eq!(feature.tag("missing"), None);
    }

    #[rstest]
    #[case(f64::NAN, 0.0)]
    #[case(0.0, f64::INFINITY)]
    fn feature_rejects_non_finite_location(#[case] x: f64, #[case] y: f64) {
        let result = PointFeature::new(3, Coord { x, y }, Tags::new());
        assert!(matches!(
            result,
            Err(PointFeatureError::NonFiniteLocation { id: 3, .. })
        ));
    }
}
