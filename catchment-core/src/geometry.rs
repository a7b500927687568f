//! Polygon dissolve, boundary clipping and area helpers.
//!
//! All geometries are WGS84 `MultiPolygon<f64>` values. Planar areas are in
//! squared degrees and only meaningful for comparisons; geodesic areas are in
//! square metres.

use geo::{Area, BooleanOps, Contains, GeodesicArea, MultiPolygon};

/// Return `true` when the geometry encloses no area.
#[must_use]
pub fn is_empty(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.is_empty() || geometry.unsigned_area() <= 0.0
}

/// Dissolve a sequence of geometries into their union.
///
/// The first non-empty geometry seeds the result and every later one is
/// merged into it. Returns `None` when every input is empty.
///
/// # Examples
/// ```
/// use geo::{MultiPolygon, Rect};
/// use catchment_core::geometry::dissolve;
///
/// let left = MultiPolygon::new(vec![Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon()]);
/// let right = MultiPolygon::new(vec![Rect::new((1.0, 0.0), (2.0, 1.0)).to_polygon()]);
/// let merged = dissolve([&left, &right]).expect("non-empty input");
/// assert!((catchment_core::geometry::planar_area(&merged) - 2.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn dissolve<'a, I>(geometries: I) -> Option<MultiPolygon<f64>>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    geometries
        .into_iter()
        .filter(|geometry| !is_empty(geometry))
        .fold(None, |acc, geometry| match acc {
            None => Some(geometry.clone()),
            Some(merged) => Some(merged.union(geometry)),
        })
}

/// Intersect `geometry` with `boundary`, discarding area outside it.
///
/// Geometries already inside the boundary are returned unchanged.
#[must_use]
pub fn clip(geometry: &MultiPolygon<f64>, boundary: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if boundary.contains(geometry) {
        return geometry.clone();
    }
    geometry.intersection(boundary)
}

/// Planar area in squared coordinate units.
#[must_use]
pub fn planar_area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Geodesic area in square metres.
#[must_use]
pub fn geodesic_area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.geodesic_area_unsigned()
}
