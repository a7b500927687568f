//! In-memory collaborators used by unit and behaviour tests.
//!
//! None of these types perform I/O; they let the pipeline run end to end
//! against hand-built geometries.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use geo::{BooleanOps, Coord, Intersects, MultiPolygon, Point, Rect};

use crate::geometry;
use crate::{
    FeatureSource, FeatureSourceError, IsochroneBand, IsochroneError, IsochroneProvider,
    IsochroneRequest, PointFeature, PopulationError, PopulationService, TravelProfile,
};

/// Axis-aligned square with its lower-left corner at `(x, y)`.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "corner offsets are coordinate sums")]
pub fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Rect::new((x, y), (x + size, y + size)).to_polygon()])
}

/// Square of half-width `half` centred on `centre`.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "corner offsets are coordinate sums")]
pub fn square_around(centre: Coord<f64>, half: f64) -> MultiPolygon<f64> {
    square(centre.x - half, centre.y - half, 2.0 * half)
}

/// Deterministic provider returning one square per range around the origin.
///
/// Each band's half-width is `range * scale`. Origins registered with
/// [`fail_at`](Self::fail_at) produce a network error instead.
#[derive(Debug, Default)]
pub struct StubIsochroneProvider {
    scale: f64,
    failures: Vec<Coord<f64>>,
    unsupported: Vec<TravelProfile>,
    calls: AtomicUsize,
}

impl StubIsochroneProvider {
    /// Create a provider whose squares grow by `scale` per range unit.
    #[must_use]
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    /// Fail every request originating at `location`.
    #[must_use]
    pub fn fail_at(mut self, location: Coord<f64>) -> Self {
        self.failures.push(location);
        self
    }

    /// Reject every request for `profile`.
    #[must_use]
    pub fn without_profile(mut self, profile: TravelProfile) -> Self {
        self.unsupported.push(profile);
        self
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl IsochroneProvider for StubIsochroneProvider {
    fn name(&self) -> &str {
        "stub"
    }

    #[expect(clippy::float_arithmetic, reason = "band size scales with the range")]
    async fn isochrones(
        &self,
        request: IsochroneRequest<'_>,
    ) -> Result<Vec<IsochroneBand>, IsochroneError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unsupported.contains(&request.profile) {
            return Err(IsochroneError::ProfileNotImplemented {
                profile: request.profile,
                provider: self.name().to_owned(),
            });
        }
        if self.failures.contains(&request.location) {
            return Err(IsochroneError::NetworkError {
                url: "stub://isochrones".into(),
                message: format!(
                    "no route from ({}, {})",
                    request.location.x, request.location.y
                ),
            });
        }
        Ok(request
            .ranges
            .as_slice()
            .iter()
            .map(|&range| IsochroneBand {
                range,
                geometry: square_around(request.location, f64::from(range) * self.scale),
            })
            .collect())
    }
}

/// Feature source answering from in-memory boundaries and points.
///
/// Point queries honour the `key=value or key=value` filter syntax and only
/// return points inside the query area.
#[derive(Debug, Default, Clone)]
pub struct MemoryFeatureSource {
    boundaries: HashMap<String, MultiPolygon<f64>>,
    points: Vec<PointFeature>,
    failing: HashSet<String>,
}

impl MemoryFeatureSource {
    /// Register the boundary of `city`.
    #[must_use]
    pub fn with_boundary(mut self, city: impl Into<String>, boundary: MultiPolygon<f64>) -> Self {
        self.boundaries.insert(city.into(), boundary);
        self
    }

    /// Add point features available to every query.
    #[must_use]
    pub fn with_points<I>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = PointFeature>,
    {
        self.points.extend(points);
        self
    }

    /// Make boundary lookups for `city` fail.
    #[must_use]
    pub fn failing_boundary(mut self, city: impl Into<String>) -> Self {
        self.failing.insert(city.into());
        self
    }
}

fn parse_filter(filter: &str) -> Vec<(&str, &str)> {
    filter
        .split(" or ")
        .filter_map(|clause| clause.trim().split_once('='))
        .collect()
}

#[async_trait(?Send)]
impl FeatureSource for MemoryFeatureSource {
    async fn boundary(&self, city: &str) -> Result<Option<MultiPolygon<f64>>, FeatureSourceError> {
        if self.failing.contains(city) {
            return Err(FeatureSourceError::HttpError {
                url: "memory://boundary".into(),
                status: 500,
                message: format!("boundary lookup for {city} failed"),
            });
        }
        Ok(self.boundaries.get(city).cloned())
    }

    async fn points(
        &self,
        area: &MultiPolygon<f64>,
        filter: &str,
    ) -> Result<Vec<PointFeature>, FeatureSourceError> {
        let clauses = parse_filter(filter);
        Ok(self
            .points
            .iter()
            .filter(|feature| area.intersects(&Point::from(feature.location)))
            .filter(|feature| {
                clauses
                    .iter()
                    .any(|(key, value)| feature.tag(key) == Some(*value))
            })
            .cloned()
            .collect())
    }
}

/// Population service returning the same answer for every query.
#[derive(Debug, Clone)]
pub struct FixedPopulation {
    answer: Result<Option<f64>, PopulationError>,
}

impl FixedPopulation {
    /// Answer every query with `population`.
    #[must_use]
    pub const fn new(population: f64) -> Self {
        Self {
            answer: Ok(Some(population)),
        }
    }

    /// Answer every query with "no cells".
    #[must_use]
    pub const fn empty() -> Self {
        Self { answer: Ok(None) }
    }

    /// Fail every query.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            answer: Err(PopulationError::Unavailable {
                message: message.into(),
            }),
        }
    }
}

impl PopulationService for FixedPopulation {
    fn sum_population(&self, _area: &MultiPolygon<f64>) -> Result<Option<f64>, PopulationError> {
        self.answer.clone()
    }
}

/// Population spread uniformly over a set of polygons.
///
/// A query receives each polygon's population in proportion to the share of
/// its area that the query covers. Queries touching no polygon yield `None`.
#[derive(Debug, Clone, Default)]
pub struct PolygonPopulation {
    zones: Vec<(MultiPolygon<f64>, f64)>,
}

impl PolygonPopulation {
    /// Create a service from `(zone, population)` pairs.
    #[must_use]
    pub const fn new(zones: Vec<(MultiPolygon<f64>, f64)>) -> Self {
        Self { zones }
    }
}

impl PopulationService for PolygonPopulation {
    #[expect(
        clippy::float_arithmetic,
        reason = "population is apportioned by covered area share"
    )]
    fn sum_population(&self, area: &MultiPolygon<f64>) -> Result<Option<f64>, PopulationError> {
        let mut total = None;
        for (zone, people) in &self.zones {
            let zone_area = geometry::planar_area(zone);
            if zone_area <= 0.0 {
                continue;
            }
            let covered = geometry::planar_area(&zone.intersection(area));
            if covered > 0.0 {
                *total.get_or_insert(0.0) += people * covered / zone_area;
            }
        }
        Ok(total)
    }
}
