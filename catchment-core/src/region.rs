//! Aggregated regions and their population-weighted metrics.

use std::fmt;
use std::num::NonZeroUsize;

use geo::MultiPolygon;

use crate::geometry;
use crate::{PopulationError, PopulationService, TagFilter};

/// Grouping a region was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionKey {
    /// All isochrones of one tag at one range.
    Tag {
        /// Category the tag belongs to.
        category: String,
        /// Matching tag filter.
        tag: TagFilter,
        /// Travel budget.
        range: u32,
    },
    /// All isochrones of one category at one range.
    Category {
        /// Category name.
        category: String,
        /// Travel budget.
        range: u32,
    },
    /// Every category of a city at every range.
    City,
}

impl RegionKey {
    /// Category label, absent for whole-city regions.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Tag { category, .. } | Self::Category { category, .. } => Some(category),
            Self::City => None,
        }
    }

    /// Tag label, present only for tag regions.
    #[must_use]
    pub const fn tag(&self) -> Option<&TagFilter> {
        match self {
            Self::Tag { tag, .. } => Some(tag),
            Self::Category { .. } | Self::City => None,
        }
    }

    /// Travel budget, absent for whole-city regions.
    #[must_use]
    pub const fn range(&self) -> Option<u32> {
        match self {
            Self::Tag { range, .. } | Self::Category { range, .. } => Some(*range),
            Self::City => None,
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag {
                category,
                tag,
                range,
            } => write!(f, "{category}/{tag}@{range}"),
            Self::Category { category, range } => write!(f, "{category}@{range}"),
            Self::City => f.write_str("city"),
        }
    }
}

/// Population figures derived for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMetrics {
    /// Population living inside the clipped region.
    pub population: f64,
    /// Population per contributing POI.
    pub population_poi_ratio: f64,
    /// Share of the city's population, in percent.
    pub total_population_percentage: f64,
    /// Population of the whole city.
    pub total_population: f64,
}

impl RegionMetrics {
    /// Derive ratios from a population figure.
    ///
    /// The percentage is `0.0` when `total_population` is not positive.
    ///
    /// # Examples
    /// ```
    /// use std::num::NonZeroUsize;
    /// use catchment_core::RegionMetrics;
    ///
    /// let count = NonZeroUsize::new(2).expect("non-zero");
    /// let metrics = RegionMetrics::new(150.0, count, 1000.0);
    /// assert_eq!(metrics.population_poi_ratio, 75.0);
    /// assert_eq!(metrics.total_population_percentage, 15.0);
    /// ```
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "ratios and percentages are floating-point by definition"
    )]
    pub fn new(population: f64, count_pois: NonZeroUsize, total_population: f64) -> Self {
        let count = f64::from(u32::try_from(count_pois.get()).unwrap_or(u32::MAX));
        let total_population_percentage = if total_population > 0.0 {
            100.0 * population / total_population
        } else {
            0.0
        };
        Self {
            population,
            population_poi_ratio: population / count,
            total_population_percentage,
            total_population,
        }
    }
}

/// One group's unioned and clipped geometry with its metrics.
///
/// The geometry always lies inside the city boundary and `count_pois` is at
/// least one; empty groups are never materialised.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRegion {
    /// Grouping the region represents.
    pub key: RegionKey,
    /// Clipped union of the contributing isochrones.
    pub geometry: MultiPolygon<f64>,
    /// Number of distinct contributing POIs.
    pub count_pois: NonZeroUsize,
    /// Geodesic area of `geometry` in square metres.
    pub area_sq_m: f64,
    /// Population-weighted metrics.
    pub metrics: RegionMetrics,
}

impl AggregatedRegion {
    /// Clip `union` to `boundary` and query its population.
    ///
    /// Returns `Ok(None)` when nothing of the union lies inside the boundary.
    pub fn measure(
        key: RegionKey,
        union: &MultiPolygon<f64>,
        boundary: &MultiPolygon<f64>,
        count_pois: NonZeroUsize,
        total_population: f64,
        population: &dyn PopulationService,
    ) -> Result<Option<Self>, PopulationError> {
        let clipped = geometry::clip(union, boundary);
        if geometry::is_empty(&clipped) {
            log::debug!("Region {key} lies outside the boundary; dropping it");
            return Ok(None);
        }
        let people = population.population_or_zero(&clipped)?;
        Ok(Some(Self {
            area_sq_m: geometry::geodesic_area(&clipped),
            metrics: RegionMetrics::new(people, count_pois, total_population),
            key,
            geometry: clipped,
            count_pois,
        }))
    }
}
