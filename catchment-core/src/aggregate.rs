//! Spatial aggregation of isochrones into tag and category regions.
//!
//! Isochrones are grouped by `(category, tag, range)`, dissolved, and then
//! dissolved again across tags into `(category, range)` groups. Every group is
//! clipped to the city boundary before its population is queried, so the
//! population service is called once per resulting region rather than once
//! per raw polygon.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::num::NonZeroUsize;

use geo::MultiPolygon;
use log::{debug, warn};
use thiserror::Error;

use crate::geometry;
use crate::{
    AggregatedRegion, CategorySet, IsochroneResult, PointFeature, PopulationError,
    PopulationService, RegionKey,
};

/// Errors raised while aggregating a city.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    /// The population of a region could not be determined.
    #[error("failed to query population for {key}: {source}")]
    Population {
        /// Region being measured.
        key: RegionKey,
        /// Underlying population error.
        #[source]
        source: PopulationError,
    },
}

/// A point feature that contributed at least one isochrone.
#[derive(Debug, Clone, PartialEq)]
pub struct ContributingPoint {
    /// Category the point was classified into.
    pub category: String,
    /// The point itself.
    pub feature: PointFeature,
}

/// Output of [`Aggregator::aggregate`] for one city.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregation {
    /// One region per `(category, range)`, ordered by key.
    pub category_regions: Vec<AggregatedRegion>,
    /// One region per `(category, tag, range)`, ordered by key.
    pub tag_regions: Vec<AggregatedRegion>,
    /// Points that produced at least one non-empty isochrone.
    pub points: Vec<ContributingPoint>,
    /// Distinct contributing points per category.
    pub category_poi_counts: BTreeMap<String, NonZeroUsize>,
}

impl Aggregation {
    /// Return `true` when no region was produced.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category_regions.is_empty() && self.tag_regions.is_empty()
    }
}

/// Geometry and membership of a group under construction.
#[derive(Debug)]
struct Group {
    union: MultiPolygon<f64>,
    members: BTreeSet<u64>,
}

impl Group {
    fn seed(geometry: &MultiPolygon<f64>, member: u64) -> Self {
        Self {
            union: geometry.clone(),
            members: BTreeSet::from([member]),
        }
    }

    fn absorb(&mut self, geometry: &MultiPolygon<f64>, members: impl IntoIterator<Item = u64>) {
        self.union = geometry::dissolve([&self.union, geometry])
            .unwrap_or_else(|| MultiPolygon::new(Vec::new()));
        self.members.extend(members);
    }

    fn count(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.members.len())
    }
}

/// Builds tag and category regions for one city.
pub struct Aggregator<'a> {
    categories: &'a CategorySet,
    population: &'a dyn PopulationService,
}

impl std::fmt::Debug for Aggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("categories", &self.categories)
            .field("population", &"<dyn PopulationService>")
            .finish()
    }
}

impl<'a> Aggregator<'a> {
    /// Create an aggregator classifying POIs with `categories`.
    #[must_use]
    pub const fn new(categories: &'a CategorySet, population: &'a dyn PopulationService) -> Self {
        Self {
            categories,
            population,
        }
    }

    /// Aggregate every isochrone of a city.
    ///
    /// Results whose feature matches no category, duplicates of an already
    /// seen feature and results without geometry are skipped with a log line.
    /// Ranges for which no isochrone exists produce no region at all.
    pub fn aggregate(
        &self,
        results: Vec<IsochroneResult>,
        boundary: &MultiPolygon<f64>,
        total_population: f64,
    ) -> Result<Aggregation, AggregationError> {
        let (tag_groups, points) = self.group_by_tag(results, boundary);
        let category_groups = group_by_category(&tag_groups);

        let tag_regions = self.measure_all(tag_groups, boundary, total_population)?;
        let category_regions = self.measure_all(category_groups, boundary, total_population)?;

        let mut per_category: BTreeMap<String, usize> = BTreeMap::new();
        for point in &points {
            *per_category.entry(point.category.clone()).or_default() += 1;
        }
        let category_poi_counts = per_category
            .into_iter()
            .filter_map(|(category, n)| NonZeroUsize::new(n).map(|count| (category, count)))
            .collect();

        Ok(Aggregation {
            category_regions,
            tag_regions,
            points,
            category_poi_counts,
        })
    }

    fn group_by_tag(
        &self,
        results: Vec<IsochroneResult>,
        boundary: &MultiPolygon<f64>,
    ) -> (BTreeMap<RegionKey, Group>, Vec<ContributingPoint>) {
        let mut groups: BTreeMap<RegionKey, Group> = BTreeMap::new();
        let mut points = Vec::new();
        let mut seen = HashSet::new();

        for result in results {
            let id = result.feature.id;
            if result.is_empty() {
                debug!("Skipping feature {id}: provider returned no geometry");
                continue;
            }
            let Some(hit) = self.categories.classify(&result.feature) else {
                warn!("Skipping feature {id}: its tags match no configured category");
                continue;
            };
            if !seen.insert(id) {
                warn!("Skipping duplicate isochrones for feature {id}");
                continue;
            }
            let mut contributed = false;
            for band in &result.bands {
                if geometry::is_empty(&geometry::clip(&band.geometry, boundary)) {
                    debug!("Feature {id} reaches nothing inside the boundary at {}", band.range);
                    continue;
                }
                contributed = true;
                let key = RegionKey::Tag {
                    category: hit.category.to_owned(),
                    tag: hit.tag.clone(),
                    range: band.range,
                };
                match groups.get_mut(&key) {
                    Some(group) => group.absorb(&band.geometry, [id]),
                    None => {
                        groups.insert(key, Group::seed(&band.geometry, id));
                    }
                }
            }
            if !contributed {
                continue;
            }
            points.push(ContributingPoint {
                category: hit.category.to_owned(),
                feature: result.feature,
            });
        }
        (groups, points)
    }

    fn measure_all(
        &self,
        groups: BTreeMap<RegionKey, Group>,
        boundary: &MultiPolygon<f64>,
        total_population: f64,
    ) -> Result<Vec<AggregatedRegion>, AggregationError> {
        let mut regions = Vec::with_capacity(groups.len());
        for (key, group) in groups {
            let Some(count) = group.count() else {
                continue;
            };
            let measured = AggregatedRegion::measure(
                key.clone(),
                &group.union,
                boundary,
                count,
                total_population,
                self.population,
            )
            .map_err(|source| AggregationError::Population { key, source })?;
            regions.extend(measured);
        }
        Ok(regions)
    }
}

/// Dissolve tag groups across the tag axis, keeping category and range.
fn group_by_category(tag_groups: &BTreeMap<RegionKey, Group>) -> BTreeMap<RegionKey, Group> {
    let mut groups: BTreeMap<RegionKey, Group> = BTreeMap::new();
    for (key, tag_group) in tag_groups {
        let (Some(category), Some(range)) = (key.category(), key.range()) else {
            continue;
        };
        let category_key = RegionKey::Category {
            category: category.to_owned(),
            range,
        };
        match groups.get_mut(&category_key) {
            Some(group) => group.absorb(&tag_group.union, tag_group.members.iter().copied()),
            None => {
                groups.insert(
                    category_key,
                    Group {
                        union: tag_group.union.clone(),
                        members: tag_group.members.clone(),
                    },
                );
            }
        }
    }
    groups
}
