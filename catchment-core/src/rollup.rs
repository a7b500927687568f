//! Whole-city rollup and cross-city comparison datasets.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use geo::MultiPolygon;

use crate::aggregate::{Aggregation, AggregationError, ContributingPoint};
use crate::geometry;
use crate::{AggregatedRegion, PointFeature, PopulationService, RegionKey};

/// Durable output for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityResult {
    /// City name as configured.
    pub name: String,
    /// Administrative boundary every region is clipped to.
    pub boundary: MultiPolygon<f64>,
    /// Population living inside the boundary.
    pub total_population: f64,
    /// Regions per `(category, tag, range)`.
    pub tag_regions: Vec<AggregatedRegion>,
    /// Regions per `(category, range)`.
    pub category_regions: Vec<AggregatedRegion>,
    /// Union of every category region, if any lies inside the boundary.
    pub city_region: Option<AggregatedRegion>,
    /// POIs that contributed at least one isochrone.
    pub points: Vec<ContributingPoint>,
}

impl CityResult {
    /// Roll an [`Aggregation`] up into a whole-city result.
    ///
    /// The city region dissolves every category region across all ranges.
    /// Its POI count is the sum of each category's distinct contributing POIs;
    /// categories never share a POI, so nothing is counted twice.
    pub fn rollup(
        name: impl Into<String>,
        boundary: MultiPolygon<f64>,
        total_population: f64,
        aggregation: Aggregation,
        population: &dyn PopulationService,
    ) -> Result<Self, AggregationError> {
        let Aggregation {
            category_regions,
            tag_regions,
            points,
            category_poi_counts,
        } = aggregation;

        let dissolved = geometry::dissolve(category_regions.iter().map(|region| &region.geometry));
        let pois = category_poi_counts
            .values()
            .map(|n| n.get())
            .sum::<usize>();

        let city_region = match (dissolved, NonZeroUsize::new(pois)) {
            (Some(union), Some(count)) => AggregatedRegion::measure(
                RegionKey::City,
                &union,
                &boundary,
                count,
                total_population,
                population,
            )
            .map_err(|source| AggregationError::Population {
                key: RegionKey::City,
                source,
            })?,
            _ => None,
        };

        Ok(Self {
            name: name.into(),
            boundary,
            total_population,
            tag_regions,
            category_regions,
            city_region,
            points,
        })
    }
}

/// Metric a [`ComparisonDataset`] can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RankMetric {
    /// Absolute population inside the region.
    Population,
    /// Population per contributing POI.
    PopulationPoiRatio,
    /// Share of the city's population.
    #[default]
    TotalPopulationPercentage,
}

impl RankMetric {
    /// Return the metric's column name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::PopulationPoiRatio => "population_poi_ratio",
            Self::TotalPopulationPercentage => "total_population_percentage",
        }
    }

    const fn value(self, region: &AggregatedRegion) -> f64 {
        match self {
            Self::Population => region.metrics.population,
            Self::PopulationPoiRatio => region.metrics.population_poi_ratio,
            Self::TotalPopulationPercentage => region.metrics.total_population_percentage,
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "population" => Ok(Self::Population),
            "population_poi_ratio" => Ok(Self::PopulationPoiRatio),
            "total_population_percentage" => Ok(Self::TotalPopulationPercentage),
            _ => Err(format!("invalid rank metric: {s}")),
        }
    }
}

/// One city's region inside a [`ComparisonDataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    /// City the region belongs to.
    pub city: String,
    /// The region, unchanged.
    pub region: AggregatedRegion,
}

/// Row concatenation of regions from several cities.
///
/// Rows are never merged geometrically; two cities with overlapping regions
/// stay two rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonDataset {
    rows: Vec<ComparisonRow>,
}

impl ComparisonDataset {
    /// Append one city's region.
    pub fn push(&mut self, city: impl Into<String>, region: AggregatedRegion) {
        self.rows.push(ComparisonRow {
            city: city.into(),
            region,
        });
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return `true` when the dataset has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows ordered by `metric`, highest first.
    ///
    /// Ties keep insertion order.
    #[must_use]
    pub fn rank_by(&self, metric: RankMetric) -> Vec<&ComparisonRow> {
        let mut ranked: Vec<_> = self.rows.iter().collect();
        ranked.sort_by(|a, b| metric.value(&b.region).total_cmp(&metric.value(&a.region)));
        ranked
    }

    /// Split rows by region key, one dataset per `(category, range)` or
    /// `(category, tag, range)`.
    #[must_use]
    pub fn by_key(&self) -> BTreeMap<RegionKey, Self> {
        let mut groups: BTreeMap<RegionKey, Self> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry(row.region.key.clone())
                .or_default()
                .rows
                .push(row.clone());
        }
        groups
    }
}

/// A contributing POI tagged with its city.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRow {
    /// City the POI was fetched for.
    pub city: String,
    /// Category the POI was classified into.
    pub category: String,
    /// The POI.
    pub feature: PointFeature,
}

/// Every cross-city dataset derived from a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comparison {
    /// One whole-city region per city.
    pub totals: ComparisonDataset,
    /// Category regions of every city.
    pub categories: ComparisonDataset,
    /// Tag regions of every city.
    pub tags: ComparisonDataset,
    /// Contributing POIs of every city.
    pub points: Vec<PointRow>,
}

impl Comparison {
    /// Concatenate the results of finished cities.
    ///
    /// # Examples
    /// ```
    /// use catchment_core::Comparison;
    ///
    /// let comparison = Comparison::from_cities(&[]);
    /// assert!(comparison.totals.is_empty());
    /// assert!(comparison.points.is_empty());
    /// ```
    #[must_use]
    pub fn from_cities(cities: &[CityResult]) -> Self {
        let mut comparison = Self::default();
        for city in cities {
            if let Some(region) = &city.city_region {
                comparison.totals.push(&city.name, region.clone());
            }
            for region in &city.category_regions {
                comparison.categories.push(&city.name, region.clone());
            }
            for region in &city.tag_regions {
                comparison.tags.push(&city.name, region.clone());
            }
            comparison
                .points
                .extend(city.points.iter().map(|point| PointRow {
                    city: city.name.clone(),
                    category: point.category.clone(),
                    feature: point.feature.clone(),
                }));
        }
        comparison
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests use expect for readable failures")]
mod tests {
    use super::*;
    use crate::test_support::{PolygonPopulation, square};
    use crate::RegionMetrics;
    use rstest::rstest;

    fn count(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).expect("non-zero")
    }

    fn region(category: &str, range: u32, geometry: MultiPolygon<f64>, pois: usize) -> AggregatedRegion {
        AggregatedRegion {
            key: RegionKey::Category {
                category: category.into(),
                range,
            },
            area_sq_m: geometry::geodesic_area(&geometry),
            geometry,
            count_pois: count(pois),
            metrics: RegionMetrics::new(10.0, count(pois), 100.0),
        }
    }

    fn aggregation(regions: Vec<AggregatedRegion>, counts: &[(&str, usize)]) -> Aggregation {
        Aggregation {
            category_regions: regions,
            tag_regions: Vec::new(),
            points: Vec::new(),
            category_poi_counts: counts
                .iter()
                .map(|(name, n)| ((*name).to_owned(), count(*n)))
                .collect(),
        }
    }

    #[rstest]
    #[expect(clippy::float_arithmetic, reason = "test compares areas within a tolerance")]
    fn city_count_is_sum_of_category_counts() {
        let population = PolygonPopulation::default();
        let result = CityResult::rollup(
            "Heidelberg",
            square(0.0, 0.0, 1.0),
            1000.0,
            aggregation(
                vec![
                    region("green", 600, square(0.1, 0.1, 0.2), 3),
                    region("green", 1200, square(0.1, 0.1, 0.3), 3),
                    region("historic", 600, square(0.5, 0.5, 0.2), 2),
                ],
                &[("green", 3), ("historic", 2)],
            ),
            &population,
        )
        .expect("rollup succeeds");

        let city = result.city_region.expect("city region present");
        assert_eq!(city.key, RegionKey::City);
        assert_eq!(city.count_pois.get(), 5);
        assert_eq!(city.key.category(), None);
        assert_eq!(city.key.tag(), None);
        let expected = 0.09 + 0.04;
        assert!((geometry::planar_area(&city.geometry) - expected).abs() < 1e-9);
    }

    #[rstest]
    fn city_without_regions_has_no_city_region() {
        let population = PolygonPopulation::default();
        let result = CityResult::rollup(
            "Empty",
            square(0.0, 0.0, 1.0),
            1000.0,
            Aggregation::default(),
            &population,
        )
        .expect("rollup succeeds");
        assert!(result.city_region.is_none());
    }

    #[rstest]
    fn comparison_keeps_overlapping_rows_distinct() {
        let shared = square(0.1, 0.1, 0.2);
        let cities: Vec<_> = ["A", "B"]
            .into_iter()
            .map(|name| CityResult {
                name: name.into(),
                boundary: square(0.0, 0.0, 1.0),
                total_population: 100.0,
                tag_regions: Vec::new(),
                category_regions: vec![region("green", 600, shared.clone(), 1)],
                city_region: None,
                points: Vec::new(),
            })
            .collect();

        let comparison = Comparison::from_cities(&cities);
        assert_eq!(comparison.categories.len(), 2);
        let by_key = comparison.categories.by_key();
        assert_eq!(by_key.len(), 1);
        let names: Vec<_> = by_key
            .values()
            .flat_map(|dataset| dataset.rows().iter().map(|row| row.city.as_str()))
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[rstest]
    fn ranking_orders_highest_first() {
        let mut dataset = ComparisonDataset::default();
        let mut low = region("green", 600, square(0.0, 0.0, 0.1), 1);
        low.metrics = RegionMetrics::new(10.0, count(1), 100.0);
        let mut high = region("green", 600, square(0.0, 0.0, 0.1), 1);
        high.metrics = RegionMetrics::new(40.0, count(1), 100.0);
        dataset.push("Low", low);
        dataset.push("High", high);

        let ranked: Vec<_> = dataset
            .rank_by(RankMetric::TotalPopulationPercentage)
            .into_iter()
            .map(|row| row.city.as_str())
            .collect();
        assert_eq!(ranked, vec!["High", "Low"]);
    }

    #[rstest]
    #[case("population", RankMetric::Population)]
    #[case("POPULATION_POI_RATIO", RankMetric::PopulationPoiRatio)]
    #[case("total_population_percentage", RankMetric::TotalPopulationPercentage)]
    fn rank_metric_parses(#[case] input: &str, #[case] expected: RankMetric) {
        assert_eq!(input.parse::<RankMetric>(), Ok(expected));
        assert_eq!(expected.to_string(), expected.as_str());
    }

    #[rstest]
    fn unknown_rank_metric_is_rejected() {
        assert!("area".parse::<RankMetric>().is_err());
    }
}
