//! GeoJSON export of comparison datasets and per-city results.
//!
//! Every file lands in one output directory and shares the prefix
//! `<scenario>_<provider>_<profile>`, so runs with different settings can sit
//! side by side without timestamps. Region features carry their metrics as
//! properties; point features carry the POI's tags.
//!
//! Comparison datasets are written one region key after another, each key's
//! rows ordered by the exporter's [`RankMetric`] with a 1-based `rank`
//! property. City files keep their regions unranked.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use catchment_core::{
    AggregatedRegion, CityResult, Comparison, ComparisonDataset, PointRow, RankMetric, Tags,
};
use geo::Point;
use geojson::{Feature, FeatureCollection, JsonObject, Value};
use log::info;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while writing export files.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that could not be written.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Feature properties could not be serialised.
    #[error("failed to serialise feature properties: {0}")]
    Serialise(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct RegionProperties<'a> {
    city: &'a str,
    category: Option<&'a str>,
    tag: Option<String>,
    range: Option<u32>,
    rank: Option<usize>,
    count_pois: usize,
    area_sq_m: f64,
    population: f64,
    population_poi_ratio: f64,
    total_population_percentage: f64,
    total_population: f64,
}

impl<'a> RegionProperties<'a> {
    fn new(city: &'a str, region: &'a AggregatedRegion, rank: Option<usize>) -> Self {
        Self {
            city,
            category: region.key.category(),
            tag: region.key.tag().map(ToString::to_string),
            range: region.key.range(),
            rank,
            count_pois: region.count_pois.get(),
            area_sq_m: region.area_sq_m,
            population: region.metrics.population,
            population_poi_ratio: region.metrics.population_poi_ratio,
            total_population_percentage: region.metrics.total_population_percentage,
            total_population: region.metrics.total_population,
        }
    }
}

#[derive(Debug, Serialize)]
struct PointProperties<'a> {
    city: &'a str,
    category: &'a str,
    osm_id: u64,
    tags: &'a Tags,
}

/// Writes run results as GeoJSON feature collections.
#[derive(Debug, Clone)]
pub struct GeoJsonExporter {
    dir: Utf8PathBuf,
    prefix: String,
    rank_metric: RankMetric,
}

impl GeoJsonExporter {
    /// Create an exporter writing into `dir` with the
    /// `<scenario>_<provider>_<profile>` file prefix.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>, scenario: &str, provider: &str, profile: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: format!("{}_{}_{}", slug(scenario), slug(provider), slug(profile)),
            rank_metric: RankMetric::default(),
        }
    }

    /// Rank comparison rows by `metric` instead of the population share.
    #[must_use]
    pub const fn with_rank_metric(mut self, metric: RankMetric) -> Self {
        self.rank_metric = metric;
        self
    }

    /// Directory files are written to.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Path of the file named `<prefix>_<suffix>.geojson`.
    #[must_use]
    pub fn path_for(&self, suffix: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}_{suffix}.geojson", self.prefix))
    }

    /// Write the four comparison datasets.
    ///
    /// Returns the written paths in the order totals, categories, tags,
    /// points.
    ///
    /// # Errors
    ///
    /// Returns an [`ExportError`] when the directory or a file cannot be
    /// written.
    pub fn write_comparison(&self, comparison: &Comparison) -> Result<Vec<Utf8PathBuf>, ExportError> {
        self.ensure_dir()?;
        let paths = vec![
            self.write("totals", self.dataset_features(&comparison.totals)?)?,
            self.write("categories", self.dataset_features(&comparison.categories)?)?,
            self.write("tags", self.dataset_features(&comparison.tags)?)?,
            self.write("points", point_features(&comparison.points)?)?,
        ];
        Ok(paths)
    }

    /// Write one city's boundary, tag, category and whole-city regions.
    ///
    /// # Errors
    ///
    /// Returns an [`ExportError`] when the directory or the file cannot be
    /// written.
    pub fn write_city(&self, city: &CityResult) -> Result<Utf8PathBuf, ExportError> {
        self.ensure_dir()?;
        let mut features = vec![boundary_feature(city)?];
        for region in city
            .tag_regions
            .iter()
            .chain(&city.category_regions)
            .chain(&city.city_region)
        {
            features.push(region_feature(&city.name, region, None)?);
        }
        self.write(&format!("city_{}", slug(&city.name)), features)
    }

    /// Features of `dataset`, grouped by region key and ranked within each
    /// group.
    fn dataset_features(&self, dataset: &ComparisonDataset) -> Result<Vec<Feature>, ExportError> {
        let mut features = Vec::with_capacity(dataset.len());
        for group in dataset.by_key().values() {
            for (position, row) in group.rank_by(self.rank_metric).into_iter().enumerate() {
                features.push(region_feature(&row.city, &row.region, Some(position + 1))?);
            }
        }
        Ok(features)
    }

    fn ensure_dir(&self) -> Result<(), ExportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::CreateDir {
            path: self.dir.clone(),
            source,
        })
    }

    fn write(&self, suffix: &str, features: Vec<Feature>) -> Result<Utf8PathBuf, ExportError> {
        let path = self.path_for(suffix);
        let count = features.len();
        let collection: FeatureCollection = features.into_iter().collect();
        fs::write(&path, collection.to_string()).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        info!("Wrote {count} features to {path}");
        Ok(path)
    }
}

fn point_features(points: &[PointRow]) -> Result<Vec<Feature>, ExportError> {
    points
        .iter()
        .map(|row| {
            let properties = PointProperties {
                city: &row.city,
                category: &row.category,
                osm_id: row.feature.id,
                tags: &row.feature.tags,
            };
            feature(
                Value::from(&Point::from(row.feature.location)),
                &properties,
            )
        })
        .collect()
}

fn region_feature(
    city: &str,
    region: &AggregatedRegion,
    rank: Option<usize>,
) -> Result<Feature, ExportError> {
    feature(
        Value::from(&region.geometry),
        &RegionProperties::new(city, region, rank),
    )
}

fn boundary_feature(city: &CityResult) -> Result<Feature, ExportError> {
    #[derive(Serialize)]
    struct BoundaryProperties<'a> {
        city: &'a str,
        kind: &'static str,
        total_population: f64,
    }

    feature(
        Value::from(&city.boundary),
        &BoundaryProperties {
            city: &city.name,
            kind: "boundary",
            total_population: city.total_population,
        },
    )
}

fn feature(value: Value, row: &impl Serialize) -> Result<Feature, ExportError> {
    let properties: JsonObject = match serde_json::to_value(row)? {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    Ok(Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Lowercase `name` and replace anything but ASCII alphanumerics with `-`.
fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
