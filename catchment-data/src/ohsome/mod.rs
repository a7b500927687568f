//! `FeatureSource` backed by the ohsome OSM history API.
//!
//! Boundaries come from `elements/geometry` filtered by administrative name
//! inside a search bounding box; POIs come from `elements/centroid` with the
//! city boundary passed as `bpolys`. Both queries run against a fixed OSM
//! snapshot so repeated runs see the same data.

mod ids;

use std::time::Duration;

use async_trait::async_trait;
use catchment_core::{FeatureSource, FeatureSourceError, PointFeature, Tags, geometry};
use geo::{Coord, Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection, Value};
use log::{debug, info, warn};
use reqwest::Client;
use thiserror::Error;

use self::ids::encode_osm_id;

/// Default base URL of the public ohsome API.
pub const DEFAULT_OHSOME_URL: &str = "https://api.ohsome.org/v1";

/// Default OSM snapshot queried.
pub const DEFAULT_SNAPSHOT: &str = "2018-08-12";

/// Default boundary search box (`minLon,minLat,maxLon,maxLat`).
pub const DEFAULT_SEARCH_BBOX: &str = "8.667398,49.407718,8.719677,49.412392";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default user agent for ohsome requests.
const DEFAULT_USER_AGENT: &str = "catchment-ohsome/0.1";

/// Errors raised while building an [`OhsomeFeatureSource`].
#[derive(Debug, Error)]
pub enum OhsomeBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration for [`OhsomeFeatureSource`].
#[derive(Debug, Clone)]
pub struct OhsomeConfig {
    /// Base URL of the API, including the version segment.
    pub base_url: String,
    /// Bounding box searched for city boundaries.
    pub search_bbox: String,
    /// OSM snapshot date (ISO-8601).
    pub snapshot: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for OhsomeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OHSOME_URL.to_owned(),
            search_bbox: DEFAULT_SEARCH_BBOX.to_owned(),
            snapshot: DEFAULT_SNAPSHOT.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl OhsomeConfig {
    /// Create a configuration for `base_url` with default query settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the boundary search box.
    #[must_use]
    pub fn with_search_bbox(mut self, bbox: impl Into<String>) -> Self {
        self.search_bbox = bbox.into();
        self
    }

    /// Set the OSM snapshot date.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = snapshot.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Boundary and POI lookups against ohsome.
#[derive(Debug)]
pub struct OhsomeFeatureSource {
    client: Client,
    config: OhsomeConfig,
}

impl OhsomeFeatureSource {
    /// Create a source with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_config(config: OhsomeConfig) -> Result<Self, OhsomeBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(OhsomeBuildError::HttpClient)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// POST a form to `path` and parse the `FeatureCollection` answer.
    async fn query(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<FeatureCollection, FeatureSourceError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;
        let body = response
            .text()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;
        parse_collection(&body)
    }

    /// Convert a reqwest error to a `FeatureSourceError`.
    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> FeatureSourceError {
        if error.is_timeout() {
            return FeatureSourceError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return FeatureSourceError::HttpError {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        FeatureSourceError::NetworkError {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl FeatureSource for OhsomeFeatureSource {
    async fn boundary(&self, city: &str) -> Result<Option<MultiPolygon<f64>>, FeatureSourceError> {
        info!("Getting city boundary for: {city}");
        let filter = boundary_filter(city);
        let collection = self
            .query(
                "elements/geometry",
                &[
                    ("bboxes", self.config.search_bbox.as_str()),
                    ("time", self.config.snapshot.as_str()),
                    ("filter", filter.as_str()),
                    ("properties", "tags"),
                ],
            )
            .await?;
        let boundary = boundary_from_collection(collection);
        if boundary.is_none() {
            info!("Couldn't find city data for: {city}");
        }
        Ok(boundary)
    }

    async fn points(
        &self,
        area: &MultiPolygon<f64>,
        filter: &str,
    ) -> Result<Vec<PointFeature>, FeatureSourceError> {
        let bpolys = bpolys(area);
        let collection = self
            .query(
                "elements/centroid",
                &[
                    ("bpolys", bpolys.as_str()),
                    ("time", self.config.snapshot.as_str()),
                    ("filter", filter),
                    ("properties", "tags"),
                ],
            )
            .await?;
        let points = points_from_collection(collection);
        debug!("{} POIs match {filter}", points.len());
        Ok(points)
    }
}

/// Filter selecting an administrative boundary by name.
fn boundary_filter(city: &str) -> String {
    format!(
        "boundary=administrative and name=\"{}\"",
        city.replace('"', "\\\"")
    )
}

/// Serialise `area` as a one-feature GeoJSON collection.
fn bpolys(area: &MultiPolygon<f64>) -> String {
    let feature = Feature::from(geojson::Geometry::new(Value::from(area)));
    std::iter::once(feature)
        .collect::<FeatureCollection>()
        .to_string()
}

fn parse_collection(body: &str) -> Result<FeatureCollection, FeatureSourceError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|err| FeatureSourceError::ParseError {
            message: err.to_string(),
        })?;
    // ohsome omits `features` when nothing matched.
    if json.get("features").is_none() {
        return Ok(FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        });
    }
    FeatureCollection::from_json_value(json).map_err(|err| FeatureSourceError::ParseError {
        message: err.to_string(),
    })
}

/// Dissolve every polygonal feature into one boundary.
fn boundary_from_collection(collection: FeatureCollection) -> Option<MultiPolygon<f64>> {
    let parts: Vec<MultiPolygon<f64>> = collection
        .features
        .into_iter()
        .filter_map(|feature| feature.geometry)
        .filter_map(|geometry| match Geometry::<f64>::try_from(geometry) {
            Ok(Geometry::Polygon(polygon)) => Some(MultiPolygon::new(vec![polygon])),
            Ok(Geometry::MultiPolygon(multi)) => Some(multi),
            Ok(_) => None,
            Err(err) => {
                warn!("Skipping malformed boundary geometry: {err}");
                None
            }
        })
        .collect();
    geometry::dissolve(&parts)
}

/// Convert centroid features into point features.
///
/// Features without a point geometry or a usable `@osmId` are skipped.
fn points_from_collection(collection: FeatureCollection) -> Vec<PointFeature> {
    collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let osm_id = feature
                .property("@osmId")
                .and_then(serde_json::Value::as_str)?;
            let id = encode_osm_id(osm_id)?;
            let Some(Value::Point(position)) = feature.geometry.as_ref().map(|g| &g.value) else {
                warn!("Skipping {osm_id}: centroid is not a point");
                return None;
            };
            let (&x, &y) = (position.first()?, position.get(1)?);
            let tags: Tags = feature
                .properties_iter()
                .filter(|(key, _)| !key.starts_with('@'))
                .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_owned())))
                .collect();
            match PointFeature::new(id, Coord { x, y }, tags) {
                Ok(point) => Some(point),
                Err(err) => {
                    warn!("Skipping {osm_id}: {err}");
                    None
                }
            }
        })
        .collect()
}
