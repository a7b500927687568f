//! HTTP-based `IsochroneProvider` using Valhalla.
//!
//! Valhalla answers `POST {base}/isochrone` with a GeoJSON
//! `FeatureCollection` whose features carry a `contour` property. Time
//! contours are expressed in minutes and distance contours in kilometres, so
//! budgets are converted on the way out and back. Only the `auto` and
//! `pedestrian` costings are mapped; other profiles fail with
//! [`IsochroneError::ProfileNotImplemented`].

use std::time::Duration;

use async_trait::async_trait;
use catchment_core::{
    IsochroneBand, IsochroneError, IsochroneProvider, IsochroneRequest, RangeType, TravelProfile,
};
use log::debug;
use reqwest::Client;
use serde::Serialize;

use super::bands::{RangeProperty, bands_from_collection};
use super::http::{build_client, read_collection, request_error};
use super::provider::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, ProviderBuildError};

/// Default base URL: the Valhalla service hosted by Mapbox.
pub const DEFAULT_VALHALLA_URL: &str = "https://api.mapbox.com/valhalla/v1";

/// Name reported through [`IsochroneProvider::name`].
const PROVIDER_NAME: &str = "valhalla";

const TIME_CONTOUR: RangeProperty = RangeProperty {
    name: "contour",
    scale: 60.0,
};

const DISTANCE_CONTOUR: RangeProperty = RangeProperty {
    name: "contour",
    scale: 1000.0,
};

/// Valhalla costing model for `profile`.
///
/// # Errors
///
/// Returns [`IsochroneError::ProfileNotImplemented`] for profiles without a
/// costing.
pub fn costing(profile: TravelProfile) -> Result<&'static str, IsochroneError> {
    match profile {
        TravelProfile::Car => Ok("auto"),
        TravelProfile::Pedestrian => Ok("pedestrian"),
        TravelProfile::Bike => Err(IsochroneError::ProfileNotImplemented {
            profile,
            provider: PROVIDER_NAME.to_owned(),
        }),
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct Location {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Contour {
    /// Minutes.
    Time(f64),
    /// Kilometres.
    Distance(f64),
}

/// Body of a `POST /isochrone` request.
#[derive(Debug, Serialize, PartialEq)]
struct IsochroneBody {
    locations: Vec<Location>,
    costing: &'static str,
    contours: Vec<Contour>,
    polygons: bool,
    denoise: f64,
}

impl IsochroneBody {
    #[expect(
        clippy::float_arithmetic,
        reason = "Valhalla expects contours in minutes or kilometres"
    )]
    fn from_request(request: &IsochroneRequest<'_>) -> Result<Self, IsochroneError> {
        let contours = request
            .ranges
            .as_slice()
            .iter()
            .map(|&range| match request.range_type {
                RangeType::Time => Contour::Time(f64::from(range) / 60.0),
                RangeType::Distance => Contour::Distance(f64::from(range) / 1000.0),
            })
            .collect();
        Ok(Self {
            locations: vec![Location {
                lat: request.location.y,
                lon: request.location.x,
            }],
            costing: costing(request.profile)?,
            contours,
            polygons: true,
            denoise: 1.0,
        })
    }
}

/// Configuration for [`ValhallaIsochroneProvider`].
#[derive(Clone)]
pub struct ValhallaProviderConfig {
    /// Base URL of the service, without the `/isochrone` suffix.
    pub base_url: String,
    /// Optional key sent as the `access_token` query parameter.
    pub api_key: Option<String>,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl std::fmt::Debug for ValhallaProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValhallaProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ValhallaProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_VALHALLA_URL.to_owned(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ValhallaProviderConfig {
    /// Create a configuration for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Authenticate requests with `api_key`; blank keys are ignored.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Isochrone provider backed by a Valhalla instance.
#[derive(Debug)]
pub struct ValhallaIsochroneProvider {
    client: Client,
    config: ValhallaProviderConfig,
}

impl ValhallaIsochroneProvider {
    /// Create a provider with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_config(config: ValhallaProviderConfig) -> Result<Self, ProviderBuildError> {
        let client = build_client(&config.user_agent, config.timeout)?;
        Ok(Self { client, config })
    }

    fn build_url(&self) -> String {
        format!("{}/isochrone", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait(?Send)]
impl IsochroneProvider for ValhallaIsochroneProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn isochrones(
        &self,
        request: IsochroneRequest<'_>,
    ) -> Result<Vec<IsochroneBand>, IsochroneError> {
        let body = IsochroneBody::from_request(&request)?;
        let url = self.build_url();
        debug!(
            "Requesting {} isochrones at ({}, {}) from {url}",
            body.costing, request.location.x, request.location.y
        );

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.query(&[("access_token", key)]);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| request_error(&err, &url, self.config.timeout, PROVIDER_NAME))?;

        let collection =
            read_collection(response, &url, self.config.timeout, PROVIDER_NAME).await?;
        let property = match request.range_type {
            RangeType::Time => TIME_CONTOUR,
            RangeType::Distance => DISTANCE_CONTOUR,
        };
        bands_from_collection(collection, property)
    }
}
