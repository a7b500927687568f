//! HTTP-based `IsochroneProvider` using OpenRouteService.
//!
//! [`OrsIsochroneProvider`] posts one request per origin to the isochrone
//! endpoint and converts the GeoJSON answer into [`IsochroneBand`]s. The
//! provider is asynchronous and shares one `reqwest` client across calls, so
//! the task pool can keep several requests in flight.
//!
//! # Example
//!
//! ```no_run
//! use catchment_data::routing::{OrsIsochroneProvider, OrsProviderConfig};
//! use catchment_core::{IsochroneProvider, IsochroneRequest, RangeType, Ranges, TravelProfile};
//! use geo::Coord;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OrsProviderConfig::new("https://api.openrouteservice.org", "my-key")
//!     .with_timeout(Duration::from_secs(60));
//! let provider = OrsIsochroneProvider::with_config(config)?;
//!
//! let ranges = Ranges::new(vec![300, 600])?;
//! let bands = provider
//!     .isochrones(IsochroneRequest {
//!         location: Coord { x: 8.68, y: 49.41 },
//!         ranges: &ranges,
//!         range_type: RangeType::Time,
//!         profile: TravelProfile::Pedestrian,
//!     })
//!     .await?;
//! println!("{} bands", bands.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use catchment_core::{
    IsochroneBand, IsochroneError, IsochroneProvider, IsochroneRequest, TravelProfile,
};
use log::debug;
use reqwest::{Client, header};
use thiserror::Error;

use super::bands::bands_from_collection;
use super::http::{build_client, read_collection, request_error};
use super::ors::{IsochroneBody, ORS_RANGE, profile_name};

/// Errors raised while building a routing provider.
#[derive(Debug, Error)]
pub enum ProviderBuildError {
    /// No API key was configured.
    #[error("an OpenRouteService API key is required")]
    MissingApiKey,
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Default user agent for routing requests.
pub const DEFAULT_USER_AGENT: &str = "catchment-routing/0.1";

/// Default base URL of the public OpenRouteService API.
pub const DEFAULT_ORS_URL: &str = "https://api.openrouteservice.org";

/// Default request timeout in seconds.
pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Name reported through [`IsochroneProvider::name`].
const PROVIDER_NAME: &str = "ors";

/// Configuration for [`OrsIsochroneProvider`].
#[derive(Clone)]
pub struct OrsProviderConfig {
    /// Base URL of the service (e.g., `"http://localhost:8080/ors"`).
    pub base_url: String,
    /// API key sent in the `Authorization` header.
    pub api_key: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl std::fmt::Debug for OrsProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrsProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for OrsProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORS_URL.to_owned(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl OrsProviderConfig {
    /// Create a configuration for `base_url` authenticated with `api_key`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Isochrone provider backed by an OpenRouteService instance.
#[derive(Debug)]
pub struct OrsIsochroneProvider {
    client: Client,
    config: OrsProviderConfig,
}

impl OrsIsochroneProvider {
    /// Create a provider with default timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client fails to
    /// build.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderBuildError> {
        Self::with_config(OrsProviderConfig::new(base_url, api_key))
    }

    /// Create a provider with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client fails to
    /// build.
    pub fn with_config(config: OrsProviderConfig) -> Result<Self, ProviderBuildError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderBuildError::MissingApiKey);
        }
        let client = build_client(&config.user_agent, config.timeout)?;
        Ok(Self { client, config })
    }

    /// Build the isochrone endpoint URL for `profile`.
    ///
    /// The URL format is: `{base_url}/v2/isochrones/{profile}`.
    fn build_url(&self, profile: TravelProfile) -> String {
        format!(
            "{}/v2/isochrones/{}",
            self.config.base_url.trim_end_matches('/'),
            profile_name(profile)
        )
    }
}

#[async_trait(?Send)]
impl IsochroneProvider for OrsIsochroneProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn isochrones(
        &self,
        request: IsochroneRequest<'_>,
    ) -> Result<Vec<IsochroneBand>, IsochroneError> {
        let url = self.build_url(request.profile);
        debug!(
            "Requesting isochrones at ({}, {}) from {url}",
            request.location.x, request.location.y
        );

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, &self.config.api_key)
            .header(header::ACCEPT, "application/geo+json, application/json")
            .json(&IsochroneBody::from_request(&request))
            .send()
            .await
            .map_err(|err| request_error(&err, &url, self.config.timeout, PROVIDER_NAME))?;

        let collection =
            read_collection(response, &url, self.config.timeout, PROVIDER_NAME).await?;
        bands_from_collection(collection, ORS_RANGE)
    }
}
