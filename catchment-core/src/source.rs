//! City boundaries and points of interest from an OSM feature service.

use async_trait::async_trait;
use geo::MultiPolygon;
use thiserror::Error;

use crate::PointFeature;

/// Errors from [`FeatureSource`] queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureSourceError {
    /// The request exceeded its timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The service answered with a non-success HTTP status.
    #[error("request to {url} failed with HTTP {status}: {message}")]
    HttpError {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request never reached the service.
    #[error("network error calling {url}: {message}")]
    NetworkError {
        /// Requested URL.
        url: String,
        /// Error description.
        message: String,
    },
    /// The response body could not be understood.
    #[error("failed to parse feature response: {message}")]
    ParseError {
        /// Error description.
        message: String,
    },
}

/// Query boundaries and point features.
///
/// Both queries treat "nothing matched" as a successful empty answer.
#[async_trait(?Send)]
pub trait FeatureSource {
    /// Resolve the administrative boundary of `city`.
    ///
    /// Returns `Ok(None)` when no boundary matches the name.
    async fn boundary(&self, city: &str) -> Result<Option<MultiPolygon<f64>>, FeatureSourceError>;

    /// Return point features inside `area` matching `filter`.
    ///
    /// `filter` uses the `key=value or key=value` syntax produced by
    /// [`Category::filter_query`](crate::Category::filter_query).
    async fn points(
        &self,
        area: &MultiPolygon<f64>,
        filter: &str,
    ) -> Result<Vec<PointFeature>, FeatureSourceError>;
}
