//! Isochrones and the routing backend that produces them.
//!
//! The [`IsochroneProvider`] trait abstracts the routing backend. Callers
//! supply an [`IsochroneRequest`] for one origin and receive one
//! [`IsochroneBand`] per requested range.

use async_trait::async_trait;
use geo::{Coord, MultiPolygon};
use thiserror::Error;

use crate::{PointFeature, RangeType, Ranges, TravelProfile};

/// Polygon reachable from an origin within one travel budget.
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneBand {
    /// Travel budget in seconds or metres.
    pub range: u32,
    /// Reachable area.
    pub geometry: MultiPolygon<f64>,
}

/// All bands returned for one [`PointFeature`].
///
/// Carries the originating feature so the aggregator can recover its tags.
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneResult {
    /// Feature the isochrones were computed for.
    pub feature: PointFeature,
    /// One band per range returned by the provider.
    pub bands: Vec<IsochroneBand>,
}

impl IsochroneResult {
    /// Return `true` when no band carries any geometry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bands
            .iter()
            .all(|band| crate::geometry::is_empty(&band.geometry))
    }
}

/// Parameters of a single isochrone request.
#[derive(Debug, Clone, Copy)]
pub struct IsochroneRequest<'a> {
    /// Origin (`x = longitude`, `y = latitude`).
    pub location: Coord<f64>,
    /// Budgets to compute a band for.
    pub ranges: &'a Ranges,
    /// Unit of the budgets.
    pub range_type: RangeType,
    /// Mode of travel.
    pub profile: TravelProfile,
}

/// Errors from [`IsochroneProvider::isochrones`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsochroneError {
    /// The backend does not support the requested profile.
    #[error("profile {profile} is not implemented by {provider}")]
    ProfileNotImplemented {
        /// Requested profile.
        profile: TravelProfile,
        /// Backend name.
        provider: String,
    },
    /// The backend rejected the configured API key.
    #[error("API key rejected by {provider}")]
    Unauthorized {
        /// Backend name.
        provider: String,
    },
    /// The request exceeded its timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The backend answered with a non-success HTTP status.
    #[error("request to {url} failed with HTTP {status}: {message}")]
    HttpError {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request never reached the backend.
    #[error("network error calling {url}: {message}")]
    NetworkError {
        /// Requested URL.
        url: String,
        /// Error description.
        message: String,
    },
    /// The response body could not be understood.
    #[error("failed to parse isochrone response: {message}")]
    ParseError {
        /// Error description.
        message: String,
    },
}

/// Compute isochrones for a single origin.
///
/// Implementers return one band per range they could compute. Any backend
/// failure is reported as an error; callers must not expect a result for
/// every origin.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use geo::{MultiPolygon, Rect};
/// use catchment_core::{
///     IsochroneBand, IsochroneError, IsochroneProvider, IsochroneRequest, RangeType, Ranges,
///     TravelProfile,
/// };
///
/// struct BoxProvider;
///
/// #[async_trait(?Send)]
/// impl IsochroneProvider for BoxProvider {
///     fn name(&self) -> &str {
///         "box"
///     }
///
///     async fn isochrones(
///         &self,
///         request: IsochroneRequest<'_>,
///     ) -> Result<Vec<IsochroneBand>, IsochroneError> {
///         let origin = request.location;
///         Ok(request
///             .ranges
///             .as_slice()
///             .iter()
///             .map(|&range| {
///                 let half = f64::from(range) / 10_000.0;
///                 let rect = Rect::new(
///                     (origin.x - half, origin.y - half),
///                     (origin.x + half, origin.y + half),
///                 );
///                 IsochroneBand {
///                     range,
///                     geometry: MultiPolygon::new(vec![rect.to_polygon()]),
///                 }
///             })
///             .collect())
///     }
/// }
///
/// let ranges = Ranges::new(vec![300, 600])?;
/// let request = IsochroneRequest {
///     location: geo::Coord { x: 8.7, y: 49.4 },
///     ranges: &ranges,
///     range_type: RangeType::Time,
///     profile: TravelProfile::Car,
/// };
/// let bands = block_on(BoxProvider.isochrones(request))?;
/// assert_eq!(bands.len(), 2);
/// # fn block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[async_trait(?Send)]
pub trait IsochroneProvider {
    /// Short backend name used in logs and output names.
    fn name(&self) -> &str;

    /// Return the isochrone bands for `request`.
    async fn isochrones(
        &self,
        request: IsochroneRequest<'_>,
    ) -> Result<Vec<IsochroneBand>, IsochroneError>;
}
