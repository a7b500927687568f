//! Population lookups over arbitrary polygons.

use geo::MultiPolygon;
use thiserror::Error;

/// Errors from [`PopulationService::sum_population`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PopulationError {
    /// The backing dataset could not be queried.
    #[error("population lookup failed: {message}")]
    Unavailable {
        /// Error description.
        message: String,
    },
    /// The query geometry was rejected.
    #[error("invalid query geometry: {message}")]
    InvalidGeometry {
        /// Error description.
        message: String,
    },
}

/// Sum gridded population inside a polygon.
///
/// Implementations are authoritative and idempotent; callers never cache
/// their answers across runs. `Ok(None)` means no raster cell intersected the
/// geometry and is treated as a population of zero.
pub trait PopulationService {
    /// Return the population living inside `area`.
    fn sum_population(&self, area: &MultiPolygon<f64>) -> Result<Option<f64>, PopulationError>;

    /// Like [`sum_population`](Self::sum_population) but maps "no cells" to zero.
    fn population_or_zero(&self, area: &MultiPolygon<f64>) -> Result<f64, PopulationError> {
        Ok(self.sum_population(area)?.unwrap_or(0.0))
    }
}

impl<T: PopulationService + ?Sized> PopulationService for &T {
    fn sum_population(&self, area: &MultiPolygon<f64>) -> Result<Option<f64>, PopulationError> {
        (**self).sum_population(area)
    }
}
