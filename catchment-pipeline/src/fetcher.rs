//! Per-feature isochrone requests.

use catchment_core::{
    IsochroneError, IsochroneProvider, IsochroneRequest, IsochroneResult, PointFeature, RangeType,
    Ranges, TravelProfile,
};
use log::warn;
use thiserror::Error;

/// A provider failure tied to the feature it was requested for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("isochrones for feature {feature_id} failed: {source}")]
pub struct FetchError {
    /// Identifier of the feature.
    pub feature_id: u64,
    /// Provider error.
    #[source]
    pub source: IsochroneError,
}

/// Requests isochrones for one feature at every configured range.
#[derive(Debug)]
pub struct IsochroneFetcher<'a, P: ?Sized> {
    provider: &'a P,
    ranges: &'a Ranges,
    range_type: RangeType,
    profile: TravelProfile,
}

impl<'a, P> IsochroneFetcher<'a, P>
where
    P: IsochroneProvider + ?Sized,
{
    /// Create a fetcher for one provider and travel configuration.
    #[must_use]
    pub const fn new(
        provider: &'a P,
        ranges: &'a Ranges,
        range_type: RangeType,
        profile: TravelProfile,
    ) -> Self {
        Self {
            provider,
            ranges,
            range_type,
            profile,
        }
    }

    /// Fetch every band for `feature`.
    ///
    /// A provider error fails the whole fetch; no partial result is returned.
    /// Bands for ranges that were never requested are discarded.
    pub async fn fetch(&self, feature: PointFeature) -> Result<IsochroneResult, FetchError> {
        let request = IsochroneRequest {
            location: feature.location,
            ranges: self.ranges,
            range_type: self.range_type,
            profile: self.profile,
        };
        let mut bands = self
            .provider
            .isochrones(request)
            .await
            .map_err(|source| FetchError {
                feature_id: feature.id,
                source,
            })?;
        bands.retain(|band| {
            let requested = self.ranges.contains(band.range);
            if !requested {
                warn!(
                    "{} returned unrequested range {} for feature {}",
                    self.provider.name(),
                    band.range,
                    feature.id
                );
            }
            requested
        });
        Ok(IsochroneResult { feature, bands })
    }
}
