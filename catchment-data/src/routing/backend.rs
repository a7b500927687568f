//! Runtime selection between the supported routing backends.

use async_trait::async_trait;
use catchment_core::{IsochroneBand, IsochroneError, IsochroneProvider, IsochroneRequest};

use super::provider::OrsIsochroneProvider;
use super::valhalla::ValhallaIsochroneProvider;

/// One of the supported isochrone backends, chosen at runtime.
#[derive(Debug)]
pub enum RoutingProvider {
    /// OpenRouteService.
    Ors(OrsIsochroneProvider),
    /// Valhalla.
    Valhalla(ValhallaIsochroneProvider),
}

impl From<OrsIsochroneProvider> for RoutingProvider {
    fn from(provider: OrsIsochroneProvider) -> Self {
        Self::Ors(provider)
    }
}

impl From<ValhallaIsochroneProvider> for RoutingProvider {
    fn from(provider: ValhallaIsochroneProvider) -> Self {
        Self::Valhalla(provider)
    }
}

#[async_trait(?Send)]
impl IsochroneProvider for RoutingProvider {
    fn name(&self) -> &str {
        match self {
            Self::Ors(provider) => provider.name(),
            Self::Valhalla(provider) => provider.name(),
        }
    }

    async fn isochrones(
        &self,
        request: IsochroneRequest<'_>,
    ) -> Result<Vec<IsochroneBand>, IsochroneError> {
        match self {
            Self::Ors(provider) => provider.isochrones(request).await,
            Self::Valhalla(provider) => provider.isochrones(request).await,
        }
    }
}
