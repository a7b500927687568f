//! Concrete collaborators for the catchment pipeline.
//!
//! Responsibilities:
//! - Request isochrones from OpenRouteService or Valhalla ([`routing`]).
//! - Query city boundaries and POIs from ohsome ([`ohsome`]).
//! - Sum gridded population from an ESRI ASCII raster ([`population`]).
//! - Write run results as GeoJSON ([`export`]).
//!
//! Boundaries:
//! - Do not encode domain rules (live in `catchment-core`).
//! - Network adapters are async and share one HTTP client each.

pub mod export;
pub mod ohsome;
pub mod population;
pub mod routing;

pub use export::{ExportError, GeoJsonExporter};
pub use ohsome::{OhsomeBuildError, OhsomeConfig, OhsomeFeatureSource};
pub use population::{GridError, PopulationGrid};
pub use routing::{
    OrsIsochroneProvider, OrsProviderConfig, ProviderBuildError, RoutingProvider,
    ValhallaIsochroneProvider, ValhallaProviderConfig,
};
