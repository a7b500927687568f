//! Facade crate for catchment analysis.
//!
//! This crate re-exports the core domain types and the pipeline, and exposes
//! the HTTP, raster and export adapters behind the `data` feature.

#![forbid(unsafe_code)]

pub use catchment_core::{
    AggregatedRegion, Aggregation, AggregationError, Aggregator, Category, CategoryError,
    CategorySet, CityResult, Comparison, ComparisonDataset, ComparisonRow, FeatureSource,
    FeatureSourceError, IsochroneBand, IsochroneError, IsochroneProvider, IsochroneRequest,
    IsochroneResult, PointFeature, PointRow, PopulationError, PopulationService, RangeError,
    RangeType, Ranges, RankMetric, RegionKey, RegionMetrics, TagFilter, Tags, TravelProfile,
    geometry,
};

pub use catchment_pipeline::{
    AtomicProgress, CityOutcome, CityProgress, CityReport, CityStage, ExclusionReason,
    Orchestrator, OrchestratorConfig, ProgressSink, RunReport, TaskPool,
};

#[cfg(feature = "data")]
pub use catchment_data::{
    GeoJsonExporter, OhsomeConfig, OhsomeFeatureSource, OrsIsochroneProvider, OrsProviderConfig,
    PopulationGrid, RoutingProvider, ValhallaIsochroneProvider, ValhallaProviderConfig,
};
