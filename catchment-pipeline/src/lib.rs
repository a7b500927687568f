//! Asynchronous half of the catchment pipeline.
//!
//! [`Orchestrator`] drives each city through boundary resolution, POI
//! lookup, isochrone acquisition and aggregation. Isochrones are fetched by
//! an [`IsochroneFetcher`] per POI, executed on a [`TaskPool`] with bounded
//! parallelism; aggregation itself is synchronous and lives in
//! `catchment-core`.
//!
//! Every future runs on the caller's task, so providers need not be `Send`.

#![forbid(unsafe_code)]

mod fetcher;
mod orchestrator;
mod pool;

pub use fetcher::{FetchError, IsochroneFetcher};
pub use orchestrator::{
    CityError, CityOutcome, CityReport, CityStage, ExclusionReason, Orchestrator,
    OrchestratorConfig, RunReport,
};
pub use pool::{
    AtomicProgress, CityProgress, PoolOutcome, ProgressSink, TaskFailure, TaskPool,
};
