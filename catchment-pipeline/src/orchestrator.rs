//! Per-city sequencing of boundary, POI, isochrone and aggregation steps.
//!
//! Each city walks the stages of [`CityStage`] on its own. A failure ends
//! that city only; the next city starts from a clean slate.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use catchment_core::{
    AggregationError, Aggregator, CategorySet, CityResult, Comparison, FeatureSource,
    FeatureSourceError, IsochroneProvider, PointFeature, PopulationError, PopulationService,
    RangeType, Ranges, TravelProfile,
};
use geo::MultiPolygon;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{CityProgress, IsochroneFetcher, TaskPool};

/// Stage a city has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CityStage {
    /// Waiting for the administrative boundary.
    BoundaryPending,
    /// Waiting for POIs inside the boundary.
    PoisPending,
    /// Waiting for isochrones of every POI.
    IsochronesPending,
    /// Regions built, rollup pending.
    Aggregated,
    /// Finished with a [`CityResult`].
    Done,
    /// Dropped without a result.
    Excluded,
}

impl CityStage {
    /// Return the stage name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BoundaryPending => "boundary-pending",
            Self::PoisPending => "pois-pending",
            Self::IsochronesPending => "isochrones-pending",
            Self::Aggregated => "aggregated",
            Self::Done => "done",
            Self::Excluded => "excluded",
        }
    }
}

impl fmt::Display for CityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end processing of a single city.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CityError {
    /// The boundary query failed.
    #[error("failed to resolve boundary of {city}: {source}")]
    Boundary {
        /// City name.
        city: String,
        /// Underlying error.
        #[source]
        source: FeatureSourceError,
    },
    /// No boundary matched the city name.
    #[error("no administrative boundary named {city}")]
    BoundaryMissing {
        /// City name.
        city: String,
    },
    /// The POI query of one category failed.
    #[error("failed to fetch {category} POIs for {city}: {source}")]
    Points {
        /// City name.
        city: String,
        /// Category being fetched.
        category: String,
        /// Underlying error.
        #[source]
        source: FeatureSourceError,
    },
    /// The total population of the city could not be determined.
    #[error("failed to query total population of {city}: {source}")]
    TotalPopulation {
        /// City name.
        city: String,
        /// Underlying error.
        #[source]
        source: PopulationError,
    },
    /// Aggregation or rollup failed.
    #[error("failed to aggregate {city}: {source}")]
    Aggregation {
        /// City name.
        city: String,
        /// Underlying error.
        #[source]
        source: AggregationError,
    },
}

/// Why a city produced no result without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// No POI of any category lies inside the boundary.
    NoPois,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPois => f.write_str("no matching POIs inside the boundary"),
        }
    }
}

/// Terminal state of one city.
#[derive(Debug, Clone, PartialEq)]
pub enum CityOutcome {
    /// The city finished with a result.
    Done(Box<CityResult>),
    /// The city was dropped as a legitimate absence.
    Excluded(ExclusionReason),
    /// The city failed.
    Failed(CityError),
}

/// What happened to one city during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CityReport {
    /// City name.
    pub city: String,
    /// Terminal state.
    pub outcome: CityOutcome,
    /// Isochrone tasks that failed and were dropped.
    pub dropped_tasks: usize,
}

impl CityReport {
    /// Return the result if the city finished.
    #[must_use]
    pub fn result(&self) -> Option<&CityResult> {
        match &self.outcome {
            CityOutcome::Done(result) => Some(result.as_ref()),
            CityOutcome::Excluded(_) | CityOutcome::Failed(_) => None,
        }
    }
}

/// Reports of every city in run order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunReport {
    /// One report per requested city.
    pub cities: Vec<CityReport>,
}

impl RunReport {
    /// Iterate over finished city results.
    pub fn results(&self) -> impl Iterator<Item = &CityResult> {
        self.cities.iter().filter_map(CityReport::result)
    }

    /// Build the cross-city comparison datasets from finished cities.
    #[must_use]
    pub fn comparison(&self) -> Comparison {
        let finished: Vec<CityResult> = self.results().cloned().collect();
        Comparison::from_cities(&finished)
    }

    /// Number of cities that finished, were excluded and failed.
    #[must_use]
    pub fn tally(&self) -> (usize, usize, usize) {
        self.cities
            .iter()
            .fold((0, 0, 0), |(done, excluded, failed), report| match report.outcome {
                CityOutcome::Done(_) => (done + 1, excluded, failed),
                CityOutcome::Excluded(_) => (done, excluded + 1, failed),
                CityOutcome::Failed(_) => (done, excluded, failed + 1),
            })
    }

    /// Total number of dropped isochrone tasks.
    #[must_use]
    pub fn dropped_tasks(&self) -> usize {
        self.cities.iter().map(|report| report.dropped_tasks).sum()
    }
}

/// Travel and concurrency settings of a run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Budgets to compute isochrones for.
    pub ranges: Ranges,
    /// Unit of the budgets.
    pub range_type: RangeType,
    /// Mode of travel.
    pub profile: TravelProfile,
    /// Maximum concurrent isochrone requests.
    pub workers: NonZeroUsize,
    /// Per-request timeout; `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
}

/// Runs the pipeline city by city.
///
/// Generic over the three collaborators so tests can substitute in-memory
/// doubles for the network services.
pub struct Orchestrator<S, P, Q>
where
    S: FeatureSource,
    P: IsochroneProvider,
    Q: PopulationService,
{
    source: S,
    provider: P,
    population: Q,
    categories: CategorySet,
    config: OrchestratorConfig,
}

struct CityRun<'a> {
    city: &'a str,
    stage: CityStage,
}

impl<'a> CityRun<'a> {
    const fn new(city: &'a str) -> Self {
        Self {
            city,
            stage: CityStage::BoundaryPending,
        }
    }

    fn advance(&mut self, next: CityStage) {
        debug!("{}: {} -> {next}", self.city, self.stage);
        self.stage = next;
    }
}

impl<S, P, Q> Orchestrator<S, P, Q>
where
    S: FeatureSource,
    P: IsochroneProvider,
    Q: PopulationService,
{
    /// Assemble an orchestrator from its collaborators.
    #[must_use]
    pub const fn new(
        source: S,
        provider: P,
        population: Q,
        categories: CategorySet,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            source,
            provider,
            population,
            categories,
            config,
        }
    }

    /// Process every city in order.
    ///
    /// Isochrone requests of each city report to the sink `progress` hands
    /// out for it.
    pub async fn run<I>(&self, cities: I, progress: &dyn CityProgress) -> RunReport
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut report = RunReport::default();
        for city in cities {
            report
                .cities
                .push(self.process_city(city.as_ref(), progress).await);
        }
        report
    }

    /// Process a single city to a terminal state.
    pub async fn process_city(&self, city: &str, progress: &dyn CityProgress) -> CityReport {
        let mut run = CityRun::new(city);
        let mut dropped_tasks = 0;
        let outcome = match self.walk(&mut run, &mut dropped_tasks, progress).await {
            Ok(Some(result)) => {
                run.advance(CityStage::Done);
                info!(
                    "{city}: finished with {} category regions",
                    result.category_regions.len()
                );
                CityOutcome::Done(Box::new(result))
            }
            Ok(None) => {
                run.advance(CityStage::Excluded);
                info!("{city}: excluded, {}", ExclusionReason::NoPois);
                CityOutcome::Excluded(ExclusionReason::NoPois)
            }
            Err(err) => {
                error!("{city}: failed during {}: {err}", run.stage);
                CityOutcome::Failed(err)
            }
        };
        CityReport {
            city: city.to_owned(),
            outcome,
            dropped_tasks,
        }
    }

    async fn walk(
        &self,
        run: &mut CityRun<'_>,
        dropped_tasks: &mut usize,
        progress: &dyn CityProgress,
    ) -> Result<Option<CityResult>, CityError> {
        let city = run.city;
        let boundary = self
            .source
            .boundary(city)
            .await
            .map_err(|source| CityError::Boundary {
                city: city.to_owned(),
                source,
            })?
            .ok_or_else(|| CityError::BoundaryMissing {
                city: city.to_owned(),
            })?;

        run.advance(CityStage::PoisPending);
        let pois = self.points(city, &boundary).await?;
        if pois.is_empty() {
            return Ok(None);
        }
        info!("{city}: {} POIs", pois.len());

        let total_population = self
            .population
            .population_or_zero(&boundary)
            .map_err(|source| CityError::TotalPopulation {
                city: city.to_owned(),
                source,
            })?;
        if total_population <= 0.0 {
            warn!("{city}: total population is {total_population}; percentages will be zero");
        }

        run.advance(CityStage::IsochronesPending);
        let fetcher = IsochroneFetcher::new(
            &self.provider,
            &self.config.ranges,
            self.config.range_type,
            self.config.profile,
        );
        let mut pool = TaskPool::new(self.config.workers);
        if let Some(timeout) = self.config.task_timeout {
            pool = pool.with_timeout(timeout);
        }
        let requested = pois.len();
        let sink = progress.for_city(city);
        let fetched = pool
            .run(pois.into_iter().map(|poi| fetcher.fetch(poi)), &*sink)
            .await;
        *dropped_tasks = fetched.dropped;
        if fetched.dropped > 0 {
            warn!(
                "{city}: {} of {requested} isochrone requests dropped",
                fetched.dropped
            );
        }

        let aggregation = Aggregator::new(&self.categories, &self.population)
            .aggregate(fetched.results, &boundary, total_population)
            .map_err(|source| CityError::Aggregation {
                city: city.to_owned(),
                source,
            })?;
        run.advance(CityStage::Aggregated);

        let result = CityResult::rollup(
            city,
            boundary,
            total_population,
            aggregation,
            &self.population,
        )
        .map_err(|source| CityError::Aggregation {
            city: city.to_owned(),
            source,
        })?;
        Ok(Some(result))
    }

    /// Query every category and keep each classified feature once.
    async fn points(
        &self,
        city: &str,
        boundary: &MultiPolygon<f64>,
    ) -> Result<Vec<PointFeature>, CityError> {
        let mut seen = HashSet::new();
        let mut pois = Vec::new();
        for category in self.categories.iter() {
            let found = self
                .source
                .points(boundary, &category.filter_query())
                .await
                .map_err(|source| CityError::Points {
                    city: city.to_owned(),
                    category: category.name.clone(),
                    source,
                })?;
            debug!("{city}: {} candidates for {}", found.len(), category.name);
            for feature in found {
                if self.categories.classify(&feature).is_none() {
                    debug!("{city}: feature {} matches no category", feature.id);
                    continue;
                }
                if seen.insert(feature.id) {
                    pois.push(feature);
                }
            }
        }
        Ok(pois)
    }
}
