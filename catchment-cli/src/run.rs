//! Run command implementation for the catchment CLI.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use catchment_core::{
    CategorySet, FeatureSource, IsochroneProvider, PopulationService, RangeType, Ranges,
    RankMetric, TravelProfile,
};
use catchment_data::ohsome::{DEFAULT_OHSOME_URL, DEFAULT_SEARCH_BBOX, DEFAULT_SNAPSHOT};
use catchment_data::routing::{DEFAULT_ORS_URL, DEFAULT_VALHALLA_URL};
use catchment_data::{
    GeoJsonExporter, OhsomeConfig, OhsomeFeatureSource, OrsIsochroneProvider, OrsProviderConfig,
    PopulationGrid, RoutingProvider, ValhallaIsochroneProvider, ValhallaProviderConfig,
};
use catchment_pipeline::{CityProgress, Orchestrator, OrchestratorConfig, RunReport};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::categories::load_categories;
use crate::progress::IsochroneBars;
use crate::{
    ARG_CATEGORIES, ARG_CITY, ARG_OHSOME_URL, ARG_ORS_API_KEY, ARG_ORS_BASE_URL, ARG_OUTPUT_DIR,
    ARG_POPULATION_GRID, ARG_PROFILE, ARG_PROVIDER, ARG_RANGE_TYPE, ARG_RANGES, ARG_RANK_BY,
    ARG_SCENARIO, ARG_SEARCH_BBOX, ARG_SNAPSHOT, ARG_TASK_TIMEOUT_SECS, ARG_THREADS,
    ARG_VALHALLA_API_KEY, ARG_VALHALLA_URL, ARG_VERBOSITY, CliError, ENV_CATEGORIES, ENV_CITY,
    ENV_ORS_API_KEY, ENV_POPULATION_GRID,
};

const DEFAULT_RANGES: [u32; 4] = [600, 1200, 1800, 3600];
const DEFAULT_THREADS: usize = 2;
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 120;
const DEFAULT_OUTPUT_DIR: &str = "results";
const DEFAULT_SCENARIO: &str = "catchment";
const DEFAULT_PROVIDER: &str = "ors";

/// CLI arguments for the `run` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Resolve each city's boundary, fetch its points of interest, \
                 request isochrones around them and weigh the resulting \
                 regions by population. Options can come from CLI flags, \
                 configuration files, or environment variables.",
    about = "Compute catchment regions for one or more cities"
)]
#[ortho_config(prefix = "CATCHMENT")]
pub(crate) struct RunArgs {
    /// City to analyse; repeat for several cities.
    #[arg(long = ARG_CITY, value_name = "name")]
    #[serde(default)]
    pub(crate) city: Option<Vec<String>>,
    /// Comma-separated travel budgets (seconds or metres).
    #[arg(long = ARG_RANGES, value_name = "list", value_delimiter = ',')]
    #[serde(default)]
    pub(crate) ranges: Option<Vec<u32>>,
    /// Unit of the budgets: `time` or `distance`.
    #[arg(long = ARG_RANGE_TYPE, value_name = "type")]
    #[serde(default)]
    pub(crate) range_type: Option<String>,
    /// Travel profile: `car`, `pedestrian` or `bike`.
    #[arg(long = ARG_PROFILE, value_name = "profile")]
    #[serde(default)]
    pub(crate) profile: Option<String>,
    /// Maximum concurrent isochrone requests.
    #[arg(long = ARG_THREADS, value_name = "count")]
    #[serde(default)]
    pub(crate) threads: Option<usize>,
    /// Path to the JSON category definitions.
    #[arg(long = ARG_CATEGORIES, value_name = "path")]
    #[serde(default)]
    pub(crate) categories: Option<Utf8PathBuf>,
    /// Routing backend: `ors` or `valhalla`.
    #[arg(long = ARG_PROVIDER, value_name = "name")]
    #[serde(default)]
    pub(crate) provider: Option<String>,
    /// Base URL of the OpenRouteService instance.
    #[arg(long = ARG_ORS_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) ors_base_url: Option<String>,
    /// OpenRouteService API key.
    #[arg(long = ARG_ORS_API_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) ors_api_key: Option<String>,
    /// Base URL of the Valhalla instance; defaults to the Mapbox service.
    #[arg(long = ARG_VALHALLA_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) valhalla_url: Option<String>,
    /// Valhalla access token, if the instance requires one.
    #[arg(long = ARG_VALHALLA_API_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) valhalla_api_key: Option<String>,
    /// Base URL of the ohsome API.
    #[arg(long = ARG_OHSOME_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) ohsome_url: Option<String>,
    /// Bounding box searched for city boundaries (`minLon,minLat,maxLon,maxLat`).
    #[arg(long = ARG_SEARCH_BBOX, value_name = "bbox")]
    #[serde(default)]
    pub(crate) search_bbox: Option<String>,
    /// OSM snapshot date queried from ohsome.
    #[arg(long = ARG_SNAPSHOT, value_name = "date")]
    #[serde(default)]
    pub(crate) snapshot: Option<String>,
    /// Path to an ESRI ASCII population grid.
    #[arg(long = ARG_POPULATION_GRID, value_name = "path")]
    #[serde(default)]
    pub(crate) population_grid: Option<Utf8PathBuf>,
    /// Directory receiving the GeoJSON results.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Scenario name prefixed to every output file.
    #[arg(long = ARG_SCENARIO, value_name = "name")]
    #[serde(default)]
    pub(crate) scenario: Option<String>,
    /// Metric ordering comparison rows: `population`,
    /// `population_poi_ratio` or `total_population_percentage`.
    #[arg(long = ARG_RANK_BY, value_name = "metric")]
    #[serde(default)]
    pub(crate) rank_by: Option<String>,
    /// Per-request timeout in seconds; `0` waits indefinitely.
    #[arg(long = ARG_TASK_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) task_timeout_secs: Option<u64>,
    /// Log level: `error`, `warn`, `info`, `debug` or `trace`.
    #[arg(long = ARG_VERBOSITY, value_name = "level")]
    #[serde(default)]
    pub(crate) verbosity: Option<String>,
}

impl RunArgs {
    pub(crate) fn into_config(self) -> Result<RunConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RunConfig::try_from(merged)
    }
}

/// Routing backend and its connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProviderSettings {
    Ors {
        base_url: String,
        api_key: String,
    },
    Valhalla {
        base_url: String,
        api_key: Option<String>,
    },
}

impl ProviderSettings {
    fn from_args(
        name: &str,
        ors_base_url: Option<String>,
        ors_api_key: Option<String>,
        valhalla_url: Option<String>,
        valhalla_api_key: Option<String>,
    ) -> Result<Self, CliError> {
        match name.to_ascii_lowercase().as_str() {
            "ors" => Ok(Self::Ors {
                base_url: ors_base_url.unwrap_or_else(|| DEFAULT_ORS_URL.to_owned()),
                api_key: ors_api_key.filter(|key| !key.trim().is_empty()).ok_or(
                    CliError::MissingArgument {
                        field: ARG_ORS_API_KEY,
                        env: ENV_ORS_API_KEY,
                    },
                )?,
            }),
            "valhalla" => Ok(Self::Valhalla {
                base_url: valhalla_url.unwrap_or_else(|| DEFAULT_VALHALLA_URL.to_owned()),
                api_key: valhalla_api_key.filter(|key| !key.trim().is_empty()),
            }),
            _ => Err(CliError::UnknownProvider {
                name: name.to_owned(),
            }),
        }
    }

    /// Valhalla runs are always computed on travel time.
    const fn supports_distance(&self) -> bool {
        matches!(self, Self::Ors { .. })
    }

    fn base_url(&self) -> &str {
        match self {
            Self::Ors { base_url, .. } | Self::Valhalla { base_url, .. } => base_url,
        }
    }

    fn build(&self, timeout: Duration) -> Result<RoutingProvider, CliError> {
        let built = match self {
            Self::Ors { base_url, api_key } => OrsIsochroneProvider::with_config(
                OrsProviderConfig::new(base_url.clone(), api_key.clone()).with_timeout(timeout),
            )
            .map(RoutingProvider::from),
            Self::Valhalla { base_url, api_key } => {
                let mut config = ValhallaProviderConfig::new(base_url.clone()).with_timeout(timeout);
                if let Some(key) = api_key {
                    config = config.with_api_key(key.clone());
                }
                ValhallaIsochroneProvider::with_config(config).map(RoutingProvider::from)
            }
        };
        built.map_err(|source| CliError::BuildIsochroneProvider {
            base_url: self.base_url().to_owned(),
            source,
        })
    }
}

/// Resolved `run` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunConfig {
    pub(crate) cities: Vec<String>,
    pub(crate) ranges: Ranges,
    pub(crate) range_type: RangeType,
    /// Set when a distance run was switched to time for the provider.
    pub(crate) range_type_forced: bool,
    pub(crate) profile: TravelProfile,
    pub(crate) threads: NonZeroUsize,
    pub(crate) categories: Utf8PathBuf,
    pub(crate) provider: ProviderSettings,
    pub(crate) ohsome_url: String,
    pub(crate) search_bbox: String,
    pub(crate) snapshot: String,
    pub(crate) population_grid: Utf8PathBuf,
    pub(crate) output_dir: Utf8PathBuf,
    pub(crate) scenario: String,
    pub(crate) rank_by: RankMetric,
    /// `None` when requests may wait indefinitely.
    pub(crate) task_timeout: Option<Duration>,
    pub(crate) verbosity: LevelFilter,
}

impl RunConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.categories, ARG_CATEGORIES)?;
        Self::require_existing(&self.population_grid, ARG_POPULATION_GRID)?;
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(CliError::OutputDirectoryNotDirectory {
                path: self.output_dir.clone(),
            });
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        if path.is_file() {
            Ok(())
        } else {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
    }

    pub(crate) fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            ranges: self.ranges.clone(),
            range_type: self.range_type,
            profile: self.profile,
            workers: self.threads,
            task_timeout: self.task_timeout,
        }
    }
}

fn invalid(field: &'static str, value: impl ToString, reason: impl ToString) -> CliError {
    CliError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_field<T>(field: &'static str, value: Option<String>, default: T) -> Result<T, CliError>
where
    T: std::str::FromStr,
    T::Err: ToString,
{
    match value {
        Some(raw) => raw.parse().map_err(|err| invalid(field, &raw, err)),
        None => Ok(default),
    }
}

impl TryFrom<RunArgs> for RunConfig {
    type Error = CliError;

    fn try_from(args: RunArgs) -> Result<Self, Self::Error> {
        let cities = args
            .city
            .filter(|cities| !cities.is_empty())
            .ok_or(CliError::MissingArgument {
                field: ARG_CITY,
                env: ENV_CITY,
            })?;
        let categories = args.categories.ok_or(CliError::MissingArgument {
            field: ARG_CATEGORIES,
            env: ENV_CATEGORIES,
        })?;
        let provider = ProviderSettings::from_args(
            args.provider.as_deref().unwrap_or(DEFAULT_PROVIDER),
            args.ors_base_url,
            args.ors_api_key,
            args.valhalla_url,
            args.valhalla_api_key,
        )?;
        let population_grid = args.population_grid.ok_or(CliError::MissingArgument {
            field: ARG_POPULATION_GRID,
            env: ENV_POPULATION_GRID,
        })?;

        let raw_ranges = args.ranges.unwrap_or_else(|| DEFAULT_RANGES.to_vec());
        let ranges = Ranges::new(raw_ranges.clone())
            .map_err(|err| invalid(ARG_RANGES, format!("{raw_ranges:?}"), err))?;
        let threads = args.threads.unwrap_or(DEFAULT_THREADS);
        let threads = NonZeroUsize::new(threads)
            .ok_or_else(|| invalid(ARG_THREADS, threads, "must be at least 1"))?;
        let requested_range_type = parse_field(ARG_RANGE_TYPE, args.range_type, RangeType::Time)?;
        let range_type_forced =
            requested_range_type == RangeType::Distance && !provider.supports_distance();
        let range_type = if range_type_forced {
            RangeType::Time
        } else {
            requested_range_type
        };
        let task_timeout = match args.task_timeout_secs.unwrap_or(DEFAULT_TASK_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            cities,
            ranges,
            range_type,
            range_type_forced,
            profile: parse_field(ARG_PROFILE, args.profile, TravelProfile::Car)?,
            threads,
            categories,
            provider,
            ohsome_url: args
                .ohsome_url
                .unwrap_or_else(|| DEFAULT_OHSOME_URL.to_owned()),
            search_bbox: args
                .search_bbox
                .unwrap_or_else(|| DEFAULT_SEARCH_BBOX.to_owned()),
            snapshot: args.snapshot.unwrap_or_else(|| DEFAULT_SNAPSHOT.to_owned()),
            population_grid,
            output_dir: args
                .output_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR)),
            scenario: args.scenario.unwrap_or_else(|| DEFAULT_SCENARIO.to_owned()),
            rank_by: parse_field(ARG_RANK_BY, args.rank_by, RankMetric::default())?,
            task_timeout,
            verbosity: parse_field(ARG_VERBOSITY, args.verbosity, LevelFilter::Info)?,
        })
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub(crate) struct RunSummary {
    pub(crate) report: RunReport,
    pub(crate) written: Vec<Utf8PathBuf>,
}

/// Drive every configured city through the pipeline and export the results.
pub(crate) async fn execute<S, P, Q>(
    config: &RunConfig,
    categories: CategorySet,
    source: S,
    provider: P,
    population: Q,
    progress: &dyn CityProgress,
) -> Result<RunSummary, CliError>
where
    S: FeatureSource,
    P: IsochroneProvider,
    Q: PopulationService,
{
    let exporter = GeoJsonExporter::new(
        config.output_dir.clone(),
        &config.scenario,
        provider.name(),
        config.profile.as_str(),
    )
    .with_rank_metric(config.rank_by);
    let orchestrator = Orchestrator::new(
        source,
        provider,
        population,
        categories,
        config.orchestrator_config(),
    );
    let report = orchestrator.run(&config.cities, progress).await;
    let written = write_results(&exporter, &report)?;
    Ok(RunSummary { report, written })
}

fn write_results(
    exporter: &GeoJsonExporter,
    report: &RunReport,
) -> Result<Vec<Utf8PathBuf>, CliError> {
    let mut written = Vec::new();
    for city in report.results() {
        written.push(exporter.write_city(city)?);
    }
    written.extend(exporter.write_comparison(&report.comparison())?);
    Ok(written)
}

fn init_logging(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    if builder.try_init().is_err() {
        debug!("Logger already installed");
    }
}

fn log_banner(config: &RunConfig, provider: &str) {
    info!("Catchment run");
    info!("  provider:   {provider}");
    info!("  profile:    {}", config.profile);
    info!("  cities:     {}", config.cities.join(", "));
    info!("  ranges:     {:?}", config.ranges.as_slice());
    info!("  range type: {}", config.range_type);
    info!("  rank by:    {}", config.rank_by);
    info!("  output:     {}", config.output_dir);
    if config.range_type_forced {
        warn!("{provider} only computes time isochrones; ignoring range type distance");
    }
}

pub(crate) fn run_catchment(args: RunArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    init_logging(config.verbosity);
    config.validate_sources()?;

    let categories = load_categories(&config.categories)?;
    let population = PopulationGrid::load(&config.population_grid)?;
    let http_timeout = config
        .task_timeout
        .unwrap_or(Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS));
    let provider = config.provider.build(http_timeout)?;
    let source = OhsomeFeatureSource::with_config(
        OhsomeConfig::new(config.ohsome_url.clone())
            .with_search_bbox(config.search_bbox.clone())
            .with_snapshot(config.snapshot.clone())
            .with_timeout(http_timeout),
    )?;

    log_banner(&config, provider.name());
    let started = Instant::now();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let summary = runtime.block_on(execute(
        &config,
        categories,
        source,
        provider,
        population,
        &IsochroneBars,
    ))?;

    let (done, excluded, failed) = summary.report.tally();
    info!(
        "{done} cities done, {excluded} excluded, {failed} failed; {} files written",
        summary.written.len()
    );
    let dropped = summary.report.dropped_tasks();
    if dropped > 0 {
        warn!("{dropped} isochrone requests were dropped");
    }
    info!("Finished in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<RunConfig, CliError> {
    let merged = RunArgs::merge_from_layers(layers).map_err(CliError::from)?;
    RunConfig::try_from(merged)
}
