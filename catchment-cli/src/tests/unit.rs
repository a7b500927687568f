//! Focused unit tests covering run CLI configuration and category loading.

use super::helpers::{CATEGORIES_JSON, RunInputs};
use super::*;
use crate::categories::{load_categories, parse_categories};
use crate::run::{ProviderSettings, RunArgs, RunConfig, config_from_layers_for_test};
use camino::Utf8Path;
use catchment_core::{RangeType, RankMetric, TravelProfile};
use log::LevelFilter;
use ortho_config::MergeComposer;
use rstest::{fixture, rstest};
use serde_json::json;
use std::time::Duration;

#[fixture]
fn inputs() -> RunInputs {
    RunInputs::new()
}

fn complete_args(inputs: &RunInputs) -> RunArgs {
    RunArgs {
        city: Some(vec!["Heidelberg".to_owned()]),
        categories: Some(inputs.categories().to_path_buf()),
        ors_api_key: Some("key".to_owned()),
        population_grid: Some(inputs.population_grid().to_path_buf()),
        ..RunArgs::default()
    }
}

#[rstest]
fn defaults_fill_optional_fields(inputs: RunInputs) {
    let config = RunConfig::try_from(complete_args(&inputs)).expect("config builds");

    assert_eq!(config.ranges.as_slice(), &[600, 1200, 1800, 3600]);
    assert_eq!(config.range_type, RangeType::Time);
    assert_eq!(config.profile, TravelProfile::Car);
    assert_eq!(config.threads.get(), 2);
    assert_eq!(config.task_timeout, Some(Duration::from_secs(120)));
    assert_eq!(config.ohsome_url, "https://api.ohsome.org/v1");
    assert_eq!(config.snapshot, "2018-08-12");
    assert_eq!(config.output_dir, "results");
    assert_eq!(config.verbosity, LevelFilter::Info);
    assert_eq!(config.rank_by, RankMetric::TotalPopulationPercentage);
    assert!(!config.range_type_forced);
}

#[rstest]
#[case::city(ARG_CITY, ENV_CITY)]
#[case::categories(ARG_CATEGORIES, ENV_CATEGORIES)]
#[case::api_key(ARG_ORS_API_KEY, ENV_ORS_API_KEY)]
#[case::grid(ARG_POPULATION_GRID, ENV_POPULATION_GRID)]
fn converting_without_required_fields_errors(
    inputs: RunInputs,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let mut args = complete_args(&inputs);
    match field {
        ARG_CITY => args.city = Some(Vec::new()),
        ARG_CATEGORIES => args.categories = None,
        ARG_ORS_API_KEY => args.ors_api_key = Some("  ".to_owned()),
        _ => args.population_grid = None,
    }

    let err = RunConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case::profile(RunArgs { profile: Some("hovercraft".to_owned()), ..RunArgs::default() }, ARG_PROFILE)]
#[case::range_type(RunArgs { range_type: Some("weight".to_owned()), ..RunArgs::default() }, ARG_RANGE_TYPE)]
#[case::ranges(RunArgs { ranges: Some(vec![600, 0]), ..RunArgs::default() }, ARG_RANGES)]
#[case::threads(RunArgs { threads: Some(0), ..RunArgs::default() }, ARG_THREADS)]
#[case::verbosity(RunArgs { verbosity: Some("loud".to_owned()), ..RunArgs::default() }, ARG_VERBOSITY)]
#[case::rank_by(RunArgs { rank_by: Some("area".to_owned()), ..RunArgs::default() }, ARG_RANK_BY)]
fn invalid_values_are_rejected(
    inputs: RunInputs,
    #[case] overrides: RunArgs,
    #[case] expected: &'static str,
) {
    let base = complete_args(&inputs);
    let args = RunArgs {
        profile: overrides.profile,
        range_type: overrides.range_type,
        ranges: overrides.ranges,
        threads: overrides.threads,
        verbosity: overrides.verbosity,
        rank_by: overrides.rank_by,
        ..base
    };

    let err = RunConfig::try_from(args).expect_err("invalid value should error");
    match err {
        CliError::InvalidValue { field, .. } => assert_eq!(field, expected),
        other => panic!("expected InvalidValue, found {other:?}"),
    }
}

#[rstest]
fn rank_by_accepts_any_metric_name(inputs: RunInputs) {
    let args = RunArgs {
        rank_by: Some("Population_POI_Ratio".to_owned()),
        ..complete_args(&inputs)
    };

    let config = RunConfig::try_from(args).expect("config builds");

    assert_eq!(config.rank_by, RankMetric::PopulationPoiRatio);
}

#[rstest]
fn unknown_provider_is_rejected(inputs: RunInputs) {
    let args = RunArgs {
        provider: Some("here".to_owned()),
        ..complete_args(&inputs)
    };

    let err = RunConfig::try_from(args).expect_err("provider is unsupported");

    match err {
        CliError::UnknownProvider { name } => assert_eq!(name, "here"),
        other => panic!("expected UnknownProvider, found {other:?}"),
    }
}

#[rstest]
fn valhalla_needs_no_ors_key_and_forces_time(inputs: RunInputs) {
    let args = RunArgs {
        provider: Some("Valhalla".to_owned()),
        ors_api_key: None,
        range_type: Some("distance".to_owned()),
        valhalla_url: Some("http://localhost:8002".to_owned()),
        valhalla_api_key: Some(" ".to_owned()),
        ..complete_args(&inputs)
    };

    let config = RunConfig::try_from(args).expect("config builds");

    assert_eq!(
        config.provider,
        ProviderSettings::Valhalla {
            base_url: "http://localhost:8002".to_owned(),
            api_key: None,
        }
    );
    assert_eq!(config.range_type, RangeType::Time);
    assert!(config.range_type_forced);
}

#[rstest]
fn ors_keeps_distance_ranges(inputs: RunInputs) {
    let args = RunArgs {
        range_type: Some("distance".to_owned()),
        ..complete_args(&inputs)
    };

    let config = RunConfig::try_from(args).expect("config builds");

    assert_eq!(config.range_type, RangeType::Distance);
    assert!(!config.range_type_forced);
}

#[rstest]
fn zero_timeout_disables_the_limit(inputs: RunInputs) {
    let args = RunArgs {
        task_timeout_secs: Some(0),
        ..complete_args(&inputs)
    };

    let config = RunConfig::try_from(args).expect("config builds");

    assert_eq!(config.task_timeout, None);
}

#[rstest]
fn validate_sources_reports_missing_files(inputs: RunInputs) {
    let args = RunArgs {
        population_grid: Some(inputs.root().join("missing.asc")),
        ..complete_args(&inputs)
    };
    let config = RunConfig::try_from(args).expect("config builds");

    let err = config.validate_sources().expect_err("grid is absent");
    match err {
        CliError::MissingSourceFile { field, .. } => assert_eq!(field, ARG_POPULATION_GRID),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn validate_sources_rejects_output_file(inputs: RunInputs) {
    let args = RunArgs {
        output_dir: Some(inputs.categories().to_path_buf()),
        ..complete_args(&inputs)
    };
    let config = RunConfig::try_from(args).expect("config builds");

    let err = config
        .validate_sources()
        .expect_err("output path is a file");
    assert!(matches!(err, CliError::OutputDirectoryNotDirectory { .. }));
}

#[rstest]
fn merge_layers_honours_precedence(inputs: RunInputs) {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "city": ["Heidelberg"],
            "categories": inputs.categories().as_str(),
            "population_grid": inputs.population_grid().as_str(),
            "profile": "bike",
            "threads": 4,
        }),
        None,
    );
    composer.push_environment(json!({
        "ors_api_key": "from-env",
        "profile": "pedestrian",
    }));
    composer.push_cli(json!({
        "threads": 8,
    }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");

    assert_eq!(config.cities, vec!["Heidelberg".to_owned()]);
    assert_eq!(
        config.provider,
        ProviderSettings::Ors {
            base_url: "https://api.openrouteservice.org".to_owned(),
            api_key: "from-env".to_owned(),
        }
    );
    assert_eq!(config.profile, TravelProfile::Pedestrian);
    assert_eq!(config.threads.get(), 8);
}

#[rstest]
fn merge_layers_rejects_mistyped_values() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "threads": "many" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn categories_keep_file_order() {
    let set = parse_categories(CATEGORIES_JSON, Utf8Path::new("categories.json"))
        .expect("valid categories");

    let names: Vec<_> = set.iter().map(|category| category.name.as_str()).collect();
    assert_eq!(names, vec!["green", "historic"]);
    assert_eq!(set.iter().next().map(|c| c.filters.len()), Some(2));
}

#[rstest]
#[case::overlap(
    r#"[{"name": "a", "tags": {"leisure": ["park"]}}, {"name": "b", "tags": {"leisure": ["park"]}}]"#
)]
#[case::empty("[]")]
fn invalid_categories_are_rejected(#[case] text: &str) {
    let err = parse_categories(text, Utf8Path::new("categories.json"))
        .expect_err("categories are invalid");

    assert!(matches!(err, CliError::InvalidCategories { .. }));
}

#[rstest]
fn malformed_category_json_is_a_parse_error() {
    let err = parse_categories("{", Utf8Path::new("categories.json")).expect_err("not JSON");

    assert!(matches!(err, CliError::ParseCategories { .. }));
}

#[rstest]
fn missing_category_file_is_reported(inputs: RunInputs) {
    let err = load_categories(&inputs.root().join("absent.json")).expect_err("file is absent");

    assert!(matches!(err, CliError::OpenCategories { .. }));
}
