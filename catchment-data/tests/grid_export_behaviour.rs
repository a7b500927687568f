#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]
//! Behavioural tests for grid-weighted regions and their GeoJSON export.

use std::cell::RefCell;
use std::fmt::Write as _;

use camino::Utf8PathBuf;
use catchment_core::test_support::square;
use catchment_core::{
    Aggregator, Category, CategorySet, CityResult, Comparison, IsochroneBand, IsochroneResult,
    PointFeature, PopulationService, RegionKey, TagFilter, Tags,
};
use catchment_data::{GeoJsonExporter, PopulationGrid};
use geo::{Coord, MultiPolygon};
use geojson::FeatureCollection;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

struct ExportWorld {
    dir: TempDir,
    grid: RefCell<Option<PopulationGrid>>,
    boundary: RefCell<Option<MultiPolygon<f64>>>,
    results: RefCell<Vec<IsochroneResult>>,
    city: RefCell<Option<CityResult>>,
    comparison_files: RefCell<Vec<Utf8PathBuf>>,
    city_file: RefCell<Option<Utf8PathBuf>>,
}

impl ExportWorld {
    fn out_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join("out")).expect("utf-8 temp dir")
    }

    fn features_in(path: &Utf8PathBuf) -> usize {
        let text = std::fs::read_to_string(path).expect("export file exists");
        let collection: FeatureCollection = text.parse().expect("valid GeoJSON");
        collection.features.len()
    }
}

#[fixture]
fn world() -> ExportWorld {
    ExportWorld {
        dir: tempfile::tempdir().expect("temp dir"),
        grid: RefCell::new(None),
        boundary: RefCell::new(None),
        results: RefCell::new(Vec::new()),
        city: RefCell::new(None),
        comparison_files: RefCell::new(Vec::new()),
        city_file: RefCell::new(None),
    }
}

#[given("a {cols:usize} by {rows:usize} population grid holding {people:f64} people per cell")]
#[expect(clippy::float_arithmetic, reason = "the grid spans one unit")]
#[expect(clippy::cast_precision_loss, reason = "column counts are tiny")]
fn given_grid(world: &ExportWorld, cols: usize, rows: usize, people: f64) {
    let cell_size = 1.0 / cols as f64;
    let mut text = format!(
        "ncols {cols}\nnrows {rows}\nxllcorner 0\nyllcorner 0\ncellsize {cell_size}\nNODATA_value -9999\n"
    );
    for _ in 0..rows {
        let row = vec![people.to_string(); cols].join(" ");
        writeln!(text, "{row}").expect("write to string");
    }
    world
        .grid
        .replace(Some(text.parse().expect("valid grid")));
}

#[given("a unit square city")]
fn given_city(world: &ExportWorld) {
    world.boundary.replace(Some(square(0.0, 0.0, 1.0)));
}

#[given("a park whose isochrone covers the south-western quarter")]
fn given_park(world: &ExportWorld) {
    let feature = PointFeature::new(
        1,
        Coord { x: 0.25, y: 0.25 },
        Tags::from([("leisure".to_owned(), "park".to_owned())]),
    )
    .expect("valid feature");
    world.results.borrow_mut().push(IsochroneResult {
        feature,
        bands: vec![IsochroneBand {
            range: 600,
            geometry: square(0.0, 0.0, 0.5),
        }],
    });
}

#[when("the city is rolled up and exported")]
fn when_exported(world: &ExportWorld) {
    let binding = world.grid.borrow();
    let grid = binding.as_ref().expect("grid configured");
    let boundary = world.boundary.borrow().clone().expect("boundary configured");
    let categories = CategorySet::new(vec![Category::new(
        "green",
        vec![TagFilter::new("leisure", "park")],
    )])
    .expect("valid categories");

    let total = grid
        .population_or_zero(&boundary)
        .expect("grid query succeeds");
    let aggregation = Aggregator::new(&categories, grid)
        .aggregate(world.results.take(), &boundary, total)
        .expect("aggregation succeeds");
    let city = CityResult::rollup("Gridville", boundary, total, aggregation, grid)
        .expect("rollup succeeds");

    let exporter = GeoJsonExporter::new(world.out_dir(), "behaviour", "ors", "pedestrian");
    let comparison = Comparison::from_cities(std::slice::from_ref(&city));
    world.comparison_files.replace(
        exporter
            .write_comparison(&comparison)
            .expect("comparison export succeeds"),
    );
    world
        .city_file
        .replace(Some(exporter.write_city(&city).expect("city export succeeds")));
    world.city.replace(Some(city));
}

#[then("the green region at range {range:u32} has {people:f64} inhabitants")]
#[expect(clippy::float_arithmetic, reason = "populations are compared with a tolerance")]
fn then_region_population(world: &ExportWorld, range: u32, people: f64) {
    let binding = world.city.borrow();
    let city = binding.as_ref().expect("city rolled up");
    let key = RegionKey::Category {
        category: "green".to_owned(),
        range,
    };
    let region = city
        .category_regions
        .iter()
        .find(|region| region.key == key)
        .expect("green region exists");
    assert!((region.metrics.population - people).abs() < 1e-6);
}

#[then("the city total is {people:f64} inhabitants")]
#[expect(clippy::float_arithmetic, reason = "populations are compared with a tolerance")]
fn then_city_total(world: &ExportWorld, people: f64) {
    let binding = world.city.borrow();
    let city = binding.as_ref().expect("city rolled up");
    assert!((city.total_population - people).abs() < 1e-6);
}

#[then("{count:usize} comparison files are written")]
fn then_files_written(world: &ExportWorld, count: usize) {
    let files = world.comparison_files.borrow();
    assert_eq!(files.len(), count);
    assert!(files.iter().all(|path| path.exists()));
    assert!(
        files
            .iter()
            .all(|path| path.as_str().contains("behaviour_ors_pedestrian_"))
    );
}

fn assert_category_features(world: &ExportWorld, count: usize) {
    let files = world.comparison_files.borrow();
    let categories = files
        .iter()
        .find(|path| path.as_str().ends_with("_categories.geojson"))
        .expect("categories file written");
    assert_eq!(ExportWorld::features_in(categories), count);
}

#[then("the categories file holds {count:usize} feature")]
fn then_category_feature(world: &ExportWorld, count: usize) {
    assert_category_features(world, count);
}

#[then("the categories file holds {count:usize} features")]
fn then_category_features(world: &ExportWorld, count: usize) {
    assert_category_features(world, count);
}

#[then("the city file holds {count:usize} feature")]
fn then_city_feature(world: &ExportWorld, count: usize) {
    let binding = world.city_file.borrow();
    let path = binding.as_ref().expect("city file written");
    assert_eq!(ExportWorld::features_in(path), count);
}

#[scenario(path = "tests/features/grid_export.feature", index = 0)]
fn park_region_is_exported(world: ExportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/grid_export.feature", index = 1)]
fn empty_city_exports_boundary(world: ExportWorld) {
    let _ = world;
}
