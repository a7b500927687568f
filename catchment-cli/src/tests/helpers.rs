//! Test helpers for composing run CLI inputs on disk.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub(super) const CATEGORIES_JSON: &str = r#"[
    {"name": "green", "tags": {"leisure": ["park", "garden"]}},
    {"name": "historic", "tags": {"historic": ["castle"]}}
]"#;

/// 2x2 grid over the unit square with 250 people per cell.
pub(super) const GRID: &str = "ncols 2
nrows 2
xllcorner 0
yllcorner 0
cellsize 0.5
NODATA_value -9999
250 250
250 250
";

/// Input files for a run, written into a temporary directory.
pub(super) struct RunInputs {
    dir: TempDir,
    categories: Utf8PathBuf,
    population_grid: Utf8PathBuf,
}

impl RunInputs {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let categories = root.join("categories.json");
        let population_grid = root.join("population.asc");
        fs::write(&categories, CATEGORIES_JSON).expect("write categories");
        fs::write(&population_grid, GRID).expect("write grid");
        Self {
            dir,
            categories,
            population_grid,
        }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        Utf8Path::from_path(self.dir.path()).expect("utf-8 tempdir")
    }

    pub(super) fn categories(&self) -> &Utf8Path {
        &self.categories
    }

    pub(super) fn population_grid(&self) -> &Utf8Path {
        &self.population_grid
    }

    pub(super) fn output_dir(&self) -> Utf8PathBuf {
        self.root().join("out")
    }
}
