//! Loading category definitions from JSON.
//!
//! The file holds an ordered array of
//! `{"name": "green", "tags": {"leisure": ["park", "garden"]}}` entries; array
//! order is the classification priority.

use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use catchment_core::{Category, CategorySet, TagFilter};
use serde::Deserialize;

use crate::CliError;

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    name: String,
    tags: BTreeMap<String, Vec<String>>,
}

impl From<CategoryEntry> for Category {
    fn from(entry: CategoryEntry) -> Self {
        let filters = entry
            .tags
            .into_iter()
            .flat_map(|(key, values)| {
                values
                    .into_iter()
                    .map(move |value| TagFilter::new(key.clone(), value))
            })
            .collect();
        Self::new(entry.name, filters)
    }
}

/// Parse category definitions from JSON text.
pub(crate) fn parse_categories(text: &str, path: &Utf8Path) -> Result<CategorySet, CliError> {
    let entries: Vec<CategoryEntry> =
        serde_json::from_str(text).map_err(|source| CliError::ParseCategories {
            path: path.to_path_buf(),
            source,
        })?;
    CategorySet::new(entries.into_iter().map(Category::from).collect()).map_err(|source| {
        CliError::InvalidCategories {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Read and validate the category file at `path`.
pub(crate) fn load_categories(path: &Utf8Path) -> Result<CategorySet, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::OpenCategories {
        path: path.to_path_buf(),
        source,
    })?;
    parse_categories(&text, path)
}
