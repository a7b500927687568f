//! Error types emitted by the catchment CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use catchment_core::CategoryError;
use catchment_data::routing::ProviderBuildError;
use catchment_data::{ExportError, GridError, OhsomeBuildError};
use thiserror::Error;

/// Errors emitted by the catchment CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option holds a value outside its domain.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    /// The configured routing provider is not supported.
    #[error("unknown routing provider {name:?} (expected ors or valhalla)")]
    UnknownProvider { name: String },
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// The output directory exists but is not a directory.
    #[error("output directory {path:?} is not a directory")]
    OutputDirectoryNotDirectory { path: Utf8PathBuf },
    /// Opening the category file failed.
    #[error("failed to open categories at {path:?}: {source}")]
    OpenCategories {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Category JSON could not be decoded.
    #[error("failed to parse categories JSON at {path:?}: {source}")]
    ParseCategories {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The category definitions failed validation.
    #[error("categories in {path:?} failed validation: {source}")]
    InvalidCategories {
        path: Utf8PathBuf,
        #[source]
        source: CategoryError,
    },
    /// Loading the population grid failed.
    #[error(transparent)]
    LoadPopulation(#[from] GridError),
    /// Constructing the isochrone provider failed.
    #[error("failed to build isochrone provider for {base_url:?}: {source}")]
    BuildIsochroneProvider {
        base_url: String,
        #[source]
        source: ProviderBuildError,
    },
    /// Constructing the feature source failed.
    #[error("failed to build feature source: {0}")]
    BuildFeatureSource(#[from] OhsomeBuildError),
    /// Starting the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Writing result files failed.
    #[error(transparent)]
    Export(#[from] ExportError),
}
