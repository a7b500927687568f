//! Core domain types for catchment analysis.
//!
//! A catchment run measures how much of a city's population lives within a
//! travel budget of its points of interest. This crate holds the model and the
//! synchronous half of the pipeline:
//!
//! - [`CategorySet`] classifies [`PointFeature`]s into named categories.
//! - [`IsochroneProvider`], [`FeatureSource`] and [`PopulationService`] are the
//!   seams to routing, OpenStreetMap and population data.
//! - [`Aggregator`] dissolves isochrones into tag and category regions.
//! - [`CityResult::rollup`] builds the whole-city region and
//!   [`Comparison::from_cities`] concatenates cities for ranking.
//!
//! Constructors validate their input and return `Result` so malformed
//! configuration is caught before any network call.

pub mod aggregate;
mod category;
mod feature;
pub mod geometry;
mod isochrone;
mod population;
mod range;
mod region;
pub mod rollup;
mod source;

#[doc(hidden)]
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use aggregate::{Aggregation, AggregationError, Aggregator, ContributingPoint};
pub use category::{Category, CategoryError, CategorySet, TagFilter, TagMatch};
pub use feature::{PointFeature, PointFeatureError, Tags};
pub use isochrone::{
    IsochroneBand, IsochroneError, IsochroneProvider, IsochroneRequest, IsochroneResult,
};
pub use population::{PopulationError, PopulationService};
pub use range::{RangeError, RangeType, Ranges, TravelProfile};
pub use region::{AggregatedRegion, RegionKey, RegionMetrics};
pub use rollup::{CityResult, Comparison, ComparisonDataset, ComparisonRow, PointRow, RankMetric};
pub use source::{FeatureSource, FeatureSourceError};
