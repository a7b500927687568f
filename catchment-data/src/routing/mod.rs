//! HTTP-based isochrone providers for routing services.
//!
//! This module provides two implementations of
//! [`catchment_core::IsochroneProvider`]: [`OrsIsochroneProvider`] for
//! OpenRouteService and [`ValhallaIsochroneProvider`] for Valhalla.
//! [`RoutingProvider`] wraps either so the backend can be picked at runtime.
//!
//! # Architecture
//!
//! Each provider posts one request per origin and converts the GeoJSON
//! answer into bands. Requests are issued from the caller's task;
//! concurrency is bounded by the task pool that drives the provider, not by
//! the provider itself.

mod backend;
mod bands;
mod http;
mod ors;
mod provider;
mod valhalla;

pub use backend::RoutingProvider;
pub use bands::{RangeProperty, bands_from_collection};
pub use ors::profile_name;
pub use provider::{
    DEFAULT_ORS_URL, DEFAULT_USER_AGENT, OrsIsochroneProvider, OrsProviderConfig,
    ProviderBuildError,
};
pub use valhalla::{
    DEFAULT_VALHALLA_URL, ValhallaIsochroneProvider, ValhallaProviderConfig, costing,
};
