//! Travel budgets ("ranges"), their unit and the travel profile.
//!
//! # Examples
//! ```
//! use catchment_core::{RangeType, Ranges, TravelProfile};
//!
//! let ranges = Ranges::new(vec![1200, 600, 1800])?;
//! assert_eq!(ranges.as_slice(), &[600, 1200, 1800]);
//! assert_eq!(RangeType::Time.as_str(), "time");
//! assert_eq!("pedestrian".parse::<TravelProfile>(), Ok(TravelProfile::Pedestrian));
//! # Ok::<(), catchment_core::RangeError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors returned by [`Ranges::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// No ranges were supplied.
    #[error("at least one range is required")]
    Empty,
    /// A range of zero seconds or metres was supplied.
    #[error("ranges must be positive")]
    Zero,
    /// The same range was supplied twice.
    #[error("range {0} is listed more than once")]
    Duplicate(u32),
}

/// Non-empty, strictly ascending list of positive travel budgets.
///
/// Values are seconds for [`RangeType::Time`] and metres for
/// [`RangeType::Distance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranges(Vec<u32>);

impl Ranges {
    /// Validate and sort the supplied budgets.
    pub fn new(mut values: Vec<u32>) -> Result<Self, RangeError> {
        if values.is_empty() {
            return Err(RangeError::Empty);
        }
        if values.contains(&0) {
            return Err(RangeError::Zero);
        }
        values.sort_unstable();
        if let Some(window) = values.windows(2).find(|pair| pair.first() == pair.last()) {
            return Err(RangeError::Duplicate(window.first().copied().unwrap_or_default()));
        }
        Ok(Self(values))
    }

    /// Borrow the ranges in ascending order.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Return `true` when `value` is one of the configured ranges.
    #[must_use]
    pub fn contains(&self, value: u32) -> bool {
        self.0.binary_search(&value).is_ok()
    }
}

/// Unit of a travel budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RangeType {
    /// Budgets are travel times in seconds.
    #[default]
    Time,
    /// Budgets are travel distances in metres.
    Distance,
}

impl RangeType {
    /// Return the lowercase name used by routing backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Distance => "distance",
        }
    }
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time" => Ok(Self::Time),
            "distance" => Ok(Self::Distance),
            _ => Err(format!("unknown range type '{s}'")),
        }
    }
}

/// Mode of travel used when requesting isochrones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TravelProfile {
    /// Motor car.
    #[default]
    Car,
    /// Walking.
    Pedestrian,
    /// Bicycle.
    Bike,
}

impl TravelProfile {
    /// Return the lowercase profile name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Pedestrian => "pedestrian",
            Self::Bike => "bike",
        }
    }
}

impl fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "car" => Ok(Self::Car),
            "pedestrian" => Ok(Self::Pedestrian),
            "bike" => Ok(Self::Bike),
            _ => Err(format!("unknown travel profile '{s}'")),
        }
    }
}
