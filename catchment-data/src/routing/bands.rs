//! Conversion of isochrone `FeatureCollection` answers into bands.
//!
//! Both supported backends answer with one polygonal feature per range and
//! repeat the range in a numeric property. They differ only in the property
//! name and in its unit, so [`RangeProperty`] captures both.

use catchment_core::{IsochroneBand, IsochroneError};
use geo::{Geometry, MultiPolygon};
use geojson::FeatureCollection;

/// Feature property holding a band's range and its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeProperty {
    /// Property name, e.g. `value` or `contour`.
    pub name: &'static str,
    /// Seconds or metres per unit of the property.
    pub scale: f64,
}

/// Convert an isochrone `FeatureCollection` into bands.
///
/// Features without geometry are skipped; features with a non-polygonal
/// geometry or without a numeric range property are parse errors.
pub fn bands_from_collection(
    collection: FeatureCollection,
    property: RangeProperty,
) -> Result<Vec<IsochroneBand>, IsochroneError> {
    let mut bands = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let value = feature
            .property(property.name)
            .and_then(serde_json::Value::as_f64)
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or_else(|| {
                parse_error(&format!(
                    "isochrone feature lacks a numeric {}",
                    property.name
                ))
            })?;
        let Some(raw) = feature.geometry else {
            continue;
        };
        let geometry = match Geometry::<f64>::try_from(raw)
            .map_err(|err| parse_error(&format!("invalid isochrone geometry: {err}")))?
        {
            Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            Geometry::MultiPolygon(multi) => multi,
            _ => return Err(parse_error("isochrone geometry is not polygonal")),
        };
        bands.push(IsochroneBand {
            range: to_range(value, property.scale)?,
            geometry,
        });
    }
    Ok(bands)
}

#[expect(
    clippy::float_arithmetic,
    reason = "ranges arrive as scaled floating-point values"
)]
#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is rounded, non-negative and bounded by u32::MAX"
)]
#[expect(
    clippy::cast_sign_loss,
    reason = "negative values are rejected before conversion"
)]
fn to_range(value: f64, scale: f64) -> Result<u32, IsochroneError> {
    let rounded = (value * scale).round();
    if !(0.0..=f64::from(u32::MAX)).contains(&rounded) {
        return Err(parse_error("isochrone range out of bounds"));
    }
    Ok(rounded as u32)
}

fn parse_error(message: &str) -> IsochroneError {
    IsochroneError::ParseError {
        message: message.to_owned(),
    }
}
