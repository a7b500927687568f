//! OpenRouteService isochrone request and response types.
//!
//! The isochrone endpoint accepts a JSON body describing one or more
//! locations and answers with a GeoJSON `FeatureCollection` holding one
//! polygon per range. Each feature's `value` property repeats the range the
//! polygon was computed for.
//!
//! See: <https://openrouteservice.org/dev/#/api-docs/v2/isochrones>

use catchment_core::{IsochroneRequest, TravelProfile};
use serde::Serialize;

use super::bands::RangeProperty;

/// Body of a `POST /v2/isochrones/{profile}` request.
#[derive(Debug, Serialize, PartialEq)]
pub struct IsochroneBody {
    /// Origins as `[lon, lat]` pairs.
    pub locations: Vec<[f64; 2]>,
    /// Budgets in seconds or metres.
    pub range: Vec<u32>,
    /// `time` or `distance`.
    pub range_type: &'static str,
    /// Polygon smoothing factor; zero keeps the raw outline.
    pub smoothing: u8,
}

impl IsochroneBody {
    /// Build the body for a single-origin request.
    #[must_use]
    pub fn from_request(request: &IsochroneRequest<'_>) -> Self {
        Self {
            locations: vec![[request.location.x, request.location.y]],
            range: request.ranges.as_slice().to_vec(),
            range_type: request.range_type.as_str(),
            smoothing: 0,
        }
    }
}

/// Routing profile name understood by OpenRouteService.
#[must_use]
pub const fn profile_name(profile: TravelProfile) -> &'static str {
    match profile {
        TravelProfile::Car => "driving-car",
        TravelProfile::Pedestrian => "foot-walking",
        TravelProfile::Bike => "cycling-regular",
    }
}

/// Range property of OpenRouteService isochrone features, in native units.
pub const ORS_RANGE: RangeProperty = RangeProperty {
    name: "value",
    scale: 1.0,
};

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests use expect for readable failures")]
mod tests {
    use super::*;
    use crate::routing::bands::bands_from_collection;
    use catchment_core::{RangeType, Ranges};
    use geojson::FeatureCollection;
    use geo::Coord;
    use rstest::rstest;

    const RESPONSE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"group_index": 0, "value": 300.0, "center": [8.68, 49.41]},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[8.67, 49.40], [8.69, 49.40], [8.69, 49.42], [8.67, 49.40]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"group_index": 0, "value": 600.0},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[8.66, 49.39], [8.70, 49.39], [8.70, 49.43], [8.66, 49.39]]]
                }
            }
        ]
    }"#;

    #[rstest]
    fn body_carries_location_and_ranges() {
        let ranges = Ranges::new(vec![600, 300]).expect("valid ranges");
        let request = IsochroneRequest {
            location: Coord { x: 8.68, y: 49.41 },
            ranges: &ranges,
            range_type: RangeType::Distance,
            profile: TravelProfile::Pedestrian,
        };

        let body = serde_json::to_value(IsochroneBody::from_request(&request))
            .expect("body serialises");

        assert_eq!(
            body,
            serde_json::json!({
                "locations": [[8.68, 49.41]],
                "range": [300, 600],
                "range_type": "distance",
                "smoothing": 0
            })
        );
    }

    #[rstest]
    #[case(TravelProfile::Car, "driving-car")]
    #[case(TravelProfile::Pedestrian, "foot-walking")]
    #[case(TravelProfile::Bike, "cycling-regular")]
    fn profiles_map_to_routing_names(#[case] profile: TravelProfile, #[case] expected: &str) {
        assert_eq!(profile_name(profile), expected);
    }

    #[rstest]
    fn collection_converts_to_bands() {
        let collection: FeatureCollection = RESPONSE.parse().expect("valid GeoJSON");

        let bands = bands_from_collection(collection, ORS_RANGE).expect("bands parse");

        let ranges: Vec<_> = bands.iter().map(|band| band.range).collect();
        assert_eq!(ranges, vec![300, 600]);
        assert!(bands.iter().all(|band| band.geometry.0.len() == 1));
    }
}
