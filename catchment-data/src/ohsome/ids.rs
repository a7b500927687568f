//! Stable numeric identifiers for OSM elements returned by ohsome.

use log::warn;

/// Top two bits encode element type: 00=node, 01=way, 10=relation. Remaining 62 bits carry the raw ID.
const WAY_ID_PREFIX: u64 = 1 << 62;
const REL_ID_PREFIX: u64 = 1 << 63;
const TYPE_ID_MASK: u64 = (1 << 62) - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OsmElementKind {
    Node,
    Way,
    Relation,
}

/// Encode an `@osmId` value such as `way/42` into a single `u64`.
///
/// Returns `None` for unknown element types or identifiers that do not fit.
pub(super) fn encode_osm_id(osm_id: &str) -> Option<u64> {
    let (element, raw) = osm_id.split_once('/')?;
    let kind = match element {
        "node" => OsmElementKind::Node,
        "way" => OsmElementKind::Way,
        "relation" => OsmElementKind::Relation,
        _ => {
            warn!("Skipped OSM element with unknown type: {osm_id}");
            return None;
        }
    };
    let Ok(base) = raw.parse::<u64>() else {
        warn!("Skipped OSM element with malformed identifier: {osm_id}");
        return None;
    };
    if base > TYPE_ID_MASK {
        warn!("Skipped OSM element: {osm_id} exceeds supported maximum {TYPE_ID_MASK}");
        return None;
    }
    let prefix = match kind {
        OsmElementKind::Node => 0,
        OsmElementKind::Way => WAY_ID_PREFIX,
        OsmElementKind::Relation => REL_ID_PREFIX,
    };
    Some(prefix | base)
}
