use std::str::FromStr;

use h3o::CellIndex;
use h3o::LatLng;

use crate::model::GeoPoint;

/// Centre of a hex-encoded H3 cell as a GeoJSON point.
/// Anything that does not decode lands on the origin.
pub fn geo_point(location: &str) -> GeoPoint {
    match CellIndex::from_str(location.trim()) {
        Ok(cell) => {
            let centre = LatLng::from(cell);
            GeoPoint::new(centre.lng(), centre.lat())
        },
        Err(_) => GeoPoint::origin(),
    }
}
