//! Mapping from coordinates to cells of the MERRA-2 0.5° × 0.625° grid.

use crate::model::GeoPoint;

const LAT_STEP: f64 = 0.5;
const LON_STEP: f64 = 0.625;
const MAX_LAT_INDEX: i64 = 360;
const MAX_LON_INDEX: i64 = 575;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridIndex {
    pub lat: u32,
    pub lon: u32,
}

impl GridIndex {
    /// Out-of-range coordinates land in the nearest edge cell.
    pub fn resolve(point: GeoPoint) -> Self {
        Self {
            lat: clamp_index((point.latitude + 90.0) / LAT_STEP, MAX_LAT_INDEX),
            lon: clamp_index((point.longitude + 180.0) / LON_STEP, MAX_LON_INDEX),
        }
    }
}

fn clamp_index(position: f64, max: i64) -> u32 {
    if position.is_nan() {
        return 0;
    }
    // `as` saturates for infinities
    (position.floor() as i64).clamp(0, max) as u32
}
