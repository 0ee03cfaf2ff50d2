use serde::Serialize;

/// Meters in one arc-minute. Flat-earth approximation, drifts at high latitudes.
pub const METERS_PER_ARC_MINUTE: f64 = 1602.0;

/// Closed five-point ring in (lon, lat) order; the last point repeats the first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundingBox(pub [[f64; 2]; 5]);

impl BoundingBox {
    pub fn points(&self) -> &[[f64; 2]; 5] {
        &self.0
    }

    /// GeoJSON polygon with the ring as its only shell.
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [self.0],
        })
    }
}

/// Box of `w` x `h` meters centred on (`lon`, `lat`).
///
/// Sizes are halved with floor division before conversion, so odd sizes lose a
/// meter and negative sizes mirror the ring.
/// Corners always come out NE, NW, SW, SE, NE; `_ccw` is accepted for callers
/// that pass an orientation but does not change the ring.
pub fn create_box(lon: f64, lat: f64, w: i64, h: i64, _ccw: bool) -> BoundingBox {
    let h_deg = h.div_euclid(2) as f64 / (60.0 * METERS_PER_ARC_MINUTE);
    let w_deg = w.div_euclid(2) as f64 / (60.0 * METERS_PER_ARC_MINUTE);
    BoundingBox([
        [lon + w_deg, lat + h_deg],
        [lon - w_deg, lat + h_deg],
        [lon - w_deg, lat - h_deg],
        [lon + w_deg, lat - h_deg],
        [lon + w_deg, lat + h_deg],
    ])
}
