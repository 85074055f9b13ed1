use common::domain::{GeoPoint, Zone, ZoneShape};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Even-odd ray casting over a ring of `[lng, lat]` vertices.
///
/// The crossing test is half-open: for an axis-aligned ring a point on the
/// bottom or left boundary is inside and a point on the top or right boundary
/// is outside, so of the four corners only the bottom-left one is inside.
/// Rings with fewer than three vertices contain nothing.
pub fn point_in_polygon(point: GeoPoint, ring: &[[f64; 2]]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Great-circle distance in meters
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

pub fn zone_contains(zone: &Zone, point: GeoPoint) -> bool {
    match &zone.shape {
        ZoneShape::Polygon(ring) => point_in_polygon(point, ring),
        ZoneShape::Circle { center, radius } => {
            haversine_distance_m(point, GeoPoint::from_lng_lat(*center)) <= *radius
        }
    }
}
