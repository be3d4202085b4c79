use geo::{Distance, Haversine, Point};
use rstar::AABB;

const LATITUDE_DEGREE_METERS: f64 = 110574.0;
const LONGITUDE_DEGREE_METERS: f64 = 111320.0;
/// The degree lengths above are ellipsoidal while distances are measured on
/// a sphere, so search boxes get a little slack.
const ENVELOPE_SLACK: f64 = 1.05;

/// Axis-aligned box (`[lon, lat]` corners) containing every point within
/// `radius` meters of the given position.
pub fn compute_envelope(lat: f64, lon: f64, radius: f64) -> AABB<[f64; 2]> {
    let radius = radius * ENVELOPE_SLACK;
    let lat_radius = radius / LATITUDE_DEGREE_METERS;
    let lon_radius = radius / (LONGITUDE_DEGREE_METERS * lat.to_radians().cos());
    AABB::from_corners(
        [lon - lon_radius, lat - lat_radius],
        [lon + lon_radius, lat + lat_radius],
    )
}

/// Great-circle distance in meters between two `[lon, lat]` positions.
pub fn haversine(a: [f64; 2], b: [f64; 2]) -> f64 {
    Haversine::distance(Point::new(a[0], a[1]), Point::new(b[0], b[1]))
}

/// Arithmetic mean of `[lon, lat]` positions.
pub fn centroid(points: &[[f64; 2]]) -> Option<[f64; 2]> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lon, lat) = points
        .iter()
        .fold((0.0, 0.0), |(lon, lat), p| (lon + p[0], lat + p[1]));
    Some([lon / n, lat / n])
}

/// CSV rendering of a list property.
pub fn join_list(items: &[String]) -> String {
    items.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_small_offset() {
        // 0.001 degrees of latitude is about 111 m.
        let d = haversine([77.59, 12.97], [77.59, 12.971]);
        assert!((d - 111.2).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_envelope_contains_radius() {
        let (lat, lon) = (12.97, 77.59);
        let envelope = compute_envelope(lat, lon, 50.0);
        let lower = envelope.lower();
        let upper = envelope.upper();

        let east = [upper[0], lat];
        let north = [lon, upper[1]];
        assert!(haversine([lon, lat], east) >= 50.0);
        assert!(haversine([lon, lat], north) >= 50.0);
        assert!(lower[0] < lon && lower[1] < lat);
    }

    #[test]
    fn test_centroid() {
        assert_eq!(centroid(&[]), None);
        assert_eq!(centroid(&[[1.0, 2.0], [3.0, 4.0]]), Some([2.0, 3.0]));
    }

    #[test]
    fn test_join_list() {
        assert_eq!(join_list(&["06:00:00".to_string(), "07:00:00".to_string()]), "06:00:00; 07:00:00");
        assert_eq!(join_list(&[]), "");
    }
}
