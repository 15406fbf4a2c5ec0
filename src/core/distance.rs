use crate::models::Coordinates;

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers, unrounded
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two optional locations, rounded to one decimal place
///
/// Returns `None` when either side has no coordinates.
pub fn distance_km(a: Option<Coordinates>, b: Option<Coordinates>) -> Option<f64> {
    let (a, b) = a.zip(b)?;
    let km = haversine_distance(a.lat, a.lon, b.lat, b.lon);
    Some((km * 10.0).round() / 10.0)
}

/// Points awarded for proximity
///
/// 50 / 30 / 15 / 5 / 0 for under 5 / 25 / 50 / 100 km / further. Unknown distance scores 0.
#[inline]
pub fn distance_band(distance_km: Option<f64>) -> u32 {
    match distance_km {
        Some(d) if d < 5.0 => 50,
        Some(d) if d < 25.0 => 30,
        Some(d) if d < 50.0 => 15,
        Some(d) if d < 100.0 => 5,
        _ => 0,
    }
}

/// Human-readable distance label
pub fn format_distance(distance_km: f64) -> String {
    if distance_km < 1.0 {
        "less than 1 km away".to_string()
    } else if distance_km < 10.0 {
        format!("{:.1} km away", distance_km)
    } else {
        format!("{} km away", distance_km.round() as u64)
    }
}
