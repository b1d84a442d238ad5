//! Geo-velocity: implied travel speed between consecutive logins

use chrono::{DateTime, Utc};

use crate::error::DegradationReason;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A coordinate pair with the moment it was observed.
pub type GeoFix = (f64, f64, DateTime<Utc>);

/// Great-circle distance between two points, in kilometers.
///
/// Haversine over a spherical Earth; accurate to well under a percent,
/// which is far tighter than the 1000 km/h gate needs.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Implied travel speed (km/h) from `prev` to `curr`.
///
/// Returns 0.0 when there is no prior fix (first login carries no travel
/// penalty) and when elapsed time is non-positive (never divide by a
/// non-monotonic clock).
///
/// # Errors
/// Returns a [`DegradationReason`] instead of a speed when a coordinate is
/// non-finite or out of range. The caller chooses what to do with that;
/// the engine logs it and falls open to 0.0.
pub fn geo_velocity_kmh(prev: Option<GeoFix>, curr: GeoFix) -> Result<f64, DegradationReason> {
    let Some((prev_lat, prev_lon, prev_time)) = prev else {
        return Ok(0.0);
    };
    let (curr_lat, curr_lon, curr_time) = curr;

    for coord in [prev_lat, prev_lon, curr_lat, curr_lon] {
        if !coord.is_finite() {
            return Err(DegradationReason::NonFiniteCoordinate);
        }
    }
    if !(-90.0..=90.0).contains(&prev_lat)
        || !(-90.0..=90.0).contains(&curr_lat)
        || !(-180.0..=180.0).contains(&prev_lon)
        || !(-180.0..=180.0).contains(&curr_lon)
    {
        return Err(DegradationReason::CoordinateOutOfRange);
    }

    let elapsed_hours = (curr_time - prev_time).num_milliseconds() as f64 / 3_600_000.0;
    if elapsed_hours <= 0.0 {
        return Ok(0.0);
    }

    let distance_km = haversine_km(prev_lat, prev_lon, curr_lat, curr_lon);
    Ok(distance_km / elapsed_hours)
}
