//! Great-circle distance
//!
//! Haversine on a spherical Earth. Both deltas are taken as `b - a`; the
//! result only depends on squared half-angle sines, so it is symmetric.

use crate::domain::types::{Coordinate, PositionSample};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates in kilometres
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two samples in kilometres
#[inline]
pub fn distance_km(a: &PositionSample, b: &PositionSample) -> f64 {
    haversine_km(&a.coordinate, &b.coordinate)
}
