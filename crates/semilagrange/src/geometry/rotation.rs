// Rotated-pole coordinate transforms on the unit sphere

use glam::{DQuat, DVec3};
use std::f64::consts::TAU;

/// A point on the sphere in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Unit vector with z towards the north pole and x through (0, 0)
    pub fn to_unit_vector(self) -> DVec3 {
        let (sin_lat, cos_lat) = self.lat.sin_cos();
        let (sin_lon, cos_lon) = self.lon.sin_cos();
        DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }

    pub fn from_unit_vector(dir: DVec3) -> Self {
        let dir = dir.normalize();
        Self {
            lat: dir.z.clamp(-1.0, 1.0).asin(),
            lon: normalize_longitude(dir.y.atan2(dir.x)),
        }
    }
}

/// Wrap a longitude into [0, 2π)
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + TAU).rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Transform a displacement measured in the frame rotated so that `pole` sits at its origin
/// back to standard latitude/longitude
///
/// # Arguments
/// * `rotated` - Departure offset (lat', lon') in the rotated frame
/// * `pole` - Arrival point, origin of the rotated frame
/// * `epsilon` - Margin keeping the arcsin argument inside its domain
///
/// # Returns
/// Departure point with latitude in (-π/2, π/2) and longitude in [0, 2π)
pub fn to_standard(rotated: LatLon, pole: LatLon, epsilon: f64) -> LatLon {
    let (sin_lat_r, cos_lat_r) = rotated.lat.sin_cos();
    let (sin_lon_r, cos_lon_r) = rotated.lon.sin_cos();
    let (sin_lat_p, cos_lat_p) = pole.lat.sin_cos();

    let sin_lat = sin_lat_r * cos_lat_p + cos_lat_r * cos_lon_r * sin_lat_p;
    let lat = sin_lat.clamp(-1.0 + epsilon, 1.0 - epsilon).asin();

    let num = cos_lat_r * sin_lon_r;
    let den = cos_lat_r * cos_lon_r * cos_lat_p - sin_lat_r * sin_lat_p;
    let lon = normalize_longitude(pole.lon + num.atan2(den));

    LatLon { lat, lon }
}

/// Rotation taking the rotated frame to the standard frame for a given arrival point
pub fn frame_rotation(pole: LatLon) -> DQuat {
    DQuat::from_rotation_z(pole.lon) * DQuat::from_rotation_y(-pole.lat)
}

/// Inverse of [`to_standard`]: express a standard point as an offset in the frame anchored at `pole`
pub fn to_rotated(point: LatLon, pole: LatLon) -> LatLon {
    let local = frame_rotation(pole).inverse() * point.to_unit_vector();
    let local = local.normalize();
    LatLon {
        lat: local.z.clamp(-1.0, 1.0).asin(),
        lon: local.y.atan2(local.x),
    }
}
