//! # Geographic Utilities
//!
//! Stateless geodesic primitives shared by the odometer, the normalizer and
//! the playback index.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`bearing`] | Initial great-circle bearing from one point to another |
//! | [`interpolate_linear`] | Scalar interpolation (speed, distance) |
//! | [`interpolate_circular`] | Heading interpolation along the shorter arc |
//! | [`interpolate_position`] | Linear lat/lon interpolation across short gaps |
//! | [`compute_bounds`] | Bounding box of a GPS track |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use trip_playback::{GpsPoint, geo_utils};
//!
//! let a = GpsPoint::new(51.5074, -0.1278);
//! let b = GpsPoint::new(51.5080, -0.1290);
//!
//! let dist = geo_utils::haversine_distance(&a, &b);
//! let heading = geo_utils::bearing(&a, &b);
//! assert!(dist > 0.0 && dist < 200.0);
//! assert!((0.0..360.0).contains(&heading));
//!
//! // Heading wraps through north rather than sweeping through south
//! assert!(geo_utils::interpolate_circular(350.0, 10.0, 0.5).abs() < 1e-9);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances assume a spherical Earth (mean radius 6,371 km). This matches the
//! incremental distances typically recorded by tracking devices to within a
//! fraction of a percent at sub-kilometer spacing.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Coordinate System
//!
//! All functions expect validated WGS84 coordinates (degrees). Rejecting NaN
//! or out-of-range values is the normalizer's job; nothing here checks.

use geo::{Bearing, Distance, Haversine, Point};

use crate::{Bounds, GpsPoint};

// =============================================================================
// Distance and Bearing
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use trip_playback::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    Haversine::distance(to_point(p1), to_point(p2))
}

/// Initial bearing from `from` to `to` in degrees, in `[0, 360)`.
///
/// North is 0°, east is 90°. Identical points yield 0°.
#[inline]
pub fn bearing(from: &GpsPoint, to: &GpsPoint) -> f64 {
    if from == to {
        return 0.0;
    }
    normalize_course(Haversine::bearing(to_point(from), to_point(to)))
}

/// Wrap any finite angle into `[0, 360)`.
#[inline]
pub fn normalize_course(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shorter-arc difference `to - from`, in `[-180, 180)`.
#[inline]
pub fn angular_delta(from: f64, to: f64) -> f64 {
    (to - from + 540.0).rem_euclid(360.0) - 180.0
}

/// Absolute difference between a recorded course and the bearing from `a` to `b`.
///
/// Result is in `[0, 180]`. Useful for spotting devices that report a stale
/// or bogus heading.
pub fn course_deviation(recorded_course: f64, a: &GpsPoint, b: &GpsPoint) -> f64 {
    angular_delta(recorded_course, bearing(a, b)).abs()
}

// =============================================================================
// Interpolation
// =============================================================================

/// Linear interpolation between two scalars.
///
/// Intended for quantities that vary monotonically between samples, such as
/// cumulative distance or speed magnitude. `t` is not clamped.
#[inline]
pub fn interpolate_linear(v0: f64, v1: f64, t: f64) -> f64 {
    v0 + (v1 - v0) * t
}

/// Interpolate a heading along the shorter arc.
///
/// Result is in `[0, 360)`.
///
/// # Example
///
/// ```rust
/// use trip_playback::geo_utils::interpolate_circular;
///
/// assert!((interpolate_circular(158.0, 159.0, 0.5) - 158.5).abs() < 1e-9);
/// // 350 -> 10 passes through north
/// assert!(interpolate_circular(350.0, 10.0, 0.5).abs() < 1e-9);
/// assert!(interpolate_circular(10.0, 350.0, 0.5).abs() < 1e-9);
/// ```
#[inline]
pub fn interpolate_circular(c0: f64, c1: f64, t: f64) -> f64 {
    normalize_course(c0 + t * angular_delta(c0, c1))
}

/// Linear interpolation of latitude/longitude.
///
/// Only valid across short gaps (sub-kilometer, sub-minute), where the
/// difference from the true great-circle path is far below GPS noise. Callers
/// must not use it to bridge large unobserved gaps.
///
/// Longitude follows the shorter delta, so two points either side of the
/// antimeridian interpolate across it rather than around the globe.
pub fn interpolate_position(p0: &GpsPoint, p1: &GpsPoint, t: f64) -> GpsPoint {
    let latitude = interpolate_linear(p0.latitude, p1.latitude, t);
    let d_lng = angular_delta(p0.longitude, p1.longitude);
    let mut longitude = p0.longitude + d_lng * t;
    if longitude > 180.0 {
        longitude -= 360.0;
    } else if longitude < -180.0 {
        longitude += 360.0;
    }
    GpsPoint::new(latitude, longitude)
}

// =============================================================================
// Track Helpers
// =============================================================================

/// Compute the bounding box of a GPS track.
///
/// For empty input, returns a bounds with MIN/MAX values that will fail any
/// intersection check.
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Returns a single conservative value suitable for square search envelopes.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    // At the equator, 1 degree ≈ 111,320 meters; shrinks with cos(latitude)
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

#[inline]
fn to_point(p: &GpsPoint) -> Point {
    Point::new(p.longitude, p.latitude)
}

// =============================================================================
// Unit Tests
// =============================================================================
