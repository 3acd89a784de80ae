//! # Playback Index
//!
//! Immutable, time-indexed view of one trip for random-access replay.
//!
//! The index is a sorted array plus binary search. It carries no cursor or
//! direction, so any number of sessions can share one index through an
//! `Arc` and seek, play forward or play backward independently.
//!
//! ## Sampling Rules
//!
//! | Query time | Result |
//! |------------|--------|
//! | at or before the first report | first report, unmodified |
//! | at or after the last report | last report, unmodified |
//! | between two reports | position, speed, distance interpolated linearly; course along the shorter arc |
//! | between two parked reports | previous report's position and course (no sub-meter jitter) |

use crate::geo_utils::{
    haversine_distance, interpolate_circular, interpolate_linear, interpolate_position,
};
use crate::{PositionReport, Timestamp, Trip, TripSummary};

/// Configuration for playback sessions and sampling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlaybackConfig {
    /// Two parked reports closer than this are drawn at the same spot.
    /// Default: 2.0 meters
    pub stationary_snap_epsilon_meters: f64,

    /// Speed at or below which a report counts as parked, in the feed's
    /// speed unit. Default: 0.5
    pub stationary_speed_threshold: f64,

    /// Rate a new session starts with. Default: 1.0 (real time)
    pub default_rate: f64,

    /// Slowest (most negative) allowed rate. Default: -16.0
    pub min_rate: f64,

    /// Fastest allowed rate. Default: 16.0
    pub max_rate: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            stationary_snap_epsilon_meters: 2.0,
            stationary_speed_threshold: 0.5,
            default_rate: 1.0,
            min_rate: -16.0,
            max_rate: 16.0,
        }
    }
}

/// One rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterpolatedSample {
    /// Epoch milliseconds; fractional while between reports
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub course: f64,
    pub cumulative_distance: f64,
}

impl From<&PositionReport> for InterpolatedSample {
    fn from(r: &PositionReport) -> Self {
        Self {
            timestamp: r.timestamp as f64,
            latitude: r.latitude,
            longitude: r.longitude,
            speed: r.speed,
            course: r.course,
            cumulative_distance: r.cumulative_distance,
        }
    }
}

/// Read-only time index over one trip.
///
/// # Example
///
/// ```rust
/// use trip_playback::{PlaybackConfig, PlaybackIndex, Trip, PositionReport};
///
/// let report = |t: i64, speed: f64, course: f64| PositionReport {
///     device_id: "car-1".to_string(),
///     timestamp: t,
///     latitude: -1.29,
///     longitude: 36.82,
///     speed,
///     course,
///     incremental_distance: 0.0,
///     cumulative_distance: 0.0,
/// };
/// let trip = Trip::from_reports("car-1", vec![report(0, 10.0, 350.0), report(10_000, 20.0, 10.0)]).unwrap();
/// let index = PlaybackIndex::new(trip, &PlaybackConfig::default());
///
/// let mid = index.sample_at(5_000.0);
/// assert!((mid.speed - 15.0).abs() < 1e-9);
/// assert!(mid.course.abs() < 1e-9); // wraps through north
///
/// // Clamped at both ends
/// assert_eq!(index.sample_at(-1.0).speed, 10.0);
/// assert_eq!(index.sample_at(1e15).speed, 20.0);
/// ```
#[derive(Debug, Clone)]
pub struct PlaybackIndex {
    trip: Trip,
    snap_epsilon_meters: f64,
    stationary_speed_threshold: f64,
}

impl PlaybackIndex {
    /// Build the index for a trip.
    ///
    /// # Panics
    ///
    /// If the trip has no reports, which [`Trip`] construction rules out.
    pub fn new(trip: Trip, config: &PlaybackConfig) -> Self {
        assert!(!trip.is_empty(), "playback index built from an empty trip");
        Self {
            trip,
            snap_epsilon_meters: config.stationary_snap_epsilon_meters,
            stationary_speed_threshold: config.stationary_speed_threshold,
        }
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn reports(&self) -> &[PositionReport] {
        self.trip.reports()
    }

    pub fn len(&self) -> usize {
        self.trip.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn start_time(&self) -> Timestamp {
        self.trip.start_time()
    }

    pub fn end_time(&self) -> Timestamp {
        self.trip.end_time()
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time() - self.start_time()
    }

    pub fn summary(&self) -> TripSummary {
        self.trip.summary()
    }

    /// Sample the trip at `t` (epoch milliseconds). O(log n).
    pub fn sample_at(&self, t: f64) -> InterpolatedSample {
        let reports = self.trip.reports();
        let first = self.trip.first();
        let last = self.trip.last();

        if t.is_nan() || t <= first.timestamp as f64 {
            return first.into();
        }
        if t >= last.timestamp as f64 {
            return last.into();
        }

        // first.t < t < last.t, so 1 <= next < len
        let next = reports.partition_point(|r| r.timestamp as f64 <= t);
        let prev = &reports[next - 1];
        let next = &reports[next];

        let span = (next.timestamp - prev.timestamp) as f64;
        let local_t = (t - prev.timestamp as f64) / span;

        let speed = interpolate_linear(prev.speed, next.speed, local_t);
        let cumulative_distance =
            interpolate_linear(prev.cumulative_distance, next.cumulative_distance, local_t);

        let (position, course) = if self.is_stationary(prev, next) {
            (prev.point(), prev.course)
        } else {
            (
                interpolate_position(&prev.point(), &next.point(), local_t),
                interpolate_circular(prev.course, next.course, local_t),
            )
        };

        InterpolatedSample {
            timestamp: t,
            latitude: position.latitude,
            longitude: position.longitude,
            speed,
            course,
            cumulative_distance,
        }
    }

    /// Sample by progress through the trip, `0.0` = start, `1.0` = end.
    pub fn sample_at_fraction(&self, fraction: f64) -> InterpolatedSample {
        let fraction = fraction.clamp(0.0, 1.0);
        self.sample_at(self.start_time() as f64 + fraction * self.duration_ms() as f64)
    }

    fn is_stationary(&self, prev: &PositionReport, next: &PositionReport) -> bool {
        prev.speed <= self.stationary_speed_threshold
            && next.speed <= self.stationary_speed_threshold
            && haversine_distance(&prev.point(), &next.point()) <= self.snap_epsilon_meters
    }
}
