//! # Trip Playback
//!
//! GPS trip segmentation and time-indexed playback for historical vehicle tracks.
//!
//! This library provides:
//! - Cleaning of raw per-device position streams (validation, ordering, dedup)
//! - A device-lifetime odometer that is never reset between trips
//! - Idle-gap trip segmentation, in batch or streaming form
//! - An immutable per-trip playback index with O(log n) interpolated lookups
//! - Playback sessions with play/pause/seek and variable (including reverse) rate
//!
//! ## Features
//!
//! - **`parallel`** - Process independent devices in parallel with rayon
//! - **`serde`** - Derive `Serialize`/`Deserialize` on reports, trips, samples and configs
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use trip_playback::{process_device, EngineConfig, RawReport, TripCatalog};
//!
//! let reports: Vec<RawReport> = (0..10)
//!     .map(|i| RawReport::new("truck-1", i * 10_000, -1.29 + i as f64 * 0.0005, 36.82, 40.0, 0.0))
//!     .collect();
//!
//! let config = EngineConfig::default();
//! let device = process_device("truck-1", reports, &config.segment);
//! assert_eq!(device.trips.len(), 1);
//!
//! let catalog = TripCatalog::new(vec![device]);
//! let summary = &catalog.summaries()[0];
//! let mut session = catalog.session(&summary.trip_id, &config.playback).unwrap();
//!
//! session.play(4.0).unwrap();
//! let sample = session.tick(Duration::from_secs(5));
//! assert_eq!(sample.timestamp, 20_000.0);
//! ```

use std::sync::Arc;

pub mod error;
pub use error::{Result, TrackError};

pub mod geo_utils;

pub mod normalize;
pub use normalize::{normalize_reports, parse_timestamp, validate_report, Normalized};

pub mod odometer;
pub use odometer::{annotate_reports, Odometer};

pub mod segment;
pub use segment::{segment_trips, SegmentConfig, SegmenterState, TripSegmenter};

pub mod playback;
pub use playback::{InterpolatedSample, PlaybackConfig, PlaybackIndex};

pub mod controller;
pub use controller::{PlaybackController, PlaybackState};

pub mod pipeline;
pub use pipeline::{process_device, process_devices, DeviceTracker, DeviceTrips};

pub mod catalog;
pub use catalog::TripCatalog;

// ============================================================================
// Core Types
// ============================================================================

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use trip_playback::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box of a trip.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// A position report as received from the report store, before cleaning.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawReport {
    pub device_id: String,
    /// Epoch milliseconds
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed as reported by the device (km/h in typical feeds)
    pub speed: f64,
    /// Heading in degrees; wrapped into [0, 360) during normalization
    pub course: f64,
    /// Device odometer in meters, if the store carries one. Only the first
    /// report of a stream is consulted, to seed the running total.
    pub total_distance: Option<f64>,
}

impl RawReport {
    /// Create a report without an odometer seed.
    pub fn new(
        device_id: &str,
        timestamp: Timestamp,
        latitude: f64,
        longitude: f64,
        speed: f64,
        course: f64,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp,
            latitude,
            longitude,
            speed,
            course,
            total_distance: None,
        }
    }

    /// Attach a pre-seeded odometer value.
    pub fn with_total_distance(mut self, meters: f64) -> Self {
        self.total_distance = Some(meters);
        self
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A cleaned position report annotated with odometer distances.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionReport {
    pub device_id: String,
    /// Epoch milliseconds, strictly increasing within a device stream
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    /// Heading in [0, 360)
    pub course: f64,
    /// Meters from the previous report of this device (0 for the first)
    pub incremental_distance: f64,
    /// Device-lifetime odometer in meters
    pub cumulative_distance: f64,
}

impl PositionReport {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A maximal run of reports with no idle gap above the configured threshold.
///
/// Always holds at least one report; the fields are private so that
/// invariant cannot be broken after construction. Deserialization goes
/// through [`Trip::from_reports`] and fails on the same input it rejects.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "TripRepr"))]
pub struct Trip {
    device_id: String,
    reports: Vec<PositionReport>,
}

/// Unchecked wire shape of a [`Trip`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct TripRepr {
    device_id: String,
    reports: Vec<PositionReport>,
}

#[cfg(feature = "serde")]
impl TryFrom<TripRepr> for Trip {
    type Error = TrackError;

    fn try_from(repr: TripRepr) -> Result<Self> {
        Trip::from_reports(&repr.device_id, repr.reports)
    }
}

impl Trip {
    /// Open a trip with its first report.
    pub(crate) fn start(first: PositionReport) -> Self {
        Self {
            device_id: first.device_id.clone(),
            reports: vec![first],
        }
    }

    pub(crate) fn push(&mut self, report: PositionReport) {
        self.reports.push(report);
    }

    /// Build a trip from reports supplied by an external store.
    ///
    /// Fails on an empty sequence, on reports from another device, and on
    /// timestamps that are not strictly increasing.
    pub fn from_reports(device_id: &str, reports: Vec<PositionReport>) -> Result<Self> {
        if reports.is_empty() {
            return Err(TrackError::EmptyTrip { device_id: device_id.to_string() });
        }
        if let Some(other) = reports.iter().find(|r| r.device_id != device_id) {
            return Err(TrackError::DeviceMismatch {
                expected: device_id.to_string(),
                actual: other.device_id.clone(),
            });
        }
        if let Some(w) = reports.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(TrackError::InputOrdering {
                device_id: device_id.to_string(),
                timestamp: w[1].timestamp,
                previous: w[0].timestamp,
            });
        }
        Ok(Self { device_id: device_id.to_string(), reports })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn reports(&self) -> &[PositionReport] {
        &self.reports
    }

    pub fn first(&self) -> &PositionReport {
        &self.reports[0]
    }

    pub fn last(&self) -> &PositionReport {
        &self.reports[self.reports.len() - 1]
    }

    pub fn start_time(&self) -> Timestamp {
        self.first().timestamp
    }

    pub fn end_time(&self) -> Timestamp {
        self.last().timestamp
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Never true for a trip built through this crate.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Odometer difference between the last and first report, in meters.
    pub fn distance(&self) -> f64 {
        self.last().cumulative_distance - self.first().cumulative_distance
    }

    /// Stable identifier: boundaries are deterministic, so the device and
    /// start time identify a trip across recomputations.
    pub fn id(&self) -> String {
        format!("{}:{}", self.device_id, self.start_time())
    }

    pub fn bounds(&self) -> Bounds {
        let points: Vec<GpsPoint> = self.reports.iter().map(|r| r.point()).collect();
        geo_utils::compute_bounds(&points)
    }

    /// Summary row for a trip picker.
    pub fn summary(&self) -> TripSummary {
        TripSummary {
            trip_id: self.id(),
            device_id: self.device_id.clone(),
            start_time: self.start_time(),
            end_time: self.end_time(),
            distance_meters: self.distance(),
            point_count: self.reports.len(),
            bounds: self.bounds(),
        }
    }

    /// Consume the trip, yielding its reports.
    pub fn into_reports(self) -> Vec<PositionReport> {
        self.reports
    }
}

/// Trip picker row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripSummary {
    pub trip_id: String,
    pub device_id: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub distance_meters: f64,
    pub point_count: usize,
    pub bounds: Bounds,
}

/// All engine settings in one place.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub segment: SegmentConfig,
    pub playback: PlaybackConfig,
}

/// Shared handle to an immutable trip index.
pub type SharedIndex = Arc<PlaybackIndex>;

// ============================================================================
// Tests
// ============================================================================
