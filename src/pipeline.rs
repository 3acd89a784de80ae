//! Per-device processing: normalize, annotate, segment.
//!
//! All running state for one device lives in a [`DeviceTracker`], which is
//! passed around explicitly. Devices share nothing, so a fleet can be split
//! across threads with no locking (see [`process_devices`]).

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::normalize::{normalize_reports, validate_report};
use crate::{
    Odometer, RawReport, Result, SegmentConfig, TrackError, Trip, TripSegmenter,
};

/// Streaming context for one device.
///
/// Reports are validated as they arrive; a report that is invalid or does
/// not come after the previous one is rejected without disturbing the
/// device's state. Exact repeats of the previous report are ignored.
///
/// # Example
///
/// ```rust
/// use trip_playback::{DeviceTracker, RawReport, SegmentConfig};
///
/// let mut tracker = DeviceTracker::new("taxi-3", &SegmentConfig::default());
/// assert!(tracker.push(RawReport::new("taxi-3", 0, -1.29, 36.82, 20.0, 0.0)).unwrap().is_none());
/// assert!(tracker.push(RawReport::new("taxi-3", 30_000, -1.2905, 36.82, 20.0, 0.0)).unwrap().is_none());
///
/// // Late report: rejected, state untouched
/// assert!(tracker.push(RawReport::new("taxi-3", 10_000, -1.29, 36.82, 20.0, 0.0)).is_err());
///
/// // Ten minutes of silence closes the first trip
/// let closed = tracker.push(RawReport::new("taxi-3", 630_000, -1.30, 36.82, 20.0, 0.0)).unwrap();
/// assert_eq!(closed.map(|t| t.len()), Some(2));
/// assert_eq!(tracker.finish().map(|t| t.len()), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct DeviceTracker {
    device_id: String,
    config: SegmentConfig,
    odometer: Option<Odometer>,
    segmenter: TripSegmenter,
    last_accepted: Option<RawReport>,
    rejected: usize,
}

impl DeviceTracker {
    pub fn new(device_id: &str, config: &SegmentConfig) -> Self {
        Self {
            device_id: device_id.to_string(),
            config: config.clone(),
            odometer: None,
            segmenter: TripSegmenter::new(config),
            last_accepted: None,
            rejected: 0,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The odometer, once the first report has been accepted.
    pub fn odometer(&self) -> Option<&Odometer> {
        self.odometer.as_ref()
    }

    /// The trip still being extended, if any.
    pub fn current_trip(&self) -> Option<&Trip> {
        self.segmenter.current()
    }

    /// Number of reports rejected so far.
    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    /// Feed the next raw report. Returns a trip when this report closes one.
    pub fn push(&mut self, raw: RawReport) -> Result<Option<Trip>> {
        let report = match self.accept(raw) {
            Ok(Some(report)) => report,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!("Dropping report: {}", err);
                self.rejected += 1;
                return Err(err);
            }
        };

        let config = &self.config;
        let odometer = self
            .odometer
            .get_or_insert_with(|| Odometer::with_config(Odometer::seed_for(&report, config), config));

        self.last_accepted = Some(report.clone());
        Ok(self.segmenter.push(odometer.record(report)))
    }

    /// Close the open trip, e.g. when the reporting window ends.
    pub fn finish(&mut self) -> Option<Trip> {
        self.segmenter.finish()
    }

    /// Validate `raw` against this device's state. `Ok(None)` means an exact
    /// repeat of the last report.
    fn accept(&self, raw: RawReport) -> Result<Option<RawReport>> {
        if raw.device_id != self.device_id {
            return Err(TrackError::DeviceMismatch {
                expected: self.device_id.clone(),
                actual: raw.device_id,
            });
        }
        let raw = validate_report(raw)?;

        let Some(last) = &self.last_accepted else {
            return Ok(Some(raw));
        };
        if raw.timestamp > last.timestamp {
            return Ok(Some(raw));
        }

        let repeat = last.timestamp == raw.timestamp
            && last.latitude == raw.latitude
            && last.longitude == raw.longitude
            && last.speed == raw.speed
            && last.course == raw.course;
        if repeat {
            debug!(
                "[Pipeline] {}: ignoring repeated report at {}",
                self.device_id, raw.timestamp
            );
            return Ok(None);
        }

        Err(TrackError::InputOrdering {
            device_id: self.device_id.clone(),
            timestamp: raw.timestamp,
            previous: last.timestamp,
        })
    }
}

/// Everything derived from one device's report window.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTrips {
    pub device_id: String,
    /// In chronological order
    pub trips: Vec<Trip>,
    /// Reports dropped during cleaning
    pub rejected: Vec<TrackError>,
    /// Odometer hops flagged as probable transport or gap-bridging jumps
    pub long_jumps: usize,
}

impl DeviceTrips {
    /// Odometer reading at the last accepted report.
    pub fn odometer_total(&self) -> Option<f64> {
        self.trips.last().map(|t| t.last().cumulative_distance)
    }
}

/// Batch-process one device's window of raw reports.
///
/// The window is normalized first (sorted, de-duplicated, invalid reports
/// dropped), so unlike [`DeviceTracker`] late reports are placed correctly
/// rather than rejected.
pub fn process_device(device_id: &str, raw: Vec<RawReport>, config: &SegmentConfig) -> DeviceTrips {
    let input_len = raw.len();
    let normalized = normalize_reports(device_id, raw);
    let mut rejected = normalized.rejected;

    let mut tracker = DeviceTracker::new(device_id, config);
    let mut trips = Vec::new();
    for report in normalized.reports {
        match tracker.push(report) {
            Ok(closed) => trips.extend(closed),
            Err(err) => rejected.push(err),
        }
    }
    trips.extend(tracker.finish());

    let long_jumps = tracker.odometer().map_or(0, Odometer::long_jumps);
    info!(
        "[Pipeline] {}: {} reports -> {} trips ({} rejected, {} long jumps)",
        device_id,
        input_len,
        trips.len(),
        rejected.len(),
        long_jumps
    );

    DeviceTrips {
        device_id: device_id.to_string(),
        trips,
        rejected,
        long_jumps,
    }
}

/// Process a mixed stream from many devices.
///
/// Reports are grouped by device and each device is processed independently;
/// with the `parallel` feature the devices run on the rayon thread pool.
/// Output is ordered by device id regardless.
pub fn process_devices(raw: Vec<RawReport>, config: &SegmentConfig) -> Vec<DeviceTrips> {
    let mut by_device: BTreeMap<String, Vec<RawReport>> = BTreeMap::new();
    for report in raw {
        by_device.entry(report.device_id.clone()).or_default().push(report);
    }
    let groups: Vec<(String, Vec<RawReport>)> = by_device.into_iter().collect();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        groups
            .into_par_iter()
            .map(|(device_id, reports)| process_device(&device_id, reports, config))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        groups
            .into_iter()
            .map(|(device_id, reports)| process_device(&device_id, reports, config))
            .collect()
    }
}
