//! Cleaning of raw per-device report streams.
//!
//! Reports are validated (finite, in-range coordinates; finite, non-negative
//! speed; finite course), sorted by timestamp and de-duplicated. Anything that
//! cannot be repaired is dropped, logged and returned alongside the clean
//! stream so one bad report never takes a device down with it.

use chrono::{DateTime, NaiveDateTime};
use log::{debug, warn};

use crate::geo_utils::{course_deviation, haversine_distance, normalize_course};
use crate::{RawReport, Result, Timestamp, TrackError};

/// Only compare course against bearing when the device moved at least this far
const COURSE_CHECK_MIN_METERS: f64 = 10.0;

/// Deviation above which the recorded course is considered suspicious
const COURSE_CHECK_MAX_DEVIATION: f64 = 90.0;

/// Output of [`normalize_reports`].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Strictly increasing by timestamp, course wrapped into [0, 360)
    pub reports: Vec<RawReport>,
    /// One entry per dropped report
    pub rejected: Vec<TrackError>,
}

/// Validate one report and wrap its course into `[0, 360)`.
pub fn validate_report(mut raw: RawReport) -> Result<RawReport> {
    if !raw.point().is_valid() {
        return Err(TrackError::InvalidCoordinate {
            device_id: raw.device_id,
            timestamp: raw.timestamp,
            latitude: raw.latitude,
            longitude: raw.longitude,
        });
    }
    if !raw.speed.is_finite() || raw.speed < 0.0 {
        return Err(TrackError::InvalidMeasurement {
            device_id: raw.device_id,
            timestamp: raw.timestamp,
            field: "speed",
        });
    }
    if !raw.course.is_finite() {
        return Err(TrackError::InvalidMeasurement {
            device_id: raw.device_id,
            timestamp: raw.timestamp,
            field: "course",
        });
    }
    if let Some(total) = raw.total_distance {
        if !total.is_finite() || total < 0.0 {
            return Err(TrackError::InvalidMeasurement {
                device_id: raw.device_id,
                timestamp: raw.timestamp,
                field: "total_distance",
            });
        }
    }
    raw.course = normalize_course(raw.course);
    Ok(raw)
}

/// Clean a single device's raw stream.
///
/// Reports for other devices, invalid reports and conflicting duplicates
/// (same timestamp, different content) are rejected. Exact duplicates are
/// dropped silently. Ordering is repaired with a stable sort, so the first
/// of several same-timestamp reports wins.
///
/// # Example
///
/// ```rust
/// use trip_playback::{normalize_reports, RawReport};
///
/// let raw = vec![
///     RawReport::new("bus-9", 20_000, -1.2901, 36.82, 30.0, 10.0),
///     RawReport::new("bus-9", 10_000, -1.2900, 36.82, 30.0, 370.0),
///     RawReport::new("bus-9", 10_000, -1.2900, 36.82, 30.0, 370.0),
/// ];
///
/// let clean = normalize_reports("bus-9", raw);
/// assert_eq!(clean.reports.len(), 2);
/// assert_eq!(clean.reports[0].timestamp, 10_000);
/// assert_eq!(clean.reports[0].course, 10.0);
/// assert!(clean.rejected.is_empty());
/// ```
pub fn normalize_reports(device_id: &str, raw: Vec<RawReport>) -> Normalized {
    let mut rejected = Vec::new();
    let mut valid = Vec::with_capacity(raw.len());

    for report in raw {
        if report.device_id != device_id {
            let err = TrackError::DeviceMismatch {
                expected: device_id.to_string(),
                actual: report.device_id,
            };
            warn!("Dropping report: {}", err);
            rejected.push(err);
            continue;
        }
        match validate_report(report) {
            Ok(r) => valid.push(r),
            Err(err) => {
                warn!("Dropping report: {}", err);
                rejected.push(err);
            }
        }
    }

    // Stable: among equal timestamps the earliest-received report is kept
    valid.sort_by_key(|r| r.timestamp);

    let mut reports: Vec<RawReport> = Vec::with_capacity(valid.len());
    for report in valid {
        if let Some(prev) = reports.last() {
            if report.timestamp <= prev.timestamp {
                if same_fix(prev, &report) {
                    debug!(
                        "[Normalize] {}: dropping duplicate report at {}",
                        device_id, report.timestamp
                    );
                } else {
                    let err = TrackError::InputOrdering {
                        device_id: device_id.to_string(),
                        timestamp: report.timestamp,
                        previous: prev.timestamp,
                    };
                    warn!("Dropping report: {}", err);
                    rejected.push(err);
                }
                continue;
            }
            log_course_mismatch(prev, &report);
        }
        reports.push(report);
    }

    Normalized { reports, rejected }
}

/// Parse a timestamp given as integer epoch milliseconds or ISO-8601.
///
/// Accepts RFC 3339 (`2023-03-01T10:10:03Z`, with any offset) and naive
/// `YYYY-MM-DD HH:MM:SS[.fff]` or `YYYY-MM-DDTHH:MM:SS[.fff]`, which are taken
/// as UTC.
///
/// ```rust
/// use trip_playback::parse_timestamp;
///
/// assert_eq!(parse_timestamp("1677665403000").unwrap(), 1_677_665_403_000);
/// assert_eq!(parse_timestamp("2023-03-01T10:10:03Z").unwrap(), 1_677_665_403_000);
/// assert_eq!(parse_timestamp("2023-03-01 10:10:03").unwrap(), 1_677_665_403_000);
/// assert!(parse_timestamp("yesterday").is_err());
/// ```
pub fn parse_timestamp(s: &str) -> Result<Timestamp> {
    let s = s.trim();
    if let Ok(millis) = s.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    Err(TrackError::InvalidTimestamp(s.to_string()))
}

fn same_fix(a: &RawReport, b: &RawReport) -> bool {
    a.latitude == b.latitude
        && a.longitude == b.longitude
        && a.speed == b.speed
        && a.course == b.course
}

fn log_course_mismatch(prev: &RawReport, next: &RawReport) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let (a, b) = (prev.point(), next.point());
    if haversine_distance(&a, &b) < COURSE_CHECK_MIN_METERS {
        return;
    }
    let deviation = course_deviation(next.course, &a, &b);
    if deviation > COURSE_CHECK_MAX_DEVIATION {
        debug!(
            "[Normalize] {}: course {:.0} at {} is {:.0} degrees off the travelled bearing",
            next.device_id, next.course, next.timestamp, deviation
        );
    }
}
