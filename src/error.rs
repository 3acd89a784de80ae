//! # Errors
//!
//! A single error type covers every recoverable failure in the engine.
//! Conditions that upstream invariants make impossible (an empty trip
//! reaching the playback index, a non-monotonic stream reaching the
//! segmenter) are assertions instead.

use thiserror::Error;

use crate::Timestamp;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Errors raised while cleaning, segmenting or replaying position reports.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum TrackError {
    /// A report arrived at or before the previously accepted timestamp.
    #[error("device {device_id}: report at {timestamp} does not follow {previous}")]
    InputOrdering {
        device_id: String,
        timestamp: Timestamp,
        previous: Timestamp,
    },

    /// Latitude/longitude is NaN, infinite or outside WGS84 range.
    #[error("device {device_id}: invalid coordinate ({latitude}, {longitude}) at {timestamp}")]
    InvalidCoordinate {
        device_id: String,
        timestamp: Timestamp,
        latitude: f64,
        longitude: f64,
    },

    /// Speed or course is unusable.
    #[error("device {device_id}: invalid {field} at {timestamp}")]
    InvalidMeasurement {
        device_id: String,
        timestamp: Timestamp,
        field: &'static str,
    },

    /// A trip was requested from zero reports.
    #[error("device {device_id}: trip has no reports")]
    EmptyTrip { device_id: String },

    /// A report for one device was offered to another device's context.
    #[error("expected device {expected}, got report for {actual}")]
    DeviceMismatch { expected: String, actual: String },

    /// Playback rate is zero or not finite.
    #[error("invalid playback rate {0}")]
    InvalidRate(f64),

    /// Timestamp string is neither RFC 3339 nor integer epoch millis.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

impl TrackError {
    /// Device the error belongs to, if any.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::InputOrdering { device_id, .. }
            | Self::InvalidCoordinate { device_id, .. }
            | Self::InvalidMeasurement { device_id, .. }
            | Self::EmptyTrip { device_id } => Some(device_id),
            Self::DeviceMismatch { actual, .. } => Some(actual),
            Self::InvalidRate(_) | Self::InvalidTimestamp(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_device() {
        let err = TrackError::InputOrdering {
            device_id: "veh-7".to_string(),
            timestamp: 1_000,
            previous: 2_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("veh-7"));
        assert!(msg.contains("1000"));
        assert_eq!(err.device_id(), Some("veh-7"));
    }

    #[test]
    fn test_rate_error_has_no_device() {
        assert_eq!(TrackError::InvalidRate(0.0).device_id(), None);
    }
}
