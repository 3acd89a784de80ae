//! # Trip Segmentation
//!
//! Splits one device's cleaned report stream into trips using an idle-gap
//! rule: a trip ends when the next report is more than
//! [`SegmentConfig::idle_gap_threshold_secs`] after the previous one.
//!
//! ## Algorithm
//!
//! A two-state machine (`Idle`, `InTrip`) run in a single left-to-right pass:
//!
//! 1. `Idle` + report: open a trip with the report as its first point
//! 2. `InTrip` + report within the gap: append
//! 3. `InTrip` + report beyond the gap: emit the open trip, open a new one
//!
//! Decisions are never revisited, so segmentation is O(n) and the batch and
//! streaming forms produce identical boundaries. Speed plays no part: a trip
//! made entirely of parked reports, or a lone report between two long gaps,
//! is a trip in its own right.

use crate::{PositionReport, Trip};

/// Configuration for segmentation and odometer bookkeeping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentConfig {
    /// Largest gap between consecutive reports that stays inside one trip.
    /// Default: 120 seconds
    pub idle_gap_threshold_secs: u64,

    /// Odometer start value for devices that do not report their own.
    /// Default: 0.0 meters
    pub odometer_seed_meters: f64,

    /// Implied speed above which an odometer hop is flagged as a probable
    /// transport event (ferry, tow truck, GPS glitch). Still counted.
    /// Default: 300 km/h
    pub transport_speed_threshold_kmh: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            idle_gap_threshold_secs: 120,
            odometer_seed_meters: 0.0,
            transport_speed_threshold_kmh: 300.0,
        }
    }
}

impl SegmentConfig {
    /// Threshold in milliseconds, saturating at `i64::MAX`.
    pub fn idle_gap_ms(&self) -> i64 {
        i64::try_from(self.idle_gap_threshold_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }
}

/// Segmenter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    Idle,
    InTrip,
}

/// Incremental trip segmenter for a single device.
///
/// # Example
///
/// ```rust
/// use trip_playback::odometer::annotate_reports;
/// use trip_playback::{RawReport, SegmentConfig, TripSegmenter};
///
/// let config = SegmentConfig::default();
/// let mut segmenter = TripSegmenter::new(&config);
/// let reports = annotate_reports(vec![
///     RawReport::new("van-2", 0, -1.2900, 36.82, 30.0, 0.0),
///     RawReport::new("van-2", 60_000, -1.2905, 36.82, 30.0, 0.0),
///     RawReport::new("van-2", 600_000, -1.2950, 36.82, 30.0, 0.0),
/// ], &config);
///
/// let mut closed = Vec::new();
/// for report in reports {
///     closed.extend(segmenter.push(report));
/// }
/// closed.extend(segmenter.finish());
///
/// assert_eq!(closed.len(), 2);
/// assert_eq!(closed[0].len(), 2);
/// assert_eq!(closed[1].len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TripSegmenter {
    idle_gap_ms: i64,
    current: Option<Trip>,
}

impl TripSegmenter {
    pub fn new(config: &SegmentConfig) -> Self {
        Self {
            idle_gap_ms: config.idle_gap_ms(),
            current: None,
        }
    }

    pub fn state(&self) -> SegmenterState {
        if self.current.is_some() {
            SegmenterState::InTrip
        } else {
            SegmenterState::Idle
        }
    }

    /// The trip currently being built, if any.
    pub fn current(&self) -> Option<&Trip> {
        self.current.as_ref()
    }

    /// Feed the next report. Returns the previous trip if this report closed it.
    ///
    /// # Panics
    ///
    /// If `report` belongs to a different device than the open trip, or does
    /// not come strictly after the open trip's last report. Both are
    /// excluded by normalization.
    pub fn push(&mut self, report: PositionReport) -> Option<Trip> {
        let Some(trip) = self.current.as_mut() else {
            self.current = Some(Trip::start(report));
            return None;
        };

        let last = trip.last();
        assert_eq!(
            last.device_id, report.device_id,
            "segmenter received reports from two devices"
        );
        assert!(
            report.timestamp > last.timestamp,
            "segmenter input not strictly increasing: {} after {}",
            report.timestamp,
            last.timestamp
        );

        if report.timestamp - last.timestamp <= self.idle_gap_ms {
            trip.push(report);
            None
        } else {
            self.current.replace(Trip::start(report))
        }
    }

    /// Close and return the open trip.
    pub fn finish(&mut self) -> Option<Trip> {
        self.current.take()
    }
}

/// Segment a whole normalized, annotated stream.
///
/// Concatenating the returned trips' reports reproduces `reports` exactly.
pub fn segment_trips(reports: Vec<PositionReport>, config: &SegmentConfig) -> Vec<Trip> {
    let mut segmenter = TripSegmenter::new(config);
    let mut trips = Vec::new();
    for report in reports {
        trips.extend(segmenter.push(report));
    }
    trips.extend(segmenter.finish());
    trips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odometer::annotate_reports;
    use crate::test_support::{hms, report};
    use crate::{RawReport, Timestamp};

    fn at(t: Timestamp) -> PositionReport {
        report("d1", t, -1.29, 36.82, 30.0, 90.0)
    }

    fn boundaries(trips: &[Trip]) -> Vec<(Timestamp, Timestamp)> {
        trips.iter().map(|t| (t.start_time(), t.end_time())).collect()
    }

    /// Three pre-grouped segments in the style of a device fixture: 10-30s
    /// sampling inside a segment, gaps of 2m01s and 9h between segments.
    fn fixture() -> Vec<Vec<RawReport>> {
        fn segment(times: &[Timestamp], lat0: f64) -> Vec<RawReport> {
            times
                .iter()
                .enumerate()
                .map(|(i, &t)| RawReport::new("ke-114", t, lat0 - i as f64 * 0.0004, 36.81, 47.0, 158.0))
                .collect()
        }
        vec![
            segment(&[hms(10, 10, 3), hms(10, 10, 13), hms(10, 10, 33), hms(10, 12, 33)], -1.28),
            segment(&[hms(10, 14, 34), hms(10, 14, 44), hms(10, 15, 14)], -1.30),
            segment(&[hms(19, 15, 14)], -1.31),
        ]
    }

    #[test]
    fn test_reproduces_fixture_segments() {
        let segments = fixture();
        let flat: Vec<RawReport> = segments.iter().flatten().cloned().collect();
        let trips = segment_trips(annotate_reports(flat, &SegmentConfig::default()), &SegmentConfig::default());

        assert_eq!(trips.len(), segments.len());
        for (trip, segment) in trips.iter().zip(&segments) {
            let got: Vec<Timestamp> = trip.reports().iter().map(|r| r.timestamp).collect();
            let want: Vec<Timestamp> = segment.iter().map(|r| r.timestamp).collect();
            assert_eq!(got, want);
        }
    }

    #[test]
    fn test_gap_equal_to_threshold_stays_in_trip() {
        let trips = segment_trips(vec![at(0), at(120_000), at(240_001)], &SegmentConfig::default());
        assert_eq!(boundaries(&trips), vec![(0, 120_000), (240_001, 240_001)]);
    }

    #[test]
    fn test_single_point_trip_not_merged() {
        let input = vec![at(0), at(10_000), at(1_000_000), at(2_000_000), at(2_010_000)];
        let trips = segment_trips(input, &SegmentConfig::default());
        assert_eq!(trips.len(), 3);
        assert_eq!(trips[1].len(), 1);
    }

    #[test]
    fn test_parked_trip_kept() {
        let parked: Vec<PositionReport> = (0..5)
            .map(|i| report("d1", i * 60_000, -1.29, 36.82, 0.0, 0.0))
            .collect();
        let trips = segment_trips(parked, &SegmentConfig::default());
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].len(), 5);
    }

    #[test]
    fn test_completeness_and_determinism() {
        let input: Vec<PositionReport> = [0, 5, 200, 210, 400, 401, 402, 1000]
            .iter()
            .map(|s| at(s * 1000))
            .collect();

        let first = segment_trips(input.clone(), &SegmentConfig::default());
        let second = segment_trips(input.clone(), &SegmentConfig::default());
        assert_eq!(first, second);

        let rejoined: Vec<PositionReport> = first.into_iter().flat_map(Trip::into_reports).collect();
        assert_eq!(rejoined, input);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let input: Vec<PositionReport> = [0, 200, 400].iter().map(|s| at(s * 1000)).collect();
        let strict = segment_trips(input.clone(), &SegmentConfig::default());
        let relaxed = segment_trips(
            input,
            &SegmentConfig { idle_gap_threshold_secs: 300, ..SegmentConfig::default() },
        );
        assert_eq!(strict.len(), 3);
        assert_eq!(relaxed.len(), 1);
    }

    #[test]
    fn test_huge_threshold_saturates() {
        let config = SegmentConfig { idle_gap_threshold_secs: u64::MAX, ..SegmentConfig::default() };
        assert_eq!(config.idle_gap_ms(), i64::MAX);
        let edge = SegmentConfig { idle_gap_threshold_secs: i64::MAX as u64, ..SegmentConfig::default() };
        assert_eq!(edge.idle_gap_ms(), i64::MAX);

        let trips = segment_trips(vec![at(0), at(1_000), at(86_400_000)], &config);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].len(), 3);
    }

    #[test]
    fn test_streaming_state_transitions() {
        let mut seg = TripSegmenter::new(&SegmentConfig::default());
        assert_eq!(seg.state(), SegmenterState::Idle);
        assert!(seg.push(at(0)).is_none());
        assert_eq!(seg.state(), SegmenterState::InTrip);
        assert!(seg.push(at(30_000)).is_none());
        assert_eq!(seg.current().map(Trip::len), Some(2));

        let closed = seg.push(at(500_000)).unwrap();
        assert_eq!(closed.end_time(), 30_000);
        assert_eq!(seg.current().map(Trip::start_time), Some(500_000));

        assert!(seg.finish().is_some());
        assert_eq!(seg.state(), SegmenterState::Idle);
        assert!(seg.finish().is_none());
    }

    #[test]
    fn test_trip_distance_spans_odometer() {
        let raw: Vec<RawReport> = fixture().into_iter().flatten().collect();
        let reports = annotate_reports(raw, &SegmentConfig::default());
        let trips = segment_trips(reports, &SegmentConfig::default());

        let total: f64 = trips.iter().map(Trip::distance).sum();
        let overall = trips.last().unwrap().last().cumulative_distance;
        // Inter-trip hops are on the odometer but belong to no trip
        assert!(total < overall);
        assert_eq!(trips[2].distance(), 0.0);
        for pair in trips.windows(2) {
            assert!(pair[1].first().cumulative_distance >= pair[0].last().cumulative_distance);
        }
    }

    #[test]
    #[should_panic(expected = "not strictly increasing")]
    fn test_non_monotonic_input_panics() {
        segment_trips(vec![at(10_000), at(10_000)], &SegmentConfig::default());
    }

    #[test]
    #[should_panic(expected = "two devices")]
    fn test_mixed_devices_panics() {
        let other = report("d2", 20_000, 0.0, 0.0, 0.0, 0.0);
        segment_trips(vec![at(10_000), other], &SegmentConfig::default());
    }
}
