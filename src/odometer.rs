//! Device-lifetime odometer.
//!
//! Distance accumulates across trip boundaries and is never reset: an
//! overnight stop still contributes the straight great-circle hop between
//! the evening's last fix and the morning's first. No attempt is made to
//! reconstruct the unobserved path.
//!
//! Hops that look like the vehicle was carried (implied speed above
//! [`SegmentConfig::transport_speed_threshold_kmh`]) or that span an idle gap
//! are still counted, but logged and tallied in [`Odometer::long_jumps`].

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::{GpsPoint, PositionReport, RawReport, SegmentConfig, Timestamp};

/// Running distance total for one device.
#[derive(Debug, Clone)]
pub struct Odometer {
    total: f64,
    last: Option<(GpsPoint, Timestamp)>,
    long_jumps: usize,
    transport_speed_threshold_kmh: f64,
    idle_gap_ms: i64,
}

impl Odometer {
    /// Start an odometer at `seed_meters` with default thresholds.
    pub fn new(seed_meters: f64) -> Self {
        Self::with_config(seed_meters, &SegmentConfig::default())
    }

    pub fn with_config(seed_meters: f64, config: &SegmentConfig) -> Self {
        Self {
            total: seed_meters.max(0.0),
            last: None,
            long_jumps: 0,
            transport_speed_threshold_kmh: config.transport_speed_threshold_kmh,
            idle_gap_ms: config.idle_gap_ms(),
        }
    }

    /// Seed for a stream starting at `first`: the device's own odometer if it
    /// reported one, else the configured default.
    pub fn seed_for(first: &RawReport, config: &SegmentConfig) -> f64 {
        first.total_distance.unwrap_or(config.odometer_seed_meters)
    }

    /// Current total in meters.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of hops flagged as possible transport or gap-bridging jumps.
    pub fn long_jumps(&self) -> usize {
        self.long_jumps
    }

    /// Annotate the next report of the stream.
    ///
    /// Reports must arrive in strictly increasing time order; the normalizer
    /// guarantees this upstream.
    pub fn record(&mut self, raw: RawReport) -> PositionReport {
        let point = raw.point();
        let incremental = match self.last {
            Some((prev, prev_t)) => {
                let d = haversine_distance(&prev, &point);
                self.check_jump(&raw.device_id, d, raw.timestamp - prev_t, raw.timestamp);
                d
            }
            None => 0.0,
        };

        self.total += incremental;
        self.last = Some((point, raw.timestamp));

        PositionReport {
            device_id: raw.device_id,
            timestamp: raw.timestamp,
            latitude: raw.latitude,
            longitude: raw.longitude,
            speed: raw.speed,
            course: raw.course,
            incremental_distance: incremental,
            cumulative_distance: self.total,
        }
    }

    fn check_jump(&mut self, device_id: &str, meters: f64, dt_ms: i64, at: Timestamp) {
        if meters <= 0.0 {
            return;
        }
        let implied_kmh = if dt_ms > 0 {
            meters / 1000.0 / (dt_ms as f64 / 3_600_000.0)
        } else {
            f64::INFINITY
        };
        let bridges_gap = dt_ms > self.idle_gap_ms;
        if bridges_gap || implied_kmh > self.transport_speed_threshold_kmh {
            self.long_jumps += 1;
            debug!(
                "[Odometer] {}: {:.0}m jump over {}s at {} (implied {:.0} km/h)",
                device_id,
                meters,
                dt_ms / 1000,
                at,
                implied_kmh
            );
        }
    }
}

/// Annotate a normalized stream with incremental and cumulative distances.
///
/// The odometer is seeded from the first report's `total_distance` when
/// present.
pub fn annotate_reports(reports: Vec<RawReport>, config: &SegmentConfig) -> Vec<PositionReport> {
    let Some(first) = reports.first() else {
        return Vec::new();
    };
    let mut odometer = Odometer::with_config(Odometer::seed_for(first, config), config);
    reports.into_iter().map(|r| odometer.record(r)).collect()
}
