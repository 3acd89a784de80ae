//! Trip picker backing store.
//!
//! Holds one shared [`PlaybackIndex`] per trip and answers the lookups a trip
//! picker needs: list, fetch by id, filter by device, by map viewport and by
//! time window. Viewport queries go through an R-tree over trip bounding
//! boxes.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::{
    Bounds, DeviceTrips, GpsPoint, PlaybackConfig, PlaybackController, PlaybackIndex, SharedIndex,
    Timestamp, TripSummary,
};

/// Bounding box of one catalog slot (used for spatial indexing).
#[derive(Debug, Clone)]
struct TripEnvelope {
    slot: usize,
    bounds: Bounds,
}

impl RTreeObject for TripEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// All replayable trips for a reporting window.
///
/// # Example
///
/// ```rust
/// use trip_playback::{process_devices, Bounds, RawReport, SegmentConfig, TripCatalog};
///
/// let raw = vec![
///     RawReport::new("a", 0, 51.500, -0.120, 30.0, 0.0),
///     RawReport::new("a", 10_000, 51.501, -0.120, 30.0, 0.0),
///     RawReport::new("b", 0, 40.710, -74.000, 30.0, 0.0),
/// ];
/// let catalog = TripCatalog::new(process_devices(raw, &SegmentConfig::default()));
/// assert_eq!(catalog.len(), 2);
///
/// let london = Bounds { min_lat: 51.0, max_lat: 52.0, min_lng: -1.0, max_lng: 1.0 };
/// let hits = catalog.trips_in_bounds(&london);
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].trip().device_id(), "a");
/// ```
pub struct TripCatalog {
    entries: Vec<SharedIndex>,
    by_id: HashMap<String, usize>,
    rtree: RTree<TripEnvelope>,
}

impl TripCatalog {
    /// Build a catalog with default playback settings.
    pub fn new(devices: Vec<DeviceTrips>) -> Self {
        Self::with_config(devices, &PlaybackConfig::default())
    }

    /// Build a catalog; `config` sets the stationary-snap behaviour of every
    /// trip index.
    pub fn with_config(devices: Vec<DeviceTrips>, config: &PlaybackConfig) -> Self {
        let mut entries: Vec<SharedIndex> = devices
            .into_iter()
            .flat_map(|device| device.trips)
            .map(|trip| Arc::new(PlaybackIndex::new(trip, config)))
            .collect();
        entries.sort_by(|a, b| {
            a.trip()
                .device_id()
                .cmp(b.trip().device_id())
                .then(a.start_time().cmp(&b.start_time()))
        });

        let mut by_id = HashMap::with_capacity(entries.len());
        for (slot, index) in entries.iter().enumerate() {
            if by_id.insert(index.trip().id(), slot).is_some() {
                debug!("[Catalog] duplicate trip id {}", index.trip().id());
            }
        }

        let envelopes: Vec<TripEnvelope> = entries
            .iter()
            .enumerate()
            .map(|(slot, index)| TripEnvelope { slot, bounds: index.trip().bounds() })
            .collect();
        let rtree = RTree::bulk_load(envelopes);

        debug!("[Catalog] indexed {} trips", entries.len());
        Self { entries, by_id, rtree }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summaries ordered by device, then start time.
    pub fn summaries(&self) -> Vec<TripSummary> {
        self.entries.iter().map(|index| index.summary()).collect()
    }

    pub fn get(&self, trip_id: &str) -> Option<&SharedIndex> {
        self.by_id.get(trip_id).map(|&slot| &self.entries[slot])
    }

    pub fn trips_for_device(&self, device_id: &str) -> Vec<&SharedIndex> {
        self.entries
            .iter()
            .filter(|index| index.trip().device_id() == device_id)
            .collect()
    }

    /// Trips whose bounding box intersects `bounds`.
    pub fn trips_in_bounds(&self, bounds: &Bounds) -> Vec<&SharedIndex> {
        let query = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );
        let mut slots: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&query)
            .map(|env| env.slot)
            .collect();
        slots.sort_unstable();
        slots.into_iter().map(|slot| &self.entries[slot]).collect()
    }

    /// Trips with at least one report within `radius_meters` of `point`.
    pub fn trips_near(&self, point: &GpsPoint, radius_meters: f64) -> Vec<&SharedIndex> {
        let pad = meters_to_degrees(radius_meters, point.latitude);
        let search = Bounds {
            min_lat: point.latitude - pad,
            max_lat: point.latitude + pad,
            min_lng: point.longitude - pad,
            max_lng: point.longitude + pad,
        };
        self.trips_in_bounds(&search)
            .into_iter()
            .filter(|index| {
                index
                    .reports()
                    .iter()
                    .any(|r| haversine_distance(&r.point(), point) <= radius_meters)
            })
            .collect()
    }

    /// Trips with any part inside `[start, end]`.
    pub fn trips_overlapping(&self, start: Timestamp, end: Timestamp) -> Vec<&SharedIndex> {
        self.entries
            .iter()
            .filter(|index| index.start_time() <= end && index.end_time() >= start)
            .collect()
    }

    /// Open a playback session for a trip.
    pub fn session(&self, trip_id: &str, config: &PlaybackConfig) -> Option<PlaybackController> {
        self.get(trip_id)
            .map(|index| PlaybackController::new(Arc::clone(index), config))
    }
}
