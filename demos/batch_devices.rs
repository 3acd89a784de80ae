//! Segment a synthetic fleet in parallel and query the catalog.
//!
//! Run with: cargo run --example batch_devices --features parallel

use std::time::Instant;

use trip_playback::{process_devices, Bounds, RawReport, SegmentConfig, TripCatalog};

fn main() {
    let mut raw = Vec::new();
    for vehicle in 0..200 {
        let id = format!("veh-{:03}", vehicle);
        let lat0 = -1.35 + (vehicle % 20) as f64 * 0.01;
        let lng0 = 36.70 + (vehicle / 20) as f64 * 0.02;
        for i in 0..2_000i64 {
            // A ten-minute break every 500 reports
            let t = i * 15_000 + (i / 500) * 600_000;
            raw.push(RawReport::new(
                &id,
                t,
                lat0 + (i % 500) as f64 * 0.0001,
                lng0,
                35.0,
                0.0,
            ));
        }
    }

    println!("Processing {} reports...", raw.len());
    let start = Instant::now();
    let devices = process_devices(raw, &SegmentConfig::default());
    let elapsed = start.elapsed();

    let trips: usize = devices.iter().map(|d| d.trips.len()).sum();
    println!("{} devices, {} trips in {:?}", devices.len(), trips, elapsed);

    let catalog = TripCatalog::new(devices);
    let cbd = Bounds { min_lat: -1.30, max_lat: -1.28, min_lng: 36.80, max_lng: 36.84 };
    println!("{} trips pass through the CBD box", catalog.trips_in_bounds(&cbd).len());
}
