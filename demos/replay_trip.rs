//! Segment one vehicle's day and replay a trip forward, then backward.
//!
//! Run with: cargo run --example replay_trip

use std::time::Duration;

use trip_playback::{parse_timestamp, process_device, EngineConfig, RawReport, TripCatalog};

fn main() {
    // (time, lat, lng, speed km/h, course)
    let morning = [
        ("2023-03-01 10:10:03", -1.28570, 36.81550, 47.1922, 158.0),
        ("2023-03-01 10:10:13", -1.28690, 36.81600, 50.3240, 159.0),
        ("2023-03-01 10:10:33", -1.28930, 36.81690, 44.0000, 161.0),
        ("2023-03-01 10:11:03", -1.29200, 36.81760, 31.5000, 172.0),
        ("2023-03-01 10:11:23", -1.29290, 36.81770, 0.0000, 172.0),
    ];
    let evening = [
        ("2023-03-01 18:42:10", -1.29290, 36.81770, 12.0, 350.0),
        ("2023-03-01 18:42:30", -1.29180, 36.81750, 38.0, 355.0),
        ("2023-03-01 18:42:50", -1.28990, 36.81760, 41.0, 10.0),
    ];

    let raw: Vec<RawReport> = morning
        .iter()
        .chain(evening.iter())
        .map(|&(t, lat, lng, speed, course)| {
            let ts = parse_timestamp(t).expect("demo timestamps are valid");
            RawReport::new("ke-114", ts, lat, lng, speed, course)
        })
        .collect();

    let config = EngineConfig::default();
    let device = process_device("ke-114", raw, &config.segment);
    let catalog = TripCatalog::new(vec![device]);

    println!("Trips for ke-114\n");
    for summary in catalog.summaries() {
        println!(
            "  {}  {} points, {:.0}s, {:.0}m",
            summary.trip_id,
            summary.point_count,
            (summary.end_time - summary.start_time) as f64 / 1000.0,
            summary.distance_meters
        );
    }

    let first = &catalog.summaries()[0];
    let mut session = catalog
        .session(&first.trip_id, &config.playback)
        .expect("trip id comes from the catalog");

    println!("\nForward at 8x, 250ms frames:");
    session.play(8.0).expect("rate is valid");
    while session.state() == trip_playback::PlaybackState::Playing {
        let frame = session.tick(Duration::from_millis(250));
        println!(
            "  t+{:>5.1}s  ({:.5}, {:.5})  {:>5.1} km/h  {:>5.1}°  odo {:.0}m",
            (frame.timestamp - first.start_time as f64) / 1000.0,
            frame.latitude,
            frame.longitude,
            frame.speed,
            frame.course,
            frame.cumulative_distance
        );
    }

    println!("\nBackward at 16x from the end:");
    session.play(-16.0).expect("rate is valid");
    while session.state() == trip_playback::PlaybackState::Playing {
        let frame = session.tick(Duration::from_millis(500));
        println!("  progress {:>5.1}%  course {:>5.1}°", session.progress() * 100.0, frame.course);
    }
}
