//! # Playback Sessions
//!
//! A [`PlaybackController`] is one viewer's clock over a shared
//! [`PlaybackIndex`](crate::PlaybackIndex). It owns virtual time, rate and state and nothing else;
//! the trip data stays immutable and shared.
//!
//! ## States
//!
//! ```text
//!            play(rate)                 boundary reached
//!   Paused ─────────────▶ Playing ─────────────────────────▶ Ended
//!     ▲                     │  ▲                               │
//!     └──── pause() ────────┘  └────── play(rate), rewinds ────┘
//! ```
//!
//! Every mutating call takes `&mut self`, so a session has exactly one driver
//! at a time. Commands coming from other threads (a UI pause button while the
//! render loop ticks) must be funnelled through whoever owns the session.

use std::time::Duration;

use log::debug;

use crate::{InterpolatedSample, PlaybackConfig, Result, SharedIndex, TrackError};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlaybackState {
    Paused,
    Playing,
    Ended,
}

/// Stateful playback over one trip.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use trip_playback::{PlaybackConfig, PlaybackController, PlaybackIndex, PlaybackState, PositionReport, Trip};
///
/// let reports: Vec<PositionReport> = (0..3)
///     .map(|i| PositionReport {
///         device_id: "car-1".to_string(),
///         timestamp: i * 10_000,
///         latitude: -1.29 + i as f64 * 0.001,
///         longitude: 36.82,
///         speed: 40.0,
///         course: 0.0,
///         incremental_distance: 0.0,
///         cumulative_distance: i as f64 * 111.0,
///     })
///     .collect();
/// let config = PlaybackConfig::default();
/// let index = Arc::new(PlaybackIndex::new(Trip::from_reports("car-1", reports).unwrap(), &config));
///
/// let mut session = PlaybackController::new(index, &config);
/// session.play(2.0).unwrap();
/// let frame = session.tick(Duration::from_secs(5));
/// assert_eq!(frame.timestamp, 10_000.0);
///
/// // Reverse from here back to the start
/// session.set_rate(-16.0).unwrap();
/// session.tick(Duration::from_secs(1));
/// assert_eq!(session.state(), PlaybackState::Ended);
/// assert_eq!(session.virtual_time(), 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct PlaybackController {
    index: SharedIndex,
    virtual_time: f64,
    rate: f64,
    state: PlaybackState,
    min_rate: f64,
    max_rate: f64,
}

impl PlaybackController {
    /// Open a paused session at the start of the trip.
    pub fn new(index: SharedIndex, config: &PlaybackConfig) -> Self {
        let start = index.start_time() as f64;
        let (min_rate, max_rate) = if config.min_rate.is_finite() && config.max_rate.is_finite() {
            (config.min_rate.min(config.max_rate), config.max_rate.max(config.min_rate))
        } else {
            let fallback = PlaybackConfig::default();
            debug!(
                "[Playback] ignoring unusable rate range [{}, {}], using [{}, {}]",
                config.min_rate, config.max_rate, fallback.min_rate, fallback.max_rate
            );
            (fallback.min_rate, fallback.max_rate)
        };
        let mut session = Self {
            index,
            virtual_time: start,
            rate: 1.0,
            state: PlaybackState::Paused,
            min_rate,
            max_rate,
        };
        if session.set_rate(config.default_rate).is_err() {
            debug!(
                "[Playback] ignoring unusable default rate {}, using 1.0",
                config.default_rate
            );
        }
        session
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Current virtual time in epoch milliseconds.
    pub fn virtual_time(&self) -> f64 {
        self.virtual_time
    }

    /// Position within the trip, `0.0` at the start and `1.0` at the end.
    /// Single-point trips report `1.0`.
    pub fn progress(&self) -> f64 {
        let duration = self.index.duration_ms() as f64;
        if duration <= 0.0 {
            return 1.0;
        }
        (self.virtual_time - self.start()) / duration
    }

    /// The frame at the current virtual time, without advancing.
    pub fn current_sample(&self) -> InterpolatedSample {
        self.index.sample_at(self.virtual_time)
    }

    /// Start or resume playback at `rate`.
    ///
    /// After the session has ended, playback restarts from the start of the
    /// trip (or from the end, for a negative rate).
    pub fn play(&mut self, rate: f64) -> Result<()> {
        self.set_rate(rate)?;
        if self.state == PlaybackState::Ended {
            self.virtual_time = if self.rate > 0.0 { self.start() } else { self.end() };
        }
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Freeze virtual time. Only affects a playing session.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Jump to `t` (epoch milliseconds), clamped to the trip.
    ///
    /// Landing on the boundary the session is heading toward while playing
    /// ends it; moving an ended session off that boundary pauses it.
    pub fn seek(&mut self, t: f64) {
        self.virtual_time = if t.is_nan() {
            self.start()
        } else {
            t.clamp(self.start(), self.end())
        };

        match self.state {
            PlaybackState::Playing if self.at_travel_boundary() => {
                self.state = PlaybackState::Ended;
            }
            PlaybackState::Ended if !self.at_travel_boundary() => {
                self.state = PlaybackState::Paused;
            }
            _ => {}
        }
    }

    /// Change speed and direction without moving virtual time.
    ///
    /// Rates outside the configured range are clamped; zero and non-finite
    /// rates are rejected.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate == 0.0 {
            return Err(TrackError::InvalidRate(rate));
        }
        let clamped = rate.clamp(self.min_rate, self.max_rate);
        if clamped != rate {
            debug!("[Playback] rate {} clamped to {}", rate, clamped);
        }
        // A range that excludes one direction entirely clamps onto zero
        if clamped == 0.0 {
            return Err(TrackError::InvalidRate(rate));
        }
        self.rate = clamped;
        Ok(())
    }

    /// Advance by `elapsed` wall-clock time and return the frame to draw.
    ///
    /// Virtual time moves only while playing. Reaching either end of the
    /// trip in the direction of travel ends the session.
    pub fn tick(&mut self, elapsed: Duration) -> InterpolatedSample {
        if self.state == PlaybackState::Playing {
            let advanced = self.virtual_time + elapsed.as_secs_f64() * 1000.0 * self.rate;
            self.virtual_time = advanced.clamp(self.start(), self.end());
            if self.at_travel_boundary() {
                self.state = PlaybackState::Ended;
            }
        }
        self.current_sample()
    }

    fn start(&self) -> f64 {
        self.index.start_time() as f64
    }

    fn end(&self) -> f64 {
        self.index.end_time() as f64
    }

    fn at_travel_boundary(&self) -> bool {
        if self.rate > 0.0 {
            self.virtual_time >= self.end()
        } else {
            self.virtual_time <= self.start()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::report;
    use crate::{PlaybackIndex, PositionReport, Trip};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// 0s..60s, one report every 10s, speed equal to seconds elapsed.
    fn shared_index() -> SharedIndex {
        let reports: Vec<PositionReport> = (0..7)
            .map(|i| report("d1", i * 10_000, -1.29 + i as f64 * 0.0005, 36.82, (i * 10) as f64, 0.0))
            .collect();
        Arc::new(PlaybackIndex::new(
            Trip::from_reports("d1", reports).unwrap(),
            &PlaybackConfig::default(),
        ))
    }

    fn session() -> PlaybackController {
        PlaybackController::new(shared_index(), &PlaybackConfig::default())
    }

    #[test]
    fn test_initial_state() {
        let s = session();
        assert_eq!(s.state(), PlaybackState::Paused);
        assert_eq!(s.virtual_time(), 0.0);
        assert_eq!(s.rate(), 1.0);
        assert_eq!(s.progress(), 0.0);
    }

    #[test]
    fn test_tick_while_paused_does_not_move() {
        let mut s = session();
        let frame = s.tick(Duration::from_secs(30));
        assert_eq!(s.virtual_time(), 0.0);
        assert_eq!(frame, s.index().sample_at(0.0));
    }

    #[test]
    fn test_play_advances_by_rate() {
        let mut s = session();
        s.play(2.0).unwrap();
        let frame = s.tick(Duration::from_millis(7_500));
        assert_eq!(s.virtual_time(), 15_000.0);
        assert!(approx_eq(frame.speed, 15.0, 1e-9));
        assert_eq!(s.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut s = session();
        s.play(1.0).unwrap();
        s.tick(Duration::from_secs(5));
        s.pause();
        assert_eq!(s.state(), PlaybackState::Paused);
        s.tick(Duration::from_secs(5));
        assert_eq!(s.virtual_time(), 5_000.0);
    }

    #[test]
    fn test_reaching_end_transitions_to_ended() {
        let mut s = session();
        s.play(16.0).unwrap();
        let frame = s.tick(Duration::from_secs(10));
        assert_eq!(s.state(), PlaybackState::Ended);
        assert_eq!(s.virtual_time(), 60_000.0);
        assert_eq!(frame, s.index().sample_at(60_000.0));
        assert_eq!(s.progress(), 1.0);

        // Further ticks hold the final frame
        assert_eq!(s.tick(Duration::from_secs(1)), frame);
    }

    #[test]
    fn test_play_after_end_rewinds() {
        let mut s = session();
        s.play(16.0).unwrap();
        s.tick(Duration::from_secs(10));
        assert_eq!(s.state(), PlaybackState::Ended);

        s.play(1.0).unwrap();
        assert_eq!(s.state(), PlaybackState::Playing);
        assert_eq!(s.virtual_time(), 0.0);
    }

    #[test]
    fn test_reverse_playback() {
        let mut s = session();
        s.seek(40_000.0);
        s.play(-2.0).unwrap();
        let frame = s.tick(Duration::from_secs(5));
        assert_eq!(s.virtual_time(), 30_000.0);
        assert!(approx_eq(frame.speed, 30.0, 1e-9));

        s.tick(Duration::from_secs(60));
        assert_eq!(s.state(), PlaybackState::Ended);
        assert_eq!(s.virtual_time(), 0.0);

        // Replaying in reverse starts from the end
        s.play(-1.0).unwrap();
        assert_eq!(s.virtual_time(), 60_000.0);
    }

    #[test]
    fn test_set_rate_keeps_time() {
        let mut s = session();
        s.play(1.0).unwrap();
        s.tick(Duration::from_secs(20));
        s.set_rate(-4.0).unwrap();
        assert_eq!(s.virtual_time(), 20_000.0);
        assert_eq!(s.state(), PlaybackState::Playing);
        s.tick(Duration::from_secs(1));
        assert_eq!(s.virtual_time(), 16_000.0);
    }

    #[test]
    fn test_rate_validation_and_clamping() {
        let mut s = session();
        assert_eq!(s.play(0.0), Err(TrackError::InvalidRate(0.0)));
        assert_eq!(s.state(), PlaybackState::Paused);
        assert!(s.set_rate(f64::NAN).is_err());
        assert!(s.set_rate(f64::INFINITY).is_err());
        assert_eq!(s.rate(), 1.0);

        s.set_rate(100.0).unwrap();
        assert_eq!(s.rate(), 16.0);
        s.set_rate(-100.0).unwrap();
        assert_eq!(s.rate(), -16.0);
    }

    #[test]
    fn test_seek_clamps() {
        let mut s = session();
        s.seek(-5_000.0);
        assert_eq!(s.virtual_time(), 0.0);
        s.seek(1e12);
        assert_eq!(s.virtual_time(), 60_000.0);
        // Paused sessions stay paused even at the end
        assert_eq!(s.state(), PlaybackState::Paused);
        s.seek(f64::NAN);
        assert_eq!(s.virtual_time(), 0.0);
    }

    #[test]
    fn test_seek_to_end_while_playing_ends() {
        let mut s = session();
        s.play(1.0).unwrap();
        s.seek(60_000.0);
        assert_eq!(s.state(), PlaybackState::Ended);

        s.seek(30_000.0);
        assert_eq!(s.state(), PlaybackState::Paused);
        assert_eq!(s.virtual_time(), 30_000.0);
    }

    #[test]
    fn test_seek_then_zero_tick_matches_direct_sample() {
        let mut s = session();
        for t in [-1.0, 0.0, 12_345.0, 59_999.5, 60_000.0, 90_000.0] {
            s.seek(t);
            let clamped = t.clamp(0.0, 60_000.0);
            assert_eq!(s.tick(Duration::ZERO), s.index().sample_at(clamped));
            assert_eq!(s.tick(Duration::ZERO), s.index().sample_at(t));
        }

        s.play(3.0).unwrap();
        s.seek(25_500.0);
        assert_eq!(s.tick(Duration::ZERO), s.index().sample_at(25_500.0));
    }

    #[test]
    fn test_single_point_trip_session() {
        let only = report("d1", 5_000, -1.29, 36.82, 0.0, 0.0);
        let index = Arc::new(PlaybackIndex::new(
            Trip::from_reports("d1", vec![only.clone()]).unwrap(),
            &PlaybackConfig::default(),
        ));
        let mut s = PlaybackController::new(index, &PlaybackConfig::default());
        assert_eq!(s.progress(), 1.0);
        s.play(1.0).unwrap();
        let frame = s.tick(Duration::from_secs(1));
        assert_eq!(s.state(), PlaybackState::Ended);
        assert_eq!(frame, InterpolatedSample::from(&only));
    }

    #[test]
    fn test_sessions_share_one_index() {
        let index = shared_index();
        let mut a = PlaybackController::new(Arc::clone(&index), &PlaybackConfig::default());
        let mut b = PlaybackController::new(Arc::clone(&index), &PlaybackConfig::default());
        a.play(1.0).unwrap();
        b.seek(60_000.0);
        b.play(-1.0).unwrap();
        a.tick(Duration::from_secs(10));
        b.tick(Duration::from_secs(10));
        assert_eq!(a.virtual_time(), 10_000.0);
        assert_eq!(b.virtual_time(), 50_000.0);
        assert_eq!(Arc::strong_count(&index), 3);
    }

    #[test]
    fn test_default_rate_from_config() {
        let config = PlaybackConfig { default_rate: 4.0, ..PlaybackConfig::default() };
        let s = PlaybackController::new(shared_index(), &config);
        assert_eq!(s.rate(), 4.0);

        let broken = PlaybackConfig { default_rate: 0.0, ..PlaybackConfig::default() };
        let s = PlaybackController::new(shared_index(), &broken);
        assert_eq!(s.rate(), 1.0);
    }

    #[test]
    fn test_non_finite_rate_range_falls_back() {
        let config = PlaybackConfig { min_rate: f64::NAN, max_rate: f64::NAN, ..PlaybackConfig::default() };
        let mut s = PlaybackController::new(shared_index(), &config);
        assert_eq!(s.rate(), 1.0);
        s.set_rate(40.0).unwrap();
        assert_eq!(s.rate(), 16.0);

        let half_open = PlaybackConfig { max_rate: f64::INFINITY, ..PlaybackConfig::default() };
        let mut s = PlaybackController::new(shared_index(), &half_open);
        s.set_rate(-40.0).unwrap();
        assert_eq!(s.rate(), -16.0);
    }
}
