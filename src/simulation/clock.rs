//! Virtual simulation clock
//!
//! Tracks virtual time as microseconds since the Unix epoch plus a fractional
//! UTC hour of day. The clock only moves when [`SimulationClock::advance`] is
//! called, by the inter-arrival gaps of the arrival process.

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info};

use crate::simulation::diurnal::wrap_hour;
use crate::types::ResumeState;

const MICROS_PER_SECOND: f64 = 1_000_000.0;
const MICROS_PER_HOUR: i64 = 3_600_000_000;
const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

/// Virtual time position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    virtual_timestamp_micros: i64,
    virtual_hour_fraction: f64,
}

impl SimulationClock {
    /// Clock at an explicit position
    pub fn new(virtual_timestamp_micros: i64, virtual_hour_fraction: f64) -> Self {
        Self { virtual_timestamp_micros, virtual_hour_fraction: wrap_hour(virtual_hour_fraction) }
    }

    /// Clock seeded from the current wall-clock time (UTC)
    pub fn from_wall_clock() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Clock seeded from a UTC instant
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        let hour = instant.hour() as f64
            + instant.minute() as f64 / 60.0
            + instant.second() as f64 / 3600.0
            + instant.nanosecond() as f64 / 3_600_000_000_000.0;
        Self::new(instant.timestamp_micros(), hour)
    }

    /// Clock continuing from a previous run
    ///
    /// When the resume state carries no hour it is derived from the timestamp's
    /// UTC time of day.
    pub fn from_resume(state: &ResumeState) -> Self {
        let hour = state
            .virtual_hour
            .unwrap_or_else(|| hour_of_day(state.virtual_timestamp_micros));
        info!(
            "Resuming virtual clock at {} micros ({:.4}h UTC)",
            state.virtual_timestamp_micros, hour
        );
        Self::new(state.virtual_timestamp_micros, hour)
    }

    /// Move the clock forward by `seconds`
    ///
    /// The timestamp grows by the truncated number of microseconds; the hour
    /// wraps modulo 24.
    pub fn advance(&mut self, seconds: f64) {
        let micros = (seconds * MICROS_PER_SECOND) as i64;
        self.virtual_timestamp_micros = self.virtual_timestamp_micros.saturating_add(micros);
        self.virtual_hour_fraction = wrap_hour(self.virtual_hour_fraction + seconds / 3600.0);
    }

    /// Fractional UTC hour of day in `[0, 24)`
    pub fn hour(&self) -> f64 {
        self.virtual_hour_fraction
    }

    /// Virtual microseconds since the Unix epoch
    pub fn timestamp_micros(&self) -> i64 {
        self.virtual_timestamp_micros
    }

    /// Virtual time as a UTC instant, if representable
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.virtual_timestamp_micros)
    }

    /// Position to hand to a later run
    pub fn snapshot(&self) -> ResumeState {
        debug!("Clock snapshot at {} micros", self.virtual_timestamp_micros);
        ResumeState {
            virtual_timestamp_micros: self.virtual_timestamp_micros,
            virtual_hour: Some(self.virtual_hour_fraction),
        }
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::from_wall_clock()
    }
}

/// Fractional UTC hour of day for a microsecond timestamp
pub fn hour_of_day(timestamp_micros: i64) -> f64 {
    timestamp_micros.rem_euclid(MICROS_PER_DAY) as f64 / MICROS_PER_HOUR as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_datetime() {
        let instant = Utc.with_ymd_and_hms(2025, 10, 19, 6, 15, 0).unwrap();
        let clock = SimulationClock::from_datetime(instant);
        assert!((clock.hour() - 6.25).abs() < 1e-9);
        assert_eq!(clock.timestamp_micros(), instant.timestamp_micros());
        assert_eq!(clock.as_datetime(), Some(instant));
    }

    #[test]
    fn test_hour_derived_from_timestamp() {
        let instant = Utc.with_ymd_and_hms(2025, 10, 19, 18, 30, 0).unwrap();
        let state = ResumeState {
            virtual_timestamp_micros: instant.timestamp_micros(),
            virtual_hour: None,
        };
        let clock = SimulationClock::from_resume(&state);
        assert!((clock.hour() - 18.5).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_resume_hour_wins() {
        let state = ResumeState { virtual_timestamp_micros: 0, virtual_hour: Some(6.2337) };
        let clock = SimulationClock::from_resume(&state);
        assert_eq!(clock.hour(), 6.2337);
        assert_eq!(clock.timestamp_micros(), 0);
    }

    #[test]
    fn test_advance_truncates_micros() {
        let mut clock = SimulationClock::new(1_000, 0.0);
        clock.advance(0.000_001_9);
        assert_eq!(clock.timestamp_micros(), 1_001);
        clock.advance(2.5);
        assert_eq!(clock.timestamp_micros(), 2_501_001);
    }

    #[test]
    fn test_advance_wraps_hour() {
        let mut clock = SimulationClock::new(0, 23.5);
        clock.advance(3600.0);
        assert!((clock.hour() - 0.5).abs() < 1e-9);
        assert_eq!(clock.timestamp_micros(), 3_600_000_000);
    }

    #[test]
    fn test_snapshot_round_trips() {
        let mut clock = SimulationClock::new(1_760_854_441_420_750, 6.2337);
        clock.advance(90.0);
        let restored = SimulationClock::from_resume(&clock.snapshot());
        assert_eq!(restored, clock);
    }

    #[test]
    fn test_hour_of_day_negative_timestamp() {
        assert!((hour_of_day(-MICROS_PER_HOUR) - 23.0).abs() < 1e-12);
    }
}
