//! Diurnal activity modulation
//!
//! Maps a fractional local hour to an activity multiplier in (0, 1]. The curve
//! peaks at 16:00 local time and bottoms out at 04:00 with a floor of 0.03.

use std::f64::consts::PI;

use crate::types::ModulationPolicy;

/// Floor of the activity curve
pub const ACTIVITY_FLOOR: f64 = 0.03;

/// Local hour of peak activity
pub const PEAK_HOUR: f64 = 16.0;

/// Number of table buckets per hour (one every 12 minutes)
pub const BUCKETS_PER_HOUR: usize = 5;

/// Number of table entries covering a full day
pub const TABLE_SIZE: usize = 24 * BUCKETS_PER_HOUR;

/// Activity curve sampled at the start of every 12-minute bucket, starting at 00:00
pub const HOURLY_MODULATION_FACTORS: [f64; TABLE_SIZE] = [
    0.272, 0.251, 0.230, 0.210, 0.190, // 00h
    0.172, 0.155, 0.138, 0.123, 0.108, // 01h
    0.095, 0.083, 0.072, 0.062, 0.054, // 02h
    0.047, 0.041, 0.036, 0.033, 0.031, // 03h
    0.030, 0.031, 0.033, 0.036, 0.041, // 04h
    0.047, 0.054, 0.062, 0.072, 0.083, // 05h
    0.095, 0.108, 0.123, 0.138, 0.155, // 06h
    0.172, 0.190, 0.210, 0.230, 0.251, // 07h
    0.273, 0.295, 0.318, 0.341, 0.365, // 08h
    0.389, 0.414, 0.439, 0.464, 0.490, // 09h
    0.515, 0.540, 0.566, 0.591, 0.616, // 10h
    0.641, 0.665, 0.689, 0.712, 0.735, // 11h
    0.758, 0.779, 0.800, 0.820, 0.840, // 12h
    0.858, 0.875, 0.892, 0.907, 0.922, // 13h
    0.935, 0.947, 0.958, 0.968, 0.976, // 14h
    0.983, 0.989, 0.994, 0.997, 0.999, // 15h
    1.000, 0.999, 0.997, 0.994, 0.989, // 16h
    0.983, 0.976, 0.968, 0.958, 0.947, // 17h
    0.935, 0.922, 0.907, 0.892, 0.875, // 18h
    0.858, 0.840, 0.820, 0.800, 0.779, // 19h
    0.758, 0.735, 0.712, 0.689, 0.665, // 20h
    0.641, 0.616, 0.591, 0.566, 0.540, // 21h
    0.515, 0.490, 0.464, 0.439, 0.414, // 22h
    0.389, 0.365, 0.341, 0.318, 0.295, // 23h
];

/// Converts a local hour into an activity multiplier
///
/// Both policies expose the same interface; the discretized one trades a
/// little precision (at most one bucket of drift, ~0.025) for avoiding a
/// cosine per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiurnalModulator {
    policy: ModulationPolicy,
}

impl DiurnalModulator {
    /// Create a modulator for the given policy
    pub fn new(policy: ModulationPolicy) -> Self {
        Self { policy }
    }

    /// Closed-form curve
    pub fn continuous() -> Self {
        Self::new(ModulationPolicy::Continuous)
    }

    /// Table lookup
    pub fn discretized() -> Self {
        Self::new(ModulationPolicy::Discretized)
    }

    /// Active policy
    pub fn policy(&self) -> ModulationPolicy {
        self.policy
    }

    /// Activity multiplier for a local hour; any real hour is wrapped modulo 24
    pub fn multiplier(&self, hour: f64) -> f64 {
        match self.policy {
            ModulationPolicy::Continuous => continuous_curve(hour),
            ModulationPolicy::Discretized => table_lookup(hour),
        }
    }
}

/// `0.03 + 0.97 * (1 + cos((h - 16) * 2π / 24)) / 2`
pub fn continuous_curve(hour: f64) -> f64 {
    let phase = (wrap_hour(hour) - PEAK_HOUR) * (2.0 * PI / 24.0);
    ACTIVITY_FLOOR + (1.0 - ACTIVITY_FLOOR) * (1.0 + phase.cos()) / 2.0
}

/// Table entry for the 12-minute bucket containing `hour`
pub fn table_lookup(hour: f64) -> f64 {
    let index = (wrap_hour(hour) * BUCKETS_PER_HOUR as f64).floor() as usize;
    HOURLY_MODULATION_FACTORS[index.min(TABLE_SIZE - 1)]
}

/// Wrap any real hour into `[0, 24)`
pub fn wrap_hour(hour: f64) -> f64 {
    let wrapped = hour.rem_euclid(24.0);
    // rem_euclid of a tiny negative value rounds up to exactly 24.0
    if wrapped >= 24.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuous_peak_and_trough() {
        let modulator = DiurnalModulator::continuous();
        assert!((modulator.multiplier(16.0) - 1.0).abs() < 1e-12);
        assert!((modulator.multiplier(4.0) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_discretized_peak_and_trough() {
        let modulator = DiurnalModulator::discretized();
        assert_eq!(modulator.multiplier(16.0), 1.0);
        assert_eq!(modulator.multiplier(4.0), 0.030);
    }

    #[test]
    fn test_wraps_modulo_24() {
        for policy in [ModulationPolicy::Continuous, ModulationPolicy::Discretized] {
            let modulator = DiurnalModulator::new(policy);
            assert_eq!(modulator.multiplier(40.0), modulator.multiplier(16.0));
            assert!((modulator.multiplier(-8.0) - modulator.multiplier(16.0)).abs() < 1e-12);
            assert!((modulator.multiplier(-1e-18) - modulator.multiplier(0.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_policies_agree_at_bucket_starts() {
        for index in 0..TABLE_SIZE {
            let hour = index as f64 / BUCKETS_PER_HOUR as f64;
            let diff = (continuous_curve(hour) - table_lookup(hour)).abs();
            assert!(diff <= 0.01, "bucket {} differs by {}", index, diff);
        }
    }

    #[test]
    fn test_policies_agree_early_in_bucket() {
        // First four minutes of every bucket
        for step in 0..(24 * 60) {
            let minute_of_bucket = step % 12;
            if minute_of_bucket > 4 {
                continue;
            }
            let hour = step as f64 / 60.0;
            let diff = (continuous_curve(hour) - table_lookup(hour)).abs();
            assert!(diff <= 0.01, "hour {} differs by {}", hour, diff);
        }
    }

    #[test]
    fn test_policies_close_everywhere() {
        for step in 0..2400 {
            let hour = step as f64 / 100.0;
            let diff = (continuous_curve(hour) - table_lookup(hour)).abs();
            assert!(diff <= 0.03, "hour {} differs by {}", hour, diff);
        }
    }

    #[test]
    fn test_multiplier_range() {
        for step in 0..2400 {
            let hour = step as f64 / 100.0;
            let value = continuous_curve(hour);
            assert!(value > 0.0 && value <= 1.0);
            let value = table_lookup(hour);
            assert!(value > 0.0 && value <= 1.0);
        }
    }
}
