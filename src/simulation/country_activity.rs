//! Per-country activity model
//!
//! Holds each country's static population weight and UTC offset and recomputes
//! the diurnally modulated weights for the current simulation hour.

use std::collections::HashMap;
use tracing::debug;

use crate::simulation::{DiurnalModulator, SimulationError, SimulationResult};
use crate::types::Distribution;

/// Minutes scanned by [`CountryActivityModel::peak_ratio`]
const PEAK_SCAN_STEPS: usize = 24 * 60;

/// Static and modulated state for one country
#[derive(Debug, Clone, PartialEq)]
pub struct CountryProfile {
    /// Country label (e.g. "US")
    pub label: String,
    /// Static population weight
    pub base_weight: f64,
    /// Offset from UTC in hours
    pub utc_offset_hours: f64,
    /// `base_weight` scaled by the activity multiplier at the last refresh
    pub modulated_weight: f64,
}

impl CountryProfile {
    /// Local hour for a UTC hour
    pub fn local_hour(&self, utc_hour: f64) -> f64 {
        utc_hour + self.utc_offset_hours
    }
}

/// Aggregates per-country modulated weights
#[derive(Debug, Clone)]
pub struct CountryActivityModel {
    profiles: Vec<CountryProfile>,
    modulated: Distribution,
    base_weight_sum: f64,
    modulated_sum: f64,
}

impl CountryActivityModel {
    /// Build the model for every country in `distribution`
    ///
    /// Fails with `MissingTimezoneEntry` if a country has no UTC offset.
    pub fn new(
        distribution: &Distribution,
        timezones: &HashMap<String, f64>,
    ) -> SimulationResult<Self> {
        if distribution.is_empty() {
            return Err(SimulationError::EmptyDistribution);
        }

        let profiles = distribution
            .iter()
            .map(|(label, base_weight)| {
                let utc_offset_hours = *timezones
                    .get(label)
                    .ok_or_else(|| SimulationError::missing_timezone(label))?;
                Ok(CountryProfile {
                    label: label.to_string(),
                    base_weight,
                    utc_offset_hours,
                    modulated_weight: 0.0,
                })
            })
            .collect::<SimulationResult<Vec<_>>>()?;

        let modulated = profiles.iter().map(|p| (p.label.clone(), 0.0)).collect();
        let base_weight_sum = distribution.total_weight();

        Ok(Self { profiles, modulated, base_weight_sum, modulated_sum: 0.0 })
    }

    /// Recompute every modulated weight for `utc_hour` and return their sum
    pub fn refresh(&mut self, utc_hour: f64, modulator: &DiurnalModulator) -> f64 {
        let mut sum = 0.0;
        for (profile, weight) in self.profiles.iter_mut().zip(self.modulated.weights_mut()) {
            let local_hour = profile.utc_offset_hours + utc_hour;
            profile.modulated_weight = profile.base_weight * modulator.multiplier(local_hour);
            *weight = profile.modulated_weight;
            sum += profile.modulated_weight;
        }
        self.modulated_sum = sum;
        sum
    }

    /// Modulated weights from the last refresh
    pub fn modulated_distribution(&self) -> &Distribution {
        &self.modulated
    }

    /// Sum of the modulated weights from the last refresh
    pub fn modulated_sum(&self) -> f64 {
        self.modulated_sum
    }

    /// Sum of the static weights
    pub fn base_weight_sum(&self) -> f64 {
        self.base_weight_sum
    }

    /// Modulated sum relative to the static total, in `[0, 1]` for a well-formed curve
    pub fn activity_ratio(&self) -> f64 {
        if self.base_weight_sum > 0.0 {
            self.modulated_sum / self.base_weight_sum
        } else {
            0.0
        }
    }

    /// All country profiles
    pub fn profiles(&self) -> &[CountryProfile] {
        &self.profiles
    }

    /// Highest activity ratio over a day, scanned minute by minute across all offsets
    ///
    /// Does not disturb the state produced by the last [`refresh`](Self::refresh).
    pub fn peak_ratio(&self, modulator: &DiurnalModulator) -> f64 {
        if self.base_weight_sum <= 0.0 {
            return 0.0;
        }

        let mut peak: f64 = 0.0;
        let mut peak_hour = 0.0;
        for step in 0..PEAK_SCAN_STEPS {
            let utc_hour = step as f64 / 60.0;
            let sum: f64 = self
                .profiles
                .iter()
                .map(|p| p.base_weight * modulator.multiplier(p.local_hour(utc_hour)))
                .sum();
            let ratio = sum / self.base_weight_sum;
            if ratio > peak {
                peak = ratio;
                peak_hour = utc_hour;
            }
        }

        debug!("Peak activity ratio {:.4} at {:.2}h UTC", peak, peak_hour);
        peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> CountryActivityModel {
        let distribution = Distribution::new().with("US", 300.0).with("IR", 100.0);
        let timezones: HashMap<String, f64> =
            [("US".to_string(), -5.0), ("IR".to_string(), 3.5)].into_iter().collect();
        CountryActivityModel::new(&distribution, &timezones).unwrap()
    }

    #[test]
    fn test_missing_timezone_entry() {
        let distribution = Distribution::new().with("US", 1.0).with("FR", 1.0);
        let timezones: HashMap<String, f64> = [("US".to_string(), -5.0)].into_iter().collect();

        match CountryActivityModel::new(&distribution, &timezones) {
            Err(SimulationError::MissingTimezoneEntry { country }) => assert_eq!(country, "FR"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_refresh_applies_local_hour() {
        let mut model = model();
        let modulator = DiurnalModulator::continuous();

        // 21:00 UTC is 16:00 in US (-5)
        let sum = model.refresh(21.0, &modulator);
        let us = &model.profiles()[0];
        assert!((us.modulated_weight - 300.0).abs() < 1e-9);

        let ir = &model.profiles()[1];
        let expected_ir = 100.0 * modulator.multiplier(24.5);
        assert!((ir.modulated_weight - expected_ir).abs() < 1e-9);

        assert!((sum - (300.0 + expected_ir)).abs() < 1e-9);
        assert_eq!(model.modulated_sum(), sum);
        assert_eq!(model.modulated_distribution().get("US"), Some(us.modulated_weight));
    }

    #[test]
    fn test_refresh_is_recomputed_each_call() {
        let mut model = model();
        let modulator = DiurnalModulator::discretized();

        let morning = model.refresh(9.0, &modulator);
        let evening = model.refresh(21.0, &modulator);
        assert_ne!(morning, evening);
        assert_eq!(model.modulated_sum(), evening);
    }

    #[test]
    fn test_activity_ratio_bounded() {
        let mut model = model();
        let modulator = DiurnalModulator::continuous();
        for step in 0..96 {
            model.refresh(step as f64 / 4.0, &modulator);
            let ratio = model.activity_ratio();
            assert!(ratio > 0.0 && ratio <= 1.0);
        }
        assert_eq!(model.base_weight_sum(), 400.0);
    }

    #[test]
    fn test_peak_ratio_single_country_reaches_one() {
        let distribution = Distribution::new().with("US", 10.0);
        let timezones: HashMap<String, f64> = [("US".to_string(), -5.0)].into_iter().collect();
        let model = CountryActivityModel::new(&distribution, &timezones).unwrap();

        let peak = model.peak_ratio(&DiurnalModulator::continuous());
        assert!((peak - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_ratio_spread_offsets_below_one() {
        let model = model();
        let peak = model.peak_ratio(&DiurnalModulator::continuous());
        assert!(peak < 1.0);
        assert!(peak > 0.75);
    }
}
