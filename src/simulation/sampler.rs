//! Weighted categorical sampling
//!
//! Every nominal attribute of an event (event type, device type, country) is
//! drawn through [`WeightedSampler`].

use rand::Rng;

use crate::simulation::{SimulationError, SimulationResult};
use crate::types::Distribution;

/// Draws one label from a [`Distribution`] with probability proportional to its weight
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSampler;

impl WeightedSampler {
    /// Draw a label
    ///
    /// Uses a single uniform draw in `[0, total_weight)` and one cumulative pass,
    /// so results are reproducible for a seeded RNG. A distribution whose weights
    /// are all zero falls back to a uniform pick over its labels; one whose
    /// weights overflow to an infinite total is a configuration error.
    pub fn sample<'a, R: Rng + ?Sized>(
        distribution: &'a Distribution,
        rng: &mut R,
    ) -> SimulationResult<&'a str> {
        if distribution.is_empty() {
            return Err(SimulationError::EmptyDistribution);
        }

        let total = distribution.total_weight();
        if !total.is_finite() {
            return Err(SimulationError::configuration_error(format!(
                "distribution weights sum to {}",
                total
            )));
        }
        if !(total > 0.0) {
            let index = rng.gen_range(0..distribution.len());
            return distribution
                .labels()
                .nth(index)
                .ok_or(SimulationError::EmptyDistribution);
        }

        let target = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (label, weight) in distribution.iter() {
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            if target < cumulative {
                return Ok(label);
            }
            last_positive = Some(label);
        }

        // Rounding can leave `target` a hair above the final cumulative sum.
        last_positive.ok_or(SimulationError::EmptyDistribution)
    }
}
