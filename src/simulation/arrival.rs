//! Non-homogeneous Poisson arrivals by thinning
//!
//! Candidate arrivals are drawn from a homogeneous process at the bound rate
//! `R`. Each candidate advances the virtual clock, the country activity is
//! refreshed at the new time and the candidate is kept with probability
//! `λ(t) / R`, where `λ(t) = R_raw × modulated_sum / base_weight_sum`.

use rand::Rng;
use rand_distr::{Distribution as _, Exp};
use tracing::{debug, instrument, warn};

use crate::simulation::{
    CountryActivityModel, DiurnalModulator, SimulationClock, SimulationError, SimulationResult,
    WeightedSampler,
};

/// Log a rate-bound violation warning every N occurrences after the first
pub const VIOLATION_LOG_INTERVAL: u64 = 10_000;

/// Result of one thinning step
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalTick {
    /// Inter-arrival gap drawn for this candidate (seconds)
    pub gap_seconds: f64,
    /// Instantaneous intensity at the candidate's virtual time (events/s)
    pub intensity: f64,
    /// Country assigned to the arrival, `None` when the candidate was thinned out
    pub accepted: Option<String>,
}

/// Thinning-based arrival generator over virtual time
#[derive(Debug, Clone)]
pub struct ArrivalProcess {
    clock: SimulationClock,
    activity: CountryActivityModel,
    modulator: DiurnalModulator,
    raw_rate: f64,
    bound: f64,
    gaps: Exp<f64>,
    candidates: u64,
    accepted: u64,
    violations: u64,
}

impl ArrivalProcess {
    /// Create a process whose bound is `raw_rate × safety_margin`
    ///
    /// `raw_rate` is the aggregate rate (events/s) at full activity, normally
    /// [`UserPool::rate_maximum`](crate::simulation::UserPool::rate_maximum).
    pub fn new(
        clock: SimulationClock,
        activity: CountryActivityModel,
        modulator: DiurnalModulator,
        raw_rate: f64,
        safety_margin: f64,
    ) -> SimulationResult<Self> {
        if !(raw_rate.is_finite() && raw_rate > 0.0) {
            return Err(SimulationError::configuration_error(format!(
                "arrival rate must be positive and finite, got {}",
                raw_rate
            )));
        }
        if !(safety_margin.is_finite() && safety_margin > 0.0) {
            return Err(SimulationError::configuration_error(format!(
                "rate safety margin must be positive and finite, got {}",
                safety_margin
            )));
        }

        let bound = raw_rate * safety_margin;
        let gaps = Exp::new(bound).map_err(|e| {
            SimulationError::configuration_error(format!("invalid thinning bound {}: {}", bound, e))
        })?;

        debug!(
            "Arrival process: raw rate {:.6} events/s, bound {:.6} events/s, {} policy",
            raw_rate,
            bound,
            modulator.policy()
        );

        Ok(Self {
            clock,
            activity,
            modulator,
            raw_rate,
            bound,
            gaps,
            candidates: 0,
            accepted: 0,
            violations: 0,
        })
    }

    /// Run one thinning step
    ///
    /// Draws a gap, advances the clock, refreshes the country activity and
    /// decides acceptance. An accepted candidate gets a country drawn from the
    /// refreshed modulated weights.
    pub fn next_tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> SimulationResult<ArrivalTick> {
        let gap_seconds = self.gaps.sample(rng);
        self.clock.advance(gap_seconds);

        let intensity = self.intensity_at_clock();
        self.candidates += 1;

        if intensity > self.bound {
            self.record_violation(intensity);
        }

        let acceptance = (intensity / self.bound).min(1.0);
        if rng.gen::<f64>() >= acceptance {
            return Ok(ArrivalTick { gap_seconds, intensity, accepted: None });
        }

        let country = WeightedSampler::sample(self.activity.modulated_distribution(), rng)?;
        self.accepted += 1;

        Ok(ArrivalTick { gap_seconds, intensity, accepted: Some(country.to_string()) })
    }

    /// Confirm that `λ(t) ≤ R` across a full day for every country offset combined
    ///
    /// Returns the peak intensity on success.
    #[instrument(skip(self))]
    pub fn validate_bound(&self) -> SimulationResult<f64> {
        let peak_intensity = self.raw_rate * self.activity.peak_ratio(&self.modulator);
        if peak_intensity > self.bound {
            return Err(SimulationError::RateInvariantViolation {
                intensity: peak_intensity,
                bound: self.bound,
            });
        }
        debug!("Peak intensity {:.6} within bound {:.6}", peak_intensity, self.bound);
        Ok(peak_intensity)
    }

    fn intensity_at_clock(&mut self) -> f64 {
        let base = self.activity.base_weight_sum();
        let modulated = self.activity.refresh(self.clock.hour(), &self.modulator);
        if base > 0.0 {
            self.raw_rate * modulated / base
        } else {
            0.0
        }
    }

    fn record_violation(&mut self, intensity: f64) {
        self.violations += 1;
        if self.violations == 1 || self.violations % VIOLATION_LOG_INTERVAL == 0 {
            SimulationError::RateInvariantViolation { intensity, bound: self.bound }.log();
            warn!("Thinning bound exceeded {} times so far; acceptance clamped", self.violations);
        }
    }

    /// Virtual clock
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Country activity at the last tick
    pub fn activity(&self) -> &CountryActivityModel {
        &self.activity
    }

    /// Diurnal modulator in use
    pub fn modulator(&self) -> DiurnalModulator {
        self.modulator
    }

    /// Aggregate rate at full activity (events/s)
    pub fn raw_rate(&self) -> f64 {
        self.raw_rate
    }

    /// Thinning bound `R` (events/s)
    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Candidates drawn so far
    pub fn candidates(&self) -> u64 {
        self.candidates
    }

    /// Candidates accepted so far
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Candidates whose intensity exceeded the bound
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Fraction of candidates accepted
    pub fn acceptance_rate(&self) -> f64 {
        if self.candidates == 0 {
            0.0
        } else {
            self.accepted as f64 / self.candidates as f64
        }
    }
}
