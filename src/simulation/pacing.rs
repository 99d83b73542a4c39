//! Pacing between dispatched events

use rand::Rng;
use std::time::Duration;

use crate::types::MAX_PACING_INTERVAL_SECONDS;

/// Sleep applied by the delivery loop after each dispatched event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacingPolicy {
    /// `(1 / events_per_second) × (1 + U(-r, r))`, never negative
    Jittered {
        /// Target rate
        events_per_second: f64,
        /// Jitter fraction `r`
        randomness_factor: f64,
    },
    /// Constant floor sleep
    Fixed(Duration),
    /// No sleep at all
    Unthrottled,
}

impl PacingPolicy {
    /// Jittered pacing around a target rate
    pub fn jittered(events_per_second: f64, randomness_factor: f64) -> Self {
        Self::Jittered { events_per_second, randomness_factor }
    }

    /// Fixed sleep from a number of seconds; non-positive values disable pacing
    pub fn fixed_seconds(seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            Self::Fixed(capped_duration(seconds))
        } else {
            Self::Unthrottled
        }
    }

    /// Delay before the next event
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            PacingPolicy::Jittered { events_per_second, randomness_factor } => {
                if !(events_per_second.is_finite() && events_per_second > 0.0) {
                    return Duration::ZERO;
                }
                let base = 1.0 / events_per_second;
                let jitter = if randomness_factor > 0.0 {
                    rng.gen_range(-randomness_factor..=randomness_factor)
                } else {
                    0.0
                };
                capped_duration((base * (1.0 + jitter)).max(0.0))
            }
            PacingPolicy::Fixed(delay) => delay,
            PacingPolicy::Unthrottled => Duration::ZERO,
        }
    }
}

/// Seconds to `Duration`, saturating at [`MAX_PACING_INTERVAL_SECONDS`]
fn capped_duration(seconds: f64) -> Duration {
    let cap = Duration::from_secs_f64(MAX_PACING_INTERVAL_SECONDS);
    Duration::try_from_secs_f64(seconds).map_or(cap, |delay| delay.min(cap))
}
