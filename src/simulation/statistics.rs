//! Statistics collection and reporting
//!
//! Delivery tallies shared between the generation loop and completion
//! handlers, plus the startup population report and the final run summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::types::{GenerationMode, ModulationPolicy, ResumeState};

/// Process-wide delivery counters
///
/// Completion handlers and the reporting path touch these concurrently, so
/// every counter is atomic.
#[derive(Debug, Default)]
pub struct DeliveryTally {
    published: AtomicU64,
    failed: AtomicU64,
    dispatched: AtomicU64,
}

impl DeliveryTally {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a handed-off event, returning the new dispatched total
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count an acknowledged event, returning the new published total
    pub fn record_published(&self) -> u64 {
        self.published.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a rejected event, returning the new failed total
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Events acknowledged by the transport
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Events the transport reported as failed
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Events handed to the transport
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Dispatched events with no completion yet
    pub fn in_flight(&self) -> u64 {
        self.dispatched().saturating_sub(self.published() + self.failed())
    }
}

/// Per-country line of the startup report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountryPopulation {
    /// Country label
    pub country: String,
    /// Static population weight
    pub base_weight: f64,
    /// UTC offset in hours
    pub utc_offset_hours: f64,
    /// Simulated users (0 in paced mode, which does not build a pool)
    pub users: usize,
}

/// Startup report describing the simulated population and rate bound
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationReport {
    /// Generation mode
    pub mode: GenerationMode,
    /// Diurnal policy
    pub modulation: ModulationPolicy,
    /// Active countries in document order
    pub countries: Vec<CountryPopulation>,
    /// Countries dropped because their population rounded to zero
    pub dropped_countries: Vec<String>,
    /// Total simulated users
    pub total_users: usize,
    /// Aggregate rate at full activity (events/s), Poisson mode only
    pub raw_rate: Option<f64>,
    /// Thinning bound (events/s), Poisson mode only
    pub rate_bound: Option<f64>,
    /// Peak intensity over a day (events/s), Poisson mode only
    pub peak_intensity: Option<f64>,
}

impl PopulationReport {
    /// Expected events per day at the modelled peak, Poisson mode only
    pub fn peak_events_per_day(&self) -> Option<f64> {
        self.peak_intensity.map(|rate| rate * 86_400.0)
    }
}

impl fmt::Display for PopulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulated Population ===")?;
        writeln!(f, "Mode: {} ({} modulation)", self.mode, self.modulation)?;
        for country in &self.countries {
            writeln!(
                f,
                "  {:<4} weight {:>14.0}  UTC{:+05.1}  users {:>8}",
                country.country, country.base_weight, country.utc_offset_hours, country.users
            )?;
        }
        if !self.dropped_countries.is_empty() {
            writeln!(f, "Dropped (zero population): {}", self.dropped_countries.join(", "))?;
        }
        writeln!(f, "Total users: {}", self.total_users)?;
        if let (Some(raw), Some(bound)) = (self.raw_rate, self.rate_bound) {
            writeln!(f, "Global rate maximum: {:.4} events/s (bound {:.4} events/s)", raw, bound)?;
        }
        if let (Some(peak), Some(per_day)) = (self.peak_intensity, self.peak_events_per_day()) {
            writeln!(f, "Peak intensity: {:.4} events/s (~{:.0} events/day)", peak, per_day)?;
        }
        Ok(())
    }
}

/// Final summary of a delivery run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryReport {
    /// Events acknowledged by the transport
    pub published: u64,
    /// Events the transport rejected
    pub failed: u64,
    /// Events handed to the transport
    pub dispatched: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Virtual clock position at shutdown, Poisson mode only
    pub resume_state: Option<ResumeState>,
}

impl DeliveryReport {
    /// Build the report from the final tally
    pub fn from_tally(
        tally: &DeliveryTally,
        elapsed: Duration,
        resume_state: Option<ResumeState>,
    ) -> Self {
        Self {
            published: tally.published(),
            failed: tally.failed(),
            dispatched: tally.dispatched(),
            elapsed,
            resume_state,
        }
    }

    /// Average published events per wall-clock second
    pub fn published_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.published as f64 / seconds
        } else {
            0.0
        }
    }

    /// Failed events as a percentage of completed events
    pub fn failure_percentage(&self) -> f64 {
        let completed = self.published + self.failed;
        if completed == 0 {
            0.0
        } else {
            (self.failed as f64 / completed as f64) * 100.0
        }
    }
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Published: {}", self.published)?;
        writeln!(f, "Failed: {} ({:.1}%)", self.failed, self.failure_percentage())?;
        writeln!(f, "Dispatched: {}", self.dispatched)?;
        writeln!(
            f,
            "Elapsed: {:.2}s ({:.1} events/s)",
            self.elapsed.as_secs_f64(),
            self.published_per_second()
        )?;
        if let Some(resume) = &self.resume_state {
            write!(f, "Resume at virtual timestamp {} micros", resume.virtual_timestamp_micros)?;
            if let Some(hour) = resume.virtual_hour {
                write!(f, " ({:.4}h UTC)", hour)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_tally_counts() {
        let tally = DeliveryTally::new();
        assert_eq!(tally.record_dispatched(), 1);
        assert_eq!(tally.record_dispatched(), 2);
        assert_eq!(tally.record_published(), 1);
        assert_eq!(tally.record_failed(), 1);
        assert_eq!(tally.in_flight(), 0);

        tally.record_dispatched();
        assert_eq!(tally.in_flight(), 1);
    }

    #[test]
    fn test_tally_concurrent_updates() {
        let tally = Arc::new(DeliveryTally::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tally = Arc::clone(&tally);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        tally.record_published();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tally.published(), 8_000);
    }

    #[test]
    fn test_delivery_report_summary() {
        let tally = DeliveryTally::new();
        for _ in 0..4 {
            tally.record_dispatched();
        }
        for _ in 0..3 {
            tally.record_published();
        }
        tally.record_failed();

        let report = DeliveryReport::from_tally(
            &tally,
            Duration::from_secs(2),
            Some(ResumeState { virtual_timestamp_micros: 42, virtual_hour: Some(6.5) }),
        );
        assert_eq!(report.failure_percentage(), 25.0);
        assert_eq!(report.published_per_second(), 1.5);

        let summary = report.to_string();
        assert!(summary.contains("Published: 3"));
        assert!(summary.contains("Failed: 1 (25.0%)"));
        assert!(summary.contains("virtual timestamp 42 micros"));
    }

    #[test]
    fn test_empty_report() {
        let report = DeliveryReport::from_tally(&DeliveryTally::new(), Duration::ZERO, None);
        assert_eq!(report.failure_percentage(), 0.0);
        assert_eq!(report.published_per_second(), 0.0);
        assert!(!report.to_string().contains("Resume"));
    }

    #[test]
    fn test_population_report_display() {
        let report = PopulationReport {
            mode: GenerationMode::Poisson,
            modulation: ModulationPolicy::Discretized,
            countries: vec![CountryPopulation {
                country: "US".to_string(),
                base_weight: 331_000_000.0,
                utc_offset_hours: -5.0,
                users: 33_100,
            }],
            dropped_countries: vec!["VA".to_string()],
            total_users: 33_100,
            raw_rate: Some(21.8),
            rate_bound: Some(21.8),
            peak_intensity: Some(21.8),
        };

        let text = report.to_string();
        assert!(text.contains("US"));
        assert!(text.contains("33100"));
        assert!(text.contains("Dropped (zero population): VA"));
        assert!(text.contains("~1883520 events/day"));
    }
}
