//! Simulation models and control
//!
//! # Overview
//!
//! - **WeightedSampler**: categorical draws from a [`Distribution`](crate::types::Distribution)
//! - **DiurnalModulator**: local hour to activity multiplier
//! - **CountryActivityModel**: per-country modulated weights and their sum
//! - **UserPool**: simulated users per country and the global rate maximum
//! - **SimulationClock**: virtual time, resumable across runs
//! - **ArrivalProcess**: thinning of a homogeneous Poisson process
//! - **SimulationContext**: owns all of the above plus the RNG and yields events
//! - **DeliveryTally / DeliveryReport**: completion counters and summaries
//! - **SimulationError**: error handling for simulation operations
//!
//! # Usage Example
//!
//! ```rust
//! use appstore_traffic_simulator::simulation::*;
//!
//! let modulator = DiurnalModulator::continuous();
//! assert!((modulator.multiplier(16.0) - 1.0).abs() < 1e-12);
//!
//! let mut clock = SimulationClock::new(0, 23.5);
//! clock.advance(3600.0);
//! assert!((clock.hour() - 0.5).abs() < 1e-9);
//! ```

pub mod arrival;
pub mod clock;
pub mod context;
pub mod country_activity;
pub mod diurnal;
pub mod error;
pub mod logging;
pub mod pacing;
pub mod sampler;
pub mod statistics;
pub mod user_pool;

// Re-export all public types for convenience
pub use arrival::*;
pub use clock::*;
pub use context::*;
pub use country_activity::*;
pub use diurnal::*;
pub use error::*;
pub use logging::*;
pub use pacing::*;
pub use sampler::*;
pub use statistics::*;
pub use user_pool::*;
