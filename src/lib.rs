//! App-Store Traffic Simulator
//!
//! Synthesizes app-store user interaction events (searches, installs, reviews,
//! purchases, ...) and publishes them to a message transport at a controlled,
//! time-varying rate.
//!
//! # Overview
//!
//! Arrival intensity follows each country's local time of day: a diurnal curve
//! scales every country's population weight, and a non-homogeneous Poisson
//! process sampled by thinning decides when events happen and where they come
//! from. Each accepted arrival is turned into a complete event record and
//! dispatched asynchronously while delivery outcomes are tallied.
//!
//! ## Key Features
//!
//! - **Diurnal Modulation**: closed-form or 120-bucket table activity curve
//! - **Thinning Arrivals**: virtual clock driven by exponential gaps, resumable across runs
//! - **Per-Country User Pools**: stable user identifiers sized from population weights
//! - **Paced Mode**: jittered fixed-rate generation for low-fidelity profiles
//! - **Pluggable Transports**: NDJSON on stdout or HTTP POST per event
//!
//! ## Quick Start
//!
//! ```rust
//! use appstore_traffic_simulator::*;
//!
//! let config = PublisherConfig::from_json(r#"{
//!     "gcp_project_id": "demo-project",
//!     "pubsub_topic_name": "app-events",
//!     "event_type": {"distribution": {"search": 0.3, "app_open": 0.7}},
//!     "device_type": {"distribution": {"smartphone": 1.0}},
//!     "country_infos": {
//!         "distribution": {"US": 331000000},
//!         "timezone": {"US": -5}
//!     },
//!     "seed": 7
//! }"#)?;
//! config.validate()?;
//!
//! let mut context = SimulationContext::from_config(&config)?;
//! println!("{}", context.report());
//!
//! while context.next_event()?.is_none() {}
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: configuration, distributions, identifiers and enums
//! - [`simulation`]: sampling, modulation, user pools, clock, arrivals and context
//! - [`events`]: event records, the event factory and mock data
//! - [`delivery`]: transports and the delivery pipeline
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌──────────────────┐    ┌─────────────┐
//! │  Diurnal    │───►│ CountryActivity  │───►│  Arrival    │
//! │  Modulator  │    │ Model            │    │  Process    │
//! └─────────────┘    └──────────────────┘    └─────────────┘
//!                                                   │
//!                    ┌──────────────────┐           ▼
//!                    │    UserPool      │───►┌─────────────┐
//!                    └──────────────────┘    │EventFactory │
//!                                            └─────────────┘
//!                                                   │
//!                                                   ▼
//!                    ┌──────────────────┐    ┌─────────────┐
//!                    │    Transport     │◄───│  Delivery   │
//!                    └──────────────────┘    │  Pipeline   │
//!                                            └─────────────┘
//! ```
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

// Module declarations
pub mod delivery;
pub mod events;
pub mod simulation;
pub mod types;

// Re-export the most used types

// Core types and configuration
pub use types::{
    ConfigError, ConfigValidationError, Distribution, EventId, GenerationMode, ModulationPolicy,
    PublisherConfig, ResumeState, SessionId, UserId,
};

// Simulation types and functionality
pub use simulation::{
    ArrivalProcess, CountryActivityModel, DeliveryReport, DeliveryTally, DiurnalModulator,
    EventSource, SimulationClock, SimulationContext, SimulationError, SimulationResult, UserPool,
    WeightedSampler,
};

// Event types and functionality
pub use events::{Assignment, EventFactory, EventRecord, EventTimestamp, MockDataProvider};

// Delivery types and functionality
pub use delivery::{DeliveryPipeline, Destination, PipelineState, Transport, TransportError};
