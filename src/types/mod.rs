//! Core types and identifiers for the traffic simulator
//!
//! This module contains fundamental types, identifiers, and configuration structures
//! used throughout the simulation system.
//!
//! # Overview
//!
//! - **Distribution**: ordered label weights driving every categorical draw
//! - **Identifiers**: UUID-based identifiers for users, sessions and events
//! - **Enums**: event kinds, OS families, modulation policies, generation modes
//! - **Configuration**: CLI surface and publisher configuration with validation
//!
//! # Usage Example
//!
//! ```rust
//! use appstore_traffic_simulator::types::*;
//!
//! let devices = Distribution::new().with("phone", 0.8).with("tablet", 0.2);
//! assert_eq!(devices.len(), 2);
//!
//! let kind = EventKind::from_label("review_submit");
//! assert_eq!(kind, EventKind::ReviewSubmit);
//! ```

pub mod config;
pub mod distribution;
pub mod enums;
pub mod identifiers;

// Re-export all public types for convenience
pub use config::*;
pub use distribution::*;
pub use enums::*;
pub use identifiers::*;
