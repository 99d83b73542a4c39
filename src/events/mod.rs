//! Event records and their assembly
//!
//! - **EventRecord**: the wire-level event, serialised to one JSON object
//! - **EventFactory**: draws event type, device, OS and payload for an assignment
//! - **MockDataProvider**: identifiers and search phrases
//!
//! # Usage Example
//!
//! ```rust
//! use appstore_traffic_simulator::events::*;
//! use appstore_traffic_simulator::types::*;
//! use rand::SeedableRng;
//! use std::sync::Arc;
//!
//! let factory = EventFactory::new(
//!     Distribution::new().with("search", 1.0),
//!     Distribution::new().with("smartphone", 1.0),
//!     Arc::new(FakerProvider),
//! )
//! .unwrap();
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let event = factory
//!     .create(&mut rng, Assignment::new("US", UserId::new()), EventTimestamp::Micros(0))
//!     .unwrap();
//! assert_eq!(event.country_code, "US");
//! ```

pub mod event_record;
pub mod factory;
pub mod mock_data;

// Re-export all public types for convenience
pub use event_record::*;
pub use factory::*;
pub use mock_data::*;
