//! Event delivery
//!
//! - **Transport**: non-blocking publish contract with stdout and HTTP implementations
//! - **DeliveryPipeline**: the `Running → Stopping → Stopped` generation loop

pub mod pipeline;
pub mod transport;

// Re-export all public types for convenience
pub use pipeline::*;
pub use transport::*;
