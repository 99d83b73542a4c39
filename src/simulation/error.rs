//! Error types and handling
//!
//! This module contains error types and error handling for the simulation.

use thiserror::Error;
use tracing::{error, warn};

use crate::delivery::TransportError;

/// Errors that can occur during simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A weighted draw was attempted on a distribution with no entries
    #[error("Cannot sample from an empty distribution")]
    EmptyDistribution,

    /// A country has no UTC offset
    #[error("Country '{country}' has no timezone entry")]
    MissingTimezoneEntry {
        /// Country label
        country: String,
    },

    /// Every country was dropped while building the user pool
    #[error("No country has a non-zero simulated population")]
    NoActiveCountries,

    /// A user was requested for a country without a pool
    #[error("No user pool for country '{0}'")]
    UnknownCountry(String),

    /// Arrival intensity exceeded the thinning upper bound
    #[error("Arrival intensity {intensity:.6} exceeds the thinning bound {bound:.6}")]
    RateInvariantViolation {
        /// Instantaneous intensity (events/s)
        intensity: f64,
        /// Configured upper bound (events/s)
        bound: f64,
    },

    /// Configuration is inconsistent
    #[error("Configuration validation failed: {0}")]
    ConfigurationError(String),

    /// An event could not be handed to the transport
    #[error("Dispatch failed: {0}")]
    DispatchFailure(#[from] TransportError),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SimulationError {
    /// Create a configuration error
    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a missing timezone error
    pub fn missing_timezone(country: impl Into<String>) -> Self {
        Self::MissingTimezoneEntry { country: country.into() }
    }

    /// Check if this is a recoverable error
    ///
    /// Only per-event dispatch failures and rate-bound violations leave the
    /// stream intact; everything else stops the delivery loop.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SimulationError::DispatchFailure(_) => true,
            SimulationError::RateInvariantViolation { .. } => true,
            SimulationError::EmptyDistribution => false,
            SimulationError::MissingTimezoneEntry { .. } => false,
            SimulationError::NoActiveCountries => false,
            SimulationError::UnknownCountry(_) => false,
            SimulationError::ConfigurationError(_) => false,
            SimulationError::IoError(_) => false,
            SimulationError::SerializationError(_) => false,
        }
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self {
            SimulationError::EmptyDistribution => "Sampling",
            SimulationError::MissingTimezoneEntry { .. } => "Configuration",
            SimulationError::NoActiveCountries => "User Pool",
            SimulationError::UnknownCountry(_) => "User Pool",
            SimulationError::RateInvariantViolation { .. } => "Arrival Process",
            SimulationError::ConfigurationError(_) => "Configuration",
            SimulationError::DispatchFailure(_) => "Dispatch",
            SimulationError::IoError(_) => "IO",
            SimulationError::SerializationError(_) => "Serialization",
        }
    }

    /// Log the error at a level matching its recoverability
    pub fn log(&self) {
        if self.is_recoverable() {
            warn!(category = self.category(), "Recoverable error: {}", self);
        } else {
            error!(category = self.category(), "Fatal error: {}", self);
        }
    }
}

/// Result type for simulation operations
pub type SimulationResult<T> = Result<T, SimulationError>;
