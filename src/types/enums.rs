//! Enumeration types for the traffic simulator
//!
//! This module contains the small closed sets used by event generation and
//! configuration: event kinds with dedicated payloads, operating system
//! families, diurnal modulation policies and generation modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event kinds that carry a type-specific payload
///
/// Event type labels come from configuration, so any label that is not one of
/// the dedicated kinds maps to [`EventKind::Other`] and gets an empty payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Store search, carries the query phrase
    Search,
    /// Review submission, carries a star rating
    ReviewSubmit,
    /// In-app purchase, carries item and price
    InAppPurchase,
    /// Any other interaction (app_open, app_install, app_close, ...)
    Other,
}

impl EventKind {
    /// Classify an event type label
    pub fn from_label(label: &str) -> Self {
        match label {
            "search" => EventKind::Search,
            "review_submit" => EventKind::ReviewSubmit,
            "in_app_purchase" => EventKind::InAppPurchase,
            _ => EventKind::Other,
        }
    }
}

/// Mobile operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// Apple iOS
    Ios,
    /// Google Android
    Android,
}

impl OsFamily {
    /// All families, in draw order
    pub const ALL: [OsFamily; 2] = [OsFamily::Ios, OsFamily::Android];
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Ios => write!(f, "iOS"),
            OsFamily::Android => write!(f, "Android"),
        }
    }
}

/// Policy used to evaluate the diurnal activity curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModulationPolicy {
    /// Closed-form cosine curve
    Continuous,
    /// Precomputed 120-entry lookup table
    #[default]
    Discretized,
}

impl fmt::Display for ModulationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModulationPolicy::Continuous => write!(f, "continuous"),
            ModulationPolicy::Discretized => write!(f, "discretized"),
        }
    }
}

impl FromStr for ModulationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuous" => Ok(ModulationPolicy::Continuous),
            "discretized" | "discrete" | "table" => Ok(ModulationPolicy::Discretized),
            _ => Err(format!("Unknown modulation policy: {}", s)),
        }
    }
}

/// How candidate events are produced and paced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Non-homogeneous Poisson arrivals via thinning, virtual clock
    Poisson,
    /// Back-to-back generation with a jittered sleep, wall clock
    Paced,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Poisson => write!(f, "Poisson (thinning)"),
            GenerationMode::Paced => write!(f, "Paced (jittered rate)"),
        }
    }
}
