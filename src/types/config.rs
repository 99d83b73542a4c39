//! Configuration structures for the traffic simulator
//!
//! This module contains the command line surface and the publisher
//! configuration document, together with loading and validation logic.

use super::{Distribution, ModulationPolicy};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Default fraction of each country's population simulated as users
pub const DEFAULT_USERS_POPULATION_FRACTION: f64 = 0.001;

/// Default number of publisher replicas sharing the population
pub const DEFAULT_GKE_REPLICAS_FACTOR: f64 = 10.0;

/// Default number of interactions per user per day
pub const DEFAULT_USER_INTERACTIONS_PER_DAY: f64 = 57.0;

/// Default pacing jitter fraction
pub const DEFAULT_RANDOMNESS_FACTOR: f64 = 0.1;

/// Default floor sleep after each event in Poisson mode (at most ~445 events/s)
pub const DEFAULT_POISSON_MIN_INTERVAL_SECONDS: f64 = 0.00225;

/// Longest sleep between two events, in either mode (one day)
pub const MAX_PACING_INTERVAL_SECONDS: f64 = 86_400.0;

/// Progress line interval in Poisson mode
pub const DEFAULT_POISSON_PROGRESS_INTERVAL: u64 = 100_000;

/// Progress line interval in paced mode
pub const DEFAULT_PACED_PROGRESS_INTERVAL: u64 = 1_000;

/// Command line arguments structure
#[derive(Debug, Clone, Parser)]
#[command(
    name = "appstore-traffic-simulator",
    version,
    about = "App-store traffic simulator - publishes diurnally modulated synthetic events",
    long_about = "Synthesizes app-store user interaction events (searches, installs, reviews, \
purchases, ...) and publishes them at a controlled, time-varying rate. Arrival intensity \
follows each country's local time of day.

EXAMPLES:
    # Publish using a configuration file
    appstore-traffic-simulator --config publisher_config.json

    # Validate the configuration and show the simulated population
    appstore-traffic-simulator --config publisher_config.json --dry-run

    # Enable verbose logging
    appstore-traffic-simulator --config publisher_config.json --verbose

Stop publishing with Ctrl+C; the final published/failed tally is printed on exit."
)]
pub struct CliArgs {
    /// Configuration file path (JSON format)
    #[arg(
        short,
        long,
        help = "Path to the publisher JSON configuration file",
        long_help = "Path to the publisher JSON configuration file. The file must define the \
                     destination identifiers and the event, device and country distributions."
    )]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug logging")]
    pub debug: bool,

    /// Dry run mode - validate configuration without publishing
    #[arg(long, help = "Validate configuration and build the simulation without publishing")]
    pub dry_run: bool,
}

/// Section wrapping a single distribution (`{"distribution": {...}}`)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DistributionSection {
    /// Label weights
    #[serde(default)]
    pub distribution: Distribution,
}

/// Country distribution plus per-country UTC offsets
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CountryInfos {
    /// Population weight per country
    #[serde(default)]
    pub distribution: Distribution,
    /// UTC offset in hours per country
    #[serde(default)]
    pub timezone: HashMap<String, f64>,
}

/// Rate control settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationRate {
    /// Target rate; 0 selects Poisson mode
    pub events_per_second: f64,
    /// Jitter fraction applied to the paced sleep (0.0-1.0)
    pub randomness_factor: f64,
    /// Floor sleep after each event in Poisson mode
    pub poisson_min_interval_seconds: f64,
}

impl Default for GenerationRate {
    fn default() -> Self {
        Self {
            events_per_second: 0.0,
            randomness_factor: DEFAULT_RANDOMNESS_FACTOR,
            poisson_min_interval_seconds: DEFAULT_POISSON_MIN_INTERVAL_SECONDS,
        }
    }
}

/// Population sizing and arrival model parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationParameters {
    /// Fraction of each country's weight turned into simulated users
    pub users_population_fraction: f64,
    /// Number of publisher replicas sharing the population
    pub gke_replicas_factor: f64,
    /// Interactions per user per day
    pub user_interactions_per_day: f64,
    /// Diurnal curve evaluation policy
    pub modulation: ModulationPolicy,
    /// Multiplier (>= 1.0) applied to the thinning upper bound
    pub rate_safety_margin: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            users_population_fraction: DEFAULT_USERS_POPULATION_FRACTION,
            gke_replicas_factor: DEFAULT_GKE_REPLICAS_FACTOR,
            user_interactions_per_day: DEFAULT_USER_INTERACTIONS_PER_DAY,
            modulation: ModulationPolicy::default(),
            rate_safety_margin: 1.0,
        }
    }
}

impl SimulationParameters {
    /// Interactions per user per second
    pub fn interactions_per_second(&self) -> f64 {
        self.user_interactions_per_day / (24.0 * 60.0 * 60.0)
    }
}

/// Last known virtual clock position of a previous run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResumeState {
    /// Virtual timestamp in microseconds since the Unix epoch
    pub virtual_timestamp_micros: i64,
    /// Virtual hour of day; derived from the timestamp when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_hour: Option<f64>,
}

/// Periodic progress reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReportingConfig {
    /// Emit a progress line every N published events
    pub progress_interval: Option<u64>,
}

/// Log output options; the level comes from the CLI flags
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// JSON lines on the console instead of human-readable text
    pub json: bool,
    /// Directory for daily rolling JSON log files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Outbound transport selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Newline-delimited JSON on stdout
    #[default]
    Stdout,
    /// HTTP POST per event
    Http {
        /// Base URL of the ingestion endpoint
        endpoint: String,
    },
}

/// Publisher configuration document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublisherConfig {
    /// Human-readable description of the traffic profile
    #[serde(default)]
    pub description: String,

    /// Destination project identifier
    #[serde(default)]
    pub gcp_project_id: String,

    /// Destination topic name
    #[serde(default)]
    pub pubsub_topic_name: String,

    /// Event type weights
    #[serde(default)]
    pub event_type: DistributionSection,

    /// Device type weights
    #[serde(default)]
    pub device_type: DistributionSection,

    /// Country weights and UTC offsets
    #[serde(default)]
    pub country_infos: CountryInfos,

    /// Rate control settings
    #[serde(default)]
    pub generation_rate: GenerationRate,

    /// Population sizing and arrival model parameters
    #[serde(default)]
    pub simulation_parameters: SimulationParameters,

    /// Virtual clock position to continue from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeState>,

    /// Progress reporting
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Outbound transport
    #[serde(default)]
    pub transport: TransportConfig,

    /// Log output options
    #[serde(default)]
    pub logging: LoggingSection,

    /// Random seed for reproducible results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Configuration file read error
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Validation errors for the publisher configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    /// Destination identifiers are missing
    #[error("'gcp_project_id' and 'pubsub_topic_name' must be set in the config file")]
    MissingDestination,

    /// A required distribution has no entries
    #[error("Distribution '{field}' must not be empty")]
    EmptyDistribution {
        /// Configuration path of the distribution
        field: String,
    },

    /// A distribution weight is negative or not finite
    #[error("Invalid weight in '{field}' for '{label}': {value}")]
    InvalidWeight {
        /// Configuration path of the distribution
        field: String,
        /// Offending label
        label: String,
        /// Offending weight
        value: f64,
    },

    /// A country has no UTC offset
    #[error("Country '{country}' has no entry in country_infos.timezone")]
    MissingTimezoneEntry {
        /// Country label
        country: String,
    },

    /// Rate settings are out of range
    #[error("Invalid generation rate: {0}")]
    InvalidRate(String),

    /// Percentage value is out of range
    #[error("Invalid percentage for {field}: {value} (must be between 0.0 and 1.0)")]
    InvalidPercentage {
        /// Name of the field with invalid percentage
        field: String,
        /// The invalid percentage value
        value: f64,
    },

    /// Transport settings are incomplete
    #[error("Invalid transport configuration: {0}")]
    InvalidTransport(String),

    /// A simulation parameter is out of range
    #[error("Invalid value for {field}: {value}")]
    InvalidParameter {
        /// Name of the field
        field: String,
        /// The invalid value
        value: f64,
    },
}

impl PublisherConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.gcp_project_id.trim().is_empty() || self.pubsub_topic_name.trim().is_empty() {
            return Err(ConfigValidationError::MissingDestination);
        }

        self.validate_distribution("event_type.distribution", &self.event_type.distribution)?;
        self.validate_distribution("device_type.distribution", &self.device_type.distribution)?;
        self.validate_distribution(
            "country_infos.distribution",
            &self.country_infos.distribution,
        )?;

        for country in self.country_infos.distribution.labels() {
            match self.country_infos.timezone.get(country) {
                Some(offset) if offset.is_finite() => {}
                Some(offset) => {
                    return Err(ConfigValidationError::InvalidParameter {
                        field: format!("country_infos.timezone.{}", country),
                        value: *offset,
                    })
                }
                None => {
                    return Err(ConfigValidationError::MissingTimezoneEntry {
                        country: country.to_string(),
                    })
                }
            }
        }

        let rate = &self.generation_rate;
        if !rate.events_per_second.is_finite() || rate.events_per_second < 0.0 {
            return Err(ConfigValidationError::InvalidRate(format!(
                "events_per_second must be >= 0, got {}",
                rate.events_per_second
            )));
        }
        if rate.events_per_second > 0.0
            && 1.0 / rate.events_per_second > MAX_PACING_INTERVAL_SECONDS
        {
            return Err(ConfigValidationError::InvalidRate(format!(
                "events_per_second must be 0 or at least one event per {} s, got {}",
                MAX_PACING_INTERVAL_SECONDS, rate.events_per_second
            )));
        }
        let floor = rate.poisson_min_interval_seconds;
        if !floor.is_finite() || !(0.0..=MAX_PACING_INTERVAL_SECONDS).contains(&floor) {
            return Err(ConfigValidationError::InvalidRate(format!(
                "poisson_min_interval_seconds must be within 0..={}, got {}",
                MAX_PACING_INTERVAL_SECONDS, floor
            )));
        }
        self.validate_percentage("generation_rate.randomness_factor", rate.randomness_factor)?;

        let params = &self.simulation_parameters;
        if !(params.users_population_fraction > 0.0) {
            return Err(ConfigValidationError::InvalidParameter {
                field: "simulation_parameters.users_population_fraction".to_string(),
                value: params.users_population_fraction,
            });
        }
        if !(params.gke_replicas_factor >= 1.0) {
            return Err(ConfigValidationError::InvalidParameter {
                field: "simulation_parameters.gke_replicas_factor".to_string(),
                value: params.gke_replicas_factor,
            });
        }
        let interactions = params.user_interactions_per_day;
        if !(interactions > 0.0) || !interactions.is_finite() {
            return Err(ConfigValidationError::InvalidParameter {
                field: "simulation_parameters.user_interactions_per_day".to_string(),
                value: interactions,
            });
        }
        if !(params.rate_safety_margin >= 1.0) || !params.rate_safety_margin.is_finite() {
            return Err(ConfigValidationError::InvalidParameter {
                field: "simulation_parameters.rate_safety_margin".to_string(),
                value: params.rate_safety_margin,
            });
        }

        if let Some(0) = self.reporting.progress_interval {
            return Err(ConfigValidationError::InvalidParameter {
                field: "reporting.progress_interval".to_string(),
                value: 0.0,
            });
        }

        if let TransportConfig::Http { endpoint } = &self.transport {
            if endpoint.trim().is_empty() {
                return Err(ConfigValidationError::InvalidTransport(
                    "transport.endpoint must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Helper method to validate a required distribution
    fn validate_distribution(
        &self,
        field: &str,
        distribution: &Distribution,
    ) -> Result<(), ConfigValidationError> {
        if distribution.is_empty() {
            return Err(ConfigValidationError::EmptyDistribution { field: field.to_string() });
        }
        if let Some((label, value)) = distribution.first_invalid_weight() {
            return Err(ConfigValidationError::InvalidWeight {
                field: field.to_string(),
                label: label.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Helper method to validate percentage values
    fn validate_percentage(&self, field: &str, value: f64) -> Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigValidationError::InvalidPercentage {
                field: field.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Whether the configuration selects thinning-based Poisson arrivals
    pub fn is_poisson_mode(&self) -> bool {
        self.generation_rate.events_per_second == 0.0
    }

    /// Progress interval, falling back to the mode's default
    pub fn progress_interval(&self) -> u64 {
        self.reporting.progress_interval.unwrap_or(if self.is_poisson_mode() {
            DEFAULT_POISSON_PROGRESS_INTERVAL
        } else {
            DEFAULT_PACED_PROGRESS_INTERVAL
        })
    }
}
