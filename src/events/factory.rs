//! Event assembly
//!
//! [`EventFactory`] turns a country/user assignment into a complete
//! [`EventRecord`], drawing every other attribute from the configured
//! distributions and the mock-data provider.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::trace;

use crate::events::{EventDetails, EventRecord, EventTimestamp, MockDataProvider};
use crate::simulation::{SimulationError, SimulationResult, WeightedSampler};
use crate::types::{Distribution, EventId, EventKind, OsFamily, SessionId, UserId};

/// Who an event belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Country label
    pub country_code: String,
    /// Acting user
    pub user_id: UserId,
}

impl Assignment {
    /// Create an assignment
    pub fn new(country_code: impl Into<String>, user_id: UserId) -> Self {
        Self { country_code: country_code.into(), user_id }
    }
}

/// Builds event records from configured distributions
#[derive(Debug, Clone)]
pub struct EventFactory {
    event_types: Distribution,
    device_types: Distribution,
    provider: Arc<dyn MockDataProvider>,
}

impl EventFactory {
    /// Create a factory; both distributions must be non-empty
    pub fn new(
        event_types: Distribution,
        device_types: Distribution,
        provider: Arc<dyn MockDataProvider>,
    ) -> SimulationResult<Self> {
        if event_types.is_empty() || device_types.is_empty() {
            return Err(SimulationError::EmptyDistribution);
        }
        Ok(Self { event_types, device_types, provider })
    }

    /// Mock-data provider shared with the rest of the simulation
    pub fn provider(&self) -> &Arc<dyn MockDataProvider> {
        &self.provider
    }

    /// Assemble one event
    pub fn create<R: Rng>(
        &self,
        rng: &mut R,
        assignment: Assignment,
        event_timestamp: EventTimestamp,
    ) -> SimulationResult<EventRecord> {
        let event_type = WeightedSampler::sample(&self.event_types, rng)?.to_string();
        let event_details = self.details_for(&event_type, rng);

        let event_id = EventId::from_uuid(self.provider.unique_id(rng));
        let session_id = SessionId::from_uuid(self.provider.unique_id(rng));
        let app_id = format!("app_{}", rng.gen_range(1000..=9999));
        let device_type = WeightedSampler::sample(&self.device_types, rng)?.to_string();
        let os_version = os_version(rng);

        trace!("Created {} event for {}", event_type, assignment.country_code);

        Ok(EventRecord {
            generation_timestamp: Utc::now().timestamp_micros(),
            event_id,
            event_timestamp,
            user_id: assignment.user_id,
            session_id,
            event_type,
            app_id,
            device_type,
            os_version,
            country_code: assignment.country_code,
            event_details,
        })
    }

    fn details_for<R: Rng>(&self, event_type: &str, rng: &mut R) -> EventDetails {
        match EventKind::from_label(event_type) {
            EventKind::Search => {
                EventDetails::Search { search_query: self.provider.search_phrase(rng) }
            }
            EventKind::ReviewSubmit => EventDetails::Review { rating: rng.gen_range(1..=5) },
            EventKind::InAppPurchase => EventDetails::Purchase {
                item_id: format!("iap_{}", rng.gen_range(100..=999)),
                price_usd: round_cents(rng.gen_range(0.99..=99.99)),
            },
            EventKind::Other => EventDetails::Empty {},
        }
    }
}

/// `<iOS|Android> <12-15>.<0-5>`
pub fn os_version<R: Rng + ?Sized>(rng: &mut R) -> String {
    let family = OsFamily::ALL[rng.gen_range(0..OsFamily::ALL.len())];
    format!("{} {}.{}", family, rng.gen_range(12..=15), rng.gen_range(0..=5))
}

/// Current wall-clock time as RFC 3339 with microseconds and a `Z` suffix
pub fn wall_clock_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
