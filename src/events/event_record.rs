//! Event record and wire payload
//!
//! One [`EventRecord`] becomes one UTF-8 JSON object on the wire. The
//! type-specific `event_details` object is itself JSON-encoded into a string
//! field, which is what downstream consumers parse.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::simulation::SimulationResult;
use crate::types::{EventId, SessionId, UserId};

/// Type-specific payload of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDetails {
    /// `search`
    Search {
        /// Query phrase
        search_query: String,
    },
    /// `review_submit`
    Review {
        /// Star rating, 1-5
        rating: u8,
    },
    /// `in_app_purchase`
    Purchase {
        /// Item identifier, `iap_<100-999>`
        item_id: String,
        /// Price in USD, 2 decimals
        price_usd: f64,
    },
    /// Any other event type, serialised as `{}`
    Empty {},
}

impl EventDetails {
    /// Whether the payload carries no fields
    pub fn is_empty(&self) -> bool {
        matches!(self, EventDetails::Empty {})
    }
}

/// When an event happened, as seen by the generator
///
/// Poisson mode stamps events with virtual microseconds, paced mode with a
/// wall-clock RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    /// Microseconds since the Unix epoch
    Micros(i64),
    /// RFC 3339 timestamp
    Iso(String),
}

/// A complete synthetic interaction event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wall-clock creation time, microseconds since the Unix epoch
    pub generation_timestamp: i64,
    /// Unique event identifier
    pub event_id: EventId,
    /// Event time (virtual micros or ISO string)
    pub event_timestamp: EventTimestamp,
    /// Acting user
    pub user_id: UserId,
    /// Session identifier
    pub session_id: SessionId,
    /// Event type label
    pub event_type: String,
    /// Application identifier, `app_<1000-9999>`
    pub app_id: String,
    /// Device type label
    pub device_type: String,
    /// `<iOS|Android> <major>.<minor>`
    pub os_version: String,
    /// Country label
    pub country_code: String,
    /// Type-specific payload, encoded as a JSON string on the wire
    #[serde(serialize_with = "details_as_string", deserialize_with = "details_from_string")]
    pub event_details: EventDetails,
}

impl EventRecord {
    /// Serialise to the UTF-8 JSON wire payload
    pub fn to_payload(&self) -> SimulationResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a wire payload
    pub fn from_payload(payload: &[u8]) -> SimulationResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

fn details_as_string<S>(details: &EventDetails, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let encoded = serde_json::to_string(details).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&encoded)
}

fn details_from_string<'de, D>(deserializer: D) -> Result<EventDetails, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    serde_json::from_str(&encoded).map_err(D::Error::custom)
}
