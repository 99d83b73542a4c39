//! Unique identifier types for generated traffic
//!
//! This module contains UUID-based identifier types for synthetic users,
//! sessions and events. All of them serialise as plain hyphenated UUID strings,
//! which is what downstream ingestion expects.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.0.hyphenated().to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                let uuid = Uuid::parse_str(&s).map_err(serde::de::Error::custom)?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a synthetic app-store user
    UserId
);

uuid_identifier!(
    /// Identifier of a single interaction event
    EventId
);

uuid_identifier!(
    /// Identifier of the session an event belongs to
    SessionId
);
