//! Mock data provider
//!
//! Supplies the free-form fields of an event (identifiers, search phrases).
//! All randomness comes from the caller's RNG so seeded runs stay reproducible.

use fake::faker::company::en::Bs;
use fake::Fake;
use rand::RngCore;
use uuid::{Builder, Uuid};

/// Source of synthetic identifiers and phrases
pub trait MockDataProvider: Send + Sync + std::fmt::Debug {
    /// A fresh random (v4) UUID
    fn unique_id(&self, rng: &mut dyn RngCore) -> Uuid;

    /// A short business-speak phrase used as a search query
    fn search_phrase(&self, rng: &mut dyn RngCore) -> String;
}

/// [`MockDataProvider`] backed by the `fake` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct FakerProvider;

impl FakerProvider {
    /// Create a new provider
    pub fn new() -> Self {
        Self
    }
}

impl MockDataProvider for FakerProvider {
    fn unique_id(&self, rng: &mut dyn RngCore) -> Uuid {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Builder::from_random_bytes(bytes).into_uuid()
    }

    fn search_phrase(&self, mut rng: &mut dyn RngCore) -> String {
        Bs().fake_with_rng(&mut rng)
    }
}
