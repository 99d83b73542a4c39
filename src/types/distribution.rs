//! Weighted categorical distributions
//!
//! A [`Distribution`] is an ordered list of `(label, weight)` pairs loaded from a
//! JSON object. Document order is preserved so that seeded draws are reproducible
//! across runs with the same configuration file.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ordered mapping from label to non-negative weight
///
/// Weights do not need to sum to 1.0; consumers normalise implicitly by
/// drawing against the total weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    entries: Vec<(String, f64)>,
}

impl Distribution {
    /// Create an empty distribution
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label, replacing the weight if the label already exists
    pub fn insert(&mut self, label: impl Into<String>, weight: f64) {
        let label = label.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = weight,
            None => self.entries.push((label, weight)),
        }
    }

    /// Builder-style variant of [`Distribution::insert`]
    pub fn with(mut self, label: impl Into<String>, weight: f64) -> Self {
        self.insert(label, weight);
        self
    }

    /// Weight for a label, if present
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, weight)| *weight)
    }

    /// Whether the label is present
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the distribution has no labels
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights
    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|(_, weight)| weight).sum()
    }

    /// Iterate over `(label, weight)` pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(label, weight)| (label.as_str(), *weight))
    }

    /// Labels in document order
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Mutable access to the weights in document order, labels stay fixed
    pub fn weights_mut(&mut self) -> impl Iterator<Item = &mut f64> + '_ {
        self.entries.iter_mut().map(|(_, weight)| weight)
    }

    /// Build a new distribution keeping only the entries accepted by `keep`
    ///
    /// The receiver is left untouched; remaining weights are not renormalised.
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&str, f64) -> bool,
    {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(label, weight)| keep(label.as_str(), *weight))
                .cloned()
                .collect(),
        }
    }

    /// First entry whose weight is negative or not finite
    pub fn first_invalid_weight(&self) -> Option<(&str, f64)> {
        self.iter().find(|(_, weight)| !weight.is_finite() || *weight < 0.0)
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Distribution {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut distribution = Distribution::new();
        for (label, weight) in iter {
            distribution.insert(label, weight);
        }
        distribution
    }
}

impl Serialize for Distribution {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, weight) in &self.entries {
            map.serialize_entry(label, weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DistributionVisitor;

        impl<'de> Visitor<'de> for DistributionVisitor {
            type Value = Distribution;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of label to numeric weight")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut distribution = Distribution::new();
                while let Some((label, weight)) = access.next_entry::<String, f64>()? {
                    distribution.insert(label, weight);
                }
                Ok(distribution)
            }
        }

        deserializer.deserialize_map(DistributionVisitor)
    }
}
