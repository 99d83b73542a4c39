//! Simulated user population
//!
//! Every country gets `floor(weight × fraction / replicas)` users with stable
//! identifiers. Countries whose population rounds down to zero are dropped.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::events::MockDataProvider;
use crate::simulation::{SimulationError, SimulationResult};
use crate::types::{Distribution, SimulationParameters, UserId};

/// Users per country, fixed for the lifetime of the run
#[derive(Debug, Clone)]
pub struct UserPool {
    users_by_country: HashMap<String, Vec<UserId>>,
}

impl UserPool {
    /// Build the pool and return it with the surviving country distribution
    ///
    /// The returned distribution is a new value holding only countries with at
    /// least one user; `countries` itself is left untouched.
    pub fn build<R: Rng>(
        countries: &Distribution,
        parameters: &SimulationParameters,
        provider: &dyn MockDataProvider,
        rng: &mut R,
    ) -> SimulationResult<(Self, Distribution)> {
        if countries.is_empty() {
            return Err(SimulationError::EmptyDistribution);
        }

        let mut users_by_country = HashMap::new();
        for (label, weight) in countries.iter() {
            let population = population_for(weight, parameters);
            if population == 0 {
                warn!("Dropping country {} (weight {}): population rounds to zero", label, weight);
                continue;
            }

            let users: Vec<UserId> =
                (0..population).map(|_| UserId::from_uuid(provider.unique_id(rng))).collect();
            debug!("Created {} users for {}", users.len(), label);
            users_by_country.insert(label.to_string(), users);
        }

        if users_by_country.is_empty() {
            return Err(SimulationError::NoActiveCountries);
        }

        let filtered = countries.filtered(|label, _| users_by_country.contains_key(label));
        let pool = Self { users_by_country };
        info!(
            "User pool ready: {} users across {} countries",
            pool.total_users(),
            filtered.len()
        );

        Ok((pool, filtered))
    }

    /// Upper bound on the aggregate arrival rate (events/s) when every user is at peak activity
    pub fn rate_maximum(&self, interactions_per_second: f64) -> f64 {
        self.total_users() as f64 * interactions_per_second
    }

    /// Pick a user of `country` uniformly at random
    pub fn pick<R: Rng + ?Sized>(&self, country: &str, rng: &mut R) -> SimulationResult<UserId> {
        self.users_by_country
            .get(country)
            .and_then(|users| users.choose(rng))
            .copied()
            .ok_or_else(|| SimulationError::UnknownCountry(country.to_string()))
    }

    /// Number of users in `country`, 0 for unknown or dropped countries
    pub fn population(&self, country: &str) -> usize {
        self.users_by_country.get(country).map_or(0, Vec::len)
    }

    /// Total users across all countries
    pub fn total_users(&self) -> usize {
        self.users_by_country.values().map(Vec::len).sum()
    }
}

/// `floor(weight × fraction / replicas)`
pub fn population_for(weight: f64, parameters: &SimulationParameters) -> usize {
    let raw = weight * parameters.users_population_fraction / parameters.gke_replicas_factor;
    if raw.is_finite() && raw > 0.0 {
        raw.floor() as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FakerProvider;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parameters() -> SimulationParameters {
        SimulationParameters::default()
    }

    #[test]
    fn test_population_formula() {
        let params = parameters();
        assert_eq!(population_for(1_000_000.0, &params), 100);
        assert_eq!(population_for(19_999.0, &params), 1);
        assert_eq!(population_for(9_999.0, &params), 0);
        assert_eq!(population_for(0.001, &params), 0);
    }

    #[test]
    fn test_build_drops_empty_countries() {
        let countries = Distribution::new()
            .with("US", 331_000_000.0)
            .with("VA", 0.001)
            .with("CA", 38_000_000.0);
        let mut rng = StdRng::seed_from_u64(1);

        let (pool, filtered) =
            UserPool::build(&countries, &parameters(), &FakerProvider, &mut rng).unwrap();

        assert_eq!(pool.population("US"), 33_100);
        assert_eq!(pool.population("CA"), 3_800);
        assert_eq!(pool.population("VA"), 0);
        assert!(!filtered.contains("VA"));
        assert_eq!(filtered.labels().collect::<Vec<_>>(), vec!["US", "CA"]);

        // the input is never mutated
        assert!(countries.contains("VA"));
    }

    #[test]
    fn test_build_fails_when_everything_dropped() {
        let countries = Distribution::new().with("VA", 0.001);
        let mut rng = StdRng::seed_from_u64(1);

        let result = UserPool::build(&countries, &parameters(), &FakerProvider, &mut rng);
        assert!(matches!(result, Err(SimulationError::NoActiveCountries)));
    }

    #[test]
    fn test_rate_maximum() {
        let countries = Distribution::new().with("US", 1_000_000.0);
        let mut rng = StdRng::seed_from_u64(1);
        let (pool, _) =
            UserPool::build(&countries, &parameters(), &FakerProvider, &mut rng).unwrap();

        let ips = parameters().interactions_per_second();
        assert!((pool.rate_maximum(ips) - 100.0 * 57.0 / 86_400.0).abs() < 1e-12);
    }

    #[test]
    fn test_pick_returns_member_of_country() {
        let countries = Distribution::new().with("US", 1_000_000.0).with("CA", 500_000.0);
        let mut rng = StdRng::seed_from_u64(4);
        let (pool, _) =
            UserPool::build(&countries, &parameters(), &FakerProvider, &mut rng).unwrap();

        let user = pool.pick("CA", &mut rng).unwrap();
        assert!(pool.users_by_country["CA"].contains(&user));
        assert!(!pool.users_by_country["US"].contains(&user));

        assert!(matches!(pool.pick("FR", &mut rng), Err(SimulationError::UnknownCountry(_))));
    }
}
