//! Simulation context
//!
//! Everything a run needs (RNG, user pool, activity model, arrival process,
//! event factory, pacing) is built once from the configuration and owned here.
//! The delivery pipeline only sees the [`EventSource`] trait.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::events::{
    wall_clock_iso, Assignment, EventFactory, EventRecord, EventTimestamp, FakerProvider,
    MockDataProvider,
};
use crate::simulation::{
    ArrivalProcess, CountryActivityModel, CountryPopulation, DiurnalModulator, PacingPolicy,
    PopulationReport, SimulationClock, SimulationError, SimulationResult, UserPool,
    WeightedSampler,
};
use crate::types::{GenerationMode, PublisherConfig, ResumeState, UserId};

/// Producer of events for the delivery pipeline
pub trait EventSource: Send {
    /// Next event, or `None` when this step produced nothing (thinned out)
    fn next_event(&mut self) -> SimulationResult<Option<EventRecord>>;

    /// Sleep to apply after a dispatched event
    fn next_delay(&mut self) -> Duration {
        Duration::ZERO
    }

    /// Virtual clock position to report at shutdown
    fn resume_state(&self) -> Option<ResumeState> {
        None
    }
}

#[derive(Debug)]
enum ModeState {
    Poisson { arrivals: ArrivalProcess, pool: UserPool },
    Paced { activity: CountryActivityModel, modulator: DiurnalModulator },
}

/// Owns all simulation state for one run
#[derive(Debug)]
pub struct SimulationContext {
    rng: StdRng,
    factory: EventFactory,
    state: ModeState,
    pacing: PacingPolicy,
    report: PopulationReport,
}

impl SimulationContext {
    /// Build the context with the default `fake`-backed provider
    pub fn from_config(config: &PublisherConfig) -> SimulationResult<Self> {
        Self::with_provider(config, Arc::new(FakerProvider))
    }

    /// Build the context with an explicit mock-data provider
    #[instrument(skip_all, fields(seed = ?config.seed))]
    pub fn with_provider(
        config: &PublisherConfig,
        provider: Arc<dyn MockDataProvider>,
    ) -> SimulationResult<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let parameters = &config.simulation_parameters;
        let countries = &config.country_infos.distribution;
        let timezones = &config.country_infos.timezone;
        let modulator = DiurnalModulator::new(parameters.modulation);

        let (state, pacing, report) = if config.is_poisson_mode() {
            let (pool, active) =
                UserPool::build(countries, parameters, provider.as_ref(), &mut rng)?;
            let activity = CountryActivityModel::new(&active, timezones)?;
            let clock = match &config.resume {
                Some(resume) => SimulationClock::from_resume(resume),
                None => SimulationClock::from_wall_clock(),
            };

            let raw_rate = pool.rate_maximum(parameters.interactions_per_second());
            let arrivals = ArrivalProcess::new(
                clock,
                activity,
                modulator,
                raw_rate,
                parameters.rate_safety_margin,
            )?;

            let peak_intensity = match arrivals.validate_bound() {
                Ok(peak) => peak,
                Err(SimulationError::RateInvariantViolation { intensity, bound }) => {
                    SimulationError::RateInvariantViolation { intensity, bound }.log();
                    intensity
                }
                Err(e) => return Err(e),
            };

            let report = PopulationReport {
                mode: GenerationMode::Poisson,
                modulation: parameters.modulation,
                countries: population_lines(arrivals.activity(), Some(&pool)),
                dropped_countries: countries
                    .labels()
                    .filter(|label| !active.contains(label))
                    .map(str::to_string)
                    .collect(),
                total_users: pool.total_users(),
                raw_rate: Some(raw_rate),
                rate_bound: Some(arrivals.bound()),
                peak_intensity: Some(peak_intensity),
            };
            let pacing =
                PacingPolicy::fixed_seconds(config.generation_rate.poisson_min_interval_seconds);

            (ModeState::Poisson { arrivals, pool }, pacing, report)
        } else {
            let activity = CountryActivityModel::new(countries, timezones)?;
            let report = PopulationReport {
                mode: GenerationMode::Paced,
                modulation: parameters.modulation,
                countries: population_lines(&activity, None),
                dropped_countries: Vec::new(),
                total_users: 0,
                raw_rate: None,
                rate_bound: None,
                peak_intensity: None,
            };
            let pacing = PacingPolicy::jittered(
                config.generation_rate.events_per_second,
                config.generation_rate.randomness_factor,
            );

            (ModeState::Paced { activity, modulator }, pacing, report)
        };

        let factory = EventFactory::new(
            config.event_type.distribution.clone(),
            config.device_type.distribution.clone(),
            provider,
        )?;

        info!(
            "Simulation context ready: {} mode, {} countries, {} users",
            report.mode,
            report.countries.len(),
            report.total_users
        );

        Ok(Self { rng, factory, state, pacing, report })
    }

    /// Active generation mode
    pub fn mode(&self) -> GenerationMode {
        self.report.mode
    }

    /// Pacing policy of the active mode
    pub fn pacing(&self) -> PacingPolicy {
        self.pacing
    }

    /// Startup population report
    pub fn report(&self) -> &PopulationReport {
        &self.report
    }

    /// Arrival process, Poisson mode only
    pub fn arrivals(&self) -> Option<&ArrivalProcess> {
        match &self.state {
            ModeState::Poisson { arrivals, .. } => Some(arrivals),
            ModeState::Paced { .. } => None,
        }
    }

    /// User pool, Poisson mode only
    pub fn user_pool(&self) -> Option<&UserPool> {
        match &self.state {
            ModeState::Poisson { pool, .. } => Some(pool),
            ModeState::Paced { .. } => None,
        }
    }
}

impl EventSource for SimulationContext {
    fn next_event(&mut self) -> SimulationResult<Option<EventRecord>> {
        let rng = &mut self.rng;
        match &mut self.state {
            ModeState::Poisson { arrivals, pool } => {
                let Some(country) = arrivals.next_tick(rng)?.accepted else {
                    return Ok(None);
                };
                let user_id = pool.pick(&country, rng)?;
                let timestamp = EventTimestamp::Micros(arrivals.clock().timestamp_micros());
                self.factory.create(rng, Assignment::new(country, user_id), timestamp).map(Some)
            }
            ModeState::Paced { activity, modulator } => {
                let clock = SimulationClock::from_wall_clock();
                activity.refresh(clock.hour(), modulator);
                let country =
                    WeightedSampler::sample(activity.modulated_distribution(), rng)?.to_string();
                let user_id = UserId::from_uuid(self.factory.provider().unique_id(rng));
                let timestamp = EventTimestamp::Iso(wall_clock_iso());
                self.factory.create(rng, Assignment::new(country, user_id), timestamp).map(Some)
            }
        }
    }

    fn next_delay(&mut self) -> Duration {
        self.pacing.next_delay(&mut self.rng)
    }

    fn resume_state(&self) -> Option<ResumeState> {
        self.arrivals().map(|arrivals| arrivals.clock().snapshot())
    }
}

fn population_lines(
    activity: &CountryActivityModel,
    pool: Option<&UserPool>,
) -> Vec<CountryPopulation> {
    activity
        .profiles()
        .iter()
        .map(|profile| CountryPopulation {
            country: profile.label.clone(),
            base_weight: profile.base_weight,
            utc_offset_hours: profile.utc_offset_hours,
            users: pool.map_or(0, |pool| pool.population(&profile.label)),
        })
        .collect()
}
