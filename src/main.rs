// App-Store Traffic Simulator - Main Entry Point
//
// You can run it via Cargo:
//
// ```console
// $ cargo build --release
// $ ./target/release/appstore-traffic-simulator --config publisher_config.json
// ```
//
// Or validate a configuration without publishing:
//
// ```console
// $ ./target/release/appstore-traffic-simulator \
//     --config publisher_config.json --dry-run --verbose
// ```

use anyhow::Context;
use appstore_traffic_simulator::delivery::{transport_from_config, DeliveryPipeline, Destination};
use appstore_traffic_simulator::simulation::{DeliveryReport, LoggingConfig, SimulationContext};
use appstore_traffic_simulator::types::config::CliArgs;
use appstore_traffic_simulator::types::PublisherConfig;
use clap::Parser;
use std::process::{self, ExitCode};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match PublisherConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let logging =
        LoggingConfig::from_cli_flags(args.verbose, args.debug).with_section(&config.logging);
    // held until main returns so the file writer drains
    let _log_guard = match logging.init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    info!("Starting App-Store Traffic Simulator");

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("Configuration validation failed: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration loaded and validated successfully");

    if args.dry_run {
        match SimulationContext::from_config(&config) {
            Ok(context) => {
                eprintln!("Configuration validation successful!");
                print_configuration_summary(&config);
                eprint!("{}", context.report());
                eprintln!("Dry run mode - no events will be published.");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                error!("Failed to build simulation: {}", e);
                eprintln!("Failed to build simulation: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    print_startup_banner(&config);

    match run_publisher(&config).await {
        Ok(report) => {
            eprintln!();
            eprint!("{}", report);
            info!("App-Store Traffic Simulator stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Publisher failed: {:#}", e);
            eprintln!("Publisher failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the simulation and publish until Ctrl+C
async fn run_publisher(config: &PublisherConfig) -> anyhow::Result<DeliveryReport> {
    let mut context =
        SimulationContext::from_config(config).context("Failed to build simulation context")?;
    eprint!("{}", context.report());

    let transport =
        transport_from_config(&config.transport).context("Failed to create transport")?;
    let destination = Destination::from_config(config);
    eprintln!("Publishing to {} via {:?}", destination, transport);
    eprintln!("Press Ctrl+C to stop.");

    let mut pipeline = DeliveryPipeline::new(transport, destination, config.progress_interval());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let report = pipeline.run(&mut context, shutdown).await.context("Delivery loop failed")?;

    if let Some(resume) = &report.resume_state {
        match serde_json::to_string(resume) {
            Ok(json) => info!(resume = %json, "Virtual clock position at shutdown"),
            Err(e) => warn!("Failed to serialize resume state: {}", e),
        }
    }

    Ok(report)
}

/// Print startup banner with configuration summary
fn print_startup_banner(config: &PublisherConfig) {
    eprintln!("App-Store Traffic Simulator");
    eprintln!("===========================");
    eprintln!("Synthetic app-store interaction events with diurnal Poisson arrivals");
    eprintln!();
    print_configuration_summary(config);
}

/// Print the configuration summary
fn print_configuration_summary(config: &PublisherConfig) {
    eprintln!("Configuration:");
    if !config.description.is_empty() {
        eprintln!("  Description: {}", config.description);
    }
    eprintln!("  Project: {}", config.gcp_project_id);
    eprintln!("  Topic: {}", config.pubsub_topic_name);
    eprintln!("  Event Types: {}", config.event_type.distribution.len());
    eprintln!("  Device Types: {}", config.device_type.distribution.len());
    eprintln!("  Countries: {}", config.country_infos.distribution.len());
    if config.is_poisson_mode() {
        eprintln!(
            "  Rate: Poisson thinning ({} interactions/user/day)",
            config.simulation_parameters.user_interactions_per_day
        );
        eprintln!(
            "  Population: {} of weight / {} replicas",
            config.simulation_parameters.users_population_fraction,
            config.simulation_parameters.gke_replicas_factor
        );
    } else {
        eprintln!(
            "  Rate: {} events/s (±{:.0}%)",
            config.generation_rate.events_per_second,
            config.generation_rate.randomness_factor * 100.0
        );
    }
    eprintln!("  Modulation: {}", config.simulation_parameters.modulation);
    eprintln!("  Progress Interval: {}", config.progress_interval());
    if let Some(seed) = config.seed {
        eprintln!("  Random Seed: {}", seed);
    }
    eprintln!();
}
