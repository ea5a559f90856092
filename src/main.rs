//! Car finder - remembers where the car is parked and guides you back
//!
//! Module structure:
//! - `domain/` - Core types (Coordinate, PositionSample, events, errors, haversine)
//! - `io/` - External interfaces (gpsd, route replay, saved position store)
//! - `services/` - Location engine (PositionSource, ProximityTracker, CarFinder)
//! - `infra/` - Infrastructure (Config)

use anyhow::bail;
use car_finder::domain::geo::distance_km;
use car_finder::domain::types::{Coordinate, PositionSample, TrackerEvent};
use car_finder::infra::{Config, ProviderKind};
use car_finder::io::{GpsdProvider, LocationProvider, ReferenceStore, ReplayProvider};
use car_finder::services::{CarFinder, PositionSource, ProximityTracker};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Car finder - save your parking spot and walk back to it
#[derive(Parser, Debug)]
#[command(name = "car-finder", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save the current position (or the given coordinates) as the car position
    Save {
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Track the current position until the car is reached
    Find,
    /// Forget the saved car position
    Forget,
    /// Show the saved car position and the distance to it
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(Config::resolve_config_path);
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        provider = ?config.provider_kind(),
        poll_interval_ms = %config.poll_interval_ms(),
        arrival_threshold_km = %config.arrival_threshold_km(),
        store_file = %config.store_file(),
        "config_loaded"
    );

    let provider = build_provider(&config)?;
    let source = PositionSource::new(provider, config.position_options());
    let tracker = ProximityTracker::from_config(source, &config);
    let events = tracker.subscribe();
    let mut finder = CarFinder::new(tracker, ReferenceStore::new(config.store_file()));

    tokio::spawn(log_events(events));

    match args.command {
        Command::Save { lat, lon } => {
            match (lat, lon) {
                (Some(lat), Some(lon)) => {
                    finder.set_candidate(PositionSample::now(Coordinate::new(lat, lon)))
                }
                _ => {
                    finder.update_position().await;
                }
            }
            if !finder.save_position()? {
                bail!("no position to save");
            }
            if let Some(saved) = finder.tracker().reference() {
                println!("Car position saved at {}", saved.coordinate);
            }
        }
        Command::Find => {
            finder.initialize().await?;
            if !finder.is_saved() {
                bail!("no saved car position, run `car-finder save` first");
            }

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("shutdown_signal_received");
                let _ = shutdown_tx.send(true);
            });

            if finder.guide(shutdown_rx).await? {
                println!("You have found your car!");
            }
        }
        Command::Forget => {
            finder.reinitialize()?;
            println!("Car position forgotten");
        }
        Command::Status => match finder.store().load()? {
            None => println!("No car position saved"),
            Some(saved) => {
                println!("Car saved at {} ({})", saved.coordinate, saved.timestamp);
                match finder.tracker().position_source().get_current_position().await {
                    Ok(here) => {
                        println!("Distance to car: {:.3} km", distance_km(&here, &saved))
                    }
                    Err(e) => warn!(error = %e, "status_fix_failed"),
                }
            }
        },
    }

    Ok(())
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn LocationProvider>> {
    Ok(match config.provider_kind() {
        ProviderKind::Gpsd => Arc::new(GpsdProvider::new(config.gpsd_addr())),
        ProviderKind::Replay => Arc::new(ReplayProvider::from_file(config.replay_file())?),
    })
}

/// Presentation stand-in: log every tracker event
async fn log_events(mut events: broadcast::Receiver<TrackerEvent>) {
    loop {
        match events.recv().await {
            Ok(TrackerEvent::PositionUpdated { coordinate, distance_km }) => {
                info!(
                    coordinate = %coordinate,
                    distance_m = %(distance_km * 1000.0).round(),
                    "distance_to_car"
                );
            }
            Ok(TrackerEvent::Arrived) => info!("arrived_at_car"),
            Ok(TrackerEvent::LocationError { message }) => {
                warn!(message = %message, "location_error")
            }
            Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "events_lagged"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
