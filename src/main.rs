//! ride-tracker CLI
//!
//! Follows a ride's driver (or its booking status) against a live backend
//! and prints each event until interrupted.

use clap::{Parser, Subcommand};
use std::process;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ride_tracker::{
    TrackingEvent, TrackingResult,
    state::{AppConfig, AppState},
};

#[derive(Parser)]
#[command(name = "ride-tracker")]
#[command(about = "Follow a ride's driver location and ETA", long_about = None)]
struct Args {
    /// API base URL (overrides RIDE_TRACKER_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the driver's location and print state, location and ETA events
    Track {
        ride_id: String,

        /// Pickup latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        pickup_lat: f64,

        /// Pickup longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        pickup_lng: f64,

        /// Poll interval in milliseconds (defaults to the configured interval)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Watch a booking's status and print every change
    Status { ride_id: String },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(base_url: Option<String>) -> TrackingResult<AppConfig> {
    AppConfig::from_lookup(|key| {
        if key == "RIDE_TRACKER_BASE_URL" {
            if let Some(url) = &base_url {
                return Some(url.clone());
            }
        }
        std::env::var(key).ok()
    })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging();

    let config = match load_config(args.base_url) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error creating services: {}", e);
            process::exit(1);
        }
    };

    let result = match args.command {
        Command::Track {
            ride_id,
            pickup_lat,
            pickup_lng,
            interval_ms,
        } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or(state.config.poll_interval);
            track(&state, &ride_id, pickup_lat, pickup_lng, interval).await
        }
        Command::Status { ride_id } => watch_status(&state, &ride_id).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn track(state: &AppState, ride_id: &str, pickup_lat: f64, pickup_lng: f64, interval: Duration) -> TrackingResult<()> {
    let session = &state.tracking_session;
    let mut events = session.subscribe();
    session.start_tracking(ride_id, pickup_lat, pickup_lng, interval).await?;
    println!("Tracking ride {} (Ctrl-C to stop)", ride_id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if let TrackingEvent::StateChanged { state: new_state, .. } = event {
                        if new_state.is_terminal() {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => tracing::warn!("Skipped {} events", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await
}

fn print_event(event: &TrackingEvent) {
    match event {
        TrackingEvent::StateChanged { state, .. } => {
            println!("[{}] state: {}", state.status_label(), state);
        }
        TrackingEvent::LocationUpdated(location) => {
            let stale = if location.is_stale() { " (stale)" } else { "" };
            println!(
                "location: {:.5}, {:.5} updated {}{}",
                location.latitude,
                location.longitude,
                location.last_updated_text(),
                stale
            );
        }
        TrackingEvent::EtaUpdated { eta, .. } => {
            println!("eta: {}, {}", eta.display_text(), eta.distance_text());
        }
    }
}

async fn watch_status(state: &AppState, ride_id: &str) -> TrackingResult<()> {
    let monitor = &state.status_monitor;
    let mut changes = monitor.subscribe();
    monitor.start_monitoring(ride_id, state.config.status_poll_interval).await?;
    println!("Watching status of ride {} (Ctrl-C to stop)", ride_id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(change) => {
                    let trackable = if change.is_trackable() { " (trackable)" } else { "" };
                    println!("status: '{}' -> '{}'{}", change.old_status, change.new_status, trackable);
                }
                Err(RecvError::Lagged(missed)) => tracing::warn!("Skipped {} status changes", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    monitor.stop_monitoring();
    Ok(())
}
