//! Beacon registration monitor
//!
//! Joins the registration protocol with loopback enabled and periodically
//! logs every process, publisher, subscriber, service and client it knows.

use beacon::config::{BeaconConfig, ConfigError, ConfigLoader, LogLevel};
use beacon::consts::DEFAULT_CONFIG_PATH;
use beacon_registration::{Components, Monitoring, RegistrationContext};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Beacon registration monitor
#[derive(Parser, Debug)]
#[command(name = "beacon_monitor")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Print everything announced on the beacon registration layer")]
#[command(long_about = None)]
struct Args {
    /// Configuration file; defaults apply if it does not exist
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Snapshot interval in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and snapshots as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("monitor failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = BeaconConfig::load(&args.config);
    let log_level = loaded
        .as_ref()
        .map(|config| config.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    let config = match loaded {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) => {
            warn!("{} not found, using defaults", args.config.display());
            BeaconConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    config.validate()?;

    info!("Beacon monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut registration = config.registration.clone();
    registration.loopback = true;
    let context = RegistrationContext::create(&registration, "beacon_monitor", Components::MONITORING)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let interval = Duration::from_millis(args.interval_ms.max(1));
    let mut next = Instant::now();
    while running.load(Ordering::SeqCst) {
        if Instant::now() >= next {
            report(&context.monitoring(), args.json)?;
            next += interval;
        }
        thread::sleep(Duration::from_millis(50).min(interval));
    }

    context.shutdown();
    info!("Beacon monitor shutdown complete");
    Ok(())
}

fn report(snapshot: &Monitoring, json: bool) -> Result<(), serde_json::Error> {
    if json {
        info!(snapshot = %serde_json::to_string(snapshot)?, "registration snapshot");
        return Ok(());
    }

    info!(
        processes = snapshot.processes.len(),
        publishers = snapshot.publishers.len(),
        subscribers = snapshot.subscribers.len(),
        services = snapshot.services.len(),
        clients = snapshot.clients.len(),
        "registration snapshot"
    );
    for entry in &snapshot.processes {
        info!(
            host = %entry.info.host_name,
            pid = entry.info.process_id,
            unit = %entry.info.unit_name,
            severity = ?entry.info.state.severity,
            components = %entry.info.component_init_info,
            "process"
        );
    }
    for entry in snapshot.publishers.iter().chain(&snapshot.subscribers) {
        info!(
            host = %entry.info.host_name,
            pid = entry.info.process_id,
            topic = %entry.info.topic_name,
            direction = ?entry.info.direction,
            datatype = %entry.info.datatype.name,
            "topic"
        );
    }
    for entry in &snapshot.services {
        info!(
            host = %entry.info.host_name,
            service = %entry.info.service_name,
            methods = entry.info.methods.len(),
            "service"
        );
    }
    for entry in &snapshot.clients {
        info!(
            host = %entry.info.host_name,
            service = %entry.info.service_name,
            "client"
        );
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        log_level.as_directive()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        directive
            .parse()
            .unwrap_or_else(|_| tracing::Level::INFO.into()),
    );

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
