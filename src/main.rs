//! pegelalarm adapter - single-shot poller
//!
//! Each invocation:
//! 1. Loads pegelalarm.toml and arms the watchdog
//! 2. Opens the state store (PostgreSQL, or memory with --dry-run)
//! 3. Polls every active query slot and writes the station tree
//! 4. Writes the warning/alert aggregates and sweeps vanished stations
//!
//! An external scheduler (cron, systemd timer) provides the cadence.
//!
//! Usage:
//!   cargo run --release                          # one cycle against PostgreSQL
//!   cargo run --release -- --dry-run             # one cycle, print the tree as JSON
//!   cargo run --release -- --config other.toml --log-file pegel.log
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (not needed for --dry-run)

use clap::Parser;
use log::LevelFilter;
use std::process;
use std::thread;
use std::time::Duration;

use pegel_service::config::{load_config, ServiceConfig, TimingConfig, DEFAULT_CONFIG_PATH};
use pegel_service::daemon::{Daemon, Termination, ThreadPacer, Watchdog};
use pegel_service::ingest::pegelalarm::HttpTransport;
use pegel_service::logging::{self, Source};
use pegel_service::store::{MemoryStore, PgStore, StateStore};

#[derive(Parser, Debug)]
#[command(name = "pegel_service", version, about = "Polls pegelalarm water levels into a state tree")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Use an in-memory store and print the resulting tree
    #[arg(long)]
    dry_run: bool,

    /// Append log lines to this file
    #[arg(long)]
    log_file: Option<String>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

/// Logs, gives the log backend time to drain, and exits.
fn terminate(termination: Termination, grace: Duration) -> ! {
    log::logger().flush();
    thread::sleep(grace);
    process::exit(termination.exit_code());
}

fn run_with_store<S: StateStore>(config: &ServiceConfig, store: S) -> Result<S, String> {
    let transport = HttpTransport::new(config.timing.request_timeout()).map_err(|e| e.to_string())?;
    let mut daemon = Daemon::new(config.clone(), store, transport, ThreadPacer);
    daemon.run_cycle().map_err(|e| e.to_string())?;
    Ok(daemon.into_store())
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(e) = logging::init_logger(level, args.log_file.as_deref(), false) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            if e.is_absent() {
                logging::error(Source::System, None, &format!("{}; nothing to do", e));
            } else {
                logging::error(Source::System, None, &format!("invalid configuration: {}", e));
            }
            terminate(Termination::ConfigurationAbsent, TimingConfig::default().grace());
        }
    };

    let watchdog = {
        let grace = config.timing.grace();
        let limit = config.timing.watchdog();
        Watchdog::arm(limit, move || {
            logging::error(
                Source::System,
                None,
                &format!("watchdog fired after {}s, terminating", limit.as_secs()),
            );
            log::logger().flush();
            thread::sleep(grace);
            process::exit(Termination::WatchdogFired.exit_code());
        })
    };

    logging::info(
        Source::System,
        None,
        &format!(
            "polling {} slot(s) for country {}",
            config.active_slots().count(),
            config.country
        ),
    );

    let outcome = if args.dry_run {
        run_with_store(&config, MemoryStore::new())
            .and_then(|store| serde_json::to_string_pretty(&store.snapshot()).map_err(|e| e.to_string()))
            .map(|json| println!("{}", json))
    } else {
        let store = match PgStore::connect() {
            Ok(store) => store,
            Err(e) => {
                logging::error(Source::Store, None, &format!("state store unavailable: {}", e));
                watchdog.disarm();
                terminate(Termination::StoreUnavailable, config.timing.grace());
            }
        };
        run_with_store(&config, store).map(|_| ())
    };

    watchdog.disarm();

    match outcome {
        Ok(()) => terminate(Termination::Completed, config.timing.grace()),
        Err(e) => {
            logging::error(Source::System, None, &format!("cycle aborted: {}", e));
            terminate(Termination::StoreUnavailable, config.timing.grace());
        }
    }
}
