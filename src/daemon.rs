/// Core daemon implementation for the pegelalarm service
///
/// One invocation runs exactly one cycle:
/// 1. Polls each active query slot in order, pausing between API calls
/// 2. Writes every returned station into the state tree
/// 3. Writes the cycle-wide warning/alert aggregates
/// 4. Removes stations that are no longer reported (clean cycles only)
///
/// A watchdog thread bounds the whole process so a stuck network call can
/// never keep it alive past the configured ceiling.

use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::ingest::pegelalarm::{build_list_url, fetch_stations, Transport};
use crate::logging::{self, Source};
use crate::reconcile::{reconcile_station, write_aggregates, CycleContext};
use crate::store::{StateStore, StoreError};
use crate::sweep::{sweep_stale_stations, SweepOutcome};

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Delay primitive between API calls; tests substitute a no-op.
pub trait Pacer {
    fn pause(&self, duration: Duration);
}

/// Sleeps the current thread.
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Completed,
    ConfigurationAbsent,
    StoreUnavailable,
    WatchdogFired,
}

impl Termination {
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Completed => 0,
            Termination::ConfigurationAbsent | Termination::StoreUnavailable => 1,
            Termination::WatchdogFired => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Runs `on_fire` on a separate thread unless disarmed within `limit`.
pub struct Watchdog {
    disarm: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn arm<F>(limit: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            // A dropped sender disconnects the channel and counts as disarmed
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(limit) {
                on_fire();
            }
        });
        Self {
            disarm: Some(tx),
            handle: Some(handle),
        }
    }

    /// Stops the watchdog and waits for its thread to finish.
    pub fn disarm(mut self) {
        self.disarm.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm.take();
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Outcome of one full cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub slots_polled: usize,
    pub failed_slots: Vec<usize>,
    pub stations_written: usize,
    pub warnings: Vec<String>,
    pub alerts: Vec<String>,
    pub aggregates_written: bool,
    pub sweep: SweepOutcome,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Main daemon state
pub struct Daemon<S, T, P> {
    config: ServiceConfig,
    store: S,
    transport: T,
    pacer: P,
}

impl<S: StateStore, T: Transport, P: Pacer> Daemon<S, T, P> {
    pub fn new(config: ServiceConfig, store: S, transport: T, pacer: P) -> Self {
        Self {
            config,
            store,
            transport,
            pacer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Polls one slot and writes its stations. Failures are logged and
    /// recorded on the context; they never abort the cycle.
    fn poll_slot(&mut self, index: usize, ctx: &mut CycleContext) -> usize {
        let slot = &self.config.slots[index];
        let context = format!("slot {}", index);
        logging::debug(
            Source::Api,
            Some(&context),
            &build_list_url(&self.config.api_url, &self.config.country, slot),
        );

        let stations = match fetch_stations(&self.transport, &self.config.api_url, &self.config.country, slot) {
            Ok(stations) => stations,
            Err(e) => {
                logging::log_fetch_failure(index, &e);
                ctx.record_slot_failure(index);
                return 0;
            }
        };

        let mut written = 0;
        for record in &stations {
            match reconcile_station(&mut self.store, ctx, record) {
                Ok(Some(_)) => written += 1,
                Ok(None) => {}
                Err(e) => {
                    logging::error(
                        Source::Store,
                        Some(&context),
                        &format!(
                            "writing station '{}' failed: {}",
                            record.station_name.as_deref().unwrap_or("?"),
                            e
                        ),
                    );
                    ctx.record_slot_failure(index);
                    return written;
                }
            }
        }

        logging::info(
            Source::Api,
            Some(&context),
            &format!("{} stations received", stations.len()),
        );
        ctx.record_slot_success();
        written
    }

    /// Runs one full cycle stamped with the current time.
    pub fn run_cycle(&mut self) -> Result<CycleReport, StoreError> {
        self.run_cycle_at(Utc::now())
    }

    /// Runs one full cycle: all active slots in order, aggregates, sweep.
    ///
    /// Slots are polled strictly one after another with the configured
    /// pacing delay between consecutive API calls.
    pub fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport, StoreError> {
        let mut ctx = CycleContext::new();
        let mut stations_written = 0;

        let active: Vec<usize> = self.config.active_slots().map(|(i, _)| i).collect();
        if active.is_empty() {
            logging::warn(Source::System, None, "no active query slots configured");
        }

        for (n, index) in active.iter().enumerate() {
            if n > 0 {
                self.pacer.pause(self.config.timing.pacing());
            }
            stations_written += self.poll_slot(*index, &mut ctx);
        }

        let aggregates_written = write_aggregates(&mut self.store, &ctx, now)?;

        let sweep = sweep_stale_stations(&mut self.store, &ctx)?;

        logging::log_cycle_summary(ctx.slots_polled(), ctx.failed_slots().len(), stations_written);

        Ok(CycleReport {
            slots_polled: ctx.slots_polled(),
            failed_slots: ctx.failed_slots().to_vec(),
            stations_written,
            warnings: ctx.warnings().to_vec(),
            alerts: ctx.alerts().to_vec(),
            aggregates_written,
            sweep,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
