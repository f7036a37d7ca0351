//! Polling engine: the periodic cycle that refreshes the channel store.
//!
//! Each cycle:
//!
//! 1. Snapshot the activity mask.
//! 2. Without an open session, end the cycle.
//! 3. DIO: read every bank.
//! 4. ENC: read every selected encoder.
//! 5. ADC: read every selected analog input, masked to 14 bits.
//!
//! The first failed driver call ends the cycle. Subsystems handled earlier in
//! the same cycle keep the values they just stored. The next cycle runs on
//! schedule regardless.

use crate::rt::{detect_rt_mode, rt_setup};
use crate::session::Session;
use crate::store::ChannelStore;
use s626_common::consts::{ADC_CHANNELS, ADC_SAMPLE_MASK, DIO_BANKS, ENC_CHANNELS};
use s626_common::error::{DaqError, DaqResult};
use s626_common::hal::config::PollerConfig;
use s626_common::hal::driver::HalCallError;
use s626_common::hal::types::{ActivityMask, Subsystem};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No session was open.
    Idle,
    /// Every active subsystem was read.
    Complete,
    /// A driver call failed; the rest of the cycle was skipped.
    Aborted {
        /// Subsystem being read.
        subsystem: Subsystem,
        /// Bank or channel being read.
        channel: usize,
        /// The failure.
        error: HalCallError,
    },
}

/// Run one driver call under the session lock.
///
/// `Err` carries the outcome that ends the cycle: `Aborted` on a driver
/// failure, `Idle` if the session was closed mid-cycle.
fn session_call<T>(
    store: &ChannelStore,
    subsystem: Subsystem,
    channel: usize,
    op: impl FnOnce(&mut Session) -> Result<T, HalCallError>,
) -> Result<T, CycleOutcome> {
    match store.with_session(op) {
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => Err(CycleOutcome::Aborted {
            subsystem,
            channel,
            error,
        }),
        None => Err(CycleOutcome::Idle),
    }
}

fn poll_subsystems(store: &ChannelStore, activity: ActivityMask) -> Result<(), CycleOutcome> {
    if activity.contains(ActivityMask::DIO) {
        for bank in 0..DIO_BANKS {
            let value = session_call(store, Subsystem::Dio, bank, |s| s.read_digital(bank))?;
            store.store_dio(bank, value);
        }
    }

    if activity.contains(ActivityMask::ENC) {
        for channel in 0..ENC_CHANNELS {
            if store.enc_selected(channel) {
                let count =
                    session_call(store, Subsystem::Enc, channel, |s| s.read_encoder(channel))?;
                store.store_enc(channel, count);
            }
        }
    }

    if activity.contains(ActivityMask::ADC) {
        for channel in 0..ADC_CHANNELS {
            if store.adc_selected(channel) {
                let raw =
                    session_call(store, Subsystem::Adc, channel, |s| s.read_analog(channel))?;
                store.store_adc(channel, raw & ADC_SAMPLE_MASK);
            }
        }
    }

    Ok(())
}

/// Execute one poll cycle against `store`.
pub fn poll_cycle(store: &ChannelStore) -> CycleOutcome {
    let activity = store.activity();
    if !store.session_present() {
        return CycleOutcome::Idle;
    }
    match poll_subsystems(store, activity) {
        Ok(()) => CycleOutcome::Complete,
        Err(outcome) => outcome,
    }
}

/// Polling statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Cycles executed.
    pub cycles: u64,
    /// Cycles that read every active subsystem.
    pub completed: u64,
    /// Cycles cut short by a driver failure.
    pub aborted: u64,
    /// Cycles without an open session.
    pub idle: u64,
    /// Cycles that took longer than the period.
    pub timing_violations: u64,
    /// Longest cycle in microseconds.
    pub max_cycle_time_us: u64,
    /// Sum of cycle times, for the average.
    pub total_cycle_time_us: u64,
}

impl CycleStats {
    /// Average cycle time in microseconds.
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us.checked_div(self.cycles).unwrap_or(0)
    }
}

/// Lock-free counters written by the polling thread.
#[derive(Debug, Default)]
struct SharedStats {
    cycles: AtomicU64,
    completed: AtomicU64,
    aborted: AtomicU64,
    idle: AtomicU64,
    timing_violations: AtomicU64,
    max_cycle_time_us: AtomicU64,
    total_cycle_time_us: AtomicU64,
}

impl SharedStats {
    /// Count one cycle. Returns the running count of its outcome kind.
    fn record(&self, outcome: &CycleOutcome, cycle_time_us: u64) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.total_cycle_time_us
            .fetch_add(cycle_time_us, Ordering::Relaxed);
        self.max_cycle_time_us
            .fetch_max(cycle_time_us, Ordering::Relaxed);
        let counter = match outcome {
            CycleOutcome::Idle => &self.idle,
            CycleOutcome::Complete => &self.completed,
            CycleOutcome::Aborted { .. } => &self.aborted,
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> CycleStats {
        CycleStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
            timing_violations: self.timing_violations.load(Ordering::Relaxed),
            max_cycle_time_us: self.max_cycle_time_us.load(Ordering::Relaxed),
            total_cycle_time_us: self.total_cycle_time_us.load(Ordering::Relaxed),
        }
    }
}

/// First 10 occurrences, then every 1000th.
#[inline]
fn should_report(count: u64) -> bool {
    count <= 10 || count % 1000 == 0
}

/// Periodic polling thread over a shared [`ChannelStore`].
pub struct PollingEngine {
    store: Arc<ChannelStore>,
    config: PollerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<SharedStats>,
    worker: Option<JoinHandle<()>>,
}

impl PollingEngine {
    /// Create a stopped engine.
    pub fn new(store: Arc<ChannelStore>, config: PollerConfig) -> Self {
        Self {
            store,
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SharedStats::default()),
            worker: None,
        }
    }

    /// Spawn the polling thread.
    ///
    /// # Errors
    /// `AlreadyRunning` if started twice, `Spawn` if the OS refuses the thread.
    pub fn start(&mut self) -> DaqResult<()> {
        if self.worker.is_some() {
            return Err(DaqError::AlreadyRunning);
        }
        if self.config.cycle_time_us == 0 {
            return Err(DaqError::Config(
                s626_common::config::ConfigError::ValidationError(
                    "poller.cycle_time_us must be greater than 0".to_string(),
                ),
            ));
        }

        self.running.store(true, Ordering::SeqCst);
        let ctx = LoopContext {
            store: Arc::clone(&self.store),
            running: Arc::clone(&self.running),
            stats: Arc::clone(&self.stats),
            period: self.config.period(),
            cpu_core: self.config.cpu_core,
            rt_priority: self.config.rt_priority,
        };

        let handle = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || ctx.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                DaqError::Spawn(e.to_string())
            })?;

        info!(
            "Polling engine '{}' started (cycle_time={}us)",
            self.config.thread_name, self.config.cycle_time_us
        );
        self.worker = Some(handle);
        Ok(())
    }

    /// Stop the polling thread after its in-flight cycle and return the
    /// statistics. A no-op on a stopped engine.
    pub fn stop(&mut self) -> CycleStats {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Polling thread '{}' panicked", self.config.thread_name);
            }
            let stats = self.stats.snapshot();
            info!(
                "Polling engine stopped after {} cycles (aborted: {}, violations: {})",
                stats.cycles, stats.aborted, stats.timing_violations
            );
        }
        self.stats.snapshot()
    }

    /// Whether the polling thread is running.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Live statistics snapshot.
    pub fn stats(&self) -> CycleStats {
        self.stats.snapshot()
    }
}

impl Drop for PollingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the polling thread.
struct LoopContext {
    store: Arc<ChannelStore>,
    running: Arc<AtomicBool>,
    stats: Arc<SharedStats>,
    period: Duration,
    cpu_core: usize,
    rt_priority: i32,
}

impl LoopContext {
    fn run(self) {
        if let Err(e) = rt_setup(self.cpu_core, self.rt_priority) {
            warn!("{e}; polling without RT scheduling");
        }
        if detect_rt_mode() {
            info!("Polling thread running in real-time mode");
        } else {
            debug!("Polling thread running in standard (non-RT) mode");
        }

        let period_us = self.period.as_micros() as u64;
        let mut next_wake = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            next_wake += self.period;
            let cycle_start = Instant::now();

            let outcome = poll_cycle(&self.store);

            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            let count = self.stats.record(&outcome, cycle_time_us);

            if let CycleOutcome::Aborted {
                subsystem,
                channel,
                error,
            } = outcome
            {
                if should_report(count) {
                    warn!(
                        "Poll cycle aborted #{count}: {subsystem} channel {channel}: {error}"
                    );
                }
            }

            if cycle_time_us > period_us {
                let violations = self.stats.timing_violations.fetch_add(1, Ordering::Relaxed) + 1;
                if should_report(violations) {
                    warn!(
                        "Timing violation #{violations}: cycle took {cycle_time_us}us (target {period_us}us)"
                    );
                }
            }

            let cycles = self.stats.cycles.load(Ordering::Relaxed);
            if cycles % 1000 == 0 {
                let s = self.stats.snapshot();
                debug!(
                    "Polling: {} cycles, avg={}us, max={}us, aborted={}, violations={}",
                    s.cycles,
                    s.avg_cycle_time_us(),
                    s.max_cycle_time_us,
                    s.aborted,
                    s.timing_violations
                );
            }

            let now = Instant::now();
            if now < next_wake {
                std::thread::sleep(next_wake - now);
            } else {
                // Overran: re-anchor instead of bursting to catch up.
                next_wake = now;
            }
        }
    }
}
