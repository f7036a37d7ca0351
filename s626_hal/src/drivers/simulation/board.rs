//! Shared simulated board: I/O state, fault injection, call counters and a
//! resource ledger.
//!
//! One `SimBoard` is shared by the driver and every handle it allocates, so
//! tests can inspect what the code under test did to the "hardware".

use super::io::IoSimulator;
use s626_common::hal::driver::HalCallError;
use s626_common::hal::types::{OpenStage, Subsystem};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Driver code returned by injected faults (`-EIO`).
pub const SIM_FAULT_CODE: i32 = -libc::EIO;

/// Which calls the simulated board fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Fail this open stage.
    pub fail_stage: Option<OpenStage>,
    /// Fail `close()`.
    pub fail_close: bool,
    /// Fail every read of this subsystem.
    pub fail_reads: Option<Subsystem>,
    /// Fail every digital and analog write.
    pub fail_writes: bool,
}

/// Resources currently held by handles of this board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resources {
    /// Allocated, not yet deinitialised handles.
    pub handles: usize,
    /// Option buffers allocated and not released.
    pub option_buffers: usize,
    /// A handle has the device open.
    pub device_open: bool,
}

/// Snapshot of per-primitive call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `dio_read` calls.
    pub dio_read: u64,
    /// `dio_write` calls.
    pub dio_write: u64,
    /// `enc_configure` calls.
    pub enc_configure: u64,
    /// `enc_read` calls.
    pub enc_read: u64,
    /// `adc_read` calls.
    pub adc_read: u64,
    /// `dac_write` calls.
    pub dac_write: u64,
    /// Open-sequence and close calls.
    pub lifecycle: u64,
}

impl CallCounts {
    /// Sum over every counter.
    pub fn total(&self) -> u64 {
        self.dio_read
            + self.dio_write
            + self.enc_configure
            + self.enc_read
            + self.adc_read
            + self.dac_write
            + self.lifecycle
    }

    /// Sum over the I/O primitives only.
    pub fn io_total(&self) -> u64 {
        self.total() - self.lifecycle
    }
}

#[derive(Debug, Default)]
struct Counters {
    dio_read: AtomicU64,
    dio_write: AtomicU64,
    enc_configure: AtomicU64,
    enc_read: AtomicU64,
    adc_read: AtomicU64,
    dac_write: AtomicU64,
    lifecycle: AtomicU64,
}

#[derive(Debug, Default)]
struct BoardState {
    io: IoSimulator,
    faults: FaultPlan,
    resources: Resources,
    last_adc_range: Option<(usize, bool)>,
}

/// Primitive being counted.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Call {
    DioRead,
    DioWrite,
    EncConfigure,
    EncRead,
    AdcRead,
    DacWrite,
    Lifecycle,
}

/// Simulated board shared between a driver and its handles.
#[derive(Debug, Default)]
pub struct SimBoard {
    state: Mutex<BoardState>,
    counters: Counters,
}

impl SimBoard {
    /// Create a board with the given fault plan and encoder step.
    pub fn new(faults: FaultPlan, enc_step: i32) -> Self {
        Self {
            state: Mutex::new(BoardState {
                io: IoSimulator::new(enc_step),
                faults,
                ..BoardState::default()
            }),
            counters: Counters::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn count(&self, call: Call) {
        let counter = match call {
            Call::DioRead => &self.counters.dio_read,
            Call::DioWrite => &self.counters.dio_write,
            Call::EncConfigure => &self.counters.enc_configure,
            Call::EncRead => &self.counters.enc_read,
            Call::AdcRead => &self.counters.adc_read,
            Call::DacWrite => &self.counters.dac_write,
            Call::Lifecycle => &self.counters.lifecycle,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fail with the injected fault code if `stage` is planned to fail.
    pub(crate) fn check_stage(&self, stage: OpenStage) -> Result<(), HalCallError> {
        self.count(Call::Lifecycle);
        if self.lock().faults.fail_stage == Some(stage) {
            return Err(HalCallError::new(SIM_FAULT_CODE));
        }
        Ok(())
    }

    pub(crate) fn check_read(&self, subsystem: Subsystem) -> Result<(), HalCallError> {
        if self.lock().faults.fail_reads == Some(subsystem) {
            return Err(HalCallError::new(SIM_FAULT_CODE));
        }
        Ok(())
    }

    pub(crate) fn check_write(&self) -> Result<(), HalCallError> {
        if self.lock().faults.fail_writes {
            return Err(HalCallError::new(SIM_FAULT_CODE));
        }
        Ok(())
    }

    pub(crate) fn check_close(&self) -> Result<(), HalCallError> {
        self.count(Call::Lifecycle);
        if self.lock().faults.fail_close {
            return Err(HalCallError::new(SIM_FAULT_CODE));
        }
        Ok(())
    }

    /// Run `f` on the I/O state.
    pub(crate) fn with_io<R>(&self, f: impl FnOnce(&mut IoSimulator) -> R) -> R {
        f(&mut self.lock().io)
    }

    pub(crate) fn with_resources(&self, f: impl FnOnce(&mut Resources)) {
        f(&mut self.lock().resources);
    }

    pub(crate) fn note_adc_range(&self, channel: usize, high_range: bool) {
        self.lock().last_adc_range = Some((channel, high_range));
    }

    // ─── Test and diagnostics hooks ─────────────────────────────────

    /// Replace the fault plan.
    pub fn set_faults(&self, faults: FaultPlan) {
        self.lock().faults = faults;
    }

    /// Toggle close failures.
    pub fn set_fail_close(&self, fail: bool) {
        self.lock().faults.fail_close = fail;
    }

    /// Fail reads of one subsystem, or none.
    pub fn set_fail_reads(&self, subsystem: Option<Subsystem>) {
        self.lock().faults.fail_reads = subsystem;
    }

    /// Toggle write failures.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().faults.fail_writes = fail;
    }

    /// Snapshot of call counters.
    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            dio_read: c.dio_read.load(Ordering::Relaxed),
            dio_write: c.dio_write.load(Ordering::Relaxed),
            enc_configure: c.enc_configure.load(Ordering::Relaxed),
            enc_read: c.enc_read.load(Ordering::Relaxed),
            adc_read: c.adc_read.load(Ordering::Relaxed),
            dac_write: c.dac_write.load(Ordering::Relaxed),
            lifecycle: c.lifecycle.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of held resources.
    pub fn resources(&self) -> Resources {
        self.lock().resources
    }

    /// Channel and range flag of the most recent analog read.
    pub fn last_adc_range(&self) -> Option<(usize, bool)> {
        self.lock().last_adc_range
    }

    /// Current line levels of a bank.
    pub fn dio_lines(&self, bank: usize) -> Option<u16> {
        self.lock().io.dio_read(bank)
    }

    /// Force line levels of a bank.
    pub fn set_dio_lines(&self, bank: usize, lines: u16) {
        self.lock().io.set_dio_lines(bank, lines);
    }

    /// Force a raw encoder counter word.
    pub fn set_enc_raw(&self, channel: usize, raw: u32) {
        self.lock().io.set_enc_raw(channel, raw);
    }

    /// Pin an analog input to a raw sample.
    pub fn pin_adc(&self, channel: usize, raw: Option<u16>) {
        self.lock().io.pin_adc(channel, raw);
    }

    /// Last value written to an analog output.
    pub fn dac_value(&self, channel: usize) -> Option<u16> {
        self.lock().io.dac_value(channel)
    }

    /// Whether an encoder was switched to quadrature mode.
    pub fn enc_configured(&self, channel: usize) -> bool {
        self.lock().io.enc_configured(channel)
    }
}
