//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `BoardDriver` trait; each handle it
//! allocates walks the real open sequence against a shared [`SimBoard`],
//! with the same stage ordering rules the analogy driver enforces.

use super::board::{Call, FaultPlan, SimBoard};
use s626_common::hal::driver::{BoardDriver, BoardHandle, HalCallError};
use s626_common::hal::types::{OpenStage, Subsystem};
use std::sync::Arc;
use tracing::{debug, info};

/// Encoder counts added per read in the default simulation.
const DEFAULT_ENC_STEP: i32 = 1;

/// Simulation driver implementing the BoardDriver trait.
pub struct SimulationDriver {
    /// Driver name
    name: &'static str,
    /// Driver version
    version: &'static str,
    /// Board shared with every allocated handle
    board: Arc<SimBoard>,
}

impl SimulationDriver {
    /// Create a new simulation driver with no injected faults.
    pub fn new() -> Self {
        Self::with_faults(FaultPlan::default())
    }

    /// Create a simulation driver with a fault plan.
    pub fn with_faults(faults: FaultPlan) -> Self {
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            board: Arc::new(SimBoard::new(faults, DEFAULT_ENC_STEP)),
        }
    }

    /// The simulated board, for inspection and fault injection.
    pub fn board(&self) -> Arc<SimBoard> {
        Arc::clone(&self.board)
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn allocate(&self, device: &str) -> Result<Box<dyn BoardHandle>, HalCallError> {
        if device.is_empty() {
            return Err(HalCallError::new(-libc::ENODEV));
        }
        self.board.check_stage(OpenStage::Allocate).map_err(|_| {
            // Stage 1 only fails on exhaustion.
            HalCallError::new(-libc::ENOMEM)
        })?;
        self.board.with_resources(|r| r.handles += 1);
        debug!("sim: allocated handle for {device}");

        Ok(Box::new(SimHandle {
            board: Arc::clone(&self.board),
            device: device.to_string(),
            options: false,
            bus: None,
            slot: None,
            open: false,
            released: false,
        }))
    }
}

/// Handle allocated by [`SimulationDriver`].
struct SimHandle {
    board: Arc<SimBoard>,
    device: String,
    options: bool,
    bus: Option<u32>,
    slot: Option<u32>,
    open: bool,
    released: bool,
}

impl SimHandle {
    fn require_open(&self) -> Result<(), HalCallError> {
        if self.open {
            Ok(())
        } else {
            Err(HalCallError::new(-libc::EBADF))
        }
    }

    fn free_options(&mut self) {
        if self.options {
            self.options = false;
            self.board.with_resources(|r| r.option_buffers -= 1);
        }
    }
}

/// Out-of-range channel on an open board.
fn bad_channel() -> HalCallError {
    HalCallError::new(-libc::EINVAL)
}

impl BoardHandle for SimHandle {
    fn set_options(&mut self) -> Result<(), HalCallError> {
        self.board.check_stage(OpenStage::Options)?;
        if !self.options {
            self.options = true;
            self.board.with_resources(|r| r.option_buffers += 1);
        }
        Ok(())
    }

    fn release_options(&mut self) {
        self.free_options();
    }

    fn set_bus(&mut self, bus: u32) -> Result<(), HalCallError> {
        self.board.check_stage(OpenStage::Bus)?;
        if !self.options {
            return Err(HalCallError::new(-2));
        }
        self.bus = Some(bus);
        Ok(())
    }

    fn set_slot(&mut self, slot: u32) -> Result<(), HalCallError> {
        self.board.check_stage(OpenStage::Slot)?;
        if !self.options {
            return Err(HalCallError::new(-2));
        }
        self.slot = Some(slot);
        Ok(())
    }

    fn open(&mut self) -> Result<(), HalCallError> {
        self.board.check_stage(OpenStage::Device)?;
        if self.bus.is_none() || self.slot.is_none() {
            return Err(HalCallError::new(-libc::EINVAL));
        }
        // The link options are consumed by the attach.
        self.free_options();
        self.open = true;
        self.board.with_resources(|r| r.device_open = true);
        info!(
            "sim: {} attached (bus {:?}, slot {:?})",
            self.device, self.bus, self.slot
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), HalCallError> {
        self.board.check_close()?;
        if self.open {
            self.open = false;
            self.board.with_resources(|r| r.device_open = false);
        }
        Ok(())
    }

    fn deinit(&mut self) {
        if self.released {
            return;
        }
        self.free_options();
        self.released = true;
        self.board.with_resources(|r| r.handles -= 1);
        debug!("sim: released handle for {}", self.device);
    }

    fn dio_read(&mut self, bank: usize) -> Result<u16, HalCallError> {
        self.board.count(Call::DioRead);
        self.require_open()?;
        self.board.check_read(Subsystem::Dio)?;
        self.board.with_io(|io| io.dio_read(bank)).ok_or_else(bad_channel)
    }

    fn dio_write(&mut self, bank: usize, mask: u16, value: u16) -> Result<(), HalCallError> {
        self.board.count(Call::DioWrite);
        self.require_open()?;
        self.board.check_write()?;
        self.board
            .with_io(|io| io.dio_write(bank, mask, value))
            .ok_or_else(bad_channel)
    }

    fn enc_configure(&mut self, channel: usize) -> Result<(), HalCallError> {
        self.board.count(Call::EncConfigure);
        self.require_open()?;
        self.board
            .with_io(|io| io.enc_configure(channel))
            .ok_or_else(bad_channel)
    }

    fn enc_read(&mut self, channel: usize) -> Result<u32, HalCallError> {
        self.board.count(Call::EncRead);
        self.require_open()?;
        self.board.check_read(Subsystem::Enc)?;
        self.board.with_io(|io| io.enc_read(channel)).ok_or_else(bad_channel)
    }

    fn adc_read(&mut self, channel: usize, high_range: bool) -> Result<u16, HalCallError> {
        self.board.count(Call::AdcRead);
        self.require_open()?;
        self.board.check_read(Subsystem::Adc)?;
        self.board.note_adc_range(channel, high_range);
        self.board
            .with_io(|io| io.adc_read(channel, high_range))
            .ok_or_else(bad_channel)
    }

    fn dac_write(&mut self, channel: usize, value: u16) -> Result<(), HalCallError> {
        self.board.count(Call::DacWrite);
        self.require_open()?;
        self.board.check_write()?;
        self.board
            .with_io(|io| io.dac_write(channel, value))
            .ok_or_else(bad_channel)
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        // Handles dropped without deinit still give their ledger entries back.
        if self.open {
            self.board.with_resources(|r| r.device_open = false);
        }
        self.deinit();
    }
}

impl std::fmt::Debug for SimulationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationDriver")
            .field("version", &self.version)
            .field("resources", &self.board.resources())
            .finish()
    }
}
