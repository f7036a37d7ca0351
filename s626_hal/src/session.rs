//! Board session: staged open with rollback, close, and I/O primitives.
//!
//! A [`Session`] only exists after every open stage succeeded. The open
//! sequence runs inside a [`StagedOpen`] guard that records completed stages;
//! if any stage fails the guard is dropped and unwinds exactly those stages.

use s626_common::consts::{ENC_SIGN_BIT, ENC_SIGN_EXTENSION};
use s626_common::hal::driver::{BoardDriver, BoardHandle, HalCallError, StageError};
use s626_common::hal::types::OpenStage;
use tracing::{debug, info, warn};

/// Widen a raw 24-bit two's-complement encoder word to `i32`.
///
/// Bits above 23 in `raw` are ignored; bit 23 is replicated into bits 24–31.
#[inline]
pub const fn sign_extend_24(raw: u32) -> i32 {
    let raw = raw & !ENC_SIGN_EXTENSION;
    if raw & ENC_SIGN_BIT != 0 {
        (raw | ENC_SIGN_EXTENSION) as i32
    } else {
        raw as i32
    }
}

/// Open sequence in progress.
///
/// Borrows the freshly allocated handle and records the last completed
/// stage. Dropping the guard without [`commit`](Self::commit) releases every
/// completed stage in reverse order.
struct StagedOpen<'a> {
    handle: &'a mut Box<dyn BoardHandle>,
    completed: OpenStage,
    armed: bool,
}

impl<'a> StagedOpen<'a> {
    /// Start after stage 1 (allocation) succeeded.
    fn new(handle: &'a mut Box<dyn BoardHandle>) -> Self {
        debug!("open stage {} complete", OpenStage::Allocate);
        Self {
            handle,
            completed: OpenStage::Allocate,
            armed: true,
        }
    }

    /// Run the next stage. A failure leaves the guard armed, so returning
    /// the error through `?` unwinds.
    fn advance<F>(&mut self, stage: OpenStage, op: F) -> Result<(), StageError>
    where
        F: FnOnce(&mut dyn BoardHandle) -> Result<(), HalCallError>,
    {
        debug_assert_eq!(stage.number(), self.completed.number() + 1);
        op(self.handle.as_mut()).map_err(|source| StageError { stage, source })?;
        self.completed = stage;
        debug!("open stage {} complete", stage);
        Ok(())
    }

    /// All stages done: nothing to unwind.
    fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for StagedOpen<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("rolling back board open after stage {}", self.completed);

        if self.completed >= OpenStage::Device {
            if let Err(e) = self.handle.close() {
                warn!("close during rollback failed: {e}");
            }
        }
        if self.completed >= OpenStage::Options {
            self.handle.release_options();
        }
        self.handle.deinit();
    }
}

/// An open board.
pub struct Session {
    handle: Box<dyn BoardHandle>,
    device: String,
    bus: u32,
    slot: u32,
    /// One bit per analog channel, 1 = ±10 V.
    adc_range: u16,
    released: bool,
}

impl Session {
    /// Run the full open sequence.
    ///
    /// # Errors
    /// Returns the first failing stage. Every resource acquired by earlier
    /// stages has been released.
    pub fn open(
        driver: &dyn BoardDriver,
        device: &str,
        bus: u32,
        slot: u32,
    ) -> Result<Self, StageError> {
        info!(
            "Opening board via '{}' on device {device}, bus {bus}, slot {slot}",
            driver.name()
        );

        let mut handle = driver.allocate(device).map_err(|source| StageError {
            stage: OpenStage::Allocate,
            source,
        })?;

        let mut staged = StagedOpen::new(&mut handle);
        staged.advance(OpenStage::Options, |h| h.set_options())?;
        staged.advance(OpenStage::Bus, |h| h.set_bus(bus))?;
        staged.advance(OpenStage::Slot, |h| h.set_slot(slot))?;
        staged.advance(OpenStage::Device, |h| h.open())?;
        staged.commit();

        info!("Board open on {device}");
        Ok(Self {
            handle,
            device: device.to_string(),
            bus,
            slot,
            adc_range: 0,
            released: false,
        })
    }

    /// Close the board.
    ///
    /// # Errors
    /// On failure the session is handed back still open; the caller may
    /// retry or keep using it.
    pub fn close(mut self) -> Result<(), (Session, HalCallError)> {
        if let Err(e) = self.handle.close() {
            warn!("Board close on {} failed: {e}", self.device);
            return Err((self, e));
        }
        self.handle.deinit();
        self.released = true;
        info!("Board closed on {}", self.device);
        Ok(())
    }

    /// Device node this session was opened on.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// PCI (bus, slot) this session was opened on.
    pub fn location(&self) -> (u32, u32) {
        (self.bus, self.slot)
    }

    /// Read all 16 lines of a digital bank.
    pub fn read_digital(&mut self, bank: usize) -> Result<u16, HalCallError> {
        self.handle.dio_read(bank)
    }

    /// Drive the lines in `mask` to `value`; other lines keep their state.
    pub fn write_digital(&mut self, bank: usize, mask: u16, value: u16) -> Result<(), HalCallError> {
        self.handle.dio_write(bank, mask, value)
    }

    /// Enable quadrature mode on an encoder. Required once before reading it.
    pub fn configure_encoder(&mut self, channel: usize) -> Result<(), HalCallError> {
        self.handle.enc_configure(channel)
    }

    /// Read an encoder count, sign-extended from 24 bits.
    pub fn read_encoder(&mut self, channel: usize) -> Result<i32, HalCallError> {
        self.handle.enc_read(channel).map(sign_extend_24)
    }

    /// Take one raw analog sample using the channel's current range bit.
    ///
    /// The caller masks the result to 14 bits.
    pub fn read_analog(&mut self, channel: usize) -> Result<u16, HalCallError> {
        let high_range = channel < u16::BITS as usize && self.adc_range & (1 << channel) != 0;
        self.handle.adc_read(channel, high_range)
    }

    /// Write one analog output value, unvalidated.
    pub fn write_analog(&mut self, channel: usize, value: u16) -> Result<(), HalCallError> {
        self.handle.dac_write(channel, value)
    }

    /// Update range bits under `mask`; no hardware access.
    ///
    /// Takes effect at the next read of each affected channel. Returns the
    /// new range word.
    pub fn set_analog_range(&mut self, mask: u16, bits: u16) -> u16 {
        self.adc_range = (self.adc_range & !mask) | (bits & mask);
        self.adc_range
    }

    /// Current range word.
    pub fn analog_range(&self) -> u16 {
        self.adc_range
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Best effort: a session dropped while open still releases the handle.
        if let Err(e) = self.handle.close() {
            warn!("Board close on drop failed: {e}");
        }
        self.handle.deinit();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("bus", &self.bus)
            .field("slot", &self.slot)
            .field("adc_range", &format_args!("{:#06x}", self.adc_range))
            .finish()
    }
}
