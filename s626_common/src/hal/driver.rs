//! Board driver traits and driver error types.
//!
//! This module defines:
//! - `BoardDriver` trait - Factory for board handles (open stage 1)
//! - `BoardHandle` trait - Open stages 2–5, teardown and I/O primitives
//! - `HalCallError` - A single driver call failed
//! - `StageError` - The open sequence failed at a given stage
//! - `DriverFactory` type alias - Factory function type

use crate::hal::types::OpenStage;
use thiserror::Error;

/// A single driver call failed.
///
/// `code` is the opaque (usually negative errno-style) value returned by the
/// underlying driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("driver call failed (code {code})")]
pub struct HalCallError {
    /// Driver return code.
    pub code: i32,
}

impl HalCallError {
    /// Wrap a driver return code.
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// The board open sequence failed.
///
/// Every resource acquired by earlier stages has been released by the time
/// this error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("board open failed at stage {stage}: {source}")]
pub struct StageError {
    /// The stage that failed.
    pub stage: OpenStage,
    /// The driver failure behind it.
    #[source]
    pub source: HalCallError,
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn BoardDriver>;

/// Driver for one board family.
///
/// The driver itself holds no per-board state: each `allocate()` produces an
/// independent handle that goes through the remaining open stages.
pub trait BoardDriver: Send + Sync {
    /// Returns the driver's unique identifier (e.g., "simulation", "analogy").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Open stage 1: allocate a handle bound to `device` (e.g. "analogy0").
    ///
    /// Failure here means resource exhaustion.
    fn allocate(&self, device: &str) -> Result<Box<dyn BoardHandle>, HalCallError>;
}

/// Handle to one board, from allocation to deinit.
///
/// Open stages must be called in order: `set_options`, `set_bus`,
/// `set_slot`, `open`. The I/O primitives are only valid after `open`
/// succeeded and before `close` succeeded.
///
/// # Rollback contract
///
/// | Completed stage | Undo |
/// |-----------------|------|
/// | Allocate | `deinit()` |
/// | Options | `release_options()` |
/// | Bus, Slot | nothing (option fields only) |
/// | Device | `close()` |
///
/// A failing `open()` must leave nothing of its own half-done.
pub trait BoardHandle: Send {
    /// Open stage 2: allocate and initialise the driver link options.
    fn set_options(&mut self) -> Result<(), HalCallError>;

    /// Release the option buffer from stage 2.
    fn release_options(&mut self);

    /// Open stage 3: bind the PCI bus number.
    fn set_bus(&mut self, bus: u32) -> Result<(), HalCallError>;

    /// Open stage 4: bind the PCI slot number.
    fn set_slot(&mut self, slot: u32) -> Result<(), HalCallError>;

    /// Open stage 5: open, attach and describe the device.
    fn open(&mut self) -> Result<(), HalCallError>;

    /// Close the device. On failure the device is still open.
    fn close(&mut self) -> Result<(), HalCallError>;

    /// Free the handle itself. Called exactly once, last.
    fn deinit(&mut self);

    /// Read the 16 lines of a digital bank.
    fn dio_read(&mut self, bank: usize) -> Result<u16, HalCallError>;

    /// Drive the lines selected by `mask` to `value`.
    fn dio_write(&mut self, bank: usize, mask: u16, value: u16) -> Result<(), HalCallError>;

    /// Switch an encoder counter to quadrature mode.
    fn enc_configure(&mut self, channel: usize) -> Result<(), HalCallError>;

    /// Read the raw counter word of an encoder (24 significant bits).
    fn enc_read(&mut self, channel: usize) -> Result<u32, HalCallError>;

    /// Take one analog sample; `high_range` selects ±10 V instead of ±5 V.
    fn adc_read(&mut self, channel: usize, high_range: bool) -> Result<u16, HalCallError>;

    /// Write one analog output value.
    fn dac_write(&mut self, channel: usize, value: u16) -> Result<(), HalCallError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn hal_call_error_display() {
        let err = HalCallError::new(-19);
        assert!(err.to_string().contains("-19"));
    }

    #[test]
    fn stage_error_reports_stage_and_source() {
        let err = StageError {
            stage: OpenStage::Bus,
            source: HalCallError::new(-2),
        };
        let msg = err.to_string();
        assert!(msg.contains("stage 3"));
        assert!(msg.contains("-2"));
        assert!(err.source().is_some());
    }
}
