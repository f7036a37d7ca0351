//! Host component adapter.
//!
//! Wraps the control API and the polling engine the way a component host
//! drives them: a lifecycle state machine, range-checked operations, inbound
//! port batches drained on each `update()`, and the published channel vectors.
//!
//! # Port batch formats
//!
//! | Port | Layout |
//! |------|--------|
//! | DIO write | `[bank_mask, mask0, value0, mask1, value1, ...]`, one pair per bank set in `bank_mask`, ascending |
//! | DAC | `[channel_mask, value0, value1, ...]`, one value per channel set in `channel_mask`, ascending |

use crate::control::Interface;
use crate::poller::{CycleStats, PollingEngine};
use s626_common::config::ConfigError;
use s626_common::consts::{
    ADC_CHANNELS, DAC_CHANNELS, DAC_MAX_VALUE, DIO_BANKS, ENC_CHANNELS, MAX_BATCHES_PER_UPDATE,
    all_channels,
};
use s626_common::error::DaqError;
use s626_common::hal::config::PollerConfig;
use s626_common::hal::driver::BoardDriver;
use s626_common::hal::types::ActivityMask;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Error code reported by [`S626Component::last_error`] for failures that
/// carry no driver code.
pub const NON_DRIVER_ERROR: i32 = -1;

/// Component lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Constructed, not configured.
    #[default]
    Unconfigured,
    /// Configured, polling not started.
    Configured,
    /// Polling thread running.
    Running,
    /// Polling stopped; may be restarted or cleaned up.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Configured => "configured",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
        })
    }
}

/// Errors returned by the component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// The requested action is not allowed in the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// Current state.
        state: LifecycleState,
        /// Requested action.
        action: &'static str,
    },

    /// The underlying operation failed.
    #[error(transparent)]
    Daq(#[from] DaqError),
}

impl From<ConfigError> for ComponentError {
    fn from(e: ConfigError) -> Self {
        ComponentError::Daq(DaqError::Config(e))
    }
}

impl ComponentError {
    /// Code stored for [`S626Component::last_error`].
    pub fn code(&self) -> i32 {
        match self {
            ComponentError::Daq(e) => e.driver_code().unwrap_or(NON_DRIVER_ERROR),
            ComponentError::InvalidTransition { .. } => NON_DRIVER_ERROR,
        }
    }
}

/// Result alias for component operations.
pub type ComponentResult<T> = Result<T, ComponentError>;

/// Values published on each update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortOutputs {
    /// Every digital bank.
    pub dio: [u16; DIO_BANKS],
    /// Selected analog inputs, ascending.
    pub adc: heapless::Vec<u16, ADC_CHANNELS>,
    /// Selected encoders, ascending.
    pub enc: heapless::Vec<i32, ENC_CHANNELS>,
}

/// Clamp a host value into the DAC range.
fn clamp_dac(value: i32) -> u16 {
    value.clamp(0, i32::from(DAC_MAX_VALUE)) as u16
}

/// Decode a DIO batch into `(bank, mask, value)` writes.
fn decode_dio_batch(batch: &[i32]) -> Result<Vec<(usize, u16, u16)>, ConfigError> {
    let selector = batch.first().copied().unwrap_or(0) as u32 & all_channels(DIO_BANKS);
    let expected = 1 + 2 * selector.count_ones() as usize;
    if batch.len() < expected {
        return Err(ConfigError::BatchLength {
            port: "DIO",
            expected,
            actual: batch.len(),
        });
    }

    Ok((0..DIO_BANKS)
        .filter(|bank| selector & (1 << bank) != 0)
        .zip(batch[1..].chunks_exact(2))
        .map(|(bank, pair)| (bank, pair[0] as u16, pair[1] as u16))
        .collect())
}

/// Decode a DAC batch into `(channel, raw value)` writes.
fn decode_dac_batch(batch: &[i32]) -> Result<Vec<(usize, i32)>, ConfigError> {
    let selector = batch.first().copied().unwrap_or(0) as u32 & all_channels(DAC_CHANNELS);
    let expected = 1 + selector.count_ones() as usize;
    if batch.len() < expected {
        return Err(ConfigError::BatchLength {
            port: "DAC",
            expected,
            actual: batch.len(),
        });
    }

    Ok((0..DAC_CHANNELS)
        .filter(|ch| selector & (1 << ch) != 0)
        .zip(batch[1..].iter().copied())
        .collect())
}

/// The S626 task component.
pub struct S626Component {
    name: String,
    interface: Interface,
    engine: PollingEngine,
    state: LifecycleState,
    dio_port: VecDeque<Vec<i32>>,
    dac_port: VecDeque<Vec<i32>>,
    outputs: PortOutputs,
    last_error: i32,
}

impl S626Component {
    /// Construct the component around a driver.
    pub fn new(name: impl Into<String>, driver: Box<dyn BoardDriver>, poller: PollerConfig) -> Self {
        let interface = Interface::with_driver(driver);
        let engine = PollingEngine::new(std::sync::Arc::clone(interface.store()), poller);
        let name = name.into();
        info!("Component '{name}' constructed");
        Self {
            name,
            interface,
            engine,
            state: LifecycleState::Unconfigured,
            dio_port: VecDeque::new(),
            dac_port: VecDeque::new(),
            outputs: PortOutputs::default(),
            last_error: 0,
        }
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The underlying control API.
    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    /// Polling statistics so far.
    pub fn stats(&self) -> CycleStats {
        self.engine.stats()
    }

    /// Most recently published outputs.
    pub fn outputs(&self) -> &PortOutputs {
        &self.outputs
    }

    fn invalid(&self, action: &'static str) -> ComponentError {
        ComponentError::InvalidTransition {
            state: self.state,
            action,
        }
    }

    /// Remember `result`'s error code for [`last_error`](Self::last_error).
    fn record<T>(&mut self, result: ComponentResult<T>) -> ComponentResult<T> {
        if let Err(e) = &result {
            self.last_error = e.code();
        }
        result
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Unconfigured → Configured.
    pub fn configure(&mut self) -> ComponentResult<()> {
        if self.state != LifecycleState::Unconfigured {
            return Err(self.invalid("configure"));
        }
        self.state = LifecycleState::Configured;
        info!("Component '{}' configured", self.name);
        Ok(())
    }

    /// Configured or Stopped → Running: start polling.
    pub fn start(&mut self) -> ComponentResult<()> {
        if !matches!(
            self.state,
            LifecycleState::Configured | LifecycleState::Stopped
        ) {
            return Err(self.invalid("start"));
        }
        self.engine.start()?;
        self.state = LifecycleState::Running;
        info!("Component '{}' started", self.name);
        Ok(())
    }

    /// Running → Stopped: stop polling after the in-flight cycle.
    pub fn stop(&mut self) -> ComponentResult<CycleStats> {
        if self.state != LifecycleState::Running {
            return Err(self.invalid("stop"));
        }
        let stats = self.engine.stop();
        self.state = LifecycleState::Stopped;
        info!("Component '{}' stopped", self.name);
        Ok(stats)
    }

    /// Configured or Stopped → Unconfigured: close the board.
    pub fn cleanup(&mut self) -> ComponentResult<()> {
        if !matches!(
            self.state,
            LifecycleState::Configured | LifecycleState::Stopped
        ) {
            return Err(self.invalid("cleanup"));
        }
        self.interface.stop_driver()?;
        self.state = LifecycleState::Unconfigured;
        info!("Component '{}' cleaned up", self.name);
        Ok(())
    }

    // ─── Ports ──────────────────────────────────────────────────────

    /// Queue a batch on the DIO write port.
    pub fn push_dio_batch(&mut self, batch: Vec<i32>) {
        self.dio_port.push_back(batch);
    }

    /// Queue a batch on the DAC port.
    pub fn push_dac_batch(&mut self, batch: Vec<i32>) {
        self.dac_port.push_back(batch);
    }

    /// Batches still queued on the (DIO, DAC) ports.
    pub fn pending_batches(&self) -> (usize, usize) {
        (self.dio_port.len(), self.dac_port.len())
    }

    fn apply_dio_batch(&self, batch: &[i32]) -> ComponentResult<()> {
        for (bank, mask, value) in decode_dio_batch(batch)? {
            self.interface.set_digital(bank, mask, value)?;
        }
        Ok(())
    }

    fn apply_dac_batch(&self, batch: &[i32]) -> ComponentResult<()> {
        for (channel, value) in decode_dac_batch(batch)? {
            self.interface.set_analog_output(channel, clamp_dac(value))?;
        }
        Ok(())
    }

    /// One host update: drain pending port batches, then publish the
    /// current channel values.
    ///
    /// At most 15 batches per port are applied; the rest wait for the next
    /// update. A failing batch is logged and recorded in `last_error`.
    /// DAC batch values are clamped like [`Self::write_dac`], but silently.
    pub fn update(&mut self) -> ComponentResult<&PortOutputs> {
        if self.state != LifecycleState::Running {
            return Err(self.invalid("update"));
        }

        for _ in 0..MAX_BATCHES_PER_UPDATE {
            let Some(batch) = self.dio_port.pop_front() else {
                break;
            };
            let result = self.apply_dio_batch(&batch);
            if let Err(e) = self.record(result) {
                warn!("DIO batch {batch:?} rejected: {e}");
            }
        }

        for _ in 0..MAX_BATCHES_PER_UPDATE {
            let Some(batch) = self.dac_port.pop_front() else {
                break;
            };
            let result = self.apply_dac_batch(&batch);
            if let Err(e) = self.record(result) {
                warn!("DAC batch {batch:?} rejected: {e}");
            }
        }

        self.publish();
        Ok(&self.outputs)
    }

    fn publish(&mut self) {
        let store = self.interface.store();
        let adc_select = store.adc_select();
        let enc_select = store.enc_select();

        self.outputs.dio = std::array::from_fn(|bank| store.dio(bank));
        self.outputs.adc = (0..ADC_CHANNELS)
            .filter(|ch| adc_select & (1 << ch) != 0)
            .map(|ch| store.adc(ch))
            .collect();
        self.outputs.enc = (0..ENC_CHANNELS)
            .filter(|ch| enc_select & (1 << ch) != 0)
            .map(|ch| store.enc(ch))
            .collect();
    }

    // ─── Operations ─────────────────────────────────────────────────

    /// Cached value of a digital bank.
    pub fn read_dio(&mut self, bank: usize) -> ComponentResult<u16> {
        let result = self.interface.get_digital(bank).map_err(Into::into);
        self.record(result)
    }

    /// Masked write to a digital bank.
    pub fn write_dio(&mut self, bank: usize, mask: u16, value: u16) -> ComponentResult<()> {
        let result = self.interface.set_digital(bank, mask, value).map_err(Into::into);
        self.record(result)
    }

    /// Cached sample of an analog input.
    pub fn read_adc(&mut self, channel: usize) -> ComponentResult<u16> {
        let result = self.interface.get_analog(channel).map_err(Into::into);
        self.record(result)
    }

    /// Cached count of an encoder.
    pub fn read_enc(&mut self, channel: usize) -> ComponentResult<i32> {
        let result = self.interface.get_encoder(channel).map_err(Into::into);
        self.record(result)
    }

    /// Write an analog output, clamping `value` into `0..=0x3FFF`.
    pub fn write_dac(&mut self, channel: usize, value: i32) -> ComponentResult<()> {
        let clamped = clamp_dac(value);
        if i32::from(clamped) != value {
            warn!("DAC value {value} out of range, clamped to {clamped}");
        }
        let result = self
            .interface
            .set_analog_output(channel, clamped)
            .map_err(Into::into);
        self.record(result)
    }

    /// Update analog range bits.
    pub fn set_range_adc(&mut self, mask: u16, value: u16) -> ComponentResult<u16> {
        let result = self.interface.set_analog_range(mask, value).map_err(Into::into);
        self.record(result)
    }

    /// Configure and zero every encoder.
    pub fn prepare_all_enc(&mut self) -> ComponentResult<()> {
        let result = self.interface.prepare_encoders().map_err(Into::into);
        self.record(result)
    }

    /// (Re)open the board.
    pub fn prepare_driver(&mut self, device: &str, bus: u32, slot: u32) -> ComponentResult<()> {
        let result = self.interface.reset_driver(device, bus, slot).map_err(Into::into);
        self.record(result)
    }

    /// Replace the subsystem gate from its host integer (0..=7).
    pub fn set_active_publishing(&mut self, state: u32) {
        self.interface
            .set_active_publishing(ActivityMask::from_host(state));
    }

    /// Initial DIO configuration from six host numbers.
    pub fn set_initial_dio(&mut self, initial: &[f64]) -> ComponentResult<()> {
        let values: Vec<u16> = initial.iter().map(|&v| v as i32 as u16).collect();
        let result = self.interface.set_initial_digital(&values).map_err(Into::into);
        self.record(result)
    }

    /// Replace the analog input selector.
    pub fn set_initial_adc(&mut self, select: u16) {
        self.interface.set_initial_adc(select);
    }

    /// Replace the encoder selector.
    pub fn set_initial_enc(&mut self, select: u8) {
        self.interface.set_initial_enc(select);
    }

    /// Last error code, cleared by reading. `0` means no error.
    pub fn last_error(&mut self) -> i32 {
        std::mem::take(&mut self.last_error)
    }
}

impl Drop for S626Component {
    fn drop(&mut self) {
        if self.state == LifecycleState::Running {
            self.engine.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulationDriver;

    #[test]
    fn dio_batch_decoding() {
        assert_eq!(
            decode_dio_batch(&[0b101, 0xFF, 0x0F, 0xF0, 0xA0]).unwrap(),
            vec![(0, 0xFF, 0x0F), (2, 0xF0, 0xA0)]
        );
        assert_eq!(decode_dio_batch(&[0]).unwrap(), vec![]);
        assert_eq!(
            decode_dio_batch(&[0b11, 1, 1]),
            Err(ConfigError::BatchLength {
                port: "DIO",
                expected: 5,
                actual: 3
            })
        );
        assert!(matches!(
            decode_dio_batch(&[]),
            Err(ConfigError::BatchLength { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn dac_batch_decoding() {
        assert_eq!(
            decode_dac_batch(&[0b1010, 100, 200]).unwrap(),
            vec![(1, 100), (3, 200)]
        );
        assert!(matches!(
            decode_dac_batch(&[0b1111, 1, 2]),
            Err(ConfigError::BatchLength { port: "DAC", expected: 5, actual: 3 })
        ));
    }

    #[test]
    fn dac_clamping() {
        assert_eq!(clamp_dac(-5), 0);
        assert_eq!(clamp_dac(0x1234), 0x1234);
        assert_eq!(clamp_dac(0x7FFF), 0x3FFF);
    }

    #[test]
    fn lifecycle_rejects_invalid_transitions() {
        let mut c = S626Component::new("s626", Box::new(SimulationDriver::new()), PollerConfig::default());
        assert!(matches!(c.start(), Err(ComponentError::InvalidTransition { action: "start", .. })));
        assert!(c.stop().is_err());
        assert!(c.update().is_err());

        c.configure().unwrap();
        assert!(c.configure().is_err());
        c.start().unwrap();
        assert_eq!(c.state(), LifecycleState::Running);
        assert!(c.cleanup().is_err());
        c.stop().unwrap();
        c.start().unwrap();
        c.stop().unwrap();
        c.cleanup().unwrap();
        assert_eq!(c.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn last_error_reads_and_clears() {
        let mut c = S626Component::new("s626", Box::new(SimulationDriver::new()), PollerConfig::default());
        assert_eq!(c.last_error(), 0);
        assert!(c.write_dac(0, 10).is_err());
        assert_eq!(c.last_error(), NON_DRIVER_ERROR);
        assert_eq!(c.last_error(), 0);
    }
}
