//! Control API: synchronous operations for arbitrary caller threads.
//!
//! Cached reads only take the data lock. Operations that reach the board take
//! the session lock for exactly one driver call, after any config or data lock
//! they needed has been released.

use crate::session::Session;
use crate::store::ChannelStore;
use s626_common::config::ConfigError;
use s626_common::consts::{ADC_CHANNELS, DAC_CHANNELS, DIO_BANKS, ENC_CHANNELS, INITIAL_DIO_LEN};
use s626_common::error::{DaqError, DaqResult};
use s626_common::hal::driver::{BoardDriver, HalCallError};
use s626_common::hal::types::{ActivityMask, DioConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reject an index outside `0..count`.
fn check_index(kind: &'static str, index: usize, count: usize) -> Result<(), ConfigError> {
    if index < count {
        Ok(())
    } else {
        Err(ConfigError::ChannelOutOfRange { kind, index, count })
    }
}

/// Caller-facing handle over the channel store and the board driver.
pub struct Interface {
    store: Arc<ChannelStore>,
    driver: Box<dyn BoardDriver>,
}

impl Interface {
    /// Create an interface over an existing store.
    pub fn new(store: Arc<ChannelStore>, driver: Box<dyn BoardDriver>) -> Self {
        Self { store, driver }
    }

    /// Create an interface with a fresh store.
    pub fn with_driver(driver: Box<dyn BoardDriver>) -> Self {
        Self::new(Arc::new(ChannelStore::new()), driver)
    }

    /// The shared store, for handing to a [`crate::PollingEngine`].
    pub fn store(&self) -> &Arc<ChannelStore> {
        &self.store
    }

    /// Run one driver call; `SessionAbsent` without an open board.
    fn hal<T>(&self, op: impl FnOnce(&mut Session) -> Result<T, HalCallError>) -> DaqResult<T> {
        match self.store.with_session(op) {
            Some(result) => result.map_err(DaqError::from),
            None => Err(DaqError::SessionAbsent),
        }
    }

    // ─── Cached reads ───────────────────────────────────────────────

    /// Last value read from a digital bank.
    pub fn get_digital(&self, bank: usize) -> DaqResult<u16> {
        check_index("DIO bank", bank, DIO_BANKS)?;
        Ok(self.store.dio(bank))
    }

    /// Last 14-bit sample of an analog input.
    pub fn get_analog(&self, channel: usize) -> DaqResult<u16> {
        check_index("ADC", channel, ADC_CHANNELS)?;
        Ok(self.store.adc(channel))
    }

    /// Last count of an encoder.
    pub fn get_encoder(&self, channel: usize) -> DaqResult<i32> {
        check_index("ENC", channel, ENC_CHANNELS)?;
        Ok(self.store.enc(channel))
    }

    // ─── Writes ─────────────────────────────────────────────────────

    /// Merge `(mask, value)` into the bank configuration and drive it.
    ///
    /// The merged configuration is kept even when no session is open; the
    /// write then fails with `SessionAbsent`.
    pub fn set_digital(&self, bank: usize, mask: u16, value: u16) -> DaqResult<()> {
        check_index("DIO bank", bank, DIO_BANKS)?;
        let config = self.store.merge_dio_config(bank, mask, value);
        debug!(
            "DIO bank {bank}: mask={:#06x} value={:#06x}",
            config.mask, config.value
        );
        self.hal(|s| s.write_digital(bank, config.mask, config.value))
    }

    /// Write an analog output. The value is passed through unvalidated.
    pub fn set_analog_output(&self, channel: usize, value: u16) -> DaqResult<()> {
        check_index("DAC", channel, DAC_CHANNELS)?;
        self.hal(|s| s.write_analog(channel, value))
    }

    /// Update analog range bits under `mask`; returns the new range word.
    ///
    /// Takes effect on the next poll of each affected channel.
    pub fn set_analog_range(&self, mask: u16, bits: u16) -> DaqResult<u16> {
        let range = self
            .store
            .with_session(|s| s.set_analog_range(mask, bits))
            .ok_or(DaqError::SessionAbsent)?;
        debug!("ADC range now {range:#06x}");
        Ok(range)
    }

    /// Configure every encoder and zero its cached count.
    ///
    /// Without a session nothing is touched.
    pub fn prepare_encoders(&self) -> DaqResult<()> {
        for channel in 0..ENC_CHANNELS {
            self.hal(|s| s.configure_encoder(channel))?;
            self.store.store_enc(channel, 0);
        }
        info!("Prepared {ENC_CHANNELS} encoders");
        Ok(())
    }

    // ─── Configuration ──────────────────────────────────────────────

    /// Replace the subsystem gate.
    pub fn set_active_publishing(&self, mask: ActivityMask) {
        self.store.set_activity(mask);
        debug!("Active publishing: {mask:?}");
    }

    /// Set all three bank configurations from `[m0, v0, m1, v1, m2, v2]` and
    /// drive them.
    ///
    /// # Errors
    /// `InitializerLength` (nothing changed) unless exactly six values are
    /// given; `SessionAbsent` if no board is open (configuration kept).
    pub fn set_initial_digital(&self, initial: &[u16]) -> DaqResult<()> {
        if initial.len() != INITIAL_DIO_LEN {
            return Err(ConfigError::InitializerLength {
                expected: INITIAL_DIO_LEN,
                actual: initial.len(),
            }
            .into());
        }

        let mut banks = [DioConfig::default(); DIO_BANKS];
        for (bank, pair) in banks.iter_mut().zip(initial.chunks_exact(2)) {
            *bank = DioConfig::new(pair[0], pair[1]);
        }
        self.store.set_dio_configs(banks);

        for (bank, config) in banks.iter().enumerate() {
            self.hal(|s| s.write_digital(bank, config.mask, config.value))?;
        }
        info!("Initial DIO configuration applied");
        Ok(())
    }

    /// Replace the analog input selector.
    pub fn set_initial_adc(&self, select: u16) {
        self.store.set_adc_select(select);
    }

    /// Replace the encoder selector.
    pub fn set_initial_enc(&self, select: u8) {
        self.store.set_enc_select(select);
    }

    // ─── Session lifecycle ──────────────────────────────────────────

    /// Whether a board session is open.
    pub fn session_present(&self) -> bool {
        self.store.session_present()
    }

    /// Close any open session, then open a new one.
    ///
    /// # Errors
    /// A failed close is returned with the old session still open. A failed
    /// open stage is returned with no session.
    pub fn reset_driver(&self, device: &str, bus: u32, slot: u32) -> DaqResult<()> {
        self.store.with_session_slot(|current| {
            close_slot(current)?;
            match Session::open(self.driver.as_ref(), device, bus, slot) {
                Ok(session) => {
                    *current = Some(session);
                    Ok(())
                }
                Err(e) => {
                    warn!("Driver reset failed: {e}");
                    Err(e.into())
                }
            }
        })
    }

    /// Close the session if one is open. Closing an absent session succeeds.
    pub fn stop_driver(&self) -> DaqResult<()> {
        self.store.with_session_slot(close_slot)
    }
}

/// Close the session in `slot`, putting it back if the close fails.
fn close_slot(slot: &mut Option<Session>) -> DaqResult<()> {
    if let Some(session) = slot.take() {
        if let Err((session, e)) = session.close() {
            *slot = Some(session);
            return Err(e.into());
        }
    }
    Ok(())
}

impl std::fmt::Debug for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interface")
            .field("driver", &self.driver.name())
            .field("store", &self.store)
            .finish()
    }
}
