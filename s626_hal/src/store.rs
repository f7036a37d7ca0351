//! Channel state store shared by the polling engine and the control API.
//!
//! Four independent lock groups:
//!
//! | Group | Contents |
//! |-------|----------|
//! | activity | `ActivityMask` |
//! | config | `DIO_config[3]`, ADC selector, ENC selector |
//! | data | last-read `DIO[3]`, `ADC[16]`, `ENC[6]` |
//! | session | `Option<Session>` |
//!
//! Every public method takes exactly one lock and releases it before
//! returning. Callers never hold two groups at once; the only accessors that
//! reach the hardware are [`ChannelStore::with_session`] and
//! [`ChannelStore::with_session_slot`].
//!
//! Indices are not checked here: the polling engine iterates fixed ranges and
//! the control API validates caller input first. An out-of-range index panics.

use crate::session::Session;
use s626_common::consts::{ADC_CHANNELS, DIO_BANKS, ENC_CHANNELS};
use s626_common::hal::types::{ActivityMask, DioConfig};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Channel selection and output configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ChannelConfig {
    dio: [DioConfig; DIO_BANKS],
    adc_select: u16,
    enc_select: u8,
}

/// Last values read from the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ChannelData {
    dio: [u16; DIO_BANKS],
    adc: [u16; ADC_CHANNELS],
    enc: [i32; ENC_CHANNELS],
}

/// Lock-guarded channel state.
#[derive(Debug, Default)]
pub struct ChannelStore {
    activity: Mutex<ActivityMask>,
    config: Mutex<ChannelConfig>,
    data: Mutex<ChannelData>,
    session: Mutex<Option<Session>>,
}

/// Lock a group; a poisoned lock is taken over as-is, every group only holds
/// plain values that are never left half-written.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelStore {
    /// Create an empty store: nothing active, nothing selected, no session.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Activity ───────────────────────────────────────────────────

    /// Snapshot of the subsystem gate.
    pub fn activity(&self) -> ActivityMask {
        *lock(&self.activity)
    }

    /// Replace the subsystem gate.
    pub fn set_activity(&self, mask: ActivityMask) {
        *lock(&self.activity) = mask;
    }

    // ─── Config ─────────────────────────────────────────────────────

    /// Output configuration of one bank.
    pub fn dio_config(&self, bank: usize) -> DioConfig {
        lock(&self.config).dio[bank]
    }

    /// Merge a masked write into a bank's configuration and return the result.
    pub fn merge_dio_config(&self, bank: usize, mask: u16, value: u16) -> DioConfig {
        let mut config = lock(&self.config);
        let merged = config.dio[bank].merged(mask, value);
        config.dio[bank] = merged;
        merged
    }

    /// Replace all bank configurations.
    pub fn set_dio_configs(&self, banks: [DioConfig; DIO_BANKS]) {
        lock(&self.config).dio = banks;
    }

    /// Analog input selector.
    pub fn adc_select(&self) -> u16 {
        lock(&self.config).adc_select
    }

    /// Replace the analog input selector.
    pub fn set_adc_select(&self, select: u16) {
        lock(&self.config).adc_select = select;
    }

    /// Whether analog input `channel` is selected.
    pub fn adc_selected(&self, channel: usize) -> bool {
        lock(&self.config).adc_select & (1 << channel) != 0
    }

    /// Encoder selector.
    pub fn enc_select(&self) -> u8 {
        lock(&self.config).enc_select
    }

    /// Replace the encoder selector.
    pub fn set_enc_select(&self, select: u8) {
        lock(&self.config).enc_select = select;
    }

    /// Whether encoder `channel` is selected.
    pub fn enc_selected(&self, channel: usize) -> bool {
        lock(&self.config).enc_select & (1 << channel) != 0
    }

    // ─── Data ───────────────────────────────────────────────────────

    /// Last value read from a bank.
    pub fn dio(&self, bank: usize) -> u16 {
        lock(&self.data).dio[bank]
    }

    /// Record a bank read.
    pub fn store_dio(&self, bank: usize, value: u16) {
        lock(&self.data).dio[bank] = value;
    }

    /// Last sample of an analog input.
    pub fn adc(&self, channel: usize) -> u16 {
        lock(&self.data).adc[channel]
    }

    /// Record an analog sample (already masked to 14 bits).
    pub fn store_adc(&self, channel: usize, value: u16) {
        lock(&self.data).adc[channel] = value;
    }

    /// Last count of an encoder.
    pub fn enc(&self, channel: usize) -> i32 {
        lock(&self.data).enc[channel]
    }

    /// Record an encoder count.
    pub fn store_enc(&self, channel: usize, value: i32) {
        lock(&self.data).enc[channel] = value;
    }

    /// All encoder counts at once.
    pub fn enc_values(&self) -> [i32; ENC_CHANNELS] {
        lock(&self.data).enc
    }

    // ─── Session ────────────────────────────────────────────────────

    /// Whether a session is open.
    pub fn session_present(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// Run one hardware call on the open session.
    ///
    /// Returns `None` without calling `f` when no session is open.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        lock(&self.session).as_mut().map(f)
    }

    /// Run `f` on the session slot itself, for open and close.
    pub fn with_session_slot<R>(&self, f: impl FnOnce(&mut Option<Session>) -> R) -> R {
        f(&mut lock(&self.session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulationDriver;

    #[test]
    fn new_store_is_inert() {
        let store = ChannelStore::new();
        assert!(store.activity().is_empty());
        assert!(!store.session_present());
        assert_eq!(store.adc_select(), 0);
        assert_eq!(store.enc_values(), [0; ENC_CHANNELS]);
        assert!(store.with_session(|_| ()).is_none());
    }

    #[test]
    fn merge_keeps_bits_outside_mask() {
        let store = ChannelStore::new();
        store.set_dio_configs([DioConfig::new(0xFFFF, 0xAAAA); DIO_BANKS]);

        let merged = store.merge_dio_config(1, 0x00FF, 0x1234);
        assert_eq!(merged, DioConfig::new(0xFFFF, 0xAA34));
        assert_eq!(store.dio_config(1), merged);
        assert_eq!(store.dio_config(0), DioConfig::new(0xFFFF, 0xAAAA));
    }

    #[test]
    fn selectors_gate_channels() {
        let store = ChannelStore::new();
        store.set_adc_select(0b1010);
        store.set_enc_select(0b10_0001);
        assert!(store.adc_selected(1));
        assert!(!store.adc_selected(2));
        assert!(store.adc_selected(3));
        assert!(store.enc_selected(0));
        assert!(store.enc_selected(5));
        assert!(!store.enc_selected(4));
    }

    #[test]
    fn session_slot_holds_open_board() {
        let driver = SimulationDriver::new();
        let store = ChannelStore::new();
        store.with_session_slot(|slot| {
            *slot = Some(Session::open(&driver, "analogy0", 0, 0).unwrap());
        });
        assert!(store.session_present());
        assert_eq!(store.with_session(|s| s.device().to_string()).as_deref(), Some("analogy0"));

        let session = store.with_session_slot(Option::take).unwrap();
        session.close().unwrap();
        assert!(!store.session_present());
    }
}
