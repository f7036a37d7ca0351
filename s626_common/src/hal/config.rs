//! Board configuration types.
//!
//! This module contains the configuration loaded from `s626.toml`:
//! - `S626Config` - Top-level file
//! - `BoardConfig` - Driver and device location
//! - `PollerConfig` - Polling thread period and scheduling
//! - `ChannelsConfig` - Startup activity, selectors and initial outputs

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    CYCLE_TIME_US, DEFAULT_DEVICE, DEFAULT_THREAD_NAME, ENC_CHANNELS,
    INITIAL_DIO_LEN, all_channels,
};
use crate::hal::types::ActivityMask;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_driver() -> String {
    "simulation".to_string()
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_cycle_time_us() -> u64 {
    CYCLE_TIME_US
}

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

fn default_cpu_core() -> usize {
    1
}

fn default_rt_priority() -> i32 {
    10
}

fn default_update_period_ms() -> u64 {
    10
}

fn default_initial_dio() -> Vec<u16> {
    vec![0; INITIAL_DIO_LEN]
}

/// Main configuration loaded from `s626.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S626Config {
    /// Logging and instance name.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Driver and device location.
    #[serde(default)]
    pub board: BoardConfig,

    /// Polling thread settings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Startup channel configuration.
    #[serde(default)]
    pub channels: ChannelsConfig,
}

impl S626Config {
    /// Validate the whole configuration.
    ///
    /// # Validation Rules
    /// 1. `shared.service_name` is not empty
    /// 2. `poller.cycle_time_us` > 0 and `poller.update_period_ms` > 0
    /// 3. `channels.initial_dio` has exactly one (mask, value) pair per bank
    /// 4. selectors only use existing channels
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.board.device.is_empty() {
            return Err(ConfigError::ValidationError(
                "board.device cannot be empty".to_string(),
            ));
        }

        if self.poller.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "poller.cycle_time_us must be greater than 0".to_string(),
            ));
        }

        if self.poller.update_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poller.update_period_ms must be greater than 0".to_string(),
            ));
        }

        self.channels.validate()
    }
}

/// Driver selection and PCI location of the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Registered driver name.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Analogy device node (e.g., "analogy0").
    #[serde(default = "default_device")]
    pub device: String,

    /// PCI bus number.
    #[serde(default)]
    pub bus: u32,

    /// PCI slot number.
    #[serde(default)]
    pub slot: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            device: default_device(),
            bus: 0,
            slot: 0,
        }
    }
}

/// Polling thread settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Polling period in microseconds.
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u64,

    /// Name of the polling thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// CPU core the polling thread is pinned to (`rt` feature only).
    #[serde(default = "default_cpu_core")]
    pub cpu_core: usize,

    /// SCHED_FIFO priority of the polling thread (`rt` feature only).
    #[serde(default = "default_rt_priority")]
    pub rt_priority: i32,

    /// Host update cadence in milliseconds.
    #[serde(default = "default_update_period_ms")]
    pub update_period_ms: u64,
}

impl PollerConfig {
    /// Polling period as a `Duration`.
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.cycle_time_us)
    }

    /// Host update cadence as a `Duration`.
    pub fn update_period(&self) -> Duration {
        Duration::from_millis(self.update_period_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: default_cycle_time_us(),
            thread_name: default_thread_name(),
            cpu_core: default_cpu_core(),
            rt_priority: default_rt_priority(),
            update_period_ms: default_update_period_ms(),
        }
    }
}

/// Channel configuration applied at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Subsystems polled (bit 0 ADC, bit 1 ENC, bit 2 DIO).
    #[serde(default)]
    pub activity: u8,

    /// Per-bank (mask, value) pairs, flattened: `[m0, v0, m1, v1, m2, v2]`.
    #[serde(default = "default_initial_dio")]
    pub initial_dio: Vec<u16>,

    /// Analog input selector.
    #[serde(default)]
    pub adc_select: u16,

    /// Encoder selector.
    #[serde(default)]
    pub enc_select: u8,

    /// Analog range bits (1 = ±10 V).
    #[serde(default)]
    pub adc_range: u16,

    /// Configure all encoders right after the board is opened.
    #[serde(default)]
    pub prepare_encoders: bool,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            activity: 0,
            initial_dio: default_initial_dio(),
            adc_select: 0,
            enc_select: 0,
            adc_range: 0,
            prepare_encoders: false,
        }
    }
}

impl ChannelsConfig {
    /// Validate selector widths and initializer length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_dio.len() != INITIAL_DIO_LEN {
            return Err(ConfigError::InitializerLength {
                expected: INITIAL_DIO_LEN,
                actual: self.initial_dio.len(),
            });
        }

        if ActivityMask::from_bits(self.activity).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "channels.activity {:#04x} has undefined bits",
                self.activity
            )));
        }

        if u32::from(self.enc_select) & !all_channels(ENC_CHANNELS) != 0 {
            return Err(ConfigError::ValidationError(format!(
                "channels.enc_select {:#04x} selects encoders beyond {}",
                self.enc_select, ENC_CHANNELS
            )));
        }

        Ok(())
    }

    /// Subsystem gate as a typed mask.
    pub fn activity_mask(&self) -> ActivityMask {
        ActivityMask::from_bits_truncate(self.activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    const FULL_TOML: &str = r#"
[shared]
log_level = "debug"
service_name = "bench"

[board]
driver = "simulation"
device = "analogy1"
bus = 2
slot = 5

[poller]
cycle_time_us = 500
thread_name = "poller"

[channels]
activity = 7
initial_dio = [0xFFFF, 0x0001, 0x00FF, 0x0000, 0, 0]
adc_select = 0x000F
enc_select = 0x03
adc_range = 0x0001
"#;

    #[test]
    fn full_config_parses_and_validates() {
        let config = S626Config::from_toml(FULL_TOML).unwrap();
        config.validate().unwrap();

        assert_eq!(config.board.device, "analogy1");
        assert_eq!(config.board.bus, 2);
        assert_eq!(config.board.slot, 5);
        assert_eq!(config.poller.period(), Duration::from_micros(500));
        assert_eq!(config.poller.rt_priority, 10);
        assert_eq!(config.channels.activity_mask(), ActivityMask::all());
        assert_eq!(config.channels.adc_select, 0x000F);

        assert_eq!(&config.channels.initial_dio[..4], &[0xFFFF, 0x0001, 0x00FF, 0x0000]);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = S626Config::from_toml("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.board.driver, "simulation");
        assert_eq!(config.board.device, DEFAULT_DEVICE);
        assert_eq!(config.poller.cycle_time_us, CYCLE_TIME_US);
        assert_eq!(config.poller.thread_name, DEFAULT_THREAD_NAME);
        assert_eq!(config.channels.initial_dio.len(), INITIAL_DIO_LEN);
        assert!(config.channels.activity_mask().is_empty());
    }

    #[test]
    fn zero_cycle_time_rejected() {
        let mut config = S626Config::default();
        config.poller.cycle_time_us = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn wrong_initializer_length_rejected() {
        let mut config = S626Config::default();
        config.channels.initial_dio = vec![0; 4];
        assert_eq!(
            config.validate(),
            Err(ConfigError::InitializerLength {
                expected: 6,
                actual: 4
            })
        );
    }

    #[test]
    fn out_of_range_selectors_rejected() {
        let mut config = S626Config::default();
        config.channels.enc_select = 0x40;
        assert!(config.validate().is_err());

        let mut config = S626Config::default();
        config.channels.activity = 0x08;
        assert!(config.validate().is_err());
    }
}
