//! Prelude module for common re-exports.
//!
//! ```rust
//! use s626_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::S626Config;

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{DaqError, DaqResult};
pub use crate::hal::driver::{HalCallError, StageError};

// ─── Board ──────────────────────────────────────────────────────────
pub use crate::consts::{ADC_CHANNELS, DAC_CHANNELS, DIO_BANKS, ENC_CHANNELS};
pub use crate::hal::driver::{BoardDriver, BoardHandle, DriverFactory};
pub use crate::hal::types::{ActivityMask, DioConfig, OpenStage, Subsystem};
