//! S626 Common Library
//!
//! Shared constants, error taxonomy, driver traits and configuration loading
//! for the S626 board I/O workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Channel counts, sample widths, defaults
//! - [`hal`] - Driver traits, channel types, board configuration
//! - [`config`] - Configuration loading traits and types
//! - [`error`] - `DaqError` umbrella
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use s626_common::prelude::*;
//!
//! let mask = ActivityMask::from_host(3);
//! assert!(mask.contains(ActivityMask::ADC | ActivityMask::ENC));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod consts;
pub mod error;
pub mod hal;
pub mod prelude;
