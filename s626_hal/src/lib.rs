//! # S626 HAL Library
//!
//! Mediates access to a Sensoray 626 data-acquisition board between one
//! periodic polling thread and any number of caller threads.
//!
//! # Module Structure
//!
//! - [`session`] - Board open/close with staged rollback, I/O primitives
//! - [`store`] - Lock-guarded channel state shared by everything below
//! - [`poller`] - Periodic polling engine
//! - [`control`] - Synchronous control API for caller threads
//! - [`component`] - Host component adapter (lifecycle, port batches)
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Board driver implementations
//! - [`rt`] - RT scheduling setup for the polling thread
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       s626_hal (single crate)                   │
//! │  ┌──────────────┐                          ┌────────────────┐   │
//! │  │ S626Component│─────────►┌────────────┐  │ PollingEngine  │   │
//! │  │ (host ports) │          │ Interface  │  │ (own thread)   │   │
//! │  └──────────────┘          └─────┬──────┘  └───────┬────────┘   │
//! │                                  ▼                 ▼            │
//! │                     ┌─────────────────────────────────────┐     │
//! │                     │ ChannelStore                        │     │
//! │                     │ activity │ config │ data │ session  │     │
//! │                     └──────────────────────────┬──────────┘     │
//! │                                                ▼                │
//! │                                   ┌────────────────────────┐    │
//! │                                   │ Session → BoardHandle  │    │
//! │                                   │ (trait object)         │    │
//! │                                   └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod component;
pub mod control;
pub mod driver_registry;
pub mod drivers;
pub mod poller;
pub mod rt;
pub mod session;
pub mod store;

// Re-export key types for convenience
pub use crate::component::{ComponentError, LifecycleState, PortOutputs, S626Component};
pub use crate::control::Interface;
pub use crate::driver_registry::DriverRegistry;
pub use crate::poller::{CycleOutcome, CycleStats, PollingEngine, poll_cycle};
pub use crate::session::{Session, sign_extend_24};
pub use crate::store::ChannelStore;
