//! Simulation driver module.
//!
//! This module provides a software S626 board for development and testing
//! without physical hardware. Faults can be injected per open stage, per
//! subsystem read, and on writes and close.

mod board;
mod driver;
mod io;

pub use board::{CallCounts, FaultPlan, Resources, SIM_FAULT_CODE, SimBoard};
pub use driver::SimulationDriver;
pub use io::IoSimulator;

use s626_common::hal::driver::BoardDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn BoardDriver> {
    Box::new(SimulationDriver::new())
}
