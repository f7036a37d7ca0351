//! Board driver implementations.
//!
//! - [`simulation`] - Software board for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `BoardDriver` and `BoardHandle` from `s626_common::hal::driver`
//! 3. Register the factory in [`register_all_drivers`]

pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);
}
