//! Driver registry for board drivers.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving board
//! driver factories by name. Constructed at startup and consulted once when
//! the configured driver is resolved.

use s626_common::error::DaqError;
use s626_common::hal::driver::{BoardDriver, DriverFactory};
use std::collections::HashMap;

/// Registry of available board drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `DaqError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn BoardDriver>, DaqError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| DaqError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s626_common::hal::driver::{BoardHandle, HalCallError};

    struct NullDriver;

    impl BoardDriver for NullDriver {
        fn name(&self) -> &'static str {
            "null"
        }

        fn version(&self) -> &'static str {
            "0.1.0"
        }

        fn allocate(&self, _device: &str) -> Result<Box<dyn BoardHandle>, HalCallError> {
            Err(HalCallError::new(-libc::ENOMEM))
        }
    }

    fn create_null_driver() -> Box<dyn BoardDriver> {
        Box::new(NullDriver)
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = DriverRegistry::new();
        reg.register("null_driver", create_null_driver);

        let driver = reg.create_driver("null_driver").expect("should create");
        assert_eq!(driver.name(), "null");
    }

    #[test]
    fn registry_driver_not_found() {
        let reg = DriverRegistry::new();
        let result = reg.create_driver("analogy");
        assert!(matches!(result, Err(DaqError::DriverNotFound(name)) if name == "analogy"));
    }

    #[test]
    fn builtin_registry_has_simulation() {
        let reg = DriverRegistry::with_builtin();
        assert_eq!(reg.list_drivers(), vec!["simulation"]);
        let driver = reg.create_driver("simulation").unwrap();
        assert_eq!(driver.name(), "simulation");
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = DriverRegistry::new();
        reg.register("dup", create_null_driver);
        reg.register("dup", create_null_driver);
    }
}
