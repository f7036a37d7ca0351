//! Error taxonomy for board operations.
//!
//! | Error | Raised by |
//! |-------|-----------|
//! | `StageError` | board open sequence, tags the failing stage 1..5 |
//! | `HalCallError` | a single driver primitive |
//! | `ConfigError` | malformed caller input or configuration file |
//! | `SessionAbsent` | an operation that needs an open board without one |
//!
//! None of these are fatal to the process.

use crate::config::ConfigError;
use crate::hal::driver::{HalCallError, StageError};
use thiserror::Error;

/// Umbrella error returned by the control API and the polling engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DaqError {
    /// Board open sequence failed; the session is absent.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// A driver primitive failed.
    #[error(transparent)]
    Hal(#[from] HalCallError),

    /// Malformed caller input.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation needs an open board session.
    #[error("no board session is open")]
    SessionAbsent,

    /// No driver registered under the requested name.
    #[error("driver not found: {0}")]
    DriverNotFound(String),

    /// The polling engine is already running.
    #[error("polling engine already running")]
    AlreadyRunning,

    /// The polling thread could not be spawned.
    #[error("failed to spawn polling thread: {0}")]
    Spawn(String),

    /// RT scheduling setup failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

impl DaqError {
    /// Driver return code carried by this error, if it came from the driver.
    pub fn driver_code(&self) -> Option<i32> {
        match self {
            DaqError::Stage(e) => Some(e.source.code),
            DaqError::Hal(e) => Some(e.code),
            _ => None,
        }
    }
}

/// Result alias for board operations.
pub type DaqResult<T> = Result<T, DaqError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::types::OpenStage;

    #[test]
    fn conversions_and_driver_code() {
        let err: DaqError = HalCallError::new(-5).into();
        assert_eq!(err.driver_code(), Some(-5));

        let err: DaqError = StageError {
            stage: OpenStage::Slot,
            source: HalCallError::new(-22),
        }
        .into();
        assert_eq!(err.driver_code(), Some(-22));
        assert!(err.to_string().contains("stage 4"));

        let err: DaqError = ConfigError::FileNotFound.into();
        assert_eq!(err.driver_code(), None);
        assert_eq!(DaqError::SessionAbsent.driver_code(), None);
    }
}
