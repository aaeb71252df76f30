//! Error types for the station core.
//!
//! Only [`StationError::HardwareInit`] is fatal, and only to the counting
//! subsystem. Link failures never leave the connection manager; dispatch and
//! print failures are reported to their immediate caller.

use std::time::Duration;

use conveyor_hardware::HardwareError;
use conveyor_storage::StorageError;
use thiserror::Error;

/// Result type alias for station operations.
pub type Result<T> = std::result::Result<T, StationError>;

/// Errors surfaced by station setup and lifecycle operations.
#[derive(Debug, Error)]
pub enum StationError {
    /// Actuators could not be claimed at startup. Counting stays parked.
    #[error("Hardware initialization failed: {0}")]
    HardwareInit(HardwareError),

    /// Settings store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A dedicated execution context could not be started.
    #[error("Failed to start {context}: {message}")]
    Spawn { context: String, message: String },
}

impl StationError {
    /// Create a spawn error for the named context.
    pub fn spawn(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Spawn {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a hand-off to the printer link manager's context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No live session to the printer.
    #[error("Printer is not connected")]
    NotConnected,

    /// The link manager context is not running.
    #[error("Printer link manager is not running")]
    ManagerUnavailable,

    /// The round trip exceeded the dispatch timeout.
    #[error("Printer dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// The link itself rejected the operation.
    #[error("Printer link error: {0}")]
    Link(String),
}

/// Reasons a print job was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    /// A required setting is absent or malformed.
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// The printer link was not connected when the job was ready.
    #[error("Printer is not connected")]
    NotConnected,

    /// Hand-off to the link manager failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Settings could not be read.
    #[error("Settings unavailable: {0}")]
    Settings(String),
}
