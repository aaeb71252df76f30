//! Shared domain types for the conveyor station controller.
//!
//! This crate has no I/O. It defines the observable state vocabulary
//! (gate, system, sensor and printer-link status), the immutable
//! [`StatusSnapshot`] published to subscribers, the settings keys consumed
//! by the station, and the core error type.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
