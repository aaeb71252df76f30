//! Settings persistence for the conveyor station.
//!
//! The station reads its configuration (batch target, gate wait, beep
//! durations, printer address and payload fields) from a simple key/value
//! store. This crate provides that store on SQLite, plus an in-memory variant
//! for tests and simulation.
//!
//! - [`Database`] - Connection pool manager with automatic migrations
//! - [`SettingsStore`] - Get / set / remove contract consumed by the station
//! - [`AnySettingsStore`] - Concrete dispatch over the available stores
//!
//! # Example
//!
//! ```no_run
//! use conveyor_storage::{Database, DatabaseConfig, SettingsStore, SqliteSettingsStore};
//! use conveyor_core::constants::SEEDED_DEFAULTS;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("conveyor.db")).await?;
//! let settings = SqliteSettingsStore::new(db.pool().clone());
//!
//! settings.ensure_defaults(SEEDED_DEFAULTS).await?;
//! let target = settings.get("batch_target").await?;
//! assert_eq!(target.as_deref(), Some("20"));
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod settings;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use settings::{AnySettingsStore, MemorySettingsStore, SettingsStore, SqliteSettingsStore};
