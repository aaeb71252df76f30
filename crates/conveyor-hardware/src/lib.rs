//! Hardware abstraction layer for the conveyor counting station.
//!
//! The station talks to three kinds of peripherals:
//!
//! - a discrete input bus carrying the entry and exit beam sensors
//!   ([`SensorBus`]),
//! - the actuator outputs: gate relay, green and red lamps, buzzer
//!   ([`OutputDriver`]),
//! - a wireless label printer reached through a connect/write link
//!   ([`LinkConnector`] and [`PrinterLink`]).
//!
//! Mock implementations of every trait live in [`mock`]; the enum wrappers in
//! [`devices`] give the station a single concrete type per device family.
//!
//! # Example
//!
//! ```no_run
//! use conveyor_hardware::traits::SensorBus;
//! use conveyor_hardware::Result;
//!
//! async fn entry_blocked<B: SensorBus>(bus: &mut B) -> Result<bool> {
//!     let inputs = bus.read_inputs().await?;
//!     Ok(inputs.first().copied().unwrap_or(false))
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] carrying a
//! [`HardwareError`].
//!
//! [`SensorBus`]: traits::SensorBus
//! [`OutputDriver`]: traits::OutputDriver
//! [`LinkConnector`]: traits::LinkConnector
//! [`PrinterLink`]: traits::PrinterLink

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use devices::{AnyLinkConnector, AnyOutputDriver, AnyPrinterLink, AnySensorBus};
pub use error::{HardwareError, Result};
pub use traits::{LinkConnector, OutputDriver, PrinterLink, SensorBus};
pub use types::{DeviceInfo, DiscoveredDevice, OutputChannel};
