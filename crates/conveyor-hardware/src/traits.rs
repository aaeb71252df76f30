//! Hardware device trait definitions.
//!
//! These traits are the contract between the station core and its physical
//! peripherals: the discrete input bus that carries the counting sensors, the
//! actuator outputs (gate relay, lamps, buzzer) and the wireless label
//! printer.
//!
//! The input bus and the printer link use native `async fn` methods (Rust
//! 1.90 + Edition 2024 RPITIT). Their futures are not required to be `Send`:
//! each of them is driven from a single dedicated execution context that
//! owns the device, so link APIs that must stay on the thread that created
//! them are expressible.
//!
//! Actuator writes are plain synchronous calls. A relay or GPIO write does
//! not wait on anything, which lets the gate controller perform it inside the
//! same critical section that records the new gate status.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use uuid::Uuid;

use crate::error::Result;
use crate::types::{DeviceInfo, DiscoveredDevice, OutputChannel};

/// Discrete input bus carrying the counting sensors.
///
/// A read returns one boolean per channel, `true` meaning the channel is
/// active (beam blocked). Reads are not bounded by a client-side timeout; a
/// failed read surfaces as an error from the bus itself.
///
/// # Examples
///
/// ```
/// use conveyor_hardware::mock::MockSensorBus;
/// use conveyor_hardware::traits::SensorBus;
///
/// #[tokio::main]
/// async fn main() -> conveyor_hardware::Result<()> {
///     let (mut bus, handle) = MockSensorBus::new(2);
///     handle.set_channel(0, true);
///
///     let inputs = bus.read_inputs().await?;
///     assert_eq!(inputs, vec![true, false]);
///     Ok(())
/// }
/// ```
pub trait SensorBus: Send {
    /// Read every input channel once.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus cannot be reached or answers with
    /// malformed data.
    async fn read_inputs(&mut self) -> Result<Vec<bool>>;

    /// Get device information.
    fn info(&self) -> DeviceInfo;
}

/// Actuator outputs: gate relay, indicator lamps and buzzer.
///
/// Implementations must be cheap to call: every method is invoked while the
/// station state lock is held.
pub trait OutputDriver: Send {
    /// Claim the outputs and drive them to a known state.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InitializationFailed`] if the outputs are
    /// unavailable (missing GPIO chip, permissions, relay board absent).
    ///
    /// [`HardwareError::InitializationFailed`]: crate::HardwareError::InitializationFailed
    fn initialize(&mut self) -> Result<()>;

    /// Energize (`on = true`) or release a single output.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be driven.
    fn set_output(&mut self, channel: OutputChannel, on: bool) -> Result<()>;

    /// Get device information.
    fn info(&self) -> DeviceInfo;
}

/// An established session to the wireless label printer.
///
/// All methods take `&self`, mirroring peripheral APIs where the handle is a
/// cheap reference to state owned by the link stack.
pub trait PrinterLink {
    /// Address of the connected printer.
    fn address(&self) -> &str;

    /// Write `data` to the given characteristic.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected or the link has dropped.
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Resolve once the link reports a disconnection.
    async fn disconnected(&self);

    /// Close the link.
    ///
    /// # Errors
    ///
    /// Returns an error if the link stack fails to tear the session down.
    async fn disconnect(&self) -> Result<()>;
}

/// Factory for [`PrinterLink`] sessions plus on-demand discovery.
///
/// A connector is moved onto the link manager's own execution context and
/// never leaves it.
pub trait LinkConnector: Send {
    /// Session type produced by [`connect`](LinkConnector::connect).
    type Link: PrinterLink;

    /// Attempt one connection to `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the printer refuses or cannot be reached.
    async fn connect(&mut self, address: &str) -> Result<Self::Link>;

    /// Discover printers advertising nearby for `duration`.
    ///
    /// # Errors
    ///
    /// Returns an error if the radio cannot scan.
    async fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredDevice>>;
}
