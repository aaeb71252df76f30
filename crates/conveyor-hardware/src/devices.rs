//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits is not object-safe, so the station cannot hold
//! a `Box<dyn SensorBus>`. These enums give it one concrete type per device
//! family while keeping static dispatch. New backends become new variants,
//! gated behind their Cargo feature.
//!
//! # Examples
//!
//! ```
//! use conveyor_hardware::devices::AnySensorBus;
//! use conveyor_hardware::mock::MockSensorBus;
//!
//! let (bus, _handle) = MockSensorBus::new(2);
//! let any_bus = AnySensorBus::Mock(bus);
//! ```

use std::time::Duration;

use uuid::Uuid;

use crate::mock::{MockConnector, MockOutputs, MockPrinterLink, MockSensorBus};
use crate::traits::{LinkConnector, OutputDriver, PrinterLink, SensorBus};
use crate::types::{DeviceInfo, DiscoveredDevice, OutputChannel};
use crate::Result;

/// Sensor bus dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySensorBus {
    /// Mock bus for development and testing.
    Mock(MockSensorBus),
}

impl SensorBus for AnySensorBus {
    async fn read_inputs(&mut self) -> Result<Vec<bool>> {
        match self {
            Self::Mock(bus) => bus.read_inputs().await,
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(bus) => bus.info(),
        }
    }
}

/// Actuator output dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyOutputDriver {
    /// Mock outputs for development and testing.
    Mock(MockOutputs),
}

impl OutputDriver for AnyOutputDriver {
    fn initialize(&mut self) -> Result<()> {
        match self {
            Self::Mock(outputs) => outputs.initialize(),
        }
    }

    fn set_output(&mut self, channel: OutputChannel, on: bool) -> Result<()> {
        match self {
            Self::Mock(outputs) => outputs.set_output(channel, on),
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(outputs) => outputs.info(),
        }
    }
}

/// Printer link connector dispatch.
///
/// # Examples
///
/// ```
/// use conveyor_hardware::devices::AnyLinkConnector;
/// use conveyor_hardware::mock::MockConnector;
/// use conveyor_hardware::traits::{LinkConnector, PrinterLink};
///
/// #[tokio::main]
/// async fn main() -> conveyor_hardware::Result<()> {
///     let (connector, _handle) = MockConnector::new();
///     let mut any_connector = AnyLinkConnector::Mock(connector);
///
///     let link = any_connector.connect("AA:BB:CC:DD:EE:FF").await?;
///     assert_eq!(link.address(), "AA:BB:CC:DD:EE:FF");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLinkConnector {
    /// Mock printer for development and testing.
    Mock(MockConnector),
}

impl LinkConnector for AnyLinkConnector {
    type Link = AnyPrinterLink;

    async fn connect(&mut self, address: &str) -> Result<Self::Link> {
        match self {
            Self::Mock(connector) => connector.connect(address).await.map(AnyPrinterLink::Mock),
        }
    }

    async fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
        match self {
            Self::Mock(connector) => connector.scan(duration).await,
        }
    }
}

/// Printer session dispatch, produced by [`AnyLinkConnector`].
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyPrinterLink {
    /// Session from the mock printer.
    Mock(MockPrinterLink),
}

impl PrinterLink for AnyPrinterLink {
    fn address(&self) -> &str {
        match self {
            Self::Mock(link) => link.address(),
        }
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        match self {
            Self::Mock(link) => link.write(characteristic, data).await,
        }
    }

    async fn disconnected(&self) {
        match self {
            Self::Mock(link) => link.disconnected().await,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        match self {
            Self::Mock(link) => link.disconnect().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_sensor_bus_dispatch() {
        let (bus, handle) = MockSensorBus::new(2);
        let mut bus = AnySensorBus::Mock(bus);

        handle.set_channel(1, true);
        assert_eq!(bus.read_inputs().await.unwrap(), vec![false, true]);
        assert_eq!(bus.info().model, "Mock Discrete Inputs");
    }

    #[test]
    fn test_any_output_driver_dispatch() {
        let (outputs, handle) = MockOutputs::new();
        let mut outputs = AnyOutputDriver::Mock(outputs);

        outputs.initialize().unwrap();
        outputs.set_output(OutputChannel::GateRelay, true).unwrap();
        assert!(handle.level(OutputChannel::GateRelay));
    }

    #[tokio::test]
    async fn test_any_link_round_trip() {
        let (connector, handle) = MockConnector::new();
        let mut connector = AnyLinkConnector::Mock(connector);

        let link = connector.connect("11:22:33:44:55:66").await.unwrap();
        link.write(Uuid::nil(), b"OK").await.unwrap();
        link.disconnect().await.unwrap();

        assert_eq!(handle.writes().len(), 1);
        assert!(!handle.is_link_live());
    }
}
