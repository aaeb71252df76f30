//! Mock device implementations for testing and development.
//!
//! Each mock is created together with a control handle, so tests and the
//! simulator can drive inputs, inject faults and inspect outputs without
//! physical hardware.

pub mod outputs;
pub mod printer;
pub mod sensor_bus;

pub use outputs::{MockOutputs, MockOutputsHandle};
pub use printer::{ConnectBehavior, MockConnector, MockPrinterHandle, MockPrinterLink, RecordedWrite};
pub use sensor_bus::{MockSensorBus, MockSensorBusHandle};
