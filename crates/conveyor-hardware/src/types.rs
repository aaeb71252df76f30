//! Common types shared across hardware device implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "IO Module", "MockSensorBus").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// Discrete actuator outputs wired to the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChannel {
    /// Gate relay. Energized means the gate is closed.
    GateRelay,

    /// Green indicator lamp.
    GreenLamp,

    /// Red indicator lamp.
    RedLamp,

    /// Audible indicator.
    Buzzer,
}

impl OutputChannel {
    /// All outputs, in wiring order.
    pub const ALL: [OutputChannel; 4] = [
        OutputChannel::GateRelay,
        OutputChannel::GreenLamp,
        OutputChannel::RedLamp,
        OutputChannel::Buzzer,
    ];
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GateRelay => write!(f, "GATE_RELAY"),
            Self::GreenLamp => write!(f, "GREEN_LED"),
            Self::RedLamp => write!(f, "RED_LED"),
            Self::Buzzer => write!(f, "BUZZER"),
        }
    }
}

/// A printer found during a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Advertised name, or "Unnamed".
    pub name: String,

    /// Link-layer address used to connect.
    pub address: String,
}

impl DiscoveredDevice {
    /// Create a discovered device entry.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_builder() {
        let info = DeviceInfo::new("IO Module", "8DI").with_firmware_version("v1.2");

        assert_eq!(info.name, "IO Module");
        assert_eq!(info.model, "8DI");
        assert_eq!(info.firmware_version, Some("v1.2".to_string()));
    }

    #[test]
    fn test_output_channel_display() {
        assert_eq!(OutputChannel::GateRelay.to_string(), "GATE_RELAY");
        assert_eq!(OutputChannel::Buzzer.to_string(), "BUZZER");
    }

    #[test]
    fn test_output_channel_serialization() {
        let json = serde_json::to_string(&OutputChannel::GreenLamp).unwrap();
        assert_eq!(json, "\"green_lamp\"");
        let parsed: OutputChannel = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, OutputChannel::GreenLamp);
    }
}
