use crate::{Result, constants::NO_PAYLOAD, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the physical batch gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Open,
    Closed,
}

impl GateStatus {
    /// Returns `true` if the gate lets objects through.
    #[inline]
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, GateStatus::Open)
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GateStatus::Open => write!(f, "Open"),
            GateStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// What the counting sensors currently see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Clear,
    Blocked,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SensorStatus::Clear => write!(f, "Clear"),
            SensorStatus::Blocked => write!(f, "Blocked"),
        }
    }
}

/// Lifecycle state of the counting station.
///
/// The batch lifecycle is `Ready → Counting → BatchClosing → Waiting →
/// Resetting → Ready`. `Initializing` and `Failed` are only reachable from
/// startup and fault paths; no object is counted outside `Ready` and
/// `Counting`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Initializing,
    Ready,
    Counting,
    BatchClosing,
    Waiting,
    Resetting,
    /// Hardware fault, with a diagnostic for the operator.
    Failed(String),
}

impl SystemStatus {
    /// Returns `true` if transit events may be counted in this state.
    #[inline]
    #[must_use]
    pub fn accepts_transits(&self) -> bool {
        matches!(self, SystemStatus::Ready | SystemStatus::Counting)
    }

    /// Returns `true` while a batch-completion workflow owns the station.
    #[inline]
    #[must_use]
    pub fn is_batch_in_progress(&self) -> bool {
        matches!(
            self,
            SystemStatus::BatchClosing | SystemStatus::Waiting | SystemStatus::Resetting
        )
    }

    /// Returns `true` if the station is parked on a fault.
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, SystemStatus::Failed(_))
    }

    /// Check if the lifecycle allows moving from this state to `target`.
    ///
    /// Any state may fall into `Failed`; only `Initializing` and `Failed`
    /// lead back to `Ready` outside the batch cycle. `Counting → Ready` is the
    /// manual counter reset.
    ///
    /// # Examples
    ///
    /// ```
    /// use conveyor_core::SystemStatus;
    ///
    /// assert!(SystemStatus::Counting.can_transition_to(&SystemStatus::BatchClosing));
    /// assert!(!SystemStatus::Waiting.can_transition_to(&SystemStatus::Counting));
    /// ```
    #[must_use]
    pub fn can_transition_to(&self, target: &SystemStatus) -> bool {
        use SystemStatus::*;

        matches!(
            (self, target),
            (Initializing, Ready)
                | (Ready, Counting)
                | (Counting, BatchClosing | Ready)
                | (BatchClosing, Waiting)
                | (Waiting, Resetting)
                | (Resetting, Ready)
                | (Failed(_), Ready)
        ) || (matches!(target, Failed(_)) && !self.is_failed())
    }

    /// Short state name without the diagnostic.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SystemStatus::Initializing => "Initializing",
            SystemStatus::Ready => "Ready",
            SystemStatus::Counting => "Counting",
            SystemStatus::BatchClosing => "BatchClosing",
            SystemStatus::Waiting => "Waiting",
            SystemStatus::Resetting => "Resetting",
            SystemStatus::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SystemStatus::Failed(reason) => write!(f, "Failed: {reason}"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// State of the wireless printer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    /// Returns `true` if a session is live.
    #[inline]
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
        }
    }
}

/// Immutable copy of every observable station field.
///
/// Snapshots are what the presentation layer receives; they never carry
/// internal handles. Serializes to a flat JSON object with snake_case keys.
///
/// # Examples
///
/// ```
/// use conveyor_core::{StatusSnapshot, SystemStatus};
///
/// let snapshot = StatusSnapshot::default();
/// assert_eq!(snapshot.system_status, SystemStatus::Initializing);
/// assert_eq!(snapshot.object_count, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub object_count: u32,
    pub batch_target: u32,
    pub gate_wait_seconds: u32,
    pub gate_status: GateStatus,
    pub sensor_status: SensorStatus,
    pub system_status: SystemStatus,
    pub batches_completed: u64,
    pub last_counted_at: Option<DateTime<Utc>>,
    pub last_debounce_at: Option<DateTime<Utc>>,
    pub debounced_transits: u64,
    pub debounce_interval_ms: u64,
    pub beep_count_ms: u64,
    pub beep_complete_ms: u64,
    pub beep_reset_ms: u64,
    pub beep_debounce_ms: u64,
    pub printer_enabled: bool,
    pub connection_status: ConnectionStatus,
    pub last_printed_payload: String,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            object_count: 0,
            batch_target: crate::constants::DEFAULT_BATCH_TARGET,
            gate_wait_seconds: crate::constants::DEFAULT_GATE_WAIT_SECONDS,
            gate_status: GateStatus::Closed,
            sensor_status: SensorStatus::Clear,
            system_status: SystemStatus::Initializing,
            batches_completed: 0,
            last_counted_at: None,
            last_debounce_at: None,
            debounced_transits: 0,
            debounce_interval_ms: crate::constants::DEFAULT_DEBOUNCE_INTERVAL_MS,
            beep_count_ms: crate::constants::DEFAULT_BEEP_COUNT_MS,
            beep_complete_ms: crate::constants::DEFAULT_BEEP_COMPLETE_MS,
            beep_reset_ms: crate::constants::DEFAULT_BEEP_RESET_MS,
            beep_debounce_ms: crate::constants::DEFAULT_BEEP_DEBOUNCE_MS,
            printer_enabled: false,
            connection_status: ConnectionStatus::Disconnected,
            last_printed_payload: NO_PAYLOAD.to_string(),
            taken_at: Utc::now(),
        }
    }
}

/// Output a manual command can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputDevice {
    Gate,
    GreenLamp,
    RedLamp,
    Buzzer,
}

impl std::str::FromStr for OutputDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gate" => Ok(OutputDevice::Gate),
            "green_led" | "green" => Ok(OutputDevice::GreenLamp),
            "red_led" | "red" => Ok(OutputDevice::RedLamp),
            "buzzer" => Ok(OutputDevice::Buzzer),
            _ => Err(Error::UnknownDevice(s.to_string())),
        }
    }
}

impl fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputDevice::Gate => write!(f, "gate"),
            OutputDevice::GreenLamp => write!(f, "green_led"),
            OutputDevice::RedLamp => write!(f, "red_led"),
            OutputDevice::Buzzer => write!(f, "buzzer"),
        }
    }
}

/// Manual action applied to an [`OutputDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputAction {
    On,
    Off,
    Beep,
}

impl std::str::FromStr for OutputAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(OutputAction::On),
            "off" => Ok(OutputAction::Off),
            "beep" => Ok(OutputAction::Beep),
            other => Err(Error::UnsupportedAction {
                device: "any".to_string(),
                action: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputAction::On => write!(f, "on"),
            OutputAction::Off => write!(f, "off"),
            OutputAction::Beep => write!(f, "beep"),
        }
    }
}

/// Result of a presentation-layer command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    /// Successful outcome with a human-readable message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Failed outcome with a human-readable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SystemStatus::Ready, true)]
    #[case(SystemStatus::Counting, true)]
    #[case(SystemStatus::Initializing, false)]
    #[case(SystemStatus::BatchClosing, false)]
    #[case(SystemStatus::Waiting, false)]
    #[case(SystemStatus::Resetting, false)]
    #[case(SystemStatus::Failed("bus".to_string()), false)]
    fn test_accepts_transits(#[case] status: SystemStatus, #[case] expected: bool) {
        assert_eq!(status.accepts_transits(), expected);
    }

    #[rstest]
    #[case(SystemStatus::Initializing, SystemStatus::Ready, true)]
    #[case(SystemStatus::Ready, SystemStatus::Counting, true)]
    #[case(SystemStatus::Counting, SystemStatus::BatchClosing, true)]
    #[case(SystemStatus::Counting, SystemStatus::Ready, true)]
    #[case(SystemStatus::BatchClosing, SystemStatus::Waiting, true)]
    #[case(SystemStatus::Waiting, SystemStatus::Resetting, true)]
    #[case(SystemStatus::Resetting, SystemStatus::Ready, true)]
    #[case(SystemStatus::Waiting, SystemStatus::Failed("bus".to_string()), true)]
    #[case(SystemStatus::Failed("bus".to_string()), SystemStatus::Ready, true)]
    #[case(SystemStatus::Ready, SystemStatus::BatchClosing, false)]
    #[case(SystemStatus::BatchClosing, SystemStatus::Ready, false)]
    #[case(SystemStatus::Initializing, SystemStatus::Counting, false)]
    #[case(SystemStatus::Failed("a".to_string()), SystemStatus::Failed("b".to_string()), false)]
    fn test_lifecycle_transitions(
        #[case] from: SystemStatus,
        #[case] to: SystemStatus,
        #[case] expected: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), expected);
    }

    #[test]
    fn test_failed_display_includes_reason() {
        let status = SystemStatus::Failed("sensor bus unreachable".to_string());
        assert_eq!(status.to_string(), "Failed: sensor bus unreachable");
        assert_eq!(status.name(), "Failed");
    }

    #[rstest]
    #[case("gate", OutputDevice::Gate)]
    #[case("green_led", OutputDevice::GreenLamp)]
    #[case("RED_LED", OutputDevice::RedLamp)]
    #[case(" buzzer ", OutputDevice::Buzzer)]
    fn test_output_device_parse(#[case] input: &str, #[case] expected: OutputDevice) {
        assert_eq!(input.parse::<OutputDevice>().unwrap(), expected);
    }

    #[test]
    fn test_output_device_parse_unknown() {
        let err = "conveyor_motor".parse::<OutputDevice>().unwrap_err();
        assert!(matches!(err, Error::UnknownDevice(_)));
    }

    #[test]
    fn test_output_action_parse() {
        assert_eq!("ON".parse::<OutputAction>().unwrap(), OutputAction::On);
        assert_eq!("beep".parse::<OutputAction>().unwrap(), OutputAction::Beep);
        assert!("toggle".parse::<OutputAction>().is_err());
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let snapshot = StatusSnapshot {
            system_status: SystemStatus::BatchClosing,
            gate_status: GateStatus::Open,
            ..StatusSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["system_status"], "batch_closing");
        assert_eq!(json["gate_status"], "open");
        assert_eq!(json["connection_status"], "disconnected");
        assert_eq!(json["last_printed_payload"], "N/A");
        assert_eq!(json["beep_debounce_ms"], 50);
    }

    #[test]
    fn test_failed_status_serializes_reason() {
        let json = serde_json::to_value(SystemStatus::Failed("no gpio".to_string())).unwrap();
        assert_eq!(json["failed"], "no gpio");
    }

    #[test]
    fn test_command_outcome_constructors() {
        assert!(CommandOutcome::ok("done").success);
        let failed = CommandOutcome::failed("nope");
        assert!(!failed.success);
        assert_eq!(failed.message, "nope");
    }
}
