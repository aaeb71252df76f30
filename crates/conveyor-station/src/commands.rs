//! Operator commands.
//!
//! [`ControlPanel`] is the boundary the presentation layer calls. Every
//! command returns a [`CommandOutcome`]; none of them panic or propagate an
//! error type, and none of them hold the station lock while waiting on
//! settings, the printer or a timer.

use conveyor_core::constants::{
    KEY_BATCH_TARGET, KEY_GATE_WAIT_SECONDS, KEY_PRINTER_ADDRESS, KEY_PRINTER_ENABLED,
    KEY_WRITE_CHARACTERISTIC, MANUAL_BEEP_MS,
};
use conveyor_core::{CommandOutcome, Error, OutputAction, OutputDevice, SystemStatus};
use conveyor_hardware::{DiscoveredDevice, OutputChannel};
use conveyor_storage::{AnySettingsStore, SettingsStore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::gate::{BeepPattern, GateChange};
use crate::station::Station;

/// Command surface over a [`Station`].
#[derive(Debug, Clone)]
pub struct ControlPanel {
    station: Station,
    settings: AnySettingsStore,
}

impl ControlPanel {
    pub fn new(station: Station, settings: AnySettingsStore) -> Self {
        Self { station, settings }
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Persist and apply a new batch target and gate wait.
    ///
    /// Lowering the target to or below the live count while counting closes
    /// the batch immediately.
    pub async fn set_config(&self, batch_target: u32, gate_wait_seconds: u32) -> CommandOutcome {
        if batch_target == 0 {
            return CommandOutcome::failed("Batch target must be at least 1");
        }

        for (key, value) in [
            (KEY_BATCH_TARGET, batch_target.to_string()),
            (KEY_GATE_WAIT_SECONDS, gate_wait_seconds.to_string()),
        ] {
            if let Err(e) = self.settings.set(key, &value).await {
                warn!(key, error = %e, "Failed to persist configuration");
                return CommandOutcome::failed(format!("Failed to save configuration: {e}"));
            }
        }

        let (snapshot, batch_closed) = {
            let mut inner = self.station.store().lock();
            inner.state.batch_target = batch_target;
            inner.state.gate_wait_seconds = gate_wait_seconds;
            let batch_closed = inner.state.system_status == SystemStatus::Counting
                && inner.state.object_count >= batch_target
                && inner.begin_batch_close();
            (inner.snapshot(), batch_closed)
        };
        info!(batch_target, gate_wait_seconds, "Configuration updated");
        self.station.publish(snapshot);

        if batch_closed {
            self.station.spawn_batch_workflow();
        }
        CommandOutcome::ok("Configuration saved")
    }

    /// Zero the live count and return to `Ready`.
    pub fn reset_counter(&self) -> CommandOutcome {
        let snapshot = {
            let mut inner = self.station.store().lock();
            let status = inner.state.system_status.clone();
            if status.is_batch_in_progress() {
                return CommandOutcome::failed("Cannot reset while a batch is closing");
            }
            if status.is_failed() || status == SystemStatus::Initializing {
                return CommandOutcome::failed(format!("Cannot reset while {}", status.name()));
            }

            inner.clear_count();
            if status == SystemStatus::Counting {
                inner.advance(SystemStatus::Ready);
            }
            inner.snapshot()
        };
        info!("Counter reset by operator");
        self.station.publish(snapshot);
        CommandOutcome::ok("Counter reset")
    }

    /// Drive an output by name, e.g. `("gate", "on")` or `("buzzer", "beep")`.
    ///
    /// For the gate, `on` energizes the relay and closes it.
    pub fn manual_output(&self, device: &str, action: &str) -> CommandOutcome {
        let parsed = device
            .parse::<OutputDevice>()
            .and_then(|device| Ok((device, action.parse::<OutputAction>()?)));
        let (device, action) = match parsed {
            Ok(pair) => pair,
            Err(e) => return CommandOutcome::failed(e.to_string()),
        };

        match (device, action) {
            (OutputDevice::Gate, OutputAction::On | OutputAction::Off) => {
                let change = if action == OutputAction::On {
                    self.station.close_gate()
                } else {
                    self.station.open_gate()
                };
                match change {
                    GateChange::Moved => CommandOutcome::ok(format!("Gate {action}")),
                    GateChange::Unchanged => CommandOutcome::ok(format!("Gate already {action}")),
                    GateChange::Unavailable => CommandOutcome::failed("Gate unavailable"),
                }
            }
            (OutputDevice::GreenLamp | OutputDevice::RedLamp, OutputAction::On | OutputAction::Off) => {
                let channel = if device == OutputDevice::GreenLamp {
                    OutputChannel::GreenLamp
                } else {
                    OutputChannel::RedLamp
                };
                if self.station.set_output(channel, action == OutputAction::On) {
                    CommandOutcome::ok(format!("{device} {action}"))
                } else {
                    CommandOutcome::failed(format!("{device} unavailable"))
                }
            }
            (OutputDevice::Buzzer, OutputAction::Beep) => {
                self.station.beep(BeepPattern::single(MANUAL_BEEP_MS));
                CommandOutcome::ok("Buzzer beep")
            }
            (device, action) => CommandOutcome::failed(
                Error::UnsupportedAction {
                    device: device.to_string(),
                    action: action.to_string(),
                }
                .to_string(),
            ),
        }
    }

    /// Store the printer the link manager should keep connected.
    pub async fn save_printer(&self, address: &str, characteristic: &str) -> CommandOutcome {
        let address = address.trim();
        if address.is_empty() {
            return CommandOutcome::failed("Printer address is required");
        }
        let characteristic = characteristic.trim();
        if Uuid::parse_str(characteristic).is_err() {
            return CommandOutcome::failed(format!(
                "Write characteristic must be a UUID, got {characteristic:?}"
            ));
        }

        for (key, value) in [
            (KEY_PRINTER_ADDRESS, address),
            (KEY_WRITE_CHARACTERISTIC, characteristic),
        ] {
            if let Err(e) = self.settings.set(key, value).await {
                warn!(key, error = %e, "Failed to persist printer");
                return CommandOutcome::failed(format!("Failed to save printer: {e}"));
            }
        }

        info!(address, "Printer saved");
        self.station.printing().printer().reconfigure();
        CommandOutcome::ok(format!("Printer {address} saved"))
    }

    /// Forget the configured printer. The live session, if any, ends at the
    /// manager's next address check.
    pub async fn remove_printer(&self) -> CommandOutcome {
        if let Err(e) = self.settings.remove(KEY_PRINTER_ADDRESS).await {
            warn!(error = %e, "Failed to remove printer");
            return CommandOutcome::failed(format!("Failed to remove printer: {e}"));
        }
        info!("Printer removed");
        self.station.printing().printer().reconfigure();
        CommandOutcome::ok("Printer removed")
    }

    /// Turn label printing on or off.
    pub async fn set_printer_enabled(&self, enabled: bool) -> CommandOutcome {
        if let Err(e) = self
            .settings
            .set(KEY_PRINTER_ENABLED, if enabled { "true" } else { "false" })
            .await
        {
            warn!(error = %e, "Failed to persist printer flag");
            return CommandOutcome::failed(format!("Failed to save printer flag: {e}"));
        }

        let snapshot = {
            let mut inner = self.station.store().lock();
            inner.state.printer_enabled = enabled;
            inner.snapshot()
        };
        self.station.publish(snapshot);
        CommandOutcome::ok(if enabled {
            "Printing enabled"
        } else {
            "Printing disabled"
        })
    }

    /// Write `text` to the printer as a test label.
    pub async fn test_print(&self, text: &str) -> CommandOutcome {
        match self.station.printing().print_text(text).await {
            Ok(()) => CommandOutcome::ok("Test label sent"),
            Err(e) => {
                warn!(error = %e, "Test print failed");
                CommandOutcome::failed(e.to_string())
            }
        }
    }

    /// Discover nearby printers.
    pub async fn scan_printers(&self) -> (CommandOutcome, Vec<DiscoveredDevice>) {
        match self.station.printing().printer().scan().await {
            Ok(devices) => (
                CommandOutcome::ok(format!("Found {} device(s)", devices.len())),
                devices,
            ),
            Err(e) => {
                warn!(error = %e, "Printer scan failed");
                (CommandOutcome::failed(e.to_string()), Vec::new())
            }
        }
    }
}
