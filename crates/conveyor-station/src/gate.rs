//! Gate, indicator lamps and buzzer.
//!
//! The gate relay is energized to close the gate. Lamps follow the gate:
//! green while open, red while closed, exactly one lit once the outputs are
//! initialized. Every physical write happens under the station lock and only
//! on an actual change of gate state.

use std::time::Duration;

use conveyor_core::GateStatus;
use conveyor_core::constants::RESET_BEEP_REPEAT;
use conveyor_hardware::{OutputChannel, OutputDriver};
use tracing::{debug, error, info, warn};

use crate::store::Inner;

/// Lamp levels `(green, red)` for a gate position.
///
/// ```
/// use conveyor_core::GateStatus;
/// use conveyor_station::gate::lamp_levels;
///
/// assert_eq!(lamp_levels(GateStatus::Open), (true, false));
/// assert_eq!(lamp_levels(GateStatus::Closed), (false, true));
/// ```
#[must_use]
pub fn lamp_levels(gate: GateStatus) -> (bool, bool) {
    match gate {
        GateStatus::Open => (true, false),
        GateStatus::Closed => (false, true),
    }
}

/// Result of commanding the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChange {
    /// The gate moved and the lamps were updated.
    Moved,
    /// Already in the commanded position; nothing was driven.
    Unchanged,
    /// Outputs are not initialized or the relay write failed.
    Unavailable,
}

/// A buzzer pattern: `repeat` pulses of `pulse`, separated by `gap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepPattern {
    pub pulse: Duration,
    pub repeat: u8,
    pub gap: Duration,
}

impl BeepPattern {
    /// One pulse of `pulse_ms`.
    pub fn single(pulse_ms: u64) -> Self {
        Self {
            pulse: Duration::from_millis(pulse_ms),
            repeat: 1,
            gap: Duration::ZERO,
        }
    }

    /// The reset chirp: three short pulses.
    pub fn reset(pulse_ms: u64, gap: Duration) -> Self {
        Self {
            pulse: Duration::from_millis(pulse_ms),
            repeat: RESET_BEEP_REPEAT,
            gap,
        }
    }

    /// Total time the pattern takes to play.
    pub fn total(&self) -> Duration {
        let repeat = u32::from(self.repeat);
        self.pulse * repeat + self.gap * repeat.saturating_sub(1)
    }
}

impl Inner {
    /// Drive the gate to `target`. Idempotent.
    pub(crate) fn drive_gate(&mut self, target: GateStatus) -> GateChange {
        if !self.outputs_ready {
            warn!(%target, "Gate command ignored, outputs not initialized");
            return GateChange::Unavailable;
        }
        if self.state.gate_status == target {
            debug!(%target, "Gate already in position");
            return GateChange::Unchanged;
        }

        let energize = target == GateStatus::Closed;
        if let Err(e) = self.outputs.set_output(OutputChannel::GateRelay, energize) {
            error!(%target, error = %e, "Gate relay write failed");
            return GateChange::Unavailable;
        }

        self.state.gate_status = target;
        self.update_lights();
        info!(gate = %target, "Gate moved");
        GateChange::Moved
    }

    /// Set the lamps from the current gate position.
    pub(crate) fn update_lights(&mut self) {
        let (green, red) = lamp_levels(self.state.gate_status);
        self.set_output(OutputChannel::GreenLamp, green);
        self.set_output(OutputChannel::RedLamp, red);
    }

    /// Drive a single output, logging failures. Returns `false` if the write
    /// did not happen.
    pub(crate) fn set_output(&mut self, channel: OutputChannel, on: bool) -> bool {
        if !self.outputs_ready {
            return false;
        }
        match self.outputs.set_output(channel, on) {
            Ok(()) => true,
            Err(e) => {
                warn!(%channel, on, error = %e, "Output write failed");
                false
            }
        }
    }

    /// Release every output. Used on shutdown.
    pub(crate) fn release_outputs(&mut self) {
        for channel in [
            OutputChannel::GreenLamp,
            OutputChannel::RedLamp,
            OutputChannel::Buzzer,
        ] {
            self.set_output(channel, false);
        }
    }
}
