//! The single mutex-guarded record of station state.
//!
//! Every component reads and mutates station state through
//! [`SharedStateStore`]. The lock is held only while fields are read or
//! written, and never across I/O waits, sleeps or hand-offs to another
//! context. Outside this crate the state is only observable as
//! [`StatusSnapshot`] copies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use conveyor_core::constants::NO_PAYLOAD;
use conveyor_core::{
    ConnectionStatus, Error, GateStatus, SensorStatus, StatusSnapshot, SystemStatus,
};
use conveyor_hardware::AnyOutputDriver;
use tracing::{debug, info, warn};

use crate::config::StationConfig;

/// Maximum number of lifecycle transitions kept for inspection.
const MAX_HISTORY_SIZE: usize = 64;

/// One recorded lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleTransition {
    pub from: SystemStatus,
    pub to: SystemStatus,
    pub at: DateTime<Utc>,
}

/// Which fault path parked the station in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultSource {
    /// Actuators unavailable at startup. Never cleared.
    HardwareInit,
    /// Sustained sensor bus read failure. Cleared when reads succeed again.
    SensorBus,
}

/// Observable station fields.
#[derive(Debug, Clone)]
pub(crate) struct StationState {
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
}

impl StationState {
    fn new(config: &StationConfig) -> Self {
        Self {
            object_count: 0,
            batch_target: config.batch_target.max(1),
            gate_wait_seconds: config.gate_wait_seconds,
            // A released relay leaves the gate open.
            gate_status: GateStatus::Open,
            sensor_status: SensorStatus::Clear,
            system_status: SystemStatus::Initializing,
            batches_completed: 0,
            last_counted_at: None,
            last_debounce_at: None,
            debounced_transits: 0,
            debounce_interval_ms: config.debounce_interval_ms,
            beep_count_ms: config.beep_count_ms,
            beep_complete_ms: config.beep_complete_ms,
            beep_reset_ms: config.beep_reset_ms,
            beep_debounce_ms: config.beep_debounce_ms,
            printer_enabled: config.printer_enabled,
            connection_status: ConnectionStatus::Disconnected,
            last_printed_payload: NO_PAYLOAD.to_string(),
        }
    }
}

/// Everything behind the station lock.
#[derive(Debug)]
pub(crate) struct Inner {
    pub state: StationState,
    pub outputs: AnyOutputDriver,
    pub outputs_ready: bool,
    pub fault: Option<FaultSource>,
    /// Opaque id of the live printer session. Only the link manager sets it.
    pub link_session: Option<u64>,
    history: VecDeque<LifecycleTransition>,
}

impl Inner {
    /// Immutable copy of the observable fields.
    pub fn snapshot(&self) -> StatusSnapshot {
        let s = &self.state;
        StatusSnapshot {
            object_count: s.object_count,
            batch_target: s.batch_target,
            gate_wait_seconds: s.gate_wait_seconds,
            gate_status: s.gate_status,
            sensor_status: s.sensor_status,
            system_status: s.system_status.clone(),
            batches_completed: s.batches_completed,
            last_counted_at: s.last_counted_at,
            last_debounce_at: s.last_debounce_at,
            debounced_transits: s.debounced_transits,
            debounce_interval_ms: s.debounce_interval_ms,
            beep_count_ms: s.beep_count_ms,
            beep_complete_ms: s.beep_complete_ms,
            beep_reset_ms: s.beep_reset_ms,
            beep_debounce_ms: s.beep_debounce_ms,
            printer_enabled: s.printer_enabled,
            connection_status: s.connection_status,
            last_printed_payload: s.last_printed_payload.clone(),
            taken_at: Utc::now(),
        }
    }

    /// Move the lifecycle to `next`, validating against the transition table.
    pub fn transition_to(&mut self, next: SystemStatus) -> conveyor_core::Result<()> {
        let current = &self.state.system_status;
        if !current.can_transition_to(&next) {
            return Err(Error::InvalidStateTransition {
                from: current.name().to_string(),
                to: next.name().to_string(),
            });
        }

        info!(from = %current, to = %next, "Station status changed");
        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(LifecycleTransition {
            from: current.clone(),
            to: next.clone(),
            at: Utc::now(),
        });
        self.state.system_status = next;
        Ok(())
    }

    /// Like [`transition_to`](Self::transition_to) but logs and skips an
    /// illegal move instead of returning it.
    pub fn advance(&mut self, next: SystemStatus) -> bool {
        match self.transition_to(next) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Lifecycle step skipped");
                false
            }
        }
    }

    /// Step the batch workflow from `expected` to `next`. A fault raised
    /// mid-workflow owns the lifecycle, so the step is skipped unless the
    /// station is still exactly where the workflow left it.
    pub fn advance_from(&mut self, expected: &SystemStatus, next: SystemStatus) -> bool {
        if self.fault.is_some() || self.state.system_status != *expected {
            debug!(
                status = %self.state.system_status,
                expected = %expected,
                "Workflow step superseded"
            );
            return false;
        }
        self.advance(next)
    }

    /// Park the station in `Failed`, recording why.
    pub fn fail(&mut self, source: FaultSource, diagnostic: String) -> bool {
        if self.fault == Some(FaultSource::HardwareInit) {
            return false;
        }
        self.fault = Some(source);
        self.advance(SystemStatus::Failed(diagnostic))
    }
}

/// Handle to the shared station record. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SharedStateStore {
    inner: Arc<Mutex<Inner>>,
}

impl SharedStateStore {
    /// Create the record in `Initializing` with configuration applied.
    pub fn new(outputs: AnyOutputDriver, config: &StationConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: StationState::new(config),
                outputs,
                outputs_ready: false,
                fault: None,
                link_session: None,
                history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            })),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves the record consistent before any call
        // that could panic, so a poisoned lock still guards valid state.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of every observable field.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().snapshot()
    }

    /// Current lifecycle state.
    pub fn system_status(&self) -> SystemStatus {
        self.lock().state.system_status.clone()
    }

    /// Current printer link state.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.lock().state.connection_status
    }

    /// Whether a printer session is live.
    pub fn has_link_session(&self) -> bool {
        self.lock().link_session.is_some()
    }

    /// Recent lifecycle transitions, oldest first.
    pub fn transitions(&self) -> Vec<LifecycleTransition> {
        self.lock().history.iter().cloned().collect()
    }
}
