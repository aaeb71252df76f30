//! The station: counting, gate and signalling bound to one state record.
//!
//! [`Station`] is the entry point the sensor poller and the command surface
//! call into. Every operation follows the same shape: lock the store, mutate,
//! take a snapshot, unlock, publish. Anything that waits (beeps, the batch
//! workflow, print jobs) is spawned on the tokio runtime captured at
//! construction, so callers on other threads never block on it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use conveyor_core::{GateStatus, SensorStatus, StatusSnapshot, SystemStatus};
use conveyor_hardware::{OutputChannel, OutputDriver};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::broadcast::{StatusBroadcaster, StatusSubscription};
use crate::config::SequenceTiming;
use crate::counting::TransitOutcome;
use crate::error::{PrintError, Result, StationError};
use crate::gate::{BeepPattern, GateChange};
use crate::print::PrintJobDispatcher;
use crate::store::{FaultSource, SharedStateStore};

struct StationInner {
    store: SharedStateStore,
    broadcaster: StatusBroadcaster,
    printing: PrintJobDispatcher,
    timing: SequenceTiming,
    runtime: Handle,
}

/// Counting station. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Station {
    inner: Arc<StationInner>,
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("status", &self.inner.store.system_status())
            .finish_non_exhaustive()
    }
}

impl Station {
    /// Bind the station to its state, queue and printer.
    ///
    /// `runtime` runs the station's background work (beeps, batch workflow,
    /// print jobs) and may be driven from any thread.
    pub fn new(
        store: SharedStateStore,
        broadcaster: StatusBroadcaster,
        printing: PrintJobDispatcher,
        timing: SequenceTiming,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(StationInner {
                store,
                broadcaster,
                printing,
                timing,
                runtime,
            }),
        }
    }

    pub fn store(&self) -> &SharedStateStore {
        &self.inner.store
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.inner.broadcaster
    }

    pub fn printing(&self) -> &PrintJobDispatcher {
        &self.inner.printing
    }

    /// Current observable state.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.store.snapshot()
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> StatusSubscription {
        self.inner.broadcaster.subscribe()
    }

    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        self.inner.broadcaster.publish(snapshot);
    }

    /// Bring the actuators up and open for counting.
    ///
    /// Closes the gate, holds it for the settle period, chirps the reset
    /// pattern, opens the gate and enters `Ready`.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::HardwareInit`] if the actuators cannot be
    /// claimed. The station is then parked in `Failed` for good.
    pub async fn startup(&self) -> Result<()> {
        let initialized = {
            let mut inner = self.inner.store.lock();
            match inner.outputs.initialize() {
                Ok(()) => {
                    inner.outputs_ready = true;
                    inner.update_lights();
                    Ok(inner.outputs.info())
                }
                Err(e) => {
                    inner.fail(
                        FaultSource::HardwareInit,
                        format!("Hardware initialization failed: {e}"),
                    );
                    Err((e, inner.snapshot()))
                }
            }
        };

        let info = match initialized {
            Ok(info) => info,
            Err((e, snapshot)) => {
                error!(error = %e, "Actuators unavailable, counting disabled");
                self.publish(snapshot);
                return Err(StationError::HardwareInit(e));
            }
        };
        info!(outputs = %info.name, model = %info.model, "Actuators initialized");

        self.close_gate();
        tokio::time::sleep(self.inner.timing.startup_settle).await;
        self.sound(self.reset_pattern()).await;
        self.open_gate();

        let snapshot = {
            let mut inner = self.inner.store.lock();
            if inner.state.system_status == SystemStatus::Initializing {
                inner.advance(SystemStatus::Ready);
            }
            inner.snapshot()
        };
        info!(target = snapshot.batch_target, "Station ready");
        self.publish(snapshot);
        Ok(())
    }

    /// Apply one detected transit at `at`.
    ///
    /// Called from the sensor poller's thread; never waits.
    pub fn register_transit(&self, at: DateTime<Utc>) -> TransitOutcome {
        let (outcome, snapshot, beeps) = {
            let mut inner = self.inner.store.lock();
            let outcome = inner.register_transit(at);
            let beeps = (inner.state.beep_count_ms, inner.state.beep_debounce_ms);
            (outcome, inner.snapshot(), beeps)
        };

        match outcome {
            TransitOutcome::Rejected(reason) => {
                debug!(?reason, "Transit rejected");
                return outcome;
            }
            TransitOutcome::Debounced { .. } => {
                self.publish(snapshot);
                self.beep(BeepPattern::single(beeps.1));
                return outcome;
            }
            TransitOutcome::Counted { .. } => {}
        }

        let printer_enabled = snapshot.printer_enabled;
        self.publish(snapshot);

        if let TransitOutcome::Counted {
            batch_closed: true, ..
        } = outcome
        {
            // The completion signal replaces the count beep.
            self.spawn_batch_workflow();
        } else {
            self.beep(BeepPattern::single(beeps.0));
        }

        if printer_enabled {
            self.spawn_print_job();
        }
        outcome
    }

    /// Open the gate. Idempotent.
    pub fn open_gate(&self) -> GateChange {
        self.drive_gate(GateStatus::Open)
    }

    /// Close the gate. Idempotent.
    pub fn close_gate(&self) -> GateChange {
        self.drive_gate(GateStatus::Closed)
    }

    fn drive_gate(&self, target: GateStatus) -> GateChange {
        let (change, snapshot) = {
            let mut inner = self.inner.store.lock();
            let change = inner.drive_gate(target);
            (change, inner.snapshot())
        };
        self.publish(snapshot);
        change
    }

    /// Drive one lamp or the buzzer directly.
    pub fn set_output(&self, channel: OutputChannel, on: bool) -> bool {
        self.inner.store.lock().set_output(channel, on)
    }

    /// Play `pattern` on a background task.
    pub fn beep(&self, pattern: BeepPattern) {
        let station = self.clone();
        self.inner
            .runtime
            .spawn(async move { station.sound(pattern).await });
    }

    /// Play `pattern` and wait for it to finish.
    pub async fn sound(&self, pattern: BeepPattern) {
        if pattern.pulse.is_zero() {
            return;
        }
        for pulse in 0..pattern.repeat {
            if pulse > 0 {
                tokio::time::sleep(pattern.gap).await;
            }
            self.set_output(OutputChannel::Buzzer, true);
            tokio::time::sleep(pattern.pulse).await;
            self.set_output(OutputChannel::Buzzer, false);
        }
    }

    fn reset_pattern(&self) -> BeepPattern {
        let pulse_ms = self.inner.store.lock().state.beep_reset_ms;
        BeepPattern::reset(pulse_ms, self.inner.timing.reset_beep_gap)
    }

    pub(crate) fn spawn_batch_workflow(&self) {
        let station = self.clone();
        self.inner
            .runtime
            .spawn(async move { station.run_batch_workflow().await });
    }

    /// Close out a batch whose count reached the target.
    ///
    /// The caller already moved the lifecycle to `BatchClosing` under the
    /// same lock that performed the final count. The gate and count steps
    /// always run. Lifecycle steps are skipped once a fault has taken over.
    async fn run_batch_workflow(&self) {
        let complete_ms = self.inner.store.lock().state.beep_complete_ms;
        info!("Batch closing");
        self.sound(BeepPattern::single(complete_ms)).await;
        tokio::time::sleep(self.inner.timing.batch_close_settle).await;

        self.close_gate();
        let snapshot = {
            let mut inner = self.inner.store.lock();
            inner.advance_from(&SystemStatus::BatchClosing, SystemStatus::Waiting);
            inner.snapshot()
        };
        let gate_wait = snapshot.gate_wait_seconds;
        self.publish(snapshot);

        info!(seconds = gate_wait, "Holding gate between batches");
        tokio::time::sleep(std::time::Duration::from_secs(u64::from(gate_wait))).await;

        let snapshot = {
            let mut inner = self.inner.store.lock();
            inner.clear_count();
            inner.advance_from(&SystemStatus::Waiting, SystemStatus::Resetting);
            inner.snapshot()
        };
        self.publish(snapshot);

        self.sound(self.reset_pattern()).await;
        self.open_gate();

        let (snapshot, ready) = {
            let mut inner = self.inner.store.lock();
            let ready = inner.advance_from(&SystemStatus::Resetting, SystemStatus::Ready);
            (inner.snapshot(), ready)
        };
        if ready {
            info!(
                batches_completed = snapshot.batches_completed,
                "Batch complete, station ready"
            );
        } else {
            warn!(status = %snapshot.system_status, "Batch ended under a fault");
        }
        self.publish(snapshot);
    }

    fn spawn_print_job(&self) {
        let printing = self.inner.printing.clone();
        self.inner.runtime.spawn(async move {
            match printing.print_count().await {
                Ok(()) => {}
                Err(PrintError::ConfigurationMissing(key)) => {
                    warn!(key, "Print job abandoned, configuration missing");
                }
                Err(e) => warn!(error = %e, "Print job abandoned"),
            }
        });
    }

    /// Record what the transit beams currently see.
    pub fn set_sensor_status(&self, status: SensorStatus) {
        let snapshot = {
            let mut inner = self.inner.store.lock();
            if inner.state.sensor_status == status {
                return;
            }
            inner.state.sensor_status = status;
            inner.snapshot()
        };
        self.publish(snapshot);
    }

    /// Park the station after sustained sensor bus failure.
    pub fn mark_bus_failed(&self, diagnostic: &str) {
        let snapshot = {
            let mut inner = self.inner.store.lock();
            if !inner.fail(
                FaultSource::SensorBus,
                format!("Sensor bus failure: {diagnostic}"),
            ) {
                return;
            }
            inner.snapshot()
        };
        self.publish(snapshot);
    }

    /// Leave a sensor bus fault once reads succeed again.
    pub fn clear_bus_failure(&self) {
        let snapshot = {
            let mut inner = self.inner.store.lock();
            if inner.fault != Some(FaultSource::SensorBus) {
                return;
            }
            inner.fault = None;
            inner.advance(SystemStatus::Ready);
            inner.snapshot()
        };
        info!("Sensor bus fault cleared");
        self.publish(snapshot);
    }

    /// Drive the actuators to a safe state: gate closed, lamps and buzzer
    /// off.
    pub fn safe_shutdown(&self) {
        let snapshot = {
            let mut inner = self.inner.store.lock();
            inner.drive_gate(GateStatus::Closed);
            inner.release_outputs();
            inner.snapshot()
        };
        info!("Actuators released");
        self.publish(snapshot);
    }
}
