//! Sensor polling and transit detection.
//!
//! The poller reads the discrete input bus on a fixed tick from its own
//! thread. A [`TransitDetector`] follows each object across the entry and
//! exit beams and reports the tick on which its trailing edge has cleared
//! the exit beam; that tick is the transit fed to
//! [`Station::register_transit`].
//!
//! # Detector phases
//!
//! ```text
//!   Idle ──entry blocked──▶ Entering ──exit blocked──▶ Inside
//!    ▲                         │                        │  ▲
//!    │        both clear for   │         entry clear    │  │ entry blocked
//!    ├──── abandon_ticks ──────┘                        ▼  │
//!    └──────── exit clear for clear_ticks ─────────── Exiting
//! ```
//!
//! With a single beam (entry and exit on one channel) the detector skips
//! `Entering`: the object is inside as soon as the beam is blocked.

use std::thread::JoinHandle;

use chrono::Utc;
use conveyor_core::SensorStatus;
use conveyor_hardware::{AnySensorBus, SensorBus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::PollerConfig;
use crate::counting::TransitOutcome;
use crate::error::{Result, StationError};
use crate::station::Station;

/// Where the object under the beams is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitPhase {
    Idle,
    Entering,
    Inside,
    Exiting,
}

/// Two-beam object tracker.
///
/// # Examples
///
/// ```
/// use conveyor_station::config::PollerConfig;
/// use conveyor_station::poller::TransitDetector;
///
/// let mut detector = TransitDetector::new(&PollerConfig::default().with_clear_ticks(1));
///
/// assert!(!detector.observe(&[true, false]));  // leading edge at entry
/// assert!(!detector.observe(&[true, true]));   // spans both beams
/// assert!(!detector.observe(&[false, true]));  // past the entry beam
/// assert!(detector.observe(&[false, false]));  // trailing edge clears exit
/// ```
#[derive(Debug, Clone)]
pub struct TransitDetector {
    entry: usize,
    exit: usize,
    clear_ticks: u32,
    abandon_ticks: u32,
    phase: TransitPhase,
    clear_run: u32,
    idle_run: u32,
    missing_reported: bool,
}

impl TransitDetector {
    pub fn new(config: &PollerConfig) -> Self {
        Self {
            entry: config.entry_channel,
            exit: config.exit_channel,
            clear_ticks: config.clear_ticks.max(1),
            abandon_ticks: config.abandon_ticks.max(1),
            phase: TransitPhase::Idle,
            clear_run: 0,
            idle_run: 0,
            missing_reported: false,
        }
    }

    pub fn phase(&self) -> TransitPhase {
        self.phase
    }

    fn single_beam(&self) -> bool {
        self.entry == self.exit
    }

    /// What the beams show: blocked if either is blocked.
    pub fn sensor_status(&self, inputs: &[bool]) -> SensorStatus {
        let blocked = [self.entry, self.exit]
            .iter()
            .any(|&channel| inputs.get(channel).copied().unwrap_or(false));
        if blocked {
            SensorStatus::Blocked
        } else {
            SensorStatus::Clear
        }
    }

    /// Feed one bus read. Returns `true` on the tick a transit completes.
    ///
    /// A read missing either channel leaves the detector untouched.
    pub fn observe(&mut self, inputs: &[bool]) -> bool {
        let (Some(&entry), Some(&exit)) = (inputs.get(self.entry), inputs.get(self.exit)) else {
            if !self.missing_reported {
                warn!(
                    channels = inputs.len(),
                    entry = self.entry,
                    exit = self.exit,
                    "Sensor channel missing from bus read, holding detector state"
                );
                self.missing_reported = true;
            }
            return false;
        };
        self.missing_reported = false;

        match self.phase {
            TransitPhase::Idle => {
                if entry {
                    self.idle_run = 0;
                    self.move_to(if self.single_beam() {
                        TransitPhase::Inside
                    } else {
                        TransitPhase::Entering
                    });
                }
            }
            TransitPhase::Entering => {
                if exit {
                    self.move_to(TransitPhase::Inside);
                } else if entry {
                    self.idle_run = 0;
                } else {
                    self.idle_run += 1;
                    if self.idle_run >= self.abandon_ticks {
                        debug!(ticks = self.idle_run, "Object never reached exit beam, abandoned");
                        self.move_to(TransitPhase::Idle);
                    }
                }
            }
            TransitPhase::Inside => {
                if !entry {
                    self.move_to(TransitPhase::Exiting);
                    self.clear_run = u32::from(!exit);
                    return self.exited();
                }
            }
            TransitPhase::Exiting => {
                if entry {
                    // Flicker or a following object: keep tracking, do not count.
                    self.move_to(TransitPhase::Inside);
                } else if exit {
                    self.clear_run = 0;
                } else {
                    self.clear_run += 1;
                    return self.exited();
                }
            }
        }
        false
    }

    fn exited(&mut self) -> bool {
        if self.clear_run < self.clear_ticks {
            return false;
        }
        self.move_to(TransitPhase::Idle);
        true
    }

    fn move_to(&mut self, phase: TransitPhase) {
        trace!(from = ?self.phase, to = ?phase, "Detector phase");
        self.phase = phase;
        self.clear_run = 0;
    }
}

/// Polls the sensor bus and drives the station.
#[derive(Debug)]
pub struct SensorPoller {
    bus: AnySensorBus,
    station: Station,
    config: PollerConfig,
    detector: TransitDetector,
    consecutive_failures: u32,
    bus_failed: bool,
}

impl SensorPoller {
    pub fn new(bus: AnySensorBus, station: Station, config: PollerConfig) -> Self {
        Self {
            detector: TransitDetector::new(&config),
            bus,
            station,
            config,
            consecutive_failures: 0,
            bus_failed: false,
        }
    }

    /// Start polling on a dedicated thread until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Spawn`] if the runtime or the thread cannot be
    /// created.
    pub fn spawn(self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StationError::spawn("sensor poller runtime", e))?;

        std::thread::Builder::new()
            .name("sensor-poller".to_string())
            .spawn(move || runtime.block_on(self.run(cancel)))
            .map_err(|e| StationError::spawn("sensor poller thread", e))
    }

    /// Poll until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let info = self.bus.info();
        info!(
            bus = %info.name,
            interval = ?self.config.interval,
            entry = self.config.entry_channel,
            exit = self.config.exit_channel,
            "Sensor poller started"
        );

        loop {
            let period = if self.bus_failed {
                self.config.backoff
            } else {
                self.config.interval
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(period) => {}
            }
            self.tick().await;
        }

        info!("Sensor poller stopped");
    }

    /// Read the bus once and act on the result. Returns the outcome of the
    /// transit this tick completed, if any.
    pub async fn tick(&mut self) -> Option<TransitOutcome> {
        let inputs = match self.bus.read_inputs().await {
            Ok(inputs) => inputs,
            Err(e) => {
                self.read_failed(&e.to_string());
                return None;
            }
        };

        if self.bus_failed {
            info!(
                failures = self.consecutive_failures,
                "Sensor bus recovered"
            );
            self.bus_failed = false;
            self.station.clear_bus_failure();
        }
        self.consecutive_failures = 0;

        self.station
            .set_sensor_status(self.detector.sensor_status(&inputs));
        if !self.detector.observe(&inputs) {
            return None;
        }

        let outcome = self.station.register_transit(Utc::now());
        debug!(?outcome, "Transit detected");
        Some(outcome)
    }

    fn read_failed(&mut self, diagnostic: &str) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.bus_failed {
            trace!(failures = self.consecutive_failures, "Sensor bus still failing");
            return;
        }
        if self.consecutive_failures < self.config.failure_threshold {
            warn!(
                failures = self.consecutive_failures,
                error = diagnostic,
                "Sensor bus read failed, retrying next tick"
            );
            return;
        }

        error!(
            failures = self.consecutive_failures,
            error = diagnostic,
            backoff = ?self.config.backoff,
            "Sensor bus failed"
        );
        self.bus_failed = true;
        self.station.mark_bus_failed(diagnostic);
    }

    /// Whether the bus is currently declared failed.
    pub fn is_bus_failed(&self) -> bool {
        self.bus_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn detector(clear_ticks: u32) -> TransitDetector {
        TransitDetector::new(
            &PollerConfig::default()
                .with_clear_ticks(clear_ticks)
                .with_abandon_ticks(3),
        )
    }

    fn feed(detector: &mut TransitDetector, reads: &[[bool; 2]]) -> usize {
        reads.iter().filter(|read| detector.observe(&read[..])).count()
    }

    #[test]
    fn test_clean_passage_counts_once() {
        let mut detector = detector(2);
        let transits = feed(
            &mut detector,
            &[
                [true, false],
                [true, true],
                [false, true],
                [false, false],
                [false, false],
                [false, false],
            ],
        );
        assert_eq!(transits, 1);
        assert_eq!(detector.phase(), TransitPhase::Idle);
    }

    #[test]
    fn test_exit_flicker_does_not_double_count() {
        let mut detector = detector(2);
        let transits = feed(
            &mut detector,
            &[
                [true, false],
                [true, true],
                [false, true],
                [false, false],
                [false, true],
                [false, false],
                [false, false],
            ],
        );
        assert_eq!(transits, 1);
    }

    #[test]
    fn test_entry_flicker_while_exiting_keeps_object() {
        let mut detector = detector(2);
        feed(&mut detector, &[[true, false], [true, true], [false, true]]);
        assert_eq!(detector.phase(), TransitPhase::Exiting);

        assert!(!detector.observe(&[true, true]));
        assert_eq!(detector.phase(), TransitPhase::Inside);
    }

    #[test]
    fn test_object_backing_out_is_abandoned() {
        let mut detector = detector(1);
        let transits = feed(
            &mut detector,
            &[[true, false], [false, false], [false, false], [false, false]],
        );
        assert_eq!(transits, 0);
        assert_eq!(detector.phase(), TransitPhase::Idle);
    }

    #[test]
    fn test_single_beam_counts_short_pulse() {
        let mut detector =
            TransitDetector::new(&PollerConfig::default().with_channels(0, 0).with_clear_ticks(2));

        assert!(!detector.observe(&[true]));
        assert!(!detector.observe(&[false]));
        assert!(detector.observe(&[false]));
    }

    #[test]
    fn test_missing_channel_is_no_change() {
        let mut detector = detector(1);
        detector.observe(&[true, false]);

        assert!(!detector.observe(&[]));
        assert!(!detector.observe(&[false]));
        assert_eq!(detector.phase(), TransitPhase::Entering);
    }

    #[rstest]
    #[case([false, false], SensorStatus::Clear)]
    #[case([true, false], SensorStatus::Blocked)]
    #[case([false, true], SensorStatus::Blocked)]
    fn test_sensor_status(#[case] read: [bool; 2], #[case] expected: SensorStatus) {
        assert_eq!(detector(1).sensor_status(&read), expected);
    }
}
