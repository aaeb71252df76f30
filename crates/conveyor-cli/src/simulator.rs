//! Feeds simulated objects through the mock input bus.

use std::time::Duration;

use conveyor_hardware::mock::MockSensorBusHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Beam levels `[entry, exit]` as one object passes.
const PASSAGE: [[bool; 2]; 4] = [[true, false], [true, true], [false, true], [false, false]];

/// Ticks each level is held so the poller sees every step.
const HOLD_TICKS: u32 = 3;

pub struct TransitSimulator {
    bus: MockSensorBusHandle,
    every: Duration,
    hold: Duration,
}

impl TransitSimulator {
    pub fn new(bus: MockSensorBusHandle, every: Duration, poll_interval: Duration) -> Self {
        Self {
            bus,
            every,
            hold: poll_interval * HOLD_TICKS,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(every = ?self.every, "Transit simulator started");
        let mut objects = 0u64;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.every) => {}
            }

            if !self.pass(&cancel).await {
                break;
            }
            objects += 1;
            debug!(objects, "Simulated object passed");
        }

        self.bus.set_channels(&[false, false]);
        info!(objects, "Transit simulator stopped");
    }

    /// Step one object across the beams. Returns `false` if cancelled.
    async fn pass(&self, cancel: &CancellationToken) -> bool {
        for levels in PASSAGE {
            self.bus.set_channels(&levels);
            tokio::select! {
                () = cancel.cancelled() => return false,
                () = tokio::time::sleep(self.hold) => {}
            }
        }
        true
    }
}
