//! Mock discrete input bus for testing and simulation.
//!
//! The bus exposes a fixed number of boolean channels whose levels are set
//! programmatically through a [`MockSensorBusHandle`]. Read failures can be
//! injected to exercise the poller's retry and backoff paths.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{HardwareError, Result, traits::SensorBus, types::DeviceInfo};

#[derive(Debug)]
struct BusState {
    channels: Vec<bool>,
    failing: bool,
    reads: u64,
}

/// Mock sensor bus.
///
/// # Examples
///
/// ```
/// use conveyor_hardware::mock::MockSensorBus;
/// use conveyor_hardware::traits::SensorBus;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut bus, handle) = MockSensorBus::new(2);
///
///     handle.set_failing(true);
///     assert!(bus.read_inputs().await.is_err());
///
///     handle.set_failing(false);
///     assert_eq!(bus.read_inputs().await.unwrap(), vec![false, false]);
/// }
/// ```
#[derive(Debug)]
pub struct MockSensorBus {
    state: Arc<Mutex<BusState>>,
    name: String,
}

impl MockSensorBus {
    /// Create a mock bus with `channels` inputs, all inactive.
    pub fn new(channels: usize) -> (Self, MockSensorBusHandle) {
        let state = Arc::new(Mutex::new(BusState {
            channels: vec![false; channels],
            failing: false,
            reads: 0,
        }));

        let bus = Self {
            state: Arc::clone(&state),
            name: "Mock Sensor Bus".to_string(),
        };

        (bus, MockSensorBusHandle { state })
    }
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    // A panicked test thread must not wedge every other reader.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SensorBus for MockSensorBus {
    async fn read_inputs(&mut self) -> Result<Vec<bool>> {
        let mut state = lock(&self.state);
        state.reads += 1;

        if state.failing {
            return Err(HardwareError::communication("Mock bus not responding"));
        }

        Ok(state.channels.clone())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock Discrete Inputs").with_firmware_version("1.0.0")
    }
}

/// Handle for driving a [`MockSensorBus`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockSensorBusHandle {
    state: Arc<Mutex<BusState>>,
}

impl MockSensorBusHandle {
    /// Set the level of one channel. Out-of-range indices grow the channel
    /// vector.
    pub fn set_channel(&self, index: usize, active: bool) {
        let mut state = lock(&self.state);
        if index >= state.channels.len() {
            state.channels.resize(index + 1, false);
        }
        state.channels[index] = active;
    }

    /// Replace every channel level at once.
    pub fn set_channels(&self, levels: &[bool]) {
        lock(&self.state).channels = levels.to_vec();
    }

    /// Make every subsequent read fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    /// Number of reads served so far, including failed ones.
    pub fn read_count(&self) -> u64 {
        lock(&self.state).reads
    }
}
