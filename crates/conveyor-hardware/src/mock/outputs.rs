//! Mock actuator outputs for testing and simulation.
//!
//! Records every level change per channel so tests can assert on physical
//! transitions (for example, that commanding an already-open gate does not
//! toggle the relay again).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{HardwareError, Result, traits::OutputDriver, types::DeviceInfo, types::OutputChannel};

#[derive(Debug, Default)]
struct OutputsState {
    levels: HashMap<OutputChannel, bool>,
    transitions: HashMap<OutputChannel, usize>,
    writes: HashMap<OutputChannel, usize>,
    initialized: bool,
    fail_initialize: bool,
    fail_writes: bool,
}

/// Mock output driver.
///
/// # Examples
///
/// ```
/// use conveyor_hardware::mock::MockOutputs;
/// use conveyor_hardware::traits::OutputDriver;
/// use conveyor_hardware::types::OutputChannel;
///
/// let (mut outputs, handle) = MockOutputs::new();
/// outputs.initialize().unwrap();
/// outputs.set_output(OutputChannel::GreenLamp, true).unwrap();
///
/// assert!(handle.level(OutputChannel::GreenLamp));
/// assert_eq!(handle.transitions(OutputChannel::GreenLamp), 1);
/// ```
#[derive(Debug)]
pub struct MockOutputs {
    state: Arc<Mutex<OutputsState>>,
}

impl MockOutputs {
    /// Create mock outputs, all released.
    pub fn new() -> (Self, MockOutputsHandle) {
        let state = Arc::new(Mutex::new(OutputsState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockOutputsHandle { state },
        )
    }

    /// Create mock outputs whose initialization fails, as if the relay board
    /// were absent.
    pub fn unavailable() -> (Self, MockOutputsHandle) {
        let (outputs, handle) = Self::new();
        lock(&handle.state).fail_initialize = true;
        (outputs, handle)
    }
}

fn lock(state: &Mutex<OutputsState>) -> MutexGuard<'_, OutputsState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OutputDriver for MockOutputs {
    fn initialize(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_initialize {
            return Err(HardwareError::initialization_failed(
                "Mock relay board not present",
            ));
        }
        for channel in OutputChannel::ALL {
            state.levels.insert(channel, false);
        }
        state.initialized = true;
        Ok(())
    }

    fn set_output(&mut self, channel: OutputChannel, on: bool) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes || !state.initialized {
            return Err(HardwareError::communication(format!(
                "Cannot drive {channel}"
            )));
        }

        *state.writes.entry(channel).or_default() += 1;
        let previous = state.levels.insert(channel, on).unwrap_or(false);
        if previous != on {
            *state.transitions.entry(channel).or_default() += 1;
        }
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("Mock Outputs", "Mock Relay Board").with_firmware_version("1.0.0")
    }
}

/// Handle for inspecting and faulting a [`MockOutputs`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockOutputsHandle {
    state: Arc<Mutex<OutputsState>>,
}

impl MockOutputsHandle {
    /// Current level of a channel (`false` if never driven).
    pub fn level(&self, channel: OutputChannel) -> bool {
        lock(&self.state).levels.get(&channel).copied().unwrap_or(false)
    }

    /// Number of actual level changes on a channel.
    pub fn transitions(&self, channel: OutputChannel) -> usize {
        lock(&self.state)
            .transitions
            .get(&channel)
            .copied()
            .unwrap_or(0)
    }

    /// Number of writes to a channel, including ones that kept the level.
    pub fn writes(&self, channel: OutputChannel) -> usize {
        lock(&self.state).writes.get(&channel).copied().unwrap_or(0)
    }

    /// Whether [`OutputDriver::initialize`] succeeded.
    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }
}
