//! Mock wireless printer for testing and development.
//!
//! [`MockConnector`] hands out [`MockPrinterLink`] sessions. The paired
//! [`MockPrinterHandle`] controls how connection attempts behave, records
//! every write, and can drop the live session to simulate the printer going
//! out of range.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    HardwareError, Result,
    traits::{LinkConnector, PrinterLink},
    types::DiscoveredDevice,
};

/// How the mock printer answers connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehavior {
    /// Accept the connection immediately.
    #[default]
    Accept,

    /// Refuse the connection with an error.
    Refuse,

    /// Never answer; the caller's timeout decides.
    Hang,
}

/// A write observed by the mock printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    /// Address of the session that carried the write.
    pub address: String,

    /// Target characteristic.
    pub characteristic: Uuid,

    /// Raw bytes written.
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct PrinterState {
    behavior: ConnectBehavior,
    connect_attempts: usize,
    write_delay: Option<Duration>,
    fail_writes: bool,
    writes: Vec<RecordedWrite>,
    scan_results: Vec<DiscoveredDevice>,
    live_link: Option<watch::Sender<bool>>,
}

fn lock(state: &Mutex<PrinterState>) -> MutexGuard<'_, PrinterState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock link connector.
///
/// # Examples
///
/// ```
/// use conveyor_hardware::mock::MockConnector;
/// use conveyor_hardware::traits::{LinkConnector, PrinterLink};
/// use uuid::Uuid;
///
/// #[tokio::main]
/// async fn main() -> conveyor_hardware::Result<()> {
///     let (mut connector, handle) = MockConnector::new();
///
///     let link = connector.connect("AA:BB:CC:DD:EE:FF").await?;
///     link.write(Uuid::nil(), b"LOT42").await?;
///
///     assert_eq!(handle.writes()[0].data, b"LOT42");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockConnector {
    state: Arc<Mutex<PrinterState>>,
}

impl MockConnector {
    /// Create a connector that accepts every connection.
    pub fn new() -> (Self, MockPrinterHandle) {
        let state = Arc::new(Mutex::new(PrinterState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockPrinterHandle { state },
        )
    }
}

impl LinkConnector for MockConnector {
    type Link = MockPrinterLink;

    async fn connect(&mut self, address: &str) -> Result<Self::Link> {
        let behavior = {
            let mut state = lock(&self.state);
            state.connect_attempts += 1;
            state.behavior
        };

        match behavior {
            ConnectBehavior::Accept => {}
            ConnectBehavior::Refuse => {
                return Err(HardwareError::connect_failed(address, "Peer refused"));
            }
            ConnectBehavior::Hang => std::future::pending::<()>().await,
        }

        let (tx, rx) = watch::channel(false);
        let mut state = lock(&self.state);
        if let Some(previous) = state.live_link.replace(tx) {
            previous.send_replace(true);
        }

        Ok(MockPrinterLink {
            address: address.to_string(),
            state: Arc::clone(&self.state),
            dropped: rx,
        })
    }

    async fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
        tokio::time::sleep(duration).await;
        Ok(lock(&self.state).scan_results.clone())
    }
}

/// A session produced by [`MockConnector`].
#[derive(Debug)]
pub struct MockPrinterLink {
    address: String,
    state: Arc<Mutex<PrinterState>>,
    dropped: watch::Receiver<bool>,
}

impl MockPrinterLink {
    fn is_dropped(&self) -> bool {
        *self.dropped.borrow()
    }
}

impl PrinterLink for MockPrinterLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let delay = lock(&self.state).write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.is_dropped() {
            return Err(HardwareError::disconnected(self.address.clone()));
        }

        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(HardwareError::write_failed("Characteristic rejected write"));
        }
        state.writes.push(RecordedWrite {
            address: self.address.clone(),
            characteristic,
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn disconnected(&self) {
        let mut rx = self.dropped.clone();
        // A closed channel means the handle replaced this session.
        let _ = rx.wait_for(|dropped| *dropped).await;
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(live) = state.live_link.take() {
            live.send_replace(true);
        }
        Ok(())
    }
}

/// Handle for steering a [`MockConnector`] and its sessions. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockPrinterHandle {
    state: Arc<Mutex<PrinterState>>,
}

impl MockPrinterHandle {
    /// Change how subsequent connection attempts behave.
    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        lock(&self.state).behavior = behavior;
    }

    /// Number of connection attempts seen so far.
    pub fn connect_attempts(&self) -> usize {
        lock(&self.state).connect_attempts
    }

    /// Delay every write by `delay` before it completes.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        lock(&self.state).write_delay = delay;
    }

    /// Make writes fail while the link stays up.
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Devices returned by the next scans.
    pub fn set_scan_results(&self, devices: Vec<DiscoveredDevice>) {
        lock(&self.state).scan_results = devices;
    }

    /// Every write accepted so far, oldest first.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        lock(&self.state).writes.clone()
    }

    /// Whether a session is currently up.
    pub fn is_link_live(&self) -> bool {
        lock(&self.state).live_link.is_some()
    }

    /// Drop the live session, as if the printer went out of range.
    ///
    /// Returns `false` if no session was up.
    pub fn drop_link(&self) -> bool {
        match lock(&self.state).live_link.take() {
            Some(live) => {
                live.send_replace(true);
                true
            }
            None => false,
        }
    }
}
