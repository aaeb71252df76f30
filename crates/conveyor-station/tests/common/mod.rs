//! Common test utilities for station integration tests.
//!
//! [`Harness`] wires a full station to mock devices: outputs, a mock printer
//! connector behind a real connection manager thread, and an in-memory
//! settings store. Timing is shortened so a complete batch runs in about a
//! second.

#![allow(dead_code)]

use std::future::Future;
use std::thread::JoinHandle;
use std::time::Duration;

use conveyor_hardware::mock::{MockConnector, MockOutputs, MockOutputsHandle, MockPrinterHandle};
use conveyor_hardware::{AnyLinkConnector, AnyOutputDriver};
use conveyor_station::{
    ConnectionManager, ControlPanel, LinkConfig, PrintJobDispatcher, SequenceTiming,
    SharedStateStore, Station, StationConfig, StatusBroadcaster,
};
use conveyor_storage::{AnySettingsStore, MemorySettingsStore};
use tokio_util::sync::CancellationToken;

pub const PRINTER_ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
pub const CHARACTERISTIC: &str = "49535343-8841-43f4-a8d4-ecbe34729bb3";

/// Station config with short beeps and no debounce.
pub fn quick_config() -> StationConfig {
    StationConfig {
        beep_count_ms: 5,
        beep_complete_ms: 5,
        beep_reset_ms: 5,
        beep_debounce_ms: 5,
        ..StationConfig::default()
    }
}

/// Startup and batch pauses shortened for tests.
pub fn quick_timing() -> SequenceTiming {
    SequenceTiming::default()
        .with_startup_settle(Duration::from_millis(10))
        .with_batch_close_settle(Duration::from_millis(10))
        .with_reset_beep_gap(Duration::from_millis(5))
}

/// Link manager timing shortened for tests.
pub fn quick_link() -> LinkConfig {
    LinkConfig::default()
        .with_recheck(Duration::from_millis(50))
        .with_retry(Duration::from_millis(100))
        .with_connect_timeout(Duration::from_millis(200))
        .with_dispatch_timeout(Duration::from_millis(300))
        .with_scan_duration(Duration::from_millis(20))
}

pub struct Harness {
    pub station: Station,
    pub panel: ControlPanel,
    pub outputs: MockOutputsHandle,
    pub printer: MockPrinterHandle,
    pub settings: MemorySettingsStore,
    pub cancel: CancellationToken,
    link_thread: Option<JoinHandle<()>>,
}

impl Harness {
    /// Build a station on the current runtime. Does not run startup.
    pub fn new(config: StationConfig, settings: MemorySettingsStore, link: LinkConfig) -> Self {
        let (outputs, outputs_handle) = MockOutputs::new();
        Self::with_outputs(config, settings, link, outputs, outputs_handle)
    }

    pub fn with_outputs(
        config: StationConfig,
        settings: MemorySettingsStore,
        link: LinkConfig,
        outputs: MockOutputs,
        outputs_handle: MockOutputsHandle,
    ) -> Self {
        let cancel = CancellationToken::new();
        let any_settings = AnySettingsStore::Memory(settings.clone());
        let store = SharedStateStore::new(AnyOutputDriver::Mock(outputs), &config);
        let broadcaster = StatusBroadcaster::new(256);

        let (connector, printer) = MockConnector::new();
        let (printer_handle, link_thread) = ConnectionManager::spawn(
            AnyLinkConnector::Mock(connector),
            store.clone(),
            broadcaster.clone(),
            any_settings.clone(),
            link,
            cancel.clone(),
        )
        .unwrap();

        let printing = PrintJobDispatcher::new(
            store.clone(),
            broadcaster.clone(),
            any_settings.clone(),
            printer_handle,
        );
        let station = Station::new(
            store,
            broadcaster,
            printing,
            quick_timing(),
            tokio::runtime::Handle::current(),
        );
        let panel = ControlPanel::new(station.clone(), any_settings);

        Self {
            station,
            panel,
            outputs: outputs_handle,
            printer,
            settings,
            cancel,
            link_thread: Some(link_thread),
        }
    }

    /// Build and run startup.
    pub async fn started(config: StationConfig) -> Self {
        let harness = Self::new(config, MemorySettingsStore::new(), quick_link());
        harness.station.startup().await.unwrap();
        harness
    }

    /// Stop the link manager and wait for its thread.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.link_thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .unwrap()
                .unwrap();
        }
    }
}

/// Poll `condition` every 10 ms until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Like [`wait_until`] for an async condition.
pub async fn wait_until_async<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
