//! Connection manager, dispatch and print job integration tests.

mod common;

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use common::{CHARACTERISTIC, Harness, PRINTER_ADDRESS, quick_config, quick_link, wait_until};
use conveyor_core::ConnectionStatus;
use conveyor_core::constants::{
    KEY_PRINTER_ADDRESS, KEY_PRINTER_DELAY_MS, KEY_PRINTER_VAR1, KEY_PRINTER_VAR1_VALUE,
    KEY_PRINTER_VAR2, KEY_PRINTER_VAR2_VALUE, KEY_WRITE_CHARACTERISTIC,
};
use conveyor_hardware::DiscoveredDevice;
use conveyor_hardware::mock::ConnectBehavior;
use conveyor_station::{DispatchError, PrintError};
use conveyor_storage::{MemorySettingsStore, SettingsStore};
use uuid::Uuid;

const CONVERGE: Duration = Duration::from_secs(3);

fn configured_settings() -> MemorySettingsStore {
    MemorySettingsStore::with_values([
        (KEY_PRINTER_ADDRESS, PRINTER_ADDRESS),
        (KEY_WRITE_CHARACTERISTIC, CHARACTERISTIC),
    ])
}

async fn connected_harness(settings: MemorySettingsStore) -> Harness {
    let harness = Harness::new(quick_config(), settings, quick_link());
    let store = harness.station.store().clone();
    assert!(wait_until(CONVERGE, || store.connection_status() == ConnectionStatus::Connected).await);
    harness
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_address_stays_disconnected() {
    let harness = Harness::new(quick_config(), MemorySettingsStore::new(), quick_link());

    // Several recheck intervals.
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        harness.station.store().connection_status(),
        ConnectionStatus::Disconnected
    );
    assert_eq!(harness.printer.connect_attempts(), 0);
    assert!(!harness.station.store().has_link_session());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_configured_address_connects() {
    let harness = connected_harness(configured_settings()).await;

    assert!(harness.station.store().has_link_session());
    assert!(harness.printer.is_link_live());
    assert_eq!(harness.printer.connect_attempts(), 1);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_link_drop_reconnects_after_retry() {
    let harness = connected_harness(configured_settings()).await;
    let store = harness.station.store().clone();
    let mut subscription = harness.station.subscribe();

    assert!(harness.printer.drop_link());
    assert!(wait_until(CONVERGE, || store.connection_status() == ConnectionStatus::Disconnected).await);
    assert!(wait_until(CONVERGE, || store.connection_status() == ConnectionStatus::Connected).await);

    assert_eq!(harness.printer.connect_attempts(), 2);
    let seen: Vec<ConnectionStatus> = std::iter::from_fn(|| subscription.try_next())
        .map(|snapshot| snapshot.connection_status)
        .collect();
    assert_eq!(
        seen,
        vec![
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
        ]
    );

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refused_connection_keeps_retrying() {
    let harness = Harness::new(quick_config(), configured_settings(), quick_link());
    harness.printer.set_connect_behavior(ConnectBehavior::Refuse);

    let printer = harness.printer.clone();
    assert!(wait_until(CONVERGE, || printer.connect_attempts() >= 3).await);
    assert_ne!(
        harness.station.store().connection_status(),
        ConnectionStatus::Connected
    );

    harness.printer.set_connect_behavior(ConnectBehavior::Accept);
    let store = harness.station.store().clone();
    assert!(wait_until(CONVERGE, || store.connection_status() == ConnectionStatus::Connected).await);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hanging_connect_is_bounded() {
    let harness = Harness::new(quick_config(), configured_settings(), quick_link());
    harness.printer.set_connect_behavior(ConnectBehavior::Hang);

    let printer = harness.printer.clone();
    assert!(wait_until(CONVERGE, || printer.connect_attempts() >= 2).await);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_removed_address_ends_session() {
    let settings = configured_settings();
    let harness = connected_harness(settings.clone()).await;

    let outcome = harness.panel.remove_printer().await;
    assert!(outcome.success);

    let store = harness.station.store().clone();
    assert!(wait_until(CONVERGE, || store.connection_status() == ConnectionStatus::Disconnected).await);
    assert!(!harness.printer.is_link_live());
    assert!(!store.has_link_session());
    // The characteristic survives; only the address is forgotten.
    assert!(settings.get(KEY_WRITE_CHARACTERISTIC).await.unwrap().is_some());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_saved_printer_connects_without_waiting_for_recheck() {
    let link = quick_link().with_recheck(Duration::from_secs(60));
    let harness = Harness::new(quick_config(), MemorySettingsStore::new(), link);

    let outcome = harness.panel.save_printer(PRINTER_ADDRESS, CHARACTERISTIC).await;
    assert!(outcome.success, "{}", outcome.message);

    let store = harness.station.store().clone();
    assert!(wait_until(CONVERGE, || store.connection_status() == ConnectionStatus::Connected).await);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_save_printer_rejects_bad_characteristic() {
    let settings = MemorySettingsStore::new();
    let harness = Harness::new(quick_config(), settings.clone(), quick_link());

    let outcome = harness.panel.save_printer(PRINTER_ADDRESS, "not-a-uuid").await;
    assert!(!outcome.success);
    assert!(settings.get(KEY_PRINTER_ADDRESS).await.unwrap().is_none());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_while_disconnected_fails_locally() {
    let harness = Harness::new(quick_config(), MemorySettingsStore::new(), quick_link());

    let err = harness
        .station
        .printing()
        .printer()
        .write(Uuid::nil(), Bytes::from_static(b"LABEL"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::NotConnected);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_write_times_out() {
    let harness = connected_harness(configured_settings()).await;
    harness
        .printer
        .set_write_delay(Some(Duration::from_secs(2)));

    let err = harness
        .station
        .printing()
        .printer()
        .write(Uuid::nil(), Bytes::from_static(b"LABEL"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Timeout(Duration::from_millis(300)));

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hung_write_drops_session_and_reconnects() {
    let harness = connected_harness(configured_settings()).await;
    let printer = harness.station.printing().printer().clone();
    harness
        .printer
        .set_write_delay(Some(Duration::from_secs(2)));

    let err = printer
        .write(Uuid::nil(), Bytes::from_static(b"LABEL"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Timeout(Duration::from_millis(300)));

    // Well before the hung write would have returned.
    let mock = harness.printer.clone();
    assert!(wait_until(Duration::from_secs(1), || mock.connect_attempts() >= 2).await);
    let store = harness.station.store().clone();
    assert!(wait_until(CONVERGE, || store.connection_status() == ConnectionStatus::Connected).await);

    harness.printer.set_write_delay(None);
    printer
        .write(Uuid::nil(), Bytes::from_static(b"AGAIN"))
        .await
        .unwrap();
    assert_eq!(harness.printer.writes().last().unwrap().data, b"AGAIN");

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_is_prompt_during_hung_write() {
    let harness = connected_harness(configured_settings()).await;
    let printer = harness.station.printing().printer().clone();
    harness
        .printer
        .set_write_delay(Some(Duration::from_secs(5)));

    let pending = tokio::spawn(async move {
        printer.write(Uuid::nil(), Bytes::from_static(b"LABEL")).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(1), harness.stop())
        .await
        .expect("link manager stuck in a hung write");
    assert!(pending.await.unwrap().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_after_shutdown_is_unavailable() {
    let harness = Harness::new(quick_config(), MemorySettingsStore::new(), quick_link());
    let printer = harness.station.printing().printer().clone();

    printer.shutdown().await;
    assert!(wait_until(CONVERGE, || !printer.is_running()).await);

    let err = printer.write(Uuid::nil(), Bytes::new()).await.unwrap_err();
    assert_eq!(err, DispatchError::ManagerUnavailable);

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_counted_object_prints_label() {
    let settings = configured_settings();
    for (key, value) in [
        (KEY_PRINTER_VAR1, "LOT:"),
        (KEY_PRINTER_VAR1_VALUE, "42"),
        (KEY_PRINTER_VAR2, "/L:"),
        (KEY_PRINTER_VAR2_VALUE, "7"),
        (KEY_PRINTER_DELAY_MS, "20"),
    ] {
        settings.set(key, value).await.unwrap();
    }
    let harness = connected_harness(settings).await;
    harness.station.startup().await.unwrap();
    assert!(harness.panel.set_printer_enabled(true).await.success);

    assert!(harness.station.register_transit(Utc::now()).is_counted());

    let printer = harness.printer.clone();
    assert!(wait_until(CONVERGE, || printer.writes().len() == 1).await);
    let write = &harness.printer.writes()[0];
    assert_eq!(write.data, b"LOT:42/L:7");
    assert_eq!(write.address, PRINTER_ADDRESS);
    assert_eq!(write.characteristic, Uuid::parse_str(CHARACTERISTIC).unwrap());
    assert_eq!(harness.station.snapshot().last_printed_payload, "LOT:42/L:7");

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_print_without_characteristic_is_abandoned() {
    let settings = MemorySettingsStore::with_values([
        (KEY_PRINTER_ADDRESS, PRINTER_ADDRESS),
        (KEY_PRINTER_VAR1, "LOT:"),
        (KEY_PRINTER_DELAY_MS, "300"),
    ]);
    let harness = connected_harness(settings).await;

    let started = std::time::Instant::now();
    let err = harness.station.printing().print_count().await.unwrap_err();
    assert_eq!(
        err,
        PrintError::ConfigurationMissing(KEY_WRITE_CHARACTERISTIC.to_string())
    );
    // Abandoned before the delay, with nothing recorded.
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(
        harness.station.snapshot().last_printed_payload,
        conveyor_core::constants::NO_PAYLOAD
    );
    assert!(harness.printer.writes().is_empty());

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_print_while_disconnected_is_abandoned() {
    let settings = MemorySettingsStore::with_values([
        (KEY_WRITE_CHARACTERISTIC, CHARACTERISTIC),
        (KEY_PRINTER_VAR1, "LOT:"),
    ]);
    let harness = Harness::new(quick_config(), settings, quick_link());

    let err = harness.station.printing().print_count().await.unwrap_err();
    assert_eq!(err, PrintError::NotConnected);
    // The payload is recorded before the connection check.
    assert_eq!(harness.station.snapshot().last_printed_payload, "LOT:");

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_test_print_and_scan_commands() {
    let harness = connected_harness(configured_settings()).await;
    harness.printer.set_scan_results(vec![
        DiscoveredDevice::new("Label Printer", PRINTER_ADDRESS),
        DiscoveredDevice::new("Spare", "11:22:33:44:55:66"),
    ]);

    let outcome = harness.panel.test_print("HELLO").await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(harness.printer.writes()[0].data, b"HELLO");

    let (outcome, devices) = harness.panel.scan_printers().await;
    assert!(outcome.success);
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].address, "11:22:33:44:55:66");

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_writes_share_one_session() {
    let harness = connected_harness(configured_settings()).await;
    let printer = harness.station.printing().printer().clone();

    let writes = (0..5u8).map(|n| {
        let printer = printer.clone();
        async move { printer.write(Uuid::nil(), Bytes::from(vec![b'0' + n])).await }
    });
    let results = futures::future::join_all(writes).await;

    assert!(results.iter().all(Result::is_ok));
    let mut written: Vec<u8> = harness.printer.writes().iter().map(|w| w.data[0]).collect();
    written.sort_unstable();
    assert_eq!(written, b"01234");
    assert_eq!(harness.printer.connect_attempts(), 1);

    harness.stop().await;
}
