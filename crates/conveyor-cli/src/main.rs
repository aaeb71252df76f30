//! Conveyor station controller.
//!
//! Wires the station to the SQLite settings store and to simulated devices:
//! a mock relay board, a mock input bus driven by a transit simulator and a
//! mock printer connector. Status snapshots are logged as JSON. Ctrl-C stops
//! the sensor poller and the printer link, then parks the actuators.

mod simulator;

use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use conveyor_core::constants::{SEEDED_DEFAULTS, SNAPSHOT_QUEUE_CAPACITY};
use conveyor_hardware::mock::{MockConnector, MockOutputs, MockSensorBus};
use conveyor_hardware::{AnyLinkConnector, AnyOutputDriver, AnySensorBus, DiscoveredDevice};
use conveyor_station::{
    ConnectionManager, LinkConfig, PollerConfig, PrintJobDispatcher, SensorPoller, SequenceTiming,
    SharedStateStore, Station, StationConfig, StatusBroadcaster, StatusSubscription,
};
use conveyor_storage::{AnySettingsStore, Database, DatabaseConfig, SettingsStore, SqliteSettingsStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::simulator::TransitSimulator;

/// Conveyor counting station
#[derive(Parser, Debug)]
#[command(name = "conveyor")]
#[command(about = "Batch counting conveyor station on simulated hardware", long_about = None)]
struct Args {
    /// SQLite settings database, created if missing
    #[arg(long, default_value = "conveyor.db")]
    database: String,

    /// Log filter directives, e.g. `debug` or `conveyor_station=trace`.
    /// Falls back to `RUST_LOG`, then `info`.
    #[arg(long)]
    log_filter: Option<String>,

    /// Milliseconds between simulated objects; 0 disables the simulator
    #[arg(long, default_value = "3000")]
    simulate_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_filter.as_deref())?;

    let db = Database::new(DatabaseConfig::new(&args.database))
        .await
        .with_context(|| format!("opening settings database {}", args.database))?;
    let sqlite = SqliteSettingsStore::new(db.pool().clone());
    sqlite
        .ensure_defaults(SEEDED_DEFAULTS)
        .await
        .context("seeding default settings")?;
    let settings = AnySettingsStore::Sqlite(sqlite);

    let config = StationConfig::load(&settings).await;
    info!(
        database = %args.database,
        batch_target = config.batch_target,
        gate_wait_seconds = config.gate_wait_seconds,
        printer_enabled = config.printer_enabled,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    let (outputs, _outputs_handle) = MockOutputs::new();
    let store = SharedStateStore::new(AnyOutputDriver::Mock(outputs), &config);
    let broadcaster = StatusBroadcaster::new(SNAPSHOT_QUEUE_CAPACITY);
    let snapshot_log = tokio::spawn(log_snapshots(broadcaster.subscribe(), cancel.clone()));

    let (connector, printer) = MockConnector::new();
    printer.set_scan_results(vec![DiscoveredDevice::new(
        "Simulated Label Printer",
        "00:11:22:33:44:55",
    )]);
    let (printer_handle, link_thread) = ConnectionManager::spawn(
        AnyLinkConnector::Mock(connector),
        store.clone(),
        broadcaster.clone(),
        settings.clone(),
        LinkConfig::default(),
        cancel.clone(),
    )?;

    let printing = PrintJobDispatcher::new(
        store.clone(),
        broadcaster.clone(),
        settings.clone(),
        printer_handle,
    );
    let station = Station::new(
        store,
        broadcaster,
        printing,
        SequenceTiming::default(),
        tokio::runtime::Handle::current(),
    );

    if let Err(e) = station.startup().await {
        error!(error = %e, "Station startup failed");
        cancel.cancel();
        join_context("printer link", link_thread).await;
        return Err(e.into());
    }

    let poller_config = PollerConfig::default();
    let (bus, bus_handle) = MockSensorBus::new(2);
    let poller_thread = SensorPoller::new(AnySensorBus::Mock(bus), station.clone(), poller_config.clone())
        .spawn(cancel.clone())?;

    let simulator = (args.simulate_interval_ms > 0).then(|| {
        let simulator = TransitSimulator::new(
            bus_handle,
            Duration::from_millis(args.simulate_interval_ms),
            poller_config.interval,
        );
        tokio::spawn(simulator.run(cancel.clone()))
    });

    info!("Station running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("Shutting down");

    cancel.cancel();
    join_context("sensor poller", poller_thread).await;
    join_context("printer link", link_thread).await;
    if let Some(simulator) = simulator
        && let Err(e) = simulator.await
    {
        warn!(error = %e, "Simulator task failed");
    }

    station.safe_shutdown();
    if let Err(e) = snapshot_log.await {
        warn!(error = %e, "Snapshot logger failed");
    }
    db.close().await;
    info!("Stopped");
    Ok(())
}

fn init_logging(directives: Option<&str>) -> anyhow::Result<()> {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter {directives:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow!(e))
}

/// Log every published snapshot as one JSON line until cancelled.
async fn log_snapshots(mut subscription: StatusSubscription, cancel: CancellationToken) {
    loop {
        let snapshot = tokio::select! {
            () = cancel.cancelled() => break,
            next = subscription.next() => match next {
                Some(snapshot) => snapshot,
                None => break,
            },
        };
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(target: "conveyor::status", "{json}"),
            Err(e) => warn!(error = %e, "Snapshot not serializable"),
        }
    }
    if subscription.skipped() > 0 {
        info!(skipped = subscription.skipped(), "Snapshots dropped by slow logger");
    }
}

/// Wait for a dedicated context thread without blocking the runtime.
async fn join_context(name: &'static str, thread: JoinHandle<()>) {
    match tokio::task::spawn_blocking(move || thread.join()).await {
        Ok(Ok(())) => info!(context = name, "Context stopped"),
        Ok(Err(_)) => error!(context = name, "Context panicked"),
        Err(e) => error!(context = name, error = %e, "Failed to join context"),
    }
}
