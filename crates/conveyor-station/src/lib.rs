//! Conveyor counting station core.
//!
//! Objects pass a pair of light beams on their way to a batch gate. The
//! station counts them, closes the gate when a batch is full, holds it for
//! the configured wait and reopens, while optionally printing a label per
//! object on a wireless printer.
//!
//! # Execution contexts
//!
//! - **Sensor poller** ([`SensorPoller`]): own thread, fixed tick, feeds
//!   transits into [`Station::register_transit`].
//! - **Printer link** ([`ConnectionManager`]): own thread, owns the printer
//!   session; reached only through a [`PrinterHandle`].
//! - **Station runtime**: the tokio runtime passed to [`Station::new`] runs
//!   beeps, the batch workflow and print jobs.
//! - **Presentation**: consumes [`StatusSnapshot`]s from a
//!   [`StatusSubscription`] and calls the [`ControlPanel`].
//!
//! All of them share one [`SharedStateStore`], a single mutex that is never
//! held across a wait.
//!
//! # Example
//!
//! ```no_run
//! use conveyor_hardware::{AnyLinkConnector, AnyOutputDriver, AnySensorBus};
//! use conveyor_hardware::mock::{MockConnector, MockOutputs, MockSensorBus};
//! use conveyor_station::{
//!     ConnectionManager, LinkConfig, PollerConfig, PrintJobDispatcher, SensorPoller,
//!     SequenceTiming, SharedStateStore, Station, StationConfig, StatusBroadcaster,
//! };
//! use conveyor_storage::{AnySettingsStore, MemorySettingsStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> conveyor_station::Result<()> {
//! let settings = AnySettingsStore::Memory(MemorySettingsStore::new());
//! let config = StationConfig::load(&settings).await;
//! let cancel = CancellationToken::new();
//!
//! let (outputs, _) = MockOutputs::new();
//! let store = SharedStateStore::new(AnyOutputDriver::Mock(outputs), &config);
//! let broadcaster = StatusBroadcaster::new(64);
//!
//! let (connector, _) = MockConnector::new();
//! let (printer, _link_thread) = ConnectionManager::spawn(
//!     AnyLinkConnector::Mock(connector),
//!     store.clone(),
//!     broadcaster.clone(),
//!     settings.clone(),
//!     LinkConfig::default(),
//!     cancel.clone(),
//! )?;
//!
//! let printing = PrintJobDispatcher::new(store.clone(), broadcaster.clone(), settings, printer);
//! let station = Station::new(
//!     store,
//!     broadcaster,
//!     printing,
//!     SequenceTiming::default(),
//!     tokio::runtime::Handle::current(),
//! );
//! station.startup().await?;
//!
//! let (bus, _) = MockSensorBus::new(2);
//! let _poller_thread = SensorPoller::new(AnySensorBus::Mock(bus), station.clone(), PollerConfig::default())
//!     .spawn(cancel.clone())?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod commands;
pub mod config;
pub mod counting;
pub mod debounce;
pub mod error;
pub mod gate;
pub mod link;
pub mod poller;
pub mod print;
pub mod station;
pub mod store;

pub use broadcast::{StatusBroadcaster, StatusSubscription};
pub use commands::ControlPanel;
pub use config::{LinkConfig, PollerConfig, SequenceTiming, StationConfig};
pub use counting::{RejectReason, TransitOutcome};
pub use debounce::{DebounceFilter, DebounceVerdict};
pub use error::{DispatchError, PrintError, Result, StationError};
pub use gate::{BeepPattern, GateChange};
pub use link::{ConnectionManager, PrinterHandle};
pub use poller::{SensorPoller, TransitDetector, TransitPhase};
pub use print::PrintJobDispatcher;
pub use station::Station;
pub use store::{LifecycleTransition, SharedStateStore};

// Re-exported so callers can name snapshot types without a direct dependency.
pub use conveyor_core::{StatusSnapshot, SystemStatus};
