//! Wireless printer connection manager.
//!
//! The manager is an actor. It runs on its own thread with a single-threaded
//! runtime, owns the [`LinkConnector`] and the live [`PrinterLink`], and is
//! the only code that ever calls into them. Everything else talks to it
//! through a [`PrinterHandle`]: each request is a message with a reply
//! channel, bounded by the dispatch timeout.
//!
//! # Supervision
//!
//! ```text
//!            no address               address configured
//! ┌──────────────┐ ──────────▶ idle ┌────────────┐  connect ok  ┌───────────┐
//! │ Disconnected │ ◀──────────────── │ Connecting │ ───────────▶ │ Connected │
//! └──────────────┘  refused/timeout  └────────────┘              └───────────┘
//!        ▲                                                             │
//!        └──────────── link dropped, address removed or changed ──────┘
//! ```
//!
//! The station lock is taken only to publish a new [`ConnectionStatus`].
//! Connection attempts, the session itself and every link write run with the
//! lock released.

use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use conveyor_core::ConnectionStatus;
use conveyor_core::constants::KEY_PRINTER_ADDRESS;
use conveyor_hardware::{
    AnyLinkConnector, AnyPrinterLink, DiscoveredDevice, LinkConnector, PrinterLink,
};
use conveyor_storage::{AnySettingsStore, SettingsStore};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::StatusBroadcaster;
use crate::config::LinkConfig;
use crate::error::{DispatchError, Result, StationError};
use crate::store::SharedStateStore;

/// Pending requests the manager will queue before senders wait.
const COMMAND_QUEUE_CAPACITY: usize = 16;

type Reply<T> = oneshot::Sender<std::result::Result<T, DispatchError>>;

#[derive(Debug)]
enum LinkCommand {
    Write {
        characteristic: Uuid,
        payload: Bytes,
        reply: Reply<()>,
    },
    Scan {
        reply: Reply<Vec<DiscoveredDevice>>,
    },
    /// Re-read the configured address now instead of at the next recheck.
    Reconfigure,
    Shutdown,
}

/// Client side of the connection manager. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PrinterHandle {
    commands: mpsc::Sender<LinkCommand>,
    dispatch_timeout: Duration,
    scan_timeout: Duration,
}

impl PrinterHandle {
    /// Write `payload` to `characteristic` on the live session.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotConnected`] when no session is live
    /// - [`DispatchError::Timeout`] when the round trip exceeds the dispatch timeout
    /// - [`DispatchError::ManagerUnavailable`] when the manager has stopped
    /// - [`DispatchError::Link`] when the printer rejected the write
    pub async fn write(
        &self,
        characteristic: Uuid,
        payload: Bytes,
    ) -> std::result::Result<(), DispatchError> {
        self.request(self.dispatch_timeout, |reply| LinkCommand::Write {
            characteristic,
            payload,
            reply,
        })
        .await
    }

    /// Discover nearby printers on the manager's context.
    pub async fn scan(&self) -> std::result::Result<Vec<DiscoveredDevice>, DispatchError> {
        self.request(self.scan_timeout, |reply| LinkCommand::Scan { reply })
            .await
    }

    /// Ask the manager to re-read the configured address right away.
    ///
    /// Never waits: if the queue is full a recheck is already due.
    pub fn reconfigure(&self) {
        if self.commands.try_send(LinkCommand::Reconfigure).is_err() {
            debug!("Printer reconfigure nudge dropped");
        }
    }

    /// Stop the manager. The live session, if any, is closed.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(LinkCommand::Shutdown).await;
    }

    /// Whether the manager is still accepting requests.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        limit: Duration,
        command: impl FnOnce(Reply<T>) -> LinkCommand,
    ) -> std::result::Result<T, DispatchError> {
        let (reply, response) = oneshot::channel();
        let exchange = async {
            self.commands
                .send(command(reply))
                .await
                .map_err(|_| DispatchError::ManagerUnavailable)?;
            response
                .await
                .map_err(|_| DispatchError::ManagerUnavailable)?
        };

        match tokio::time::timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?limit, "Printer dispatch timed out");
                Err(DispatchError::Timeout(limit))
            }
        }
    }
}

/// How a phase of the supervise loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Go round the supervise loop again.
    Continue,
    /// Pause for the retry interval, then go round again.
    Retry,
    /// Cancelled or shut down.
    Stop,
}

enum Attempt {
    Connected(AnyPrinterLink),
    Failed,
    Stopped,
}

/// Supervises the printer link. See the module docs.
pub struct ConnectionManager {
    connector: AnyLinkConnector,
    store: SharedStateStore,
    broadcaster: StatusBroadcaster,
    settings: AnySettingsStore,
    config: LinkConfig,
    commands: mpsc::Receiver<LinkCommand>,
    cancel: CancellationToken,
    next_session: u64,
}

impl ConnectionManager {
    /// Start the manager on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Spawn`] if the runtime or the thread cannot be
    /// created.
    pub fn spawn(
        connector: AnyLinkConnector,
        store: SharedStateStore,
        broadcaster: StatusBroadcaster,
        settings: AnySettingsStore,
        config: LinkConfig,
        cancel: CancellationToken,
    ) -> Result<(PrinterHandle, JoinHandle<()>)> {
        let (sender, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let handle = PrinterHandle {
            commands: sender,
            dispatch_timeout: config.dispatch_timeout,
            scan_timeout: config.scan_duration + config.dispatch_timeout,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StationError::spawn("printer link runtime", e))?;

        let manager = Self {
            connector,
            store,
            broadcaster,
            settings,
            config,
            commands,
            cancel,
            next_session: 0,
        };

        let thread = std::thread::Builder::new()
            .name("printer-link".to_string())
            .spawn(move || runtime.block_on(manager.run()))
            .map_err(|e| StationError::spawn("printer link thread", e))?;

        Ok((handle, thread))
    }

    async fn run(mut self) {
        info!("Printer link manager started");

        loop {
            let flow = match self.configured_address().await {
                None => {
                    self.set_status(ConnectionStatus::Disconnected, None);
                    self.idle(self.config.recheck).await
                }
                Some(address) => match self.connect(&address).await {
                    Attempt::Connected(link) => self.session(link).await,
                    Attempt::Failed => Flow::Retry,
                    Attempt::Stopped => Flow::Stop,
                },
            };

            let flow = match flow {
                Flow::Retry => {
                    self.set_status(ConnectionStatus::Disconnected, None);
                    self.idle(self.config.retry).await
                }
                other => other,
            };
            if flow == Flow::Stop {
                break;
            }
        }

        self.set_status(ConnectionStatus::Disconnected, None);
        info!("Printer link manager stopped");
    }

    /// One bounded connection attempt.
    async fn connect(&mut self, address: &str) -> Attempt {
        self.set_status(ConnectionStatus::Connecting, None);
        info!(address, "Connecting to printer");

        let limit = self.config.connect_timeout;
        let attempt = tokio::time::timeout(limit, self.connector.connect(address));
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Attempt::Stopped,
                result = &mut attempt => {
                    return match result {
                        Ok(Ok(link)) => Attempt::Connected(link),
                        Ok(Err(e)) => {
                            warn!(address, error = %e, "Printer connection failed");
                            Attempt::Failed
                        }
                        Err(_) => {
                            warn!(address, timeout = ?limit, "Printer connection timed out");
                            Attempt::Failed
                        }
                    };
                }
                command = self.commands.recv() => match command {
                    Some(LinkCommand::Write { reply, .. }) => {
                        let _ = reply.send(Err(DispatchError::NotConnected));
                    }
                    Some(LinkCommand::Scan { reply }) => {
                        let _ = reply.send(Err(DispatchError::Link(
                            "connection attempt in progress".to_string(),
                        )));
                    }
                    Some(LinkCommand::Reconfigure) => {}
                    Some(LinkCommand::Shutdown) | None => return Attempt::Stopped,
                },
            }
        }
    }

    /// Hold a live session until it drops, the address changes, or the
    /// manager is stopped.
    async fn session(&mut self, link: AnyPrinterLink) -> Flow {
        self.next_session += 1;
        let session = self.next_session;
        let address = link.address().to_string();
        self.set_status(ConnectionStatus::Connected, Some(session));
        info!(address, session, "Printer connected");

        let recheck_every = self.config.recheck;
        let mut recheck = tokio::time::interval_at(Instant::now() + recheck_every, recheck_every);
        recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let flow = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break Flow::Stop,
                () = link.disconnected() => {
                    warn!(address, session, "Printer link dropped");
                    break Flow::Retry;
                }
                command = self.commands.recv() => match command {
                    Some(LinkCommand::Write { characteristic, payload, reply }) => {
                        let limit = self.config.dispatch_timeout;
                        let Ok(result) =
                            tokio::time::timeout(limit, link.write(characteristic, &payload)).await
                        else {
                            warn!(address, session, timeout = ?limit, "Payload write hung, dropping link");
                            let _ = reply.send(Err(DispatchError::Timeout(limit)));
                            break Flow::Retry;
                        };
                        let result = result.map_err(|e| DispatchError::Link(e.to_string()));
                        match &result {
                            Ok(()) => debug!(address, bytes = payload.len(), "Payload written"),
                            Err(e) => warn!(address, error = %e, "Payload write failed"),
                        }
                        let _ = reply.send(result);
                    }
                    Some(LinkCommand::Scan { reply }) => {
                        let _ = reply.send(self.scan().await);
                    }
                    Some(LinkCommand::Reconfigure) => {
                        if !self.still_configured(&address).await {
                            break Flow::Continue;
                        }
                    }
                    Some(LinkCommand::Shutdown) | None => break Flow::Stop,
                },
                _ = recheck.tick() => {
                    if !self.still_configured(&address).await {
                        break Flow::Continue;
                    }
                }
            }
        };

        if let Err(e) = link.disconnect().await {
            warn!(address, error = %e, "Printer disconnect failed");
        }
        self.set_status(ConnectionStatus::Disconnected, None);
        info!(address, session, "Printer session ended");
        flow
    }

    /// Wait out `pause` while answering requests.
    async fn idle(&mut self, pause: Duration) -> Flow {
        let deadline = tokio::time::sleep(pause);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Flow::Stop,
                () = &mut deadline => return Flow::Continue,
                command = self.commands.recv() => match command {
                    Some(LinkCommand::Write { reply, .. }) => {
                        let _ = reply.send(Err(DispatchError::NotConnected));
                    }
                    Some(LinkCommand::Scan { reply }) => {
                        let _ = reply.send(self.scan().await);
                    }
                    Some(LinkCommand::Reconfigure) => return Flow::Continue,
                    Some(LinkCommand::Shutdown) | None => return Flow::Stop,
                },
            }
        }
    }

    async fn scan(&mut self) -> std::result::Result<Vec<DiscoveredDevice>, DispatchError> {
        let duration = self.config.scan_duration;
        debug!(duration = ?duration, "Scanning for printers");
        match self.connector.scan(duration).await {
            Ok(devices) => {
                info!(found = devices.len(), "Printer scan complete");
                Ok(devices)
            }
            Err(e) => {
                warn!(error = %e, "Printer scan failed");
                Err(DispatchError::Link(e.to_string()))
            }
        }
    }

    async fn configured_address(&self) -> Option<String> {
        match self.settings.get(KEY_PRINTER_ADDRESS).await {
            Ok(value) => value
                .map(|address| address.trim().to_string())
                .filter(|address| !address.is_empty()),
            Err(e) => {
                warn!(error = %e, "Printer address unreadable");
                None
            }
        }
    }

    async fn still_configured(&self, address: &str) -> bool {
        match self.configured_address().await {
            Some(current) if current == address => true,
            Some(current) => {
                info!(old = address, new = %current, "Printer address changed");
                false
            }
            None => {
                info!(address, "Printer address removed");
                false
            }
        }
    }

    fn set_status(&self, status: ConnectionStatus, session: Option<u64>) {
        let snapshot = {
            let mut inner = self.store.lock();
            if inner.state.connection_status == status && inner.link_session == session {
                return;
            }
            inner.state.connection_status = status;
            inner.link_session = session;
            inner.snapshot()
        };
        debug!(%status, "Printer link status changed");
        self.broadcaster.publish(snapshot);
    }
}
