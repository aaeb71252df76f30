//! Label print jobs.
//!
//! One job runs per accepted count while printing is enabled. A job with no
//! usable write characteristic ends before anything else happens. Otherwise
//! it waits the configured delay, records the payload in the station state
//! and hands the write to the connection manager. Jobs never retry.

use std::time::Duration;

use bytes::Bytes;
use conveyor_core::constants::{
    KEY_PRINTER_DELAY_MS, KEY_PRINTER_VAR1, KEY_PRINTER_VAR1_VALUE, KEY_PRINTER_VAR2,
    KEY_PRINTER_VAR2_VALUE, KEY_WRITE_CHARACTERISTIC,
};
use conveyor_storage::{AnySettingsStore, SettingsStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::StatusBroadcaster;
use crate::config::parse_setting;
use crate::error::PrintError;
use crate::link::PrinterHandle;
use crate::store::SharedStateStore;

/// Concatenate the payload template fields. No separators, no escaping.
///
/// ```
/// use conveyor_station::print::build_payload;
///
/// assert_eq!(build_payload("LOT", "42", "-", "A"), "LOT42-A");
/// ```
#[must_use]
pub fn build_payload(var1: &str, val1: &str, var2: &str, val2: &str) -> String {
    [var1, val1, var2, val2].concat()
}

/// Builds and dispatches label print jobs.
#[derive(Debug, Clone)]
pub struct PrintJobDispatcher {
    store: SharedStateStore,
    broadcaster: StatusBroadcaster,
    settings: AnySettingsStore,
    printer: PrinterHandle,
}

impl PrintJobDispatcher {
    pub fn new(
        store: SharedStateStore,
        broadcaster: StatusBroadcaster,
        settings: AnySettingsStore,
        printer: PrinterHandle,
    ) -> Self {
        Self {
            store,
            broadcaster,
            settings,
            printer,
        }
    }

    /// Handle to the connection manager.
    pub fn printer(&self) -> &PrinterHandle {
        &self.printer
    }

    /// Print the configured label for one counted object.
    ///
    /// # Errors
    ///
    /// - [`PrintError::Settings`] if a payload field cannot be read
    /// - [`PrintError::ConfigurationMissing`] if no valid write characteristic is set
    /// - [`PrintError::NotConnected`] if no session is live when the job is ready
    /// - [`PrintError::Dispatch`] if the hand-off to the manager fails
    pub async fn print_count(&self) -> Result<(), PrintError> {
        let characteristic = self.write_characteristic().await?;
        let delay = self.read_delay().await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let payload = build_payload(
            &self.read_field(KEY_PRINTER_VAR1).await?,
            &self.read_field(KEY_PRINTER_VAR1_VALUE).await?,
            &self.read_field(KEY_PRINTER_VAR2).await?,
            &self.read_field(KEY_PRINTER_VAR2_VALUE).await?,
        );
        self.record_payload(&payload);
        self.send(characteristic, payload).await
    }

    /// Write `text` as-is, for an operator test print.
    pub async fn print_text(&self, text: &str) -> Result<(), PrintError> {
        let characteristic = self.write_characteristic().await?;
        self.record_payload(text);
        self.send(characteristic, text.to_string()).await
    }

    async fn send(&self, characteristic: Uuid, payload: String) -> Result<(), PrintError> {
        if !self.store.connection_status().is_connected() {
            return Err(PrintError::NotConnected);
        }

        let bytes = payload.len();
        self.printer
            .write(characteristic, Bytes::from(payload))
            .await?;
        info!(bytes, "Label printed");
        Ok(())
    }

    async fn write_characteristic(&self) -> Result<Uuid, PrintError> {
        let raw = self.read_field(KEY_WRITE_CHARACTERISTIC).await?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PrintError::ConfigurationMissing(
                KEY_WRITE_CHARACTERISTIC.to_string(),
            ));
        }
        Uuid::parse_str(raw).map_err(|e| {
            warn!(value = raw, error = %e, "Write characteristic is not a UUID");
            PrintError::ConfigurationMissing(KEY_WRITE_CHARACTERISTIC.to_string())
        })
    }

    async fn read_delay(&self) -> Result<Duration, PrintError> {
        let raw = self.read_field(KEY_PRINTER_DELAY_MS).await?;
        if raw.trim().is_empty() {
            return Ok(Duration::ZERO);
        }
        let millis = parse_setting::<u64>(KEY_PRINTER_DELAY_MS, &raw).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed print delay, printing immediately");
            0
        });
        Ok(Duration::from_millis(millis))
    }

    /// Missing fields read as empty text.
    async fn read_field(&self, key: &str) -> Result<String, PrintError> {
        self.settings
            .get(key)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| PrintError::Settings(e.to_string()))
    }

    fn record_payload(&self, payload: &str) {
        let snapshot = {
            let mut inner = self.store.lock();
            inner.state.last_printed_payload = payload.to_string();
            inner.snapshot()
        };
        debug!(payload, "Print payload built");
        self.broadcaster.publish(snapshot);
    }
}
