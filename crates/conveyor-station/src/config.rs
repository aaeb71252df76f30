//! Station configuration.
//!
//! [`StationConfig`] is loaded once at startup from the settings store.
//! [`PollerConfig`], [`LinkConfig`] and [`SequenceTiming`] carry the timing
//! of the execution contexts; they default to the station constants and are
//! adjusted with `with_*` setters.

use std::str::FromStr;
use std::time::Duration;

use conveyor_core::Error;
use conveyor_core::constants::*;
use conveyor_storage::SettingsStore;
use tracing::warn;

/// Live-state configuration read from the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationConfig {
    pub batch_target: u32,
    pub gate_wait_seconds: u32,
    pub debounce_interval_ms: u64,
    pub beep_count_ms: u64,
    pub beep_complete_ms: u64,
    pub beep_reset_ms: u64,
    pub beep_debounce_ms: u64,
    pub printer_enabled: bool,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            batch_target: DEFAULT_BATCH_TARGET,
            gate_wait_seconds: DEFAULT_GATE_WAIT_SECONDS,
            debounce_interval_ms: DEFAULT_DEBOUNCE_INTERVAL_MS,
            beep_count_ms: DEFAULT_BEEP_COUNT_MS,
            beep_complete_ms: DEFAULT_BEEP_COMPLETE_MS,
            beep_reset_ms: DEFAULT_BEEP_RESET_MS,
            beep_debounce_ms: DEFAULT_BEEP_DEBOUNCE_MS,
            printer_enabled: false,
        }
    }
}

impl StationConfig {
    /// Load every key from `settings`.
    ///
    /// Missing keys take their default silently; malformed values and a zero
    /// batch target take their default with a warning. A settings read error
    /// is treated like a missing key.
    pub async fn load<S: SettingsStore>(settings: &S) -> Self {
        let defaults = Self::default();

        let batch_target = match read(settings, KEY_BATCH_TARGET, defaults.batch_target).await {
            0 => {
                warn!(key = KEY_BATCH_TARGET, "Batch target must be positive, using default");
                defaults.batch_target
            }
            target => target,
        };

        Self {
            batch_target,
            gate_wait_seconds: read(settings, KEY_GATE_WAIT_SECONDS, defaults.gate_wait_seconds)
                .await,
            debounce_interval_ms: read(
                settings,
                KEY_DEBOUNCE_INTERVAL_MS,
                defaults.debounce_interval_ms,
            )
            .await,
            beep_count_ms: read(settings, KEY_BEEP_COUNT_MS, defaults.beep_count_ms).await,
            beep_complete_ms: read(settings, KEY_BEEP_COMPLETE_MS, defaults.beep_complete_ms)
                .await,
            beep_reset_ms: read(settings, KEY_BEEP_RESET_MS, defaults.beep_reset_ms).await,
            beep_debounce_ms: read(settings, KEY_BEEP_DEBOUNCE_MS, defaults.beep_debounce_ms)
                .await,
            printer_enabled: match read_raw(settings, KEY_PRINTER_ENABLED).await {
                Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                    warn!(key = KEY_PRINTER_ENABLED, value = %raw, "Unrecognized flag, printing disabled");
                    false
                }),
                None => defaults.printer_enabled,
            },
        }
    }

    /// Set the batch target.
    pub fn with_batch_target(mut self, batch_target: u32) -> Self {
        self.batch_target = batch_target;
        self
    }

    /// Set the gate wait.
    pub fn with_gate_wait_seconds(mut self, seconds: u32) -> Self {
        self.gate_wait_seconds = seconds;
        self
    }

    /// Set the debounce interval. Zero disables the filter.
    pub fn with_debounce_interval_ms(mut self, interval_ms: u64) -> Self {
        self.debounce_interval_ms = interval_ms;
        self
    }

    /// Enable or disable label printing.
    pub fn with_printer_enabled(mut self, enabled: bool) -> Self {
        self.printer_enabled = enabled;
        self
    }
}

/// Parse a textual boolean flag as stored in settings.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a stored value, reporting malformed text as an invalid setting.
pub fn parse_setting<T: FromStr>(key: &str, raw: &str) -> conveyor_core::Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::invalid_setting(key, raw))
}

async fn read_raw<S: SettingsStore>(settings: &S, key: &str) -> Option<String> {
    match settings.get(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Settings read failed, using default");
            None
        }
    }
}

async fn read<S: SettingsStore, T: FromStr>(settings: &S, key: &str, default: T) -> T {
    match read_raw(settings, key).await {
        Some(raw) => parse_setting(key, &raw).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed setting, using default");
            default
        }),
        None => default,
    }
}

/// Sensor poller timing and channel mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Tick between reads while the bus is healthy.
    pub interval: Duration,
    /// Tick between reads once the bus is declared failed.
    pub backoff: Duration,
    /// Consecutive failed reads before the bus is declared failed.
    pub failure_threshold: u32,
    /// Channel index of the entry beam.
    pub entry_channel: usize,
    /// Channel index of the exit beam.
    pub exit_channel: usize,
    /// Consecutive clear ticks on the exit beam that confirm a transit.
    pub clear_ticks: u32,
    /// Consecutive all-clear ticks that abandon a half-entered object.
    pub abandon_ticks: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            backoff: Duration::from_millis(DEFAULT_BUS_BACKOFF_MS),
            failure_threshold: DEFAULT_BUS_FAILURE_THRESHOLD,
            entry_channel: 0,
            exit_channel: 1,
            clear_ticks: 2,
            abandon_ticks: 10,
        }
    }
}

impl PollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Map the entry and exit beams to bus channels. Both may be the same
    /// channel for a single-beam station.
    pub fn with_channels(mut self, entry: usize, exit: usize) -> Self {
        self.entry_channel = entry;
        self.exit_channel = exit;
        self
    }

    pub fn with_clear_ticks(mut self, ticks: u32) -> Self {
        self.clear_ticks = ticks.max(1);
        self
    }

    pub fn with_abandon_ticks(mut self, ticks: u32) -> Self {
        self.abandon_ticks = ticks.max(1);
        self
    }
}

/// Printer link manager timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// How often the configured address is re-read, idle or connected.
    pub recheck: Duration,
    /// Pause after a failed attempt or an ended session.
    pub retry: Duration,
    /// Bound on one connection attempt.
    pub connect_timeout: Duration,
    /// Bound on one cross-context round trip.
    pub dispatch_timeout: Duration,
    /// How long a discovery scan listens.
    pub scan_duration: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            recheck: Duration::from_secs(DEFAULT_LINK_RECHECK_SECS),
            retry: Duration::from_secs(DEFAULT_LINK_RETRY_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            dispatch_timeout: Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS),
            scan_duration: Duration::from_secs(5),
        }
    }
}

impl LinkConfig {
    pub fn with_recheck(mut self, recheck: Duration) -> Self {
        self.recheck = recheck;
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }
}

/// Fixed pauses inside the startup and batch sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTiming {
    /// Gate hold during startup before the first opening.
    pub startup_settle: Duration,
    /// Pause between the completion signal and closing the gate.
    pub batch_close_settle: Duration,
    /// Silence between reset chirps.
    pub reset_beep_gap: Duration,
}

impl Default for SequenceTiming {
    fn default() -> Self {
        Self {
            startup_settle: Duration::from_millis(STARTUP_SETTLE_MS),
            batch_close_settle: Duration::from_millis(BATCH_CLOSE_SETTLE_MS),
            reset_beep_gap: Duration::from_millis(RESET_BEEP_GAP_MS),
        }
    }
}

impl SequenceTiming {
    pub fn with_startup_settle(mut self, settle: Duration) -> Self {
        self.startup_settle = settle;
        self
    }

    pub fn with_batch_close_settle(mut self, settle: Duration) -> Self {
        self.batch_close_settle = settle;
        self
    }

    pub fn with_reset_beep_gap(mut self, gap: Duration) -> Self {
        self.reset_beep_gap = gap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_storage::MemorySettingsStore;
    use rstest::rstest;

    #[tokio::test]
    async fn test_load_from_empty_store_uses_defaults() {
        let store = MemorySettingsStore::new();
        assert_eq!(StationConfig::load(&store).await, StationConfig::default());
    }

    #[tokio::test]
    async fn test_load_reads_every_key() {
        let store = MemorySettingsStore::with_values([
            (KEY_BATCH_TARGET, "3"),
            (KEY_GATE_WAIT_SECONDS, "1"),
            (KEY_DEBOUNCE_INTERVAL_MS, "250"),
            (KEY_BEEP_COUNT_MS, "10"),
            (KEY_BEEP_COMPLETE_MS, "20"),
            (KEY_BEEP_RESET_MS, "30"),
            (KEY_BEEP_DEBOUNCE_MS, "40"),
            (KEY_PRINTER_ENABLED, "true"),
        ]);

        let config = StationConfig::load(&store).await;
        assert_eq!(
            config,
            StationConfig {
                batch_target: 3,
                gate_wait_seconds: 1,
                debounce_interval_ms: 250,
                beep_count_ms: 10,
                beep_complete_ms: 20,
                beep_reset_ms: 30,
                beep_debounce_ms: 40,
                printer_enabled: true,
            }
        );
    }

    #[rstest]
    #[case("abc")]
    #[case("-4")]
    #[case("0")]
    #[case("")]
    #[tokio::test]
    async fn test_bad_batch_target_falls_back(#[case] raw: &str) {
        let store = MemorySettingsStore::with_values([(KEY_BATCH_TARGET, raw)]);
        let config = StationConfig::load(&store).await;
        assert_eq!(config.batch_target, DEFAULT_BATCH_TARGET);
    }

    #[rstest]
    #[case("true", Some(true))]
    #[case(" YES ", Some(true))]
    #[case("0", Some(false))]
    #[case("off", Some(false))]
    #[case("maybe", None)]
    fn test_parse_flag(#[case] raw: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_flag(raw), expected);
    }

    #[test]
    fn test_parse_setting_reports_key() {
        let err = parse_setting::<u32>(KEY_GATE_WAIT_SECONDS, "ten").unwrap_err();
        assert_eq!(err, Error::invalid_setting(KEY_GATE_WAIT_SECONDS, "ten"));
    }

    #[test]
    fn test_poller_config_builder_clamps_counts() {
        let config = PollerConfig::default()
            .with_interval(Duration::from_millis(5))
            .with_channels(2, 2)
            .with_clear_ticks(0)
            .with_failure_threshold(0);

        assert_eq!(config.interval, Duration::from_millis(5));
        assert_eq!((config.entry_channel, config.exit_channel), (2, 2));
        assert_eq!(config.clear_ticks, 1);
        assert_eq!(config.failure_threshold, 1);
    }

    #[test]
    fn test_link_config_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.recheck, Duration::from_secs(15));
        assert_eq!(config.retry, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.dispatch_timeout, Duration::from_secs(10));
    }
}
