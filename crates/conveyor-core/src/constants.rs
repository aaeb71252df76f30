//! Settings keys, defaults and timing constants for the conveyor station.
//!
//! Every value the station reads from the external settings store is keyed by
//! one of the `KEY_*` constants below. Values are stored as text; the station
//! parses them at startup and falls back to the matching `DEFAULT_*` constant
//! when a key is missing or malformed.
//!
//! # Usage
//!
//! ```
//! use conveyor_core::constants::*;
//!
//! assert_eq!(KEY_BATCH_TARGET, "batch_target");
//! assert_eq!(DEFAULT_BATCH_TARGET, 20);
//!
//! use std::time::Duration;
//! let tick = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
//! assert_eq!(tick.as_millis(), 50);
//! ```

// ============================================================================
// Settings Keys: Batch Lifecycle
// ============================================================================

/// Number of counted objects that closes a batch.
pub const KEY_BATCH_TARGET: &str = "batch_target";

/// Seconds the gate stays closed between batches.
pub const KEY_GATE_WAIT_SECONDS: &str = "gate_wait_time";

/// Minimum interval between two accepted counts, in milliseconds.
pub const KEY_DEBOUNCE_INTERVAL_MS: &str = "debounce_interval_ms";

// ============================================================================
// Settings Keys: Audible Signals
// ============================================================================

/// Buzzer pulse length for an accepted count, in milliseconds.
pub const KEY_BEEP_COUNT_MS: &str = "beep_count_ms";

/// Buzzer pulse length when a batch completes, in milliseconds.
pub const KEY_BEEP_COMPLETE_MS: &str = "beep_complete_ms";

/// Buzzer pulse length of each reset chirp, in milliseconds.
pub const KEY_BEEP_RESET_MS: &str = "beep_reset_ms";

/// Buzzer pulse length of the debounce alert, in milliseconds.
pub const KEY_BEEP_DEBOUNCE_MS: &str = "beep_debounce_ms";

// ============================================================================
// Settings Keys: Printer
// ============================================================================

/// Address of the wireless label printer the link manager keeps connected.
pub const KEY_PRINTER_ADDRESS: &str = "printer_address";

/// Identifier (UUID) of the characteristic that accepts label payloads.
pub const KEY_WRITE_CHARACTERISTIC: &str = "write_characteristic_uuid";

/// `"true"` when a label is printed for every counted object.
pub const KEY_PRINTER_ENABLED: &str = "printer_enabled";

/// Delay before a print job is built, in milliseconds.
pub const KEY_PRINTER_DELAY_MS: &str = "printer_delay_ms";

/// First payload label.
pub const KEY_PRINTER_VAR1: &str = "printer_var1";

/// First payload value.
pub const KEY_PRINTER_VAR1_VALUE: &str = "printer_var1_val";

/// Second payload label.
pub const KEY_PRINTER_VAR2: &str = "printer_var2";

/// Second payload value.
pub const KEY_PRINTER_VAR2_VALUE: &str = "printer_var2_val";

// ============================================================================
// Defaults
// ============================================================================

/// Default batch size.
pub const DEFAULT_BATCH_TARGET: u32 = 20;

/// Default gate pause between batches, in seconds.
pub const DEFAULT_GATE_WAIT_SECONDS: u32 = 10;

/// Default debounce interval. Zero disables the filter.
pub const DEFAULT_DEBOUNCE_INTERVAL_MS: u64 = 0;

/// Default count beep.
pub const DEFAULT_BEEP_COUNT_MS: u64 = 1000;

/// Default completion beep.
pub const DEFAULT_BEEP_COMPLETE_MS: u64 = 2000;

/// Default reset chirp.
pub const DEFAULT_BEEP_RESET_MS: u64 = 100;

/// Default debounce alert.
pub const DEFAULT_BEEP_DEBOUNCE_MS: u64 = 50;

/// Number of chirps in the reset pattern.
pub const RESET_BEEP_REPEAT: u8 = 3;

/// Silence between reset chirps, in milliseconds.
pub const RESET_BEEP_GAP_MS: u64 = 200;

/// Pulse length of a manually commanded beep, in milliseconds.
pub const MANUAL_BEEP_MS: u64 = 200;

/// Placeholder shown before the first label is printed.
pub const NO_PAYLOAD: &str = "N/A";

/// Settings seeded into an empty store so a fresh station never stalls
/// waiting for configuration.
pub const SEEDED_DEFAULTS: &[(&str, &str)] =
    &[(KEY_BATCH_TARGET, "20"), (KEY_GATE_WAIT_SECONDS, "10")];

// ============================================================================
// Timing
// ============================================================================

/// Sensor poll tick, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Poll interval after the sensor bus is declared failed, in milliseconds.
pub const DEFAULT_BUS_BACKOFF_MS: u64 = 5000;

/// Consecutive failed reads before the bus is declared failed.
pub const DEFAULT_BUS_FAILURE_THRESHOLD: u32 = 20;

/// How often the link manager re-reads the configured printer address, in seconds.
pub const DEFAULT_LINK_RECHECK_SECS: u64 = 15;

/// Pause after a failed connection or ended session, in seconds.
pub const DEFAULT_LINK_RETRY_SECS: u64 = 30;

/// Upper bound on a single connection attempt, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Upper bound on a cross-context dispatch round trip, in seconds.
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 10;

/// Pause between the completion signal and closing the gate, in milliseconds.
pub const BATCH_CLOSE_SETTLE_MS: u64 = 500;

/// Gate hold during startup before the first opening, in milliseconds.
pub const STARTUP_SETTLE_MS: u64 = 2000;

/// Capacity of the snapshot hand-off queue.
pub const SNAPSHOT_QUEUE_CAPACITY: usize = 64;
