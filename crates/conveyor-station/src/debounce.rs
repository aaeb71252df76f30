//! Minimum-interval filter between accepted counts.
//!
//! The filter is pure: it compares a transit timestamp against the last
//! accepted count and returns a verdict. The caller applies it inside the
//! same lock acquisition that performs the count, so two overlapping
//! transits can never both pass.

use chrono::{DateTime, Utc};

/// Outcome of a debounce check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceVerdict {
    Accept,
    /// Too close to the previous count.
    Reject { elapsed_ms: i64 },
}

/// Minimum-interval debounce filter.
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, Utc};
/// use conveyor_station::debounce::{DebounceFilter, DebounceVerdict};
///
/// let filter = DebounceFilter::new(300);
/// let first = Utc::now();
///
/// assert_eq!(
///     filter.check(Some(first), first + TimeDelta::milliseconds(120)),
///     DebounceVerdict::Reject { elapsed_ms: 120 }
/// );
/// assert_eq!(
///     filter.check(Some(first), first + TimeDelta::milliseconds(300)),
///     DebounceVerdict::Accept
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceFilter {
    interval_ms: u64,
}

impl DebounceFilter {
    /// Create a filter. An interval of zero accepts everything.
    pub fn new(interval_ms: u64) -> Self {
        Self { interval_ms }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_ms > 0
    }

    /// Judge a transit at `now` against the last accepted count.
    ///
    /// A timestamp earlier than the last count (wall clock stepped back) is
    /// accepted rather than silently suppressing counts until the clock
    /// catches up.
    pub fn check(&self, last_accepted: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DebounceVerdict {
        let Some(last) = last_accepted else {
            return DebounceVerdict::Accept;
        };
        if !self.is_enabled() {
            return DebounceVerdict::Accept;
        }

        let elapsed_ms = (now - last).num_milliseconds();
        if elapsed_ms >= 0 && (elapsed_ms as u64) < self.interval_ms {
            DebounceVerdict::Reject { elapsed_ms }
        } else {
            DebounceVerdict::Accept
        }
    }
}
