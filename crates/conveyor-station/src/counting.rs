//! Object counting and batch closing.
//!
//! A transit is counted only while the gate is open and the station is
//! `Ready` or `Counting`. The count that reaches the batch target moves the
//! station to `BatchClosing` in the same critical section that increments
//! it, so at most one batch-completion workflow is ever started per batch.

use chrono::{DateTime, Utc};
use conveyor_core::SystemStatus;
use tracing::{debug, info};

use crate::debounce::{DebounceFilter, DebounceVerdict};
use crate::store::Inner;

/// Why a transit was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The gate is closed.
    GateClosed,
    /// The lifecycle is outside `Ready`/`Counting`.
    NotAccepting(&'static str),
}

/// Result of [`Station::register_transit`](crate::Station::register_transit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitOutcome {
    /// Counted. `batch_closed` is set on the count that reached the target.
    Counted { count: u32, batch_closed: bool },
    /// Too close to the previous count.
    Debounced { elapsed_ms: i64 },
    /// Not counted, no state changed.
    Rejected(RejectReason),
}

impl TransitOutcome {
    pub fn is_counted(&self) -> bool {
        matches!(self, TransitOutcome::Counted { .. })
    }
}

impl Inner {
    /// Apply one transit at `at`.
    pub(crate) fn register_transit(&mut self, at: DateTime<Utc>) -> TransitOutcome {
        if !self.state.gate_status.is_open() {
            return TransitOutcome::Rejected(RejectReason::GateClosed);
        }
        if !self.state.system_status.accepts_transits() {
            return TransitOutcome::Rejected(RejectReason::NotAccepting(
                self.state.system_status.name(),
            ));
        }

        let filter = DebounceFilter::new(self.state.debounce_interval_ms);
        if let DebounceVerdict::Reject { elapsed_ms } = filter.check(self.state.last_counted_at, at)
        {
            self.state.last_debounce_at = Some(at);
            self.state.debounced_transits += 1;
            debug!(elapsed_ms, "Transit debounced");
            return TransitOutcome::Debounced { elapsed_ms };
        }

        self.state.object_count += 1;
        self.state.last_counted_at = Some(at);
        if self.state.system_status == SystemStatus::Ready {
            self.advance(SystemStatus::Counting);
        }

        let count = self.state.object_count;
        let batch_closed = count >= self.state.batch_target && self.begin_batch_close();
        info!(count, target = self.state.batch_target, "Object counted");

        TransitOutcome::Counted {
            count,
            batch_closed,
        }
    }

    /// Enter `BatchClosing` if the lifecycle allows it. Returns `true` when
    /// this call is the one that closed the batch.
    pub(crate) fn begin_batch_close(&mut self) -> bool {
        if !self.state.system_status.can_transition_to(&SystemStatus::BatchClosing) {
            return false;
        }
        self.advance(SystemStatus::BatchClosing);
        self.state.batches_completed += 1;
        info!(
            batches_completed = self.state.batches_completed,
            "Batch target reached"
        );
        true
    }

    /// Zero the live count at the end of a batch.
    pub(crate) fn clear_count(&mut self) {
        self.state.object_count = 0;
        self.state.last_counted_at = None;
    }
}
