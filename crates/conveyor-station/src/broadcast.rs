//! Snapshot hand-off from the hardware contexts to the presentation layer.
//!
//! Built on a bounded `tokio::sync::broadcast` channel. Publishing never
//! blocks and never fails: when a subscriber falls behind, the oldest pending
//! snapshots are overwritten and the subscriber resumes from the newest ones.
//! Subscribers only ever receive owned snapshots, so nothing downstream can
//! reach back into the station lock.

use conveyor_core::StatusSnapshot;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, trace};

/// Producer side of the snapshot queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    sender: broadcast::Sender<StatusSnapshot>,
}

impl StatusBroadcaster {
    /// Create a queue holding at most `capacity` pending snapshots per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Push a snapshot to every subscriber.
    pub fn publish(&self, snapshot: StatusSnapshot) {
        let status = snapshot.system_status.name();
        match self.sender.send(snapshot) {
            Ok(receivers) => trace!(receivers, status, "Snapshot published"),
            Err(_) => trace!(status, "Snapshot published with no subscribers"),
        }
    }

    /// Open a new subscription starting at the next published snapshot.
    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            receiver: self.sender.subscribe(),
            skipped: 0,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Consumer side of the snapshot queue.
///
/// # Examples
///
/// ```
/// use conveyor_core::StatusSnapshot;
/// use conveyor_station::broadcast::StatusBroadcaster;
///
/// #[tokio::main]
/// async fn main() {
///     let broadcaster = StatusBroadcaster::new(2);
///     let mut subscription = broadcaster.subscribe();
///
///     for count in 1..=5 {
///         broadcaster.publish(StatusSnapshot { object_count: count, ..Default::default() });
///     }
///
///     // Only the newest snapshots survive an overflow.
///     let snapshot = subscription.next().await.unwrap();
///     assert_eq!(snapshot.object_count, 4);
///     assert_eq!(subscription.skipped(), 3);
/// }
/// ```
#[derive(Debug)]
pub struct StatusSubscription {
    receiver: broadcast::Receiver<StatusSnapshot>,
    skipped: u64,
}

impl StatusSubscription {
    /// Wait for the next snapshot. Returns `None` once every broadcaster is
    /// gone.
    pub async fn next(&mut self) -> Option<StatusSnapshot> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(missed)) => self.note_lag(missed),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next pending snapshot without waiting.
    pub fn try_next(&mut self) -> Option<StatusSnapshot> {
        loop {
            match self.receiver.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(missed)) => self.note_lag(missed),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain everything pending and return the newest snapshot, if any.
    pub fn latest(&mut self) -> Option<StatusSnapshot> {
        let mut newest = None;
        while let Some(snapshot) = self.try_next() {
            newest = Some(snapshot);
        }
        newest
    }

    /// Snapshots overwritten before this subscriber could read them.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn note_lag(&mut self, missed: u64) {
        self.skipped += missed;
        debug!(missed, "Snapshot subscriber lagging, oldest snapshots dropped");
    }
}
