//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the source.
//! Events implement the `InternalEvent` trait which records the
//! corresponding Prometheus metric.

use metrics::{counter, gauge};
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when notifications are received from a queue.
pub struct NotificationsReceived {
    pub count: u64,
}

impl InternalEvent for NotificationsReceived {
    fn emit(self) {
        trace!(count = self.count, "Notifications received");
        counter!("squall_notifications_received_total").increment(self.count);
    }
}

/// Event emitted when a notification body cannot be decoded.
pub struct NotificationDecodeFailed;

impl InternalEvent for NotificationDecodeFailed {
    fn emit(self) {
        trace!("Notification decode failed");
        counter!("squall_notification_decode_failures_total").increment(1);
    }
}

/// Event emitted when a decoded path is rejected by the path filter.
pub struct NotificationFiltered;

impl InternalEvent for NotificationFiltered {
    fn emit(self) {
        trace!("Notification filtered");
        counter!("squall_notifications_filtered_total").increment(1);
    }
}

/// Event emitted when a file path is handed to the downstream reader.
pub struct FileForwarded;

impl InternalEvent for FileForwarded {
    fn emit(self) {
        trace!("File forwarded");
        counter!("squall_files_forwarded_total").increment(1);
    }
}

/// Event emitted when a long-poll receive fails.
pub struct ReceiveFailed;

impl InternalEvent for ReceiveFailed {
    fn emit(self) {
        trace!("Receive failed");
        counter!("squall_receive_failures_total").increment(1);
    }
}

/// Event emitted when deleting a handled notification fails.
pub struct AckFailed;

impl InternalEvent for AckFailed {
    fn emit(self) {
        trace!("Ack failed");
        counter!("squall_ack_failures_total").increment(1);
    }
}

// ============================================================================
// Gauge events
// ============================================================================

/// Event emitted once per stats interval with the worst notification lag
/// observed in that interval.
pub struct NotificationLag {
    pub seconds: f64,
}

impl InternalEvent for NotificationLag {
    fn emit(self) {
        trace!(seconds = self.seconds, "Notification lag");
        gauge!("squall_notification_lag_seconds").set(self.seconds);
    }
}

/// Event emitted when the number of running pollers changes.
pub struct ActivePollers {
    pub count: usize,
}

impl InternalEvent for ActivePollers {
    fn emit(self) {
        trace!(count = self.count, "Active pollers");
        gauge!("squall_active_pollers").set(self.count as f64);
    }
}
