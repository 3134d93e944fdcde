//! Notification lag tracking.
//!
//! Tracks the minimum notification timestamp seen since the last read.
//! Every poller feeds observations in; the stats reporter drains the value
//! once per collection interval, so the resulting gauge reflects the worst
//! lag of that interval only, not a historical minimum.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;

/// Shared minimum-timestamp accumulator.
///
/// The mutex is held only for a compare or a take, never across an await.
#[derive(Debug, Default)]
pub struct LagTracker {
    min: Mutex<Option<DateTime<Utc>>>,
}

impl LagTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a notification timestamp, keeping the earliest one seen
    /// since the last read.
    pub fn observe(&self, timestamp: DateTime<Utc>) {
        let mut min = self.min.lock().expect("lag tracker poisoned");
        if min.is_none_or(|current| timestamp < current) {
            *min = Some(timestamp);
        }
    }

    /// Lag of the earliest timestamp observed since the previous call, or
    /// `None` when nothing was observed. Clears the accumulator.
    pub fn read_and_reset(&self) -> Option<TimeDelta> {
        let min = self.min.lock().expect("lag tracker poisoned").take();
        min.map(|timestamp| Utc::now() - timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_keeps_earliest_regardless_of_order() {
        let tracker = LagTracker::new();
        let base = Utc::now() - Duration::seconds(30);

        tracker.observe(base + Duration::seconds(2));
        tracker.observe(base);
        tracker.observe(base + Duration::seconds(1));

        let lag = tracker.read_and_reset().unwrap();
        assert!(lag >= Duration::seconds(30));
        assert!(lag < Duration::seconds(31));
    }

    #[test]
    fn test_read_resets_to_unset() {
        let tracker = LagTracker::new();
        tracker.observe(Utc::now());

        assert!(tracker.read_and_reset().is_some());
        assert!(tracker.read_and_reset().is_none());
    }

    #[test]
    fn test_unset_reads_as_no_data() {
        let tracker = LagTracker::new();
        assert!(tracker.read_and_reset().is_none());
    }

    #[test]
    fn test_concurrent_observers() {
        use std::sync::Arc;

        let tracker = Arc::new(LagTracker::new());
        let base = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|offset| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    tracker.observe(base + Duration::seconds(offset));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lag = tracker.read_and_reset().unwrap();
        // The earliest observation was `base`.
        assert!(lag >= Duration::zero());
        assert!(lag < Duration::seconds(2));
    }
}
