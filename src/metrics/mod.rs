//! Metrics and observability infrastructure for squall.
//!
//! - `events`: internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder and HTTP exposition

pub mod events;
pub mod server;

pub use server::init;

/// Emit an internal event as a metric.
///
/// # Example
///
/// ```ignore
/// use squall::metrics::events::FileForwarded;
///
/// emit!(FileForwarded);
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
