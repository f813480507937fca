//! Event bus port — fire-and-forget progress notifications.

use std::future::Future;

use macrobot_domain::error::MacrobotError;
use macrobot_domain::event::Event;

/// Publishes engine events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    ///
    /// Implementations must not wait on subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), MacrobotError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).publish(event)
    }
}
