//! Event bus port — publish domain management events.

use std::future::Future;

use ossie_domain::error::OssieError;
use ossie_domain::event::Event;

/// Publishes domain events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), OssieError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), OssieError>> + Send {
        (**self).publish(event)
    }
}
