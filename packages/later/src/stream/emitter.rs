// write half of a stream's delivery channel.

use super::Delivery;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;


// side effect run for every emitted value before it is delivered.
pub(crate) type EmitAction<T> = Arc<dyn Fn(&T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Write-only handle given to a [`Stream`](crate::Stream)'s work function
///
/// There is exactly one emitter per stream, owned by the running work function. Values emitted
/// after the work function has returned are dropped.
pub struct Emitter<T> {
    send: UnboundedSender<Delivery<T>>,
    action: Option<EmitAction<T>>,
}

impl<T> Emitter<T> {
    pub(crate) fn new(send: UnboundedSender<Delivery<T>>, action: Option<EmitAction<T>>) -> Self {
        Emitter { send, action }
    }

    /// Emit a value to the stream's consumer
    ///
    /// If the stream mirrors into a [`Publisher`](crate::Publisher), the publisher is updated
    /// first, and only then is the value queued for the consumer. The queue is unbounded, so this
    /// never waits on the consumer.
    ///
    /// Returns false if the consumer has gone away, in which case the value is dropped. Work
    /// functions may use this to stop early.
    pub async fn emit(&self, value: T) -> bool {
        if let Some(action) = &self.action {
            action(&value).await;
        }
        let delivered = self.send.send(Delivery::Value(value)).is_ok();
        if !delivered {
            debug!("stream consumer gone, dropping emitted value");
        }
        delivered
    }

    /// Whether the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.send.is_closed()
    }
}
