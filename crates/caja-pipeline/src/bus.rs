use async_stream::stream;
use caja_core::events::SessionEvent;
use tokio::sync::broadcast;
use tokio_stream::Stream;

/// In-process pub/sub bus for scan session events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a new event bus with the provided channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    pub fn publish(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Subscribes to all future events from this bus.
    ///
    /// NOTE: `tokio::sync::broadcast` drops older messages if a receiver
    /// lags behind channel capacity. Slow consumers must handle
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Subscription as a stream; lagged gaps are skipped silently.
    pub fn event_stream(&self) -> impl Stream<Item = SessionEvent> {
        let mut rx = self.tx.subscribe();
        stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
