//! Where decoded events go.

use async_trait::async_trait;
use tactile_core::InboundEvent;
use tokio::sync::mpsc;

/// Receiver of decoded events.
///
/// Listeners await `handle` once per event, in arrival order.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Consume one event.
    async fn handle(&self, event: InboundEvent);
}

/// Sink that forwards events into an unbounded channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn handle(&self, event: InboundEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}
