// ABOUTME: Message bus types for routing chat traffic between gateways and the dispatcher
// ABOUTME: InboundEvent flows gateway -> dispatcher; OutboundAction flows client -> gateway

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use parley_core::SharedClient;
use tokio::sync::mpsc;

/// A message entering the bus from any gateway.
#[derive(Clone)]
pub struct InboundEvent {
    /// Connection the message arrived on; replies go back through it
    pub client: SharedClient,
    /// Channel name, or the sender's nick for private messages
    pub channel: String,
    pub nick: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(
        client: SharedClient,
        channel: impl Into<String>,
        nick: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            client,
            channel: channel.into(),
            nick: nick.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundEvent")
            .field("channel", &self.channel)
            .field("nick", &self.nick)
            .field("text", &self.text)
            .field("received_at", &self.received_at)
            .finish()
    }
}

/// Something a plugin asked the connection to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    Msg { channel: String, text: String },
    Me { channel: String, text: String },
    Join(String),
    Leave(String),
}

/// Receiving half of the bus, owned by the single dispatcher
pub type InboundReceiver = mpsc::Receiver<InboundEvent>;

/// Cloneable handle gateways publish inbound messages through.
///
/// Events are delivered in publish order to exactly one consumer. The bus
/// closes once every handle is dropped.
#[derive(Clone)]
pub struct MessageBus {
    tx: mpsc::Sender<InboundEvent>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> (Self, InboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn publish(&self, event: InboundEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow!("message bus closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::testing::RecordingClient;

    #[tokio::test]
    async fn test_bus_delivers_in_order() {
        let (bus, mut rx) = MessageBus::new(4);
        let client = RecordingClient::shared("helga");
        bus.publish(InboundEvent::new(client.clone(), "#a", "alice", "one"))
            .await
            .unwrap();
        bus.publish(InboundEvent::new(client, "#a", "alice", "two"))
            .await
            .unwrap();
        drop(bus);

        assert_eq!(rx.recv().await.unwrap().text, "one");
        assert_eq!(rx.recv().await.unwrap().text, "two");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_after_consumer_gone() {
        let (bus, rx) = MessageBus::new(4);
        drop(rx);
        assert!(bus.is_closed());
        let event = InboundEvent::new(RecordingClient::shared("helga"), "#a", "alice", "hi");
        assert!(bus.publish(event).await.is_err());
    }
}
