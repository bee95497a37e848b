// ABOUTME: Client implementation backed by an unbounded outbound channel
// ABOUTME: Plugins may send from any thread or task; the owning gateway drains the channel

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use parley_core::Client;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

use crate::bus::OutboundAction;

/// The connection state a gateway exposes to plugins.
pub struct OutboundClient {
    nick: String,
    operators: HashSet<String>,
    channels: RwLock<HashSet<String>>,
    last_messages: RwLock<HashMap<(String, String), String>>,
    tx: mpsc::UnboundedSender<OutboundAction>,
}

impl OutboundClient {
    pub fn new(
        nick: impl Into<String>,
        operators: HashSet<String>,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            nick: nick.into(),
            operators,
            channels: RwLock::new(HashSet::new()),
            last_messages: RwLock::new(HashMap::new()),
            tx,
        };
        (client, rx)
    }

    /// Remember what `nick` last said on `channel`
    pub fn observe(&self, channel: &str, nick: &str, text: &str) {
        self.last_messages
            .write()
            .insert((channel.to_string(), nick.to_string()), text.to_string());
    }

    fn send(&self, action: OutboundAction) -> Result<()> {
        self.tx
            .send(action)
            .map_err(|_| anyhow!("outbound channel for {} is closed", self.nick))
    }
}

impl Client for OutboundClient {
    fn nickname(&self) -> String {
        self.nick.clone()
    }

    fn operators(&self) -> HashSet<String> {
        self.operators.clone()
    }

    fn channels(&self) -> HashSet<String> {
        self.channels.read().clone()
    }

    fn last_message(&self, channel: &str, nick: &str) -> Option<String> {
        self.last_messages
            .read()
            .get(&(channel.to_string(), nick.to_string()))
            .cloned()
    }

    fn msg(&self, channel: &str, text: &str) -> Result<()> {
        self.send(OutboundAction::Msg {
            channel: channel.to_string(),
            text: text.to_string(),
        })
    }

    fn me(&self, channel: &str, text: &str) -> Result<()> {
        self.send(OutboundAction::Me {
            channel: channel.to_string(),
            text: text.to_string(),
        })
    }

    fn join(&self, channel: &str) -> Result<()> {
        self.send(OutboundAction::Join(channel.to_string()))?;
        self.channels.write().insert(channel.to_string());
        tracing::info!(nick = %self.nick, channel = %channel, "Joined channel");
        Ok(())
    }

    fn leave(&self, channel: &str) -> Result<()> {
        self.send(OutboundAction::Leave(channel.to_string()))?;
        self.channels.write().remove(channel);
        tracing::info!(nick = %self.nick, channel = %channel, "Left channel");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_is_queued() {
        let (client, mut rx) = OutboundClient::new("helga", HashSet::new());
        client.msg("#bots", "hello").unwrap();
        client.me("#bots", "waves").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundAction::Msg {
                channel: "#bots".into(),
                text: "hello".into()
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), OutboundAction::Me { .. }));
    }

    #[test]
    fn test_join_and_leave_track_channels() {
        let (client, _rx) = OutboundClient::new("helga", HashSet::new());
        client.join("#a").unwrap();
        client.join("#b").unwrap();
        client.leave("#a").unwrap();
        assert_eq!(client.channels(), HashSet::from(["#b".to_string()]));
    }

    #[test]
    fn test_send_after_receiver_dropped_fails() {
        let (client, rx) = OutboundClient::new("helga", HashSet::new());
        drop(rx);
        assert!(client.msg("#bots", "anyone?").is_err());
    }

    #[test]
    fn test_last_message_and_operators() {
        let operators = HashSet::from(["alice".to_string()]);
        let (client, _rx) = OutboundClient::new("helga", operators);
        client.observe("#bots", "bob", "hi there");
        assert_eq!(client.last_message("#bots", "bob").as_deref(), Some("hi there"));
        assert_eq!(client.last_message("#bots", "alice"), None);
        assert!(client.is_operator("alice"));
        assert!(!client.is_operator("bob"));
    }
}
