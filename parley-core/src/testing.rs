// ABOUTME: Test doubles for plugin authors and adapter tests
// ABOUTME: RecordingClient captures outbound traffic; FlakySource fails resolution on demand

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::client::{Client, SharedClient};
use crate::error::PluginError;
use crate::plugin::PluginLike;
use crate::source::{PluginRef, PluginSource, PluginTable};

/// One outbound action a plugin performed through the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Msg { channel: String, text: String },
    Me { channel: String, text: String },
    Join(String),
    Leave(String),
}

/// In-memory `Client` that records everything sent through it
#[derive(Default)]
pub struct RecordingClient {
    nick: String,
    operators: HashSet<String>,
    channels: Mutex<HashSet<String>>,
    last_messages: Mutex<HashMap<(String, String), String>>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingClient {
    pub fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            ..Default::default()
        }
    }

    /// Shorthand for tests that never inspect the recording
    pub fn shared(nick: &str) -> SharedClient {
        Arc::new(Self::new(nick))
    }

    pub fn with_operators<I, S>(mut self, operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operators = operators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_channels<I, S>(self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels
            .lock()
            .extend(channels.into_iter().map(Into::into));
        self
    }

    /// Pretend `nick` just said `text` on `channel`
    pub fn observe(&self, channel: &str, nick: &str, text: &str) {
        self.last_messages
            .lock()
            .insert((channel.to_string(), nick.to_string()), text.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    /// Text of every `msg` sent to `channel`, in order
    pub fn messages_to(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Msg { channel: c, text } if c == channel => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Client for RecordingClient {
    fn nickname(&self) -> String {
        self.nick.clone()
    }

    fn operators(&self) -> HashSet<String> {
        self.operators.clone()
    }

    fn channels(&self) -> HashSet<String> {
        self.channels.lock().clone()
    }

    fn last_message(&self, channel: &str, nick: &str) -> Option<String> {
        self.last_messages
            .lock()
            .get(&(channel.to_string(), nick.to_string()))
            .cloned()
    }

    fn msg(&self, channel: &str, text: &str) -> Result<()> {
        self.sent.lock().push(Sent::Msg {
            channel: channel.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn me(&self, channel: &str, text: &str) -> Result<()> {
        self.sent.lock().push(Sent::Me {
            channel: channel.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn join(&self, channel: &str) -> Result<()> {
        self.channels.lock().insert(channel.to_string());
        self.sent.lock().push(Sent::Join(channel.to_string()));
        Ok(())
    }

    fn leave(&self, channel: &str) -> Result<()> {
        self.channels.lock().remove(channel);
        self.sent.lock().push(Sent::Leave(channel.to_string()));
        Ok(())
    }
}

/// Wraps a `PluginTable` and makes every `resolve` fail while `broken` is set.
///
/// Useful for exercising reload failure paths: load with it healthy, flip the
/// switch, then reload.
pub struct FlakySource {
    table: PluginTable,
    broken: Arc<AtomicBool>,
}

impl FlakySource {
    pub fn new(table: PluginTable) -> Self {
        Self {
            table,
            broken: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that toggles failure after the source has moved into a registry
    pub fn switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.broken)
    }
}

impl PluginSource for FlakySource {
    fn list_available(&self) -> Vec<PluginRef> {
        self.table.list_available()
    }

    fn resolve(&self, plugin: &PluginRef) -> Result<PluginLike, PluginError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(PluginError::Resolve {
                name: plugin.name.clone(),
                source: anyhow::anyhow!("source is broken"),
            });
        }
        self.table.resolve(plugin)
    }
}
