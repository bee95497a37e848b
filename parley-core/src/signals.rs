// ABOUTME: Process-wide named event hub (started, plugins_loaded, signon, ...)
// ABOUTME: Synchronous publish/subscribe; a panicking subscriber is isolated and logged

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub const STARTED: &str = "started";
pub const PLUGINS_LOADED: &str = "plugins_loaded";
pub const SIGNON: &str = "signon";
pub const JOIN: &str = "join";
pub const LEFT: &str = "left";

/// One published event
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub payload: Value,
}

impl Signal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

type SignalHandler = Arc<dyn Fn(&Signal) + Send + Sync>;

/// Named-event hub shared by the registry and protocol adapters.
///
/// Handlers run on the publishing thread, in subscription order. No lock is
/// held while they run, so a handler may itself subscribe or publish.
#[derive(Default)]
pub struct Signals {
    handlers: RwLock<HashMap<String, Vec<SignalHandler>>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(name.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Deliver `signal` to every subscriber of its name. Returns how many ran.
    pub fn publish(&self, signal: Signal) -> usize {
        let handlers: Vec<SignalHandler> = self
            .handlers
            .read()
            .get(&signal.name)
            .cloned()
            .unwrap_or_default();

        tracing::debug!(signal = %signal.name, subscribers = handlers.len(), "Publishing signal");

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&signal))).is_err() {
                tracing::error!(signal = %signal.name, "Signal handler panicked");
            }
        }
        handlers.len()
    }

    /// Publish a signal with no payload
    pub fn emit(&self, name: &str) -> usize {
        self.publish(Signal::new(name))
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.handlers.read().get(name).map(Vec::len).unwrap_or(0)
    }
}
