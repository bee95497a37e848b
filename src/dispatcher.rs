// ABOUTME: Single consumer of the message bus: runs each event through the plugin registry
// ABOUTME: Preprocess then process, in full and in arrival order, then sends the reply lines

use anyhow::{Context, Result};
use chrono::Utc;
use parley_core::{MessageContext, Registry};
use std::sync::Arc;

use crate::bus::{InboundEvent, InboundReceiver};

/// Drives messages from the bus through a shared `Registry`.
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Consume the bus until every publisher has gone away.
    pub async fn run(self, mut inbound: InboundReceiver) -> Result<()> {
        tracing::info!("Dispatcher started");
        let mut handled = 0usize;
        while let Some(event) = inbound.recv().await {
            self.handle(event).await?;
            handled += 1;
        }
        tracing::info!(handled, "Message bus closed, dispatcher stopping");
        Ok(())
    }

    /// Process one event to completion. Returns the number of lines sent.
    ///
    /// Plugin code is synchronous and may block, so it runs on the blocking
    /// pool; the next event is not started until this one is finished.
    pub async fn handle(&self, event: InboundEvent) -> Result<usize> {
        let InboundEvent {
            client,
            channel,
            nick,
            text,
            received_at,
        } = event;
        let registry = Arc::clone(&self.registry);

        let (client, message, lines) = tokio::task::spawn_blocking(move || {
            let message = registry.preprocess(&client, MessageContext::new(channel, nick, text));
            let lines = registry.process(&client, &message);
            (client, message, lines)
        })
        .await
        .context("dispatch task failed")?;

        let mut sent = 0;
        for line in &lines {
            match client.msg(&message.channel, line) {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(channel = %message.channel, error = %e, "Failed to send response line");
                }
            }
        }

        let latency_ms = (Utc::now() - received_at).num_milliseconds();
        tracing::debug!(
            channel = %message.channel,
            nick = %message.nick,
            lines = sent,
            latency_ms,
            "Message dispatched"
        );
        Ok(sent)
    }
}
