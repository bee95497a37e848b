// ABOUTME: Line-oriented console gateway: reads "<channel> <nick> <text>" and prints replies
// ABOUTME: Generic over any AsyncBufRead/AsyncWrite pair so tests can drive it in memory

use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_core::signals::{self, Signal, Signals};
use parley_core::{Client, SharedClient};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::bus::{InboundEvent, MessageBus, OutboundAction};
use crate::client::OutboundClient;
use crate::gateway::GatewayAdapter;

/// Channel token marking a private message to the bot
pub const PRIVATE_CHANNEL: &str = "@";

/// Split an input line into `(channel, nick, text)`.
///
/// A channel of `@` is a private message: the channel becomes the nick.
pub fn parse_line(line: &str) -> Option<(String, String, String)> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let channel = parts.next().filter(|s| !s.is_empty())?;
    let nick = parts.next().filter(|s| !s.is_empty())?;
    let text = parts.next().map(str::trim).filter(|s| !s.is_empty())?;

    let channel = if channel == PRIVATE_CHANNEL { nick } else { channel };
    Some((channel.to_string(), nick.to_string(), text.to_string()))
}

/// How an outbound action is printed
pub fn render(action: &OutboundAction, nick: &str) -> String {
    match action {
        OutboundAction::Msg { channel, text } => format!("[{}] {}", channel, text),
        OutboundAction::Me { channel, text } => format!("[{}] * {} {}", channel, nick, text),
        OutboundAction::Join(channel) => format!("-- {} joined {}", nick, channel),
        OutboundAction::Leave(channel) => format!("-- {} left {}", nick, channel),
    }
}

async fn write_line<W>(writer: &Mutex<W>, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn pump_outbound<W>(
    mut rx: mpsc::UnboundedReceiver<OutboundAction>,
    writer: Arc<Mutex<W>>,
    nick: String,
    mut shutdown: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    let mut stopped = *shutdown.borrow();
    while !stopped {
        tokio::select! {
            action = rx.recv() => {
                let Some(action) = action else { break };
                if let Err(e) = write_line(&writer, &render(&action, &nick)).await {
                    tracing::error!(error = %e, "Failed to write console output");
                }
            }
            _ = shutdown.changed() => stopped = true,
        }
    }
    while let Ok(action) = rx.try_recv() {
        if let Err(e) = write_line(&writer, &render(&action, &nick)).await {
            tracing::error!(error = %e, "Failed to write console output");
        }
    }
    tracing::debug!("Console outbound pump stopped");
}

/// Gateway over a pair of byte streams (stdin/stdout by default).
pub struct ConsoleGateway<R, W> {
    client: Arc<OutboundClient>,
    channels: Vec<String>,
    signals: Option<Arc<Signals>>,
    reader: Mutex<Option<R>>,
    writer: Arc<Mutex<W>>,
    outbound: Mutex<Option<mpsc::UnboundedReceiver<OutboundAction>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl ConsoleGateway<BufReader<Stdin>, Stdout> {
    pub fn stdio(nick: &str, operators: HashSet<String>) -> Self {
        Self::new(nick, operators, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(nick: &str, operators: HashSet<String>, reader: R, writer: W) -> Self {
        let (client, outbound) = OutboundClient::new(nick, operators);
        let (shutdown, _) = watch::channel(false);
        Self {
            client: Arc::new(client),
            channels: Vec::new(),
            signals: None,
            reader: Mutex::new(Some(reader)),
            writer: Arc::new(Mutex::new(writer)),
            outbound: Mutex::new(Some(outbound)),
            pump: Mutex::new(None),
            shutdown,
        }
    }

    /// Channels to join at signon
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    /// Publish signon/join events on this hub
    pub fn with_signals(mut self, hub: Arc<Signals>) -> Self {
        self.signals = Some(hub);
        self
    }

    /// Client handle for sending outside the dispatch path
    pub fn client(&self) -> Arc<OutboundClient> {
        Arc::clone(&self.client)
    }

    fn publish(&self, signal: Signal) {
        if let Some(hub) = &self.signals {
            hub.publish(signal);
        }
    }

    fn signon(&self) -> Result<()> {
        let nick = self.client.nickname();
        self.publish(Signal::with_payload(signals::SIGNON, json!({ "nick": nick })));
        for channel in &self.channels {
            self.client
                .join(channel)
                .with_context(|| format!("Failed to join {}", channel))?;
            self.publish(Signal::with_payload(
                signals::JOIN,
                json!({ "nick": nick, "channel": channel }),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<R, W> GatewayAdapter for ConsoleGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn platform_id(&self) -> &str {
        "console"
    }

    async fn start(&self, bus: MessageBus) -> Result<()> {
        let reader = self
            .reader
            .lock()
            .await
            .take()
            .context("console gateway already started")?;
        let outbound = self
            .outbound
            .lock()
            .await
            .take()
            .context("console gateway already started")?;

        let pump = tokio::spawn(pump_outbound(
            outbound,
            Arc::clone(&self.writer),
            self.client.nickname(),
            self.shutdown.subscribe(),
        ));
        *self.pump.lock().await = Some(pump);

        self.signon()?;

        let client: SharedClient = self.client.clone();
        let mut shutdown = self.shutdown.subscribe();
        let mut lines = reader.lines();

        // stop() may already have run before this receiver existed
        let mut stopped = *shutdown.borrow();
        while !stopped {
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read console input")?,
                _ = shutdown.changed() => {
                    stopped = true;
                    continue;
                }
            };
            let Some(line) = line else {
                tracing::info!("Console input closed");
                break;
            };

            let Some((channel, nick, text)) = parse_line(&line) else {
                if !line.trim().is_empty() {
                    tracing::warn!(line = %line, "Ignoring malformed console line, expected: <channel> <nick> <text>");
                }
                continue;
            };

            self.client.observe(&channel, &nick, &text);
            bus.publish(InboundEvent::new(Arc::clone(&client), channel, nick, text))
                .await?;
        }

        for channel in &self.channels {
            self.publish(Signal::with_payload(
                signals::LEFT,
                json!({ "nick": self.client.nickname(), "channel": channel }),
            ));
        }
        Ok(())
    }

    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        write_line(&self.writer, &format!("[{}] {}", channel, text)).await
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.send_replace(true);
        let pump = self.pump.lock().await.take();
        if let Some(pump) = pump {
            pump.await.context("console outbound pump panicked")?;
        }
        Ok(())
    }
}
