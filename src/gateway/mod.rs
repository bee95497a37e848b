// ABOUTME: Gateway adapter abstraction for protocol-agnostic message routing.
// ABOUTME: Defines the GatewayAdapter trait that all chat transports implement.

pub mod console;
pub mod registry;

use async_trait::async_trait;

use crate::bus::MessageBus;

pub use console::ConsoleGateway;
pub use registry::GatewayRegistry;

/// Trait for chat transport adapters. Each adapter translates between
/// transport-native events and bus types: inbound lines become
/// `InboundEvent`s, and outbound actions from its client go back out.
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    /// Unique platform identifier (e.g., "console", "irc")
    fn platform_id(&self) -> &str;

    /// Run the adapter until its input ends or `stop` is called.
    async fn start(&self, bus: MessageBus) -> anyhow::Result<()>;

    /// Send a line to a channel directly, bypassing plugins.
    async fn send(&self, channel: &str, text: &str) -> anyhow::Result<()>;

    /// Graceful shutdown. Pending outbound actions are flushed first.
    async fn stop(&self) -> anyhow::Result<()>;
}
