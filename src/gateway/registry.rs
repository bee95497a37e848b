// ABOUTME: Registry that manages gateway adapter lifecycle.
// ABOUTME: Handles registration, concurrent startup, and coordinated shutdown of all adapters.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::GatewayAdapter;
use crate::bus::MessageBus;

/// Central registry for all active gateway adapters, keyed by platform_id.
///
/// The plugin registry is not owned here: adapters come and go, while
/// catalog and channel state live for the whole process.
#[derive(Default)]
pub struct GatewayRegistry {
    adapters: HashMap<String, Arc<dyn GatewayAdapter>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. An adapter with the same platform_id is replaced.
    pub fn register(&mut self, adapter: Arc<dyn GatewayAdapter>) {
        let id = adapter.platform_id().to_string();
        tracing::debug!(platform_id = %id, "Registered gateway adapter");
        self.adapters.insert(id, adapter);
    }

    pub fn get(&self, platform_id: &str) -> Option<Arc<dyn GatewayAdapter>> {
        self.adapters.get(platform_id).cloned()
    }

    /// List all registered platform IDs, sorted.
    pub fn platform_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn unregister(&mut self, platform_id: &str) -> Option<Arc<dyn GatewayAdapter>> {
        self.adapters.remove(platform_id)
    }

    /// Start every adapter on its own task. Each task yields the adapter's
    /// platform_id and how its run ended.
    pub fn start_all(&self, bus: &MessageBus) -> JoinSet<(String, anyhow::Result<()>)> {
        let mut running = JoinSet::new();
        for (id, adapter) in &self.adapters {
            let id = id.clone();
            let adapter = Arc::clone(adapter);
            let bus = bus.clone();
            tracing::info!(platform_id = %id, "Starting gateway adapter");
            running.spawn(async move {
                let result = adapter.start(bus).await;
                (id, result)
            });
        }
        running
    }

    /// Stop all registered adapters and clear the registry.
    pub async fn shutdown_all(&mut self) {
        for (id, adapter) in self.adapters.drain() {
            if let Err(e) = adapter.stop().await {
                tracing::error!(platform_id = %id, error = %e, "gateway adapter shutdown failed");
            }
        }
    }
}
