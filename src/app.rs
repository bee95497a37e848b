// ABOUTME: Composition root helpers: registry construction and metrics recorder setup
// ABOUTME: The registry is built once per process and shared with every gateway

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parley_core::builtin::builtin_table;
use parley_core::{DispatchSettings, PluginTable, Registry};
use std::sync::Arc;

/// Build the process registry over the built-in plugins.
pub fn build_registry(settings: DispatchSettings) -> Arc<Registry> {
    build_registry_with(settings, |_| {})
}

/// Build the process registry, letting `extend` add plugins to the table
/// next to the built-ins. Built-ins hold a weak handle back to the registry.
pub fn build_registry_with<F>(settings: DispatchSettings, extend: F) -> Arc<Registry>
where
    F: FnOnce(&mut PluginTable),
{
    Arc::new_cyclic(|weak| {
        let mut table = builtin_table(weak.clone());
        extend(&mut table);
        tracing::debug!(plugins = ?table.names(), "Plugin table assembled");
        Registry::new(settings, table)
    })
}

/// Install the global Prometheus recorder for the dispatch counters.
pub fn install_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus metrics recorder")
}
