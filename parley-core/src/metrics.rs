// ABOUTME: Metric names and recording helpers for the dispatch engine
// ABOUTME: Counters go through the `metrics` facade; no exporter is installed here

/// Messages run through `Registry::process`
pub const MESSAGES_PROCESSED_TOTAL: &str = "parley_messages_processed_total";
/// Output lines returned to adapters
pub const RESPONSE_LINES_TOTAL: &str = "parley_response_lines_total";
/// Plugin errors or panics caught during preprocess/process
pub const PLUGIN_ERRORS_TOTAL: &str = "parley_plugin_errors_total";
/// Plugins that answered with Deferred
pub const DEFERRED_RESPONSES_TOTAL: &str = "parley_deferred_responses_total";
/// Plugins registered by `load`
pub const PLUGINS_LOADED_TOTAL: &str = "parley_plugins_loaded_total";
/// Candidates `load`/`reload` failed to resolve or register
pub const PLUGIN_LOAD_FAILURES_TOTAL: &str = "parley_plugin_load_failures_total";

pub fn record_message_processed() {
    metrics::counter!(MESSAGES_PROCESSED_TOTAL).increment(1);
}

pub fn record_response_lines(count: usize) {
    metrics::counter!(RESPONSE_LINES_TOTAL).increment(count as u64);
}

pub fn record_plugin_error(plugin: &str, stage: &'static str) {
    metrics::counter!(PLUGIN_ERRORS_TOTAL, "plugin" => plugin.to_string(), "stage" => stage)
        .increment(1);
}

pub fn record_deferred(plugin: &str) {
    metrics::counter!(DEFERRED_RESPONSES_TOTAL, "plugin" => plugin.to_string()).increment(1);
}

pub fn record_plugin_loaded() {
    metrics::counter!(PLUGINS_LOADED_TOTAL).increment(1);
}

pub fn record_load_failure(plugin: &str) {
    metrics::counter!(PLUGIN_LOAD_FAILURES_TOTAL, "plugin" => plugin.to_string()).increment(1);
}
