// ABOUTME: Plugin registry: catalog, per-channel policy, load/reload and the dispatch pipeline
// ABOUTME: Preprocess folds preprocessors over the message; Process aggregates plugin responses

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::client::SharedClient;
use crate::command::CommandParser;
use crate::error::PluginError;
use crate::metrics;
use crate::plugin::{MessageContext, PluginDescriptor, PluginLike, Response};
use crate::policy::ChannelPolicy;
use crate::settings::DispatchSettings;
use crate::signals::{self, Signal, Signals};
use crate::source::PluginSource;

/// Descriptors registered under one name, plus the order the name first appeared
struct CatalogEntry {
    seq: u64,
    descriptors: Vec<Arc<PluginDescriptor>>,
}

#[derive(Default)]
struct Catalog {
    entries: HashMap<String, CatalogEntry>,
    next_seq: u64,
}

/// What `Registry::load` did with each candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Result of `Registry::reload`; `message` is meant for the user who asked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub ok: bool,
    pub message: String,
}

impl ReloadOutcome {
    fn failed(message: String) -> Self {
        Self { ok: false, message }
    }
}

/// Owns every loaded plugin and routes messages through them.
///
/// Construct once per process and share it (`Arc<Registry>`) with every
/// protocol adapter; it outlives individual connections so catalog and
/// channel state survive reconnects. No internal lock is held while plugin
/// code runs, so plugins may call back into the registry.
pub struct Registry {
    settings: DispatchSettings,
    parser: CommandParser,
    source: Box<dyn PluginSource>,
    catalog: RwLock<Catalog>,
    policy: Mutex<ChannelPolicy>,
    signals: RwLock<Option<Arc<Signals>>>,
}

impl Registry {
    pub fn new(settings: DispatchSettings, source: impl PluginSource + 'static) -> Self {
        let available: BTreeSet<String> = source
            .list_available()
            .into_iter()
            .map(|r| r.name)
            .collect();
        let policy = ChannelPolicy::from_settings(&settings, &available);

        tracing::debug!(
            available = available.len(),
            defaults = policy.default_set().len(),
            "Plugin registry created"
        );

        Self {
            parser: CommandParser::from_settings(&settings),
            settings,
            source: Box::new(source),
            catalog: RwLock::new(Catalog::default()),
            policy: Mutex::new(policy),
            signals: RwLock::new(None),
        }
    }

    /// Attach to the process signal hub: `started` triggers `load`, and
    /// `load` announces `plugins_loaded` there.
    pub fn listen(self: &Arc<Self>, hub: &Arc<Signals>) {
        *self.signals.write() = Some(Arc::clone(hub));

        let weak: Weak<Registry> = Arc::downgrade(self);
        hub.subscribe(signals::STARTED, move |_| {
            if let Some(registry) = weak.upgrade() {
                registry.load();
            }
        });
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Add (or replace) the plugin exported under `name`.
    ///
    /// Shape validation happens here and only here; a descriptor that makes
    /// it into the catalog is never re-checked at dispatch time.
    pub fn register(&self, name: &str, plugin: impl Into<PluginLike>) -> Result<(), PluginError> {
        let descriptors = plugin.into().into_descriptors(name, &self.settings)?;
        let count = descriptors.len();

        let mut catalog = self.catalog.write();
        let seq = match catalog.entries.get(name) {
            Some(existing) => existing.seq,
            None => {
                catalog.next_seq += 1;
                catalog.next_seq
            }
        };
        catalog.entries.insert(
            name.to_string(),
            CatalogEntry {
                seq,
                descriptors: descriptors.into_iter().map(Arc::new).collect(),
            },
        );

        tracing::info!(plugin = %name, descriptors = count, "Registered plugin");
        Ok(())
    }

    /// Descriptors registered under `name`, in chain order
    pub fn get(&self, name: &str) -> Option<Vec<Arc<PluginDescriptor>>> {
        self.catalog
            .read()
            .entries
            .get(name)
            .map(|entry| entry.descriptors.clone())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.catalog.read().entries.contains_key(name)
    }

    /// Names of every loaded plugin, sorted
    pub fn loaded_names(&self) -> BTreeSet<String> {
        self.catalog.read().entries.keys().cloned().collect()
    }

    /// Ask the plugin source for every candidate and register the ones the
    /// whitelist/blacklist allow. One bad candidate never aborts the rest.
    pub fn load(&self) -> LoadSummary {
        let mut summary = LoadSummary::default();

        for plugin_ref in self.source.list_available() {
            let name = plugin_ref.name.clone();
            {
                let policy = self.policy.lock();
                if policy.is_blacklisted(&name) {
                    tracing::debug!(plugin = %name, "Skipping blacklisted plugin");
                    summary.skipped.push(name);
                    continue;
                }
                if !policy.is_whitelisted(&name) {
                    tracing::debug!(plugin = %name, "Skipping plugin not in whitelist");
                    summary.skipped.push(name);
                    continue;
                }
            }

            let result = self
                .source
                .resolve(&plugin_ref)
                .and_then(|plugin| self.register(&name, plugin));

            match result {
                Ok(()) => {
                    metrics::record_plugin_loaded();
                    summary.loaded.push(name);
                }
                Err(e) => {
                    tracing::error!(plugin = %name, origin = %plugin_ref.origin, error = %e, "Failed to load plugin");
                    metrics::record_load_failure(&name);
                    summary.failed.push(name);
                }
            }
        }

        tracing::info!(
            loaded = summary.loaded.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "Plugins loaded"
        );

        let hub = self.signals.read().clone();
        if let Some(hub) = hub {
            hub.publish(Signal::with_payload(
                signals::PLUGINS_LOADED,
                json!({ "loaded": summary.loaded, "failed": summary.failed }),
            ));
        }

        summary
    }

    /// Re-resolve one plugin from its source and swap it in. On failure the
    /// previously registered version stays active.
    pub fn reload(&self, name: &str) -> ReloadOutcome {
        let Some(plugin_ref) = self.source.find(name) else {
            return ReloadOutcome::failed(
                PluginError::UnknownPlugin(name.to_string()).to_string() + ". Is it installed?",
            );
        };

        if !self.policy.lock().is_available(name) {
            return ReloadOutcome::failed(format!("Plugin '{}' is disabled", name));
        }

        let result = self
            .source
            .resolve(&plugin_ref)
            .and_then(|plugin| self.register(name, plugin));

        match result {
            Ok(()) => {
                tracing::info!(plugin = %name, "Reloaded plugin");
                ReloadOutcome {
                    ok: true,
                    message: format!("Successfully reloaded plugin '{}'", name),
                }
            }
            Err(e) => {
                tracing::warn!(plugin = %name, error = %e, "Reload failed, keeping previous version");
                metrics::record_load_failure(name);
                ReloadOutcome::failed(format!("Failed to reload plugin '{}': {}", name, e))
            }
        }
    }

    // =========================================================================
    // Channel policy
    // =========================================================================

    /// Enable loaded plugins on a channel. Returns the names that were not
    /// enabled because they are not loaded or are blacklisted.
    pub fn enable<S: AsRef<str>>(&self, channel: &str, names: &[S]) -> Vec<String> {
        let loaded = self.loaded_names();
        let (known, mut rejected): (Vec<String>, Vec<String>) = names
            .iter()
            .map(|n| n.as_ref().to_string())
            .partition(|n| loaded.contains(n));

        rejected.extend(self.policy.lock().enable(channel, known));
        rejected
    }

    pub fn disable<S: AsRef<str>>(&self, channel: &str, names: &[S]) {
        self.policy.lock().disable(channel, names);
    }

    pub fn is_enabled(&self, channel: &str, name: &str) -> bool {
        self.policy.lock().is_enabled(channel, name)
    }

    /// Names active on a channel (materializes the default set if unseen)
    pub fn effective_set(&self, channel: &str) -> BTreeSet<String> {
        self.policy.lock().effective_set(channel)
    }

    /// Loaded plugins that are active on `channel`
    pub fn enabled_plugins(&self, channel: &str) -> BTreeSet<String> {
        let effective = self.effective_set(channel);
        self.loaded_names()
            .into_iter()
            .filter(|name| effective.contains(name))
            .collect()
    }

    /// Loaded plugins that are not active on `channel`
    pub fn disabled_plugins(&self, channel: &str) -> BTreeSet<String> {
        let effective = self.effective_set(channel);
        self.loaded_names()
            .into_iter()
            .filter(|name| !effective.contains(name))
            .collect()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Every enabled descriptor on `channel`, chains flattened, sorted by
    /// priority. Equal priorities keep registration order (and chain order
    /// within one name) regardless of direction.
    pub fn prioritized(&self, channel: &str, high_to_low: bool) -> Vec<Arc<PluginDescriptor>> {
        let effective = self.effective_set(channel);
        let catalog = self.catalog.read();

        let mut ordered: Vec<(u64, usize, Arc<PluginDescriptor>)> = effective
            .iter()
            .filter_map(|name| catalog.entries.get(name))
            .flat_map(|entry| {
                entry
                    .descriptors
                    .iter()
                    .enumerate()
                    .map(move |(idx, d)| (entry.seq, idx, Arc::clone(d)))
            })
            .collect();
        drop(catalog);

        ordered.sort_by(|(seq_a, idx_a, a), (seq_b, idx_b, b)| {
            let by_priority = if high_to_low {
                b.priority().cmp(&a.priority())
            } else {
                a.priority().cmp(&b.priority())
            };
            by_priority.then(seq_a.cmp(seq_b)).then(idx_a.cmp(idx_b))
        });

        ordered.into_iter().map(|(_, _, d)| d).collect()
    }

    /// Let every enabled plugin rewrite the message, highest priority first.
    /// A failing preprocessor is skipped and the last good context carries on.
    pub fn preprocess(&self, client: &SharedClient, message: MessageContext) -> MessageContext {
        let mut current = message;

        for plugin in self.prioritized(&current.channel, true) {
            let input = current.clone();
            if let Some(next) = guarded(&plugin, "preprocess", &current, || {
                plugin.preprocess(client, input)
            }) {
                current = next;
            }
        }

        current
    }

    /// Run enabled plugins and collect their output lines.
    ///
    /// With `first_responder_only`, the first plugin that answers (or defers)
    /// ends the pipeline. Otherwise every answer is collected in priority
    /// order and deferred plugins simply contribute nothing.
    pub fn process(&self, client: &SharedClient, message: &MessageContext) -> Vec<String> {
        metrics::record_message_processed();
        let first_only = self.settings.first_responder_only;
        let mut responses = Vec::new();

        for plugin in self.prioritized(&message.channel, true) {
            let Some(response) = guarded(&plugin, "process", message, || {
                plugin.process(&self.parser, client, message)
            }) else {
                continue;
            };

            match response {
                Response::NoResponse => {}
                Response::Deferred => {
                    tracing::debug!(plugin = %plugin.name(), channel = %message.channel, "Plugin deferred its response");
                    metrics::record_deferred(plugin.name());
                    if first_only {
                        break;
                    }
                }
                immediate @ Response::Immediate(_) => {
                    let lines = immediate.into_lines();
                    if lines.is_empty() {
                        continue;
                    }
                    responses.extend(lines);
                    if first_only {
                        break;
                    }
                }
            }
        }

        metrics::record_response_lines(responses.len());
        responses
    }
}

/// Run plugin code, absorbing both errors and panics
fn guarded<T>(
    plugin: &PluginDescriptor,
    stage: &'static str,
    message: &MessageContext,
    f: impl FnOnce() -> anyhow::Result<T>,
) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::error!(
                plugin = %plugin.name(),
                stage,
                channel = %message.channel,
                nick = %message.nick,
                error = %e,
                "Plugin failed"
            );
            metrics::record_plugin_error(plugin.name(), stage);
            None
        }
        Err(panic) => {
            tracing::error!(
                plugin = %plugin.name(),
                stage,
                channel = %message.channel,
                panic = %panic_message(panic.as_ref()),
                "Plugin panicked"
            );
            metrics::record_plugin_error(plugin.name(), stage);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
