// ABOUTME: Per-channel plugin enablement layered over process-wide whitelist/blacklist/defaults
// ABOUTME: Unseen channels are lazily materialized from the default set on first access

use std::collections::{BTreeSet, HashMap};

use crate::settings::DispatchSettings;

/// Which plugins are active on which channel.
///
/// The whitelist, blacklist and default sets are fixed at construction.
/// `enable`/`disable` only ever touch a single channel's set, and `enable`
/// never admits a blacklisted name.
#[derive(Debug, Clone, Default)]
pub struct ChannelPolicy {
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
    defaults: BTreeSet<String>,
    enabled: HashMap<String, BTreeSet<String>>,
}

impl ChannelPolicy {
    pub fn new(
        whitelist: BTreeSet<String>,
        blacklist: BTreeSet<String>,
        defaults: BTreeSet<String>,
    ) -> Self {
        Self {
            whitelist,
            blacklist,
            defaults,
            enabled: HashMap::new(),
        }
    }

    /// Derive the three name sets from settings and the plugins a source offers
    pub fn from_settings(settings: &DispatchSettings, available: &BTreeSet<String>) -> Self {
        Self::new(
            settings.enabled_plugins.resolve(available),
            settings.disabled_plugins.resolve(available),
            settings.default_channel_plugins.resolve(available),
        )
    }

    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.whitelist.contains(name)
    }

    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.contains(name)
    }

    /// May this plugin be loaded at all
    pub fn is_available(&self, name: &str) -> bool {
        self.is_whitelisted(name) && !self.is_blacklisted(name)
    }

    /// `(defaults ∩ whitelist) − blacklist`
    pub fn default_set(&self) -> BTreeSet<String> {
        self.defaults
            .intersection(&self.whitelist)
            .filter(|name| !self.blacklist.contains(*name))
            .cloned()
            .collect()
    }

    fn channel_mut(&mut self, channel: &str) -> &mut BTreeSet<String> {
        if !self.enabled.contains_key(channel) {
            let defaults = self.default_set();
            tracing::debug!(channel = %channel, plugins = defaults.len(), "Materializing default plugins for channel");
            self.enabled.insert(channel.to_string(), defaults);
        }
        self.enabled.entry(channel.to_string()).or_default()
    }

    pub fn is_enabled(&mut self, channel: &str, name: &str) -> bool {
        self.channel_mut(channel).contains(name)
    }

    pub fn effective_set(&mut self, channel: &str) -> BTreeSet<String> {
        self.channel_mut(channel).clone()
    }

    /// Add plugins to one channel. Blacklisted names are refused and returned.
    pub fn enable<I, S>(&mut self, channel: &str, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (allowed, refused): (Vec<String>, Vec<String>) = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .partition(|n| !self.blacklist.contains(n));

        let set = self.channel_mut(channel);
        set.extend(allowed);

        if !refused.is_empty() {
            tracing::debug!(channel = %channel, refused = ?refused, "Refusing to enable blacklisted plugins");
        }
        refused
    }

    pub fn disable<I, S>(&mut self, channel: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = self.channel_mut(channel);
        for name in names {
            set.remove(name.as_ref());
        }
    }

    /// Channels that have been referenced so far
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.enabled.keys().cloned().collect();
        channels.sort();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::NameSelection;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn policy() -> ChannelPolicy {
        ChannelPolicy::new(
            set(&["help", "manager", "facts", "jokes"]),
            set(&["jokes"]),
            set(&["help", "jokes", "weather"]),
        )
    }

    #[test]
    fn test_untouched_channel_gets_default_set() {
        let mut policy = policy();
        assert_eq!(policy.effective_set("#new"), set(&["help"]));
        assert_eq!(policy.default_set(), set(&["help"]));
    }

    #[test]
    fn test_disable_then_enable_restores() {
        let mut policy = policy();
        policy.disable("#bots", ["help"]);
        assert!(!policy.is_enabled("#bots", "help"));
        policy.enable("#bots", ["help"]);
        assert!(policy.is_enabled("#bots", "help"));
    }

    #[test]
    fn test_enable_outside_default_set() {
        let mut policy = policy();
        policy.disable("#bots", ["facts"]);
        policy.enable("#bots", ["facts"]);
        assert!(policy.effective_set("#bots").contains("facts"));
    }

    #[test]
    fn test_enable_refuses_blacklisted() {
        let mut policy = policy();
        let refused = policy.enable("#bots", ["jokes", "facts"]);
        assert_eq!(refused, vec!["jokes".to_string()]);
        assert!(!policy.is_enabled("#bots", "jokes"));
        assert!(policy.is_enabled("#bots", "facts"));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut policy = policy();
        policy.disable("#a", ["help"]);
        assert!(!policy.is_enabled("#a", "help"));
        assert!(policy.is_enabled("#b", "help"));
        assert_eq!(policy.channels(), vec!["#a".to_string(), "#b".to_string()]);
    }

    #[test]
    fn test_enable_does_not_touch_process_sets() {
        let mut policy = policy();
        policy.enable("#a", ["brand-new"]);
        assert!(!policy.is_whitelisted("brand-new"));
        assert_eq!(policy.default_set(), set(&["help"]));
    }

    #[test]
    fn test_from_settings() {
        let settings = DispatchSettings {
            enabled_plugins: NameSelection::Flag(true),
            disabled_plugins: NameSelection::Names(vec!["b".into()]),
            default_channel_plugins: NameSelection::Names(vec!["a".into(), "b".into()]),
            ..Default::default()
        };
        let mut policy = ChannelPolicy::from_settings(&settings, &set(&["a", "b", "c"]));
        assert!(policy.is_available("a"));
        assert!(!policy.is_available("b"));
        assert!(!policy.is_available("zzz"));
        assert_eq!(policy.effective_set("#x"), set(&["a"]));
    }
}
