// ABOUTME: Dispatch engine settings: plugin gates, command prefixes, priority tiers
// ABOUTME: Deserializes from the [plugins] TOML table and accepts environment overrides

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::plugin::Priority;

/// A plugin name gate that is either a blanket on/off or an explicit list.
///
/// `true` means "every available plugin", `false` means "none".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameSelection {
    Flag(bool),
    Names(Vec<String>),
}

impl NameSelection {
    /// Concrete name set given the plugins a source can provide
    pub fn resolve(&self, available: &BTreeSet<String>) -> BTreeSet<String> {
        match self {
            Self::Flag(true) => available.clone(),
            Self::Flag(false) => BTreeSet::new(),
            Self::Names(names) => names.iter().cloned().collect(),
        }
    }

    /// Parse `true`, `false` or a comma separated list
    fn parse_env(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Self::Flag(true),
            "false" | "no" | "0" | "" => Self::Flag(false),
            _ => Self::Names(
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        }
    }
}

/// How a message may address the bot by name before a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BotnickPrefix {
    /// Use (or don't use) the live nickname
    Enabled(bool),
    /// Use this string verbatim instead of the live nickname
    Literal(String),
}

impl Default for BotnickPrefix {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub enabled_plugins: NameSelection,
    pub disabled_plugins: NameSelection,
    pub default_channel_plugins: NameSelection,
    /// Stop at the first plugin that answers (or promises to)
    pub first_responder_only: bool,
    pub command_prefix_botnick: BotnickPrefix,
    pub command_prefix_char: String,
    pub command_args_shlex: bool,
    pub command_ignorecase: bool,
    pub priority_low: i32,
    pub priority_normal: i32,
    pub priority_high: i32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            enabled_plugins: NameSelection::Flag(true),
            disabled_plugins: NameSelection::Flag(false),
            default_channel_plugins: NameSelection::Flag(true),
            first_responder_only: false,
            command_prefix_botnick: BotnickPrefix::default(),
            command_prefix_char: default_prefix_char(),
            command_args_shlex: false,
            command_ignorecase: true,
            priority_low: 25,
            priority_normal: 50,
            priority_high: 75,
        }
    }
}

fn default_prefix_char() -> String {
    "!".to_string()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => bail!("{} must be true or false, got: {}", key, value),
    }
}

fn parse_int(key: &str, value: &str) -> Result<i32> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a valid integer, got: {}", key, value))
}

impl DispatchSettings {
    /// Numeric value of a priority tier
    pub fn resolve_priority(&self, priority: Priority) -> i32 {
        match priority {
            Priority::Low => self.priority_low,
            Priority::Normal => self.priority_normal,
            Priority::High => self.priority_high,
            Priority::Value(value) => value,
        }
    }

    /// Apply overrides named after the classic option keys
    /// (`ENABLED_PLUGINS`, `COMMAND_PREFIX_CHAR`, ...).
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("ENABLED_PLUGINS") {
            self.enabled_plugins = NameSelection::parse_env(&val);
        }
        if let Some(val) = lookup("DISABLED_PLUGINS") {
            self.disabled_plugins = NameSelection::parse_env(&val);
        }
        if let Some(val) = lookup("DEFAULT_CHANNEL_PLUGINS") {
            self.default_channel_plugins = NameSelection::parse_env(&val);
        }
        if let Some(val) = lookup("PLUGIN_FIRST_RESPONDER_ONLY") {
            self.first_responder_only = parse_bool("PLUGIN_FIRST_RESPONDER_ONLY", &val)?;
        }
        if let Some(val) = lookup("COMMAND_PREFIX_BOTNICK") {
            self.command_prefix_botnick = match parse_bool("COMMAND_PREFIX_BOTNICK", &val) {
                Ok(flag) => BotnickPrefix::Enabled(flag),
                Err(_) => BotnickPrefix::Literal(val.trim().to_string()),
            };
        }
        if let Some(val) = lookup("COMMAND_PREFIX_CHAR") {
            self.command_prefix_char = val.trim().to_string();
        }
        if let Some(val) = lookup("COMMAND_ARGS_SHLEX") {
            self.command_args_shlex = parse_bool("COMMAND_ARGS_SHLEX", &val)?;
        }
        if let Some(val) = lookup("COMMAND_IGNORECASE") {
            self.command_ignorecase = parse_bool("COMMAND_IGNORECASE", &val)?;
        }
        if let Some(val) = lookup("PLUGIN_PRIORITY_LOW") {
            self.priority_low = parse_int("PLUGIN_PRIORITY_LOW", &val)?;
        }
        if let Some(val) = lookup("PLUGIN_PRIORITY_NORMAL") {
            self.priority_normal = parse_int("PLUGIN_PRIORITY_NORMAL", &val)?;
        }
        if let Some(val) = lookup("PLUGIN_PRIORITY_HIGH") {
            self.priority_high = parse_int("PLUGIN_PRIORITY_HIGH", &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_prefix_char.chars().count() > 1 {
            bail!(
                "command_prefix_char must be a single character, got: {:?}",
                self.command_prefix_char
            );
        }
        if let BotnickPrefix::Literal(literal) = &self.command_prefix_botnick {
            if literal.trim().is_empty() {
                bail!("command_prefix_botnick must be true, false or a non-empty string");
            }
        }
        if self.command_prefix_char.is_empty()
            && self.command_prefix_botnick == BotnickPrefix::Enabled(false)
        {
            tracing::warn!("Both command prefixes are disabled; no command plugin can match");
        }
        Ok(())
    }
}
