// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Bot identity lives under [bot]; dispatch options under [plugins]
use anyhow::{Context, Result};
use parley_core::DispatchSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::paths;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "PARLEY_CONFIG_PATH";
/// Config file picked up from the working directory
pub const LOCAL_CONFIG_FILE: &str = "parley.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub plugins: DispatchSettings,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_nick")]
    pub nick: String,
    #[serde(default)]
    pub operators: Vec<String>,
    /// Channels to join at signon
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            operators: Vec::new(),
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    #[serde(default)]
    pub enabled: bool,
}

fn default_nick() -> String {
    "parley".to_string()
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Which config file to read: an explicit path, then `PARLEY_CONFIG_PATH`,
    /// then `./parley.toml`, then the XDG config file. None means defaults.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        let xdg = paths::config_file();
        xdg.exists().then_some(xdg)
    }

    /// Load configuration with environment variable overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    /// Apply `PARLEY_*` overrides plus the classic dispatch option names
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PARLEY_NICK") {
            self.bot.nick = val.trim().to_string();
        }
        if let Some(val) = lookup("PARLEY_OPERATORS") {
            self.bot.operators = split_list(&val);
        }
        if let Some(val) = lookup("PARLEY_CHANNELS") {
            self.bot.channels = split_list(&val);
        }
        self.plugins
            .apply_overrides(&lookup)
            .context("Invalid plugin option in environment")
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot.nick.trim().is_empty() {
            anyhow::bail!("bot.nick is required (set in parley.toml or PARLEY_NICK env var)");
        }
        if self.bot.nick.chars().any(char::is_whitespace) {
            anyhow::bail!("bot.nick must not contain whitespace: {:?}", self.bot.nick);
        }
        for channel in &self.bot.channels {
            if channel.trim().is_empty() || channel.chars().any(char::is_whitespace) {
                anyhow::bail!("Invalid channel name in bot.channels: {:?}", channel);
            }
        }
        self.plugins.validate()
    }

    pub fn operators_set(&self) -> HashSet<String> {
        self.bot.operators.iter().cloned().collect()
    }
}
