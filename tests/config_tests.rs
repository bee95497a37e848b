// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, lookup order, env var overrides, and validation errors

use parley::config::{Config, CONFIG_PATH_ENV};
use parley_core::{BotnickPrefix, NameSelection};
use serial_test::serial;
use std::io::Write;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    CONFIG_PATH_ENV,
    "PARLEY_NICK",
    "PARLEY_OPERATORS",
    "PARLEY_CHANNELS",
    "ENABLED_PLUGINS",
    "DISABLED_PLUGINS",
    "DEFAULT_CHANNEL_PLUGINS",
    "PLUGIN_FIRST_RESPONDER_ONLY",
    "COMMAND_PREFIX_BOTNICK",
    "COMMAND_PREFIX_CHAR",
    "COMMAND_ARGS_SHLEX",
    "COMMAND_IGNORECASE",
    "PLUGIN_PRIORITY_LOW",
    "PLUGIN_PRIORITY_NORMAL",
    "PLUGIN_PRIORITY_HIGH",
];

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("parley.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

const FULL_CONFIG: &str = r##"
[bot]
nick = "helga"
operators = ["alice"]
channels = ["#bots", "#dev"]

[plugins]
enabled_plugins = ["help", "manager", "facts"]
disabled_plugins = false
default_channel_plugins = ["help"]
first_responder_only = true
command_prefix_botnick = "robot"
command_prefix_char = "."
priority_high = 90

[metrics]
enabled = true
"##;

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&temp_dir, FULL_CONFIG);

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.bot.nick, "helga");
    assert_eq!(config.bot.channels, vec!["#bots", "#dev"]);
    assert!(config.operators_set().contains("alice"));
    assert_eq!(
        config.plugins.enabled_plugins,
        NameSelection::Names(vec!["help".into(), "manager".into(), "facts".into()])
    );
    assert_eq!(config.plugins.disabled_plugins, NameSelection::Flag(false));
    assert!(config.plugins.first_responder_only);
    assert_eq!(
        config.plugins.command_prefix_botnick,
        BotnickPrefix::Literal("robot".into())
    );
    assert_eq!(config.plugins.command_prefix_char, ".");
    assert_eq!(config.plugins.priority_high, 90);
    assert_eq!(config.plugins.priority_normal, 50);
    assert!(config.metrics.enabled);
}

#[test]
#[serial]
fn test_config_path_env_var() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&temp_dir, "[bot]\nnick = \"fromenv\"\n");

    std::env::set_var(CONFIG_PATH_ENV, path.to_str().unwrap());
    assert_eq!(Config::locate(None), Some(path.clone()));
    let config = Config::load(None).unwrap();
    assert_eq!(config.bot.nick, "fromenv");

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let explicit = write_config(&temp_dir, "[bot]\nnick = \"explicit\"\n");

    std::env::set_var(CONFIG_PATH_ENV, "/nonexistent/parley.toml");
    let config = Config::load(Some(&explicit)).unwrap();
    assert_eq!(config.bot.nick, "explicit");

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_config_env_vars();
    let err = Config::load(Some(std::path::Path::new("/nonexistent/parley.toml"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_config_env_var_overrides() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&temp_dir, FULL_CONFIG);

    std::env::set_var("PARLEY_NICK", "override");
    std::env::set_var("PARLEY_OPERATORS", "carol, dave");
    std::env::set_var("DISABLED_PLUGINS", "facts");
    std::env::set_var("PLUGIN_FIRST_RESPONDER_ONLY", "false");
    std::env::set_var("COMMAND_PREFIX_BOTNICK", "true");
    std::env::set_var("PLUGIN_PRIORITY_LOW", "5");

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.bot.nick, "override");
    assert_eq!(config.bot.operators, vec!["carol", "dave"]);
    assert_eq!(
        config.plugins.disabled_plugins,
        NameSelection::Names(vec!["facts".into()])
    );
    assert!(!config.plugins.first_responder_only);
    assert_eq!(config.plugins.command_prefix_botnick, BotnickPrefix::Enabled(true));
    assert_eq!(config.plugins.priority_low, 5);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_numeric_override_fails() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&temp_dir, FULL_CONFIG);

    std::env::set_var("PLUGIN_PRIORITY_NORMAL", "loud");
    let err = Config::load(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("PLUGIN_PRIORITY_NORMAL"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_multi_char_prefix_rejected() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&temp_dir, "[plugins]\ncommand_prefix_char = \"!!\"\n");

    assert!(Config::load(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_blank_nick_rejected() {
    clear_config_env_vars();
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&temp_dir, "[bot]\nnick = \"  \"\n");

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("bot.nick is required"));
}

#[test]
fn test_defaults_without_file() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.bot.nick, "parley");
    assert!(config.bot.channels.is_empty());
    assert_eq!(config.plugins.command_prefix_char, "!");
    assert!(config.plugins.command_ignorecase);
    assert!(!config.metrics.enabled);
    config.validate().unwrap();
}
