// ABOUTME: Built-in help, plugin manager and operator plugins
// ABOUTME: Each holds a weak registry handle and is registered through a normal PluginTable

use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use std::sync::{Arc, Weak};

use crate::plugin::{CommandCall, PluginDescriptor, PluginLike, Response};
use crate::registry::Registry;
use crate::source::PluginTable;

pub const HELP: &str = "help";
pub const MANAGER: &str = "manager";
pub const OPERATOR: &str = "operator";

const ACKS: &[&str] = &[
    "roger that",
    "10-4",
    "no problem",
    "got it",
    "on it",
    "you got it",
    "sure thing",
    "okie dokie",
    "consider it done",
];

/// A short acknowledgement line
pub fn random_ack() -> String {
    ACKS.choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("ok")
        .to_string()
}

fn upgrade(registry: &Weak<Registry>) -> Result<Arc<Registry>> {
    registry
        .upgrade()
        .ok_or_else(|| anyhow!("plugin registry has been dropped"))
}

/// Table offering the three built-ins under their catalog names
pub fn builtin_table(registry: Weak<Registry>) -> PluginTable {
    let mut table = PluginTable::new("builtin");
    add_builtins(&mut table, registry);
    table
}

/// Add the built-ins to an existing table (alongside user plugins)
pub fn add_builtins(table: &mut PluginTable, registry: Weak<Registry>) {
    let weak = registry.clone();
    table.insert(HELP, move || Ok(PluginLike::from(help_plugin(weak.clone()))));
    let weak = registry.clone();
    table.insert(MANAGER, move || {
        Ok(PluginLike::from(manager_plugin(weak.clone())))
    });
    table.insert(OPERATOR, move || {
        Ok(PluginLike::from(operator_plugin(registry.clone())))
    });
}

// =============================================================================
// help
// =============================================================================

pub fn help_plugin(registry: Weak<Registry>) -> PluginDescriptor {
    PluginDescriptor::command("help")
        .aliases(["halp"])
        .help("Show help for a plugin, or list all commands. Usage: !help [<plugin>]")
        .handler(move |call| {
            let registry = upgrade(&registry)?;
            match call.arg(0) {
                None => Ok(Response::Immediate(command_overview(&registry, call))),
                Some(name) => Ok(plugin_help(&registry, call, name)),
            }
        })
}

fn command_overview(registry: &Registry, call: &CommandCall<'_>) -> Vec<String> {
    let prefix = &registry.settings().command_prefix_char;
    let mut lines: Vec<String> = registry
        .prioritized(call.channel(), true)
        .iter()
        .filter_map(|descriptor| {
            let spec = descriptor.command_spec()?;
            Some(if descriptor.help().is_empty() {
                format!("{}{}", prefix, spec.command())
            } else {
                format!("{}{} - {}", prefix, spec.command(), descriptor.help())
            })
        })
        .collect();
    lines.sort();
    lines.dedup();
    lines
}

fn plugin_help(registry: &Registry, call: &CommandCall<'_>, name: &str) -> Response {
    let unknown = || Response::text(format!("Sorry {}, I don't know about that plugin", call.nick()));

    if !registry.is_enabled(call.channel(), name) {
        return unknown();
    }
    let Some(descriptors) = registry.get(name) else {
        return unknown();
    };

    let helps: Vec<String> = descriptors
        .iter()
        .map(|d| d.help().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    if helps.is_empty() {
        Response::text(format!("{}: no help available", name))
    } else {
        Response::lines(helps.into_iter().map(|h| format!("{}: {}", name, h)))
    }
}

// =============================================================================
// manager
// =============================================================================

pub fn manager_plugin(registry: Weak<Registry>) -> PluginDescriptor {
    PluginDescriptor::command("plugins")
        .help("Plugin management. Usage: !plugins (list|enable <plugin>...|disable <plugin>...)")
        .handler(move |call| {
            let registry = upgrade(&registry)?;
            let names = call.args.get(1..).unwrap_or_default();
            match call.arg(0).unwrap_or("list") {
                "list" => Ok(list_plugins(&registry, call.channel())),
                "enable" if !names.is_empty() => Ok(enable_plugins(&registry, call, names)),
                "disable" if !names.is_empty() => Ok(disable_plugins(&registry, call, names)),
                "enable" | "disable" => Ok(Response::text(format!(
                    "Sorry {}, which plugins?",
                    call.nick()
                ))),
                other => Ok(Response::text(format!(
                    "Sorry {}, I don't know how to '{}'",
                    call.nick(),
                    other
                ))),
            }
        })
}

fn list_plugins(registry: &Registry, channel: &str) -> Response {
    let join = |names: std::collections::BTreeSet<String>| {
        names.into_iter().collect::<Vec<_>>().join(", ")
    };
    Response::lines([
        format!(
            "Plugins enabled on this channel: {}",
            join(registry.enabled_plugins(channel))
        ),
        format!("Available plugins: {}", join(registry.disabled_plugins(channel))),
    ])
}

fn enable_plugins(registry: &Registry, call: &CommandCall<'_>, names: &[String]) -> Response {
    let rejected = registry.enable(call.channel(), names);
    let mut lines = Vec::new();
    if rejected.len() < names.len() {
        lines.push(random_ack());
    }
    if !rejected.is_empty() {
        lines.push(format!(
            "Sorry {}, can't enable: {}",
            call.nick(),
            rejected.join(", ")
        ));
    }
    Response::Immediate(lines)
}

fn disable_plugins(registry: &Registry, call: &CommandCall<'_>, names: &[String]) -> Response {
    let (known, unknown): (Vec<&String>, Vec<&String>) =
        names.iter().partition(|n| registry.is_loaded(n));

    let mut lines = Vec::new();
    if !known.is_empty() {
        registry.disable(call.channel(), &known);
        lines.push(random_ack());
    }
    if !unknown.is_empty() {
        let unknown: Vec<&str> = unknown.iter().map(|s| s.as_str()).collect();
        lines.push(format!(
            "Sorry {}, unknown plugins: {}",
            call.nick(),
            unknown.join(", ")
        ));
    }
    Response::Immediate(lines)
}

// =============================================================================
// operator
// =============================================================================

const OPERATOR_USAGE: &str =
    "Usage: !operator (reload <plugin>|join <channel>|leave <channel>)";

pub fn operator_plugin(registry: Weak<Registry>) -> PluginDescriptor {
    PluginDescriptor::command("operator")
        .aliases(["oper", "op"])
        .help(format!("Bot operator commands. {}", OPERATOR_USAGE))
        .handler(move |call| {
            if !call.client.is_operator(call.nick()) {
                return Ok(Response::text(format!(
                    "Sorry {}, Operators only",
                    call.nick()
                )));
            }

            let (Some(subcommand), Some(target)) = (call.arg(0), call.arg(1)) else {
                return Ok(Response::text(OPERATOR_USAGE));
            };

            match subcommand {
                "reload" => {
                    let registry = upgrade(&registry)?;
                    let outcome = registry.reload(target);
                    tracing::info!(nick = %call.nick(), plugin = %target, ok = outcome.ok, "Operator reload");
                    Ok(Response::text(outcome.message))
                }
                "join" => {
                    call.client.join(target)?;
                    Ok(Response::text(random_ack()))
                }
                "leave" => {
                    call.client.leave(target)?;
                    Ok(Response::text(random_ack()))
                }
                _ => Ok(Response::text(OPERATOR_USAGE)),
            }
        })
}
