// ABOUTME: Platform-agnostic plugin dispatch engine for chat bots
// ABOUTME: Registry, plugin descriptors, command parsing and channel policy

pub mod builtin;
pub mod client;
pub mod command;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod plugin;
pub mod policy;
pub mod registry;
pub mod settings;
pub mod signals;
pub mod source;
pub mod testing;

pub use client::{Client, SharedClient};
pub use command::{CommandParser, CommandSpec, ParsedCommand};
pub use error::PluginError;
pub use matcher::MatchSpec;
pub use plugin::{
    CommandCall, MatchCall, MessageContext, Plugin, PluginChain, PluginDescriptor, PluginKind,
    PluginLike, Priority, Response,
};
pub use registry::{LoadSummary, ReloadOutcome, Registry};
pub use settings::{BotnickPrefix, DispatchSettings, NameSelection};
pub use signals::{Signal, Signals};
pub use source::{PluginRef, PluginSource, PluginTable};
