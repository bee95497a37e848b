// ABOUTME: Plugin descriptors, chains and the Plugin capability trait
// ABOUTME: Defines the Response tag (NoResponse / Immediate / Deferred) returned by handlers

use anyhow::Result;
use std::fmt;
use std::sync::Arc;

use crate::client::SharedClient;
use crate::command::{CommandParser, CommandSpec};
use crate::error::PluginError;
use crate::matcher::MatchSpec;
use crate::settings::DispatchSettings;

// =============================================================================
// Message and response types
// =============================================================================

/// The `(channel, nick, text)` triple threaded through one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub channel: String,
    pub nick: String,
    pub text: String,
}

impl MessageContext {
    pub fn new(channel: impl Into<String>, nick: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            nick: nick.into(),
            text: text.into(),
        }
    }

    /// Private messages use the sender's nick as the channel
    pub fn is_private(&self) -> bool {
        self.channel == self.nick
    }
}

/// What a plugin's `process` produced for one message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Response {
    /// Nothing to say
    #[default]
    NoResponse,
    /// One or more output lines
    Immediate(Vec<String>),
    /// The plugin will answer later through the client itself
    Deferred,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Immediate(vec![text.into()])
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Immediate(lines.into_iter().map(Into::into).collect())
    }

    /// Trimmed, non-empty output lines. Embedded newlines start a new line.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Immediate(lines) => lines
                .iter()
                .flat_map(|line| line.lines())
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
            Self::NoResponse | Self::Deferred => Vec::new(),
        }
    }
}

impl From<&str> for Response {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Response {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Vec<String>> for Response {
    fn from(lines: Vec<String>) -> Self {
        Self::Immediate(lines)
    }
}

impl From<Option<String>> for Response {
    fn from(text: Option<String>) -> Self {
        text.map(Self::text).unwrap_or_default()
    }
}

impl From<Vec<Option<String>>> for Response {
    fn from(lines: Vec<Option<String>>) -> Self {
        Self::Immediate(lines.into_iter().flatten().collect())
    }
}

/// Arguments handed to a command handler
pub struct CommandCall<'a> {
    pub client: &'a SharedClient,
    pub message: &'a MessageContext,
    /// The command or alias the user typed
    pub command: &'a str,
    pub args: &'a [String],
}

impl CommandCall<'_> {
    pub fn channel(&self) -> &str {
        &self.message.channel
    }

    pub fn nick(&self) -> &str {
        &self.message.nick
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|s| s.as_str())
    }
}

/// Arguments handed to a match handler
pub struct MatchCall<'a> {
    pub client: &'a SharedClient,
    pub message: &'a MessageContext,
    pub matches: &'a [String],
}

impl MatchCall<'_> {
    pub fn channel(&self) -> &str {
        &self.message.channel
    }

    pub fn nick(&self) -> &str {
        &self.message.nick
    }
}

pub type CommandHandler = Arc<dyn Fn(&CommandCall<'_>) -> Result<Response> + Send + Sync>;
pub type MatchHandler = Arc<dyn Fn(&MatchCall<'_>) -> Result<Response> + Send + Sync>;
pub type PreprocessHandler =
    Arc<dyn Fn(&SharedClient, MessageContext) -> Result<MessageContext> + Send + Sync>;
pub type GenericHandler =
    Arc<dyn Fn(&SharedClient, &MessageContext) -> Result<Response> + Send + Sync>;

// =============================================================================
// Plugin capability trait
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Generic,
    Command,
    Match,
    Preprocessor,
}

/// Execution order hint. Named tiers map to configurable numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
    Value(i32),
}

/// Base capability set for hand-written plugin types.
///
/// `process` decides whether the plugin applies and defaults to calling `run`.
/// `preprocess` may rewrite the message before any plugin processes it.
pub trait Plugin: Send + Sync {
    fn kind(&self) -> PluginKind {
        PluginKind::Generic
    }

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    fn help(&self) -> String {
        String::new()
    }

    fn run(&self, _client: &SharedClient, _message: &MessageContext) -> Result<Response> {
        Ok(Response::NoResponse)
    }

    fn preprocess(&self, _client: &SharedClient, message: MessageContext) -> Result<MessageContext> {
        Ok(message)
    }

    fn process(&self, client: &SharedClient, message: &MessageContext) -> Result<Response> {
        self.run(client, message)
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// The callable half of a descriptor
#[derive(Clone)]
pub enum Behavior {
    Command {
        spec: Arc<CommandSpec>,
        handler: CommandHandler,
    },
    Match {
        pattern: MatchSpec,
        handler: MatchHandler,
    },
    Preprocessor(PreprocessHandler),
    Generic(GenericHandler),
    Object(Arc<dyn Plugin>),
}

/// Immutable metadata plus behavior for one handler.
///
/// The catalog name is stamped in by `Registry::register`; the numeric
/// priority is resolved against the registry's configured tiers at the same
/// time.
#[derive(Clone)]
pub struct PluginDescriptor {
    name: String,
    kind: PluginKind,
    priority: Priority,
    resolved_priority: i32,
    help: String,
    behavior: Behavior,
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("priority", &self.resolved_priority)
            .field("command", &self.command_spec().map(|s| s.command()))
            .finish()
    }
}

impl PluginDescriptor {
    fn from_behavior(kind: PluginKind, priority: Priority, help: String, behavior: Behavior) -> Self {
        Self {
            name: String::new(),
            kind,
            priority,
            resolved_priority: 0,
            help,
            behavior,
        }
    }

    /// Start a command plugin answering to `command`
    pub fn command(command: impl Into<String>) -> CommandBuilder {
        CommandBuilder {
            spec: CommandSpec::new(command),
            help: String::new(),
            priority: Priority::Normal,
        }
    }

    /// Start a match plugin for `pattern`
    pub fn matcher(pattern: MatchSpec) -> MatchBuilder {
        MatchBuilder {
            pattern,
            help: String::new(),
            priority: Priority::Low,
        }
    }

    pub fn preprocessor() -> PreprocessorBuilder {
        PreprocessorBuilder {
            priority: Priority::Normal,
        }
    }

    /// A plugin that sees every message and decides for itself
    pub fn generic<F>(handler: F) -> Self
    where
        F: Fn(&SharedClient, &MessageContext) -> Result<Response> + Send + Sync + 'static,
    {
        Self::from_behavior(
            PluginKind::Generic,
            Priority::Normal,
            String::new(),
            Behavior::Generic(Arc::new(handler)),
        )
    }

    /// Wrap a hand-written [`Plugin`] implementation
    pub fn object(plugin: Arc<dyn Plugin>) -> Self {
        Self::from_behavior(
            plugin.kind(),
            plugin.priority(),
            plugin.help(),
            Behavior::Object(plugin),
        )
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Numeric priority, higher runs earlier
    pub fn priority(&self) -> i32 {
        self.resolved_priority
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn command_spec(&self) -> Option<&CommandSpec> {
        match &self.behavior {
            Behavior::Command { spec, .. } => Some(spec.as_ref()),
            _ => None,
        }
    }

    /// Stamp the catalog name and resolve the priority tier
    pub(crate) fn bind(&mut self, name: &str, settings: &DispatchSettings) {
        self.name = name.to_string();
        self.resolved_priority = settings.resolve_priority(self.priority);
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), PluginError> {
        if let Some(spec) = self.command_spec() {
            if spec.command().trim().is_empty() {
                return Err(PluginError::invalid(name, "command plugin has an empty command"));
            }
            if spec.command().chars().any(char::is_whitespace) {
                return Err(PluginError::invalid(
                    name,
                    format!("command '{}' contains whitespace", spec.command()),
                ));
            }
            for alias in spec.aliases() {
                if alias.is_empty() || alias.chars().any(char::is_whitespace) {
                    return Err(PluginError::invalid(
                        name,
                        format!("alias {:?} must be a single non-empty word", alias),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Run this descriptor's preprocessing step
    pub fn preprocess(&self, client: &SharedClient, message: MessageContext) -> Result<MessageContext> {
        match &self.behavior {
            Behavior::Preprocessor(handler) => handler(client, message),
            Behavior::Object(plugin) => plugin.preprocess(client, message),
            Behavior::Command { .. } | Behavior::Match { .. } | Behavior::Generic(_) => Ok(message),
        }
    }

    /// Decide whether this descriptor applies to `message` and, if so, run it
    pub fn process(
        &self,
        parser: &CommandParser,
        client: &SharedClient,
        message: &MessageContext,
    ) -> Result<Response> {
        match &self.behavior {
            Behavior::Command { spec, handler } => {
                let Some(parsed) = parser.parse(&client.nickname(), spec, &message.text) else {
                    return Ok(Response::NoResponse);
                };
                handler(&CommandCall {
                    client,
                    message,
                    command: &parsed.token,
                    args: &parsed.args,
                })
            }
            Behavior::Match { pattern, handler } => {
                let Some(matches) = pattern.find(&message.text) else {
                    return Ok(Response::NoResponse);
                };
                handler(&MatchCall {
                    client,
                    message,
                    matches: &matches,
                })
            }
            Behavior::Preprocessor(_) => Ok(Response::NoResponse),
            Behavior::Generic(handler) => handler(client, message),
            Behavior::Object(plugin) => plugin.process(client, message),
        }
    }
}

/// Builder returned by [`PluginDescriptor::command`]
pub struct CommandBuilder {
    spec: CommandSpec,
    help: String,
    priority: Priority,
}

impl CommandBuilder {
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec = self.spec.with_aliases(aliases);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Quote-aware argument splitting for this command
    pub fn shlex(mut self, shlex: bool) -> Self {
        self.spec = self.spec.with_shlex(shlex);
        self
    }

    pub fn handler<F>(self, handler: F) -> PluginDescriptor
    where
        F: Fn(&CommandCall<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        PluginDescriptor::from_behavior(
            PluginKind::Command,
            self.priority,
            self.help,
            Behavior::Command {
                spec: Arc::new(self.spec),
                handler: Arc::new(handler),
            },
        )
    }
}

/// Builder returned by [`PluginDescriptor::matcher`]
pub struct MatchBuilder {
    pattern: MatchSpec,
    help: String,
    priority: Priority,
}

impl MatchBuilder {
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn handler<F>(self, handler: F) -> PluginDescriptor
    where
        F: Fn(&MatchCall<'_>) -> Result<Response> + Send + Sync + 'static,
    {
        PluginDescriptor::from_behavior(
            PluginKind::Match,
            self.priority,
            self.help,
            Behavior::Match {
                pattern: self.pattern,
                handler: Arc::new(handler),
            },
        )
    }
}

/// Builder returned by [`PluginDescriptor::preprocessor`]
pub struct PreprocessorBuilder {
    priority: Priority,
}

impl PreprocessorBuilder {
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn handler<F>(self, handler: F) -> PluginDescriptor
    where
        F: Fn(&SharedClient, MessageContext) -> Result<MessageContext> + Send + Sync + 'static,
    {
        PluginDescriptor::from_behavior(
            PluginKind::Preprocessor,
            self.priority,
            String::new(),
            Behavior::Preprocessor(Arc::new(handler)),
        )
    }
}

// =============================================================================
// Chains and registration shapes
// =============================================================================

/// Several descriptors exported under one plugin name, run in insertion order
#[derive(Debug, Clone, Default)]
pub struct PluginChain {
    descriptors: Vec<PluginDescriptor>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn push(&mut self, descriptor: PluginDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.descriptors.iter()
    }

    pub fn into_descriptors(self) -> Vec<PluginDescriptor> {
        self.descriptors
    }
}

/// Anything `Registry::register` accepts
#[derive(Clone)]
pub enum PluginLike {
    Descriptor(PluginDescriptor),
    Chain(PluginChain),
    Object(Arc<dyn Plugin>),
}

impl From<PluginDescriptor> for PluginLike {
    fn from(descriptor: PluginDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl From<PluginChain> for PluginLike {
    fn from(chain: PluginChain) -> Self {
        Self::Chain(chain)
    }
}

impl From<Arc<dyn Plugin>> for PluginLike {
    fn from(plugin: Arc<dyn Plugin>) -> Self {
        Self::Object(plugin)
    }
}

impl PluginLike {
    /// Flatten into validated descriptors bound to `name`
    pub(crate) fn into_descriptors(
        self,
        name: &str,
        settings: &DispatchSettings,
    ) -> Result<Vec<PluginDescriptor>, PluginError> {
        if name.trim().is_empty() {
            return Err(PluginError::invalid(name, "plugin name must not be empty"));
        }

        let mut descriptors = match self {
            Self::Descriptor(descriptor) => vec![descriptor],
            Self::Chain(chain) => {
                if chain.is_empty() {
                    return Err(PluginError::invalid(name, "plugin chain is empty"));
                }
                chain.into_descriptors()
            }
            Self::Object(plugin) => vec![PluginDescriptor::object(plugin)],
        };

        for descriptor in &mut descriptors {
            descriptor.validate(name)?;
            descriptor.bind(name, settings);
        }
        Ok(descriptors)
    }
}
