// ABOUTME: Client capability handed to plugins by protocol adapters
// ABOUTME: Exposes bot identity, channel state and the outbound send/join/leave operations

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// What a plugin may see of, and do through, the connection it was invoked on.
///
/// Adapters implement this over their transport. Methods take `&self` and must
/// be callable from any thread: a plugin that answers with
/// [`Response::Deferred`](crate::plugin::Response::Deferred) keeps a clone of the
/// [`SharedClient`] and calls [`Client::msg`] later from its own callback.
pub trait Client: Send + Sync {
    /// The bot's current nickname on this connection
    fn nickname(&self) -> String;

    /// Nicks allowed to run operator-only commands
    fn operators(&self) -> HashSet<String>;

    /// Channels the bot currently sits in
    fn channels(&self) -> HashSet<String>;

    /// Last thing `nick` said on `channel`, if the adapter tracks it
    fn last_message(&self, channel: &str, nick: &str) -> Option<String>;

    /// Send a plain message to a channel (or a nick, for private messages)
    fn msg(&self, channel: &str, text: &str) -> Result<()>;

    /// Send an action/emote
    fn me(&self, channel: &str, text: &str) -> Result<()>;

    fn join(&self, channel: &str) -> Result<()>;

    fn leave(&self, channel: &str) -> Result<()>;

    /// Whether `nick` is a bot operator
    fn is_operator(&self, nick: &str) -> bool {
        self.operators().contains(nick)
    }
}

/// Reference-counted client handle threaded through the dispatch pipeline
pub type SharedClient = Arc<dyn Client>;
