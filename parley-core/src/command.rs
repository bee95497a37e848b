// ABOUTME: Command token and argument parsing for command plugins
// ABOUTME: Handles botnick/char prefixes, longest-first alias matching and shlex-style args

use parking_lot::Mutex;
use regex::Regex;

use crate::settings::{BotnickPrefix, DispatchSettings};

/// The keyword (plus aliases) a command plugin answers to.
#[derive(Debug)]
pub struct CommandSpec {
    command: String,
    aliases: Vec<String>,
    shlex: bool,
    /// Compiled pattern, keyed by its source so a nick change rebuilds it
    cache: Mutex<Option<(String, Regex)>>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            aliases: Vec::new(),
            shlex: false,
            cache: Mutex::new(None),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Request quote-aware argument splitting for this command only
    pub fn with_shlex(mut self, shlex: bool) -> Self {
        self.shlex = shlex;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn shlex(&self) -> bool {
        self.shlex
    }

    /// Primary command followed by aliases, longest first.
    ///
    /// Ordering matters: the regex alternation is leftmost-first, so a short
    /// alias like "b" listed before "bar" would swallow the first letter.
    pub fn choices(&self) -> Vec<&str> {
        let mut choices: Vec<&str> = std::iter::once(self.command.as_str())
            .chain(self.aliases.iter().map(|s| s.as_str()))
            .collect();
        choices.sort_by(|a, b| b.len().cmp(&a.len()));
        choices
    }

    /// True if `token` names this command
    pub fn answers_to(&self, token: &str, ignorecase: bool) -> bool {
        self.choices().into_iter().any(|choice| {
            if ignorecase {
                choice.to_lowercase() == token.to_lowercase()
            } else {
                choice == token
            }
        })
    }
}

/// A command token and its arguments, extracted from one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub token: String,
    pub args: Vec<String>,
}

/// Prefix and tokenization rules shared by every command plugin in a registry.
#[derive(Debug, Clone)]
pub struct CommandParser {
    botnick_prefix: BotnickPrefix,
    char_prefix: String,
    shlex: bool,
    ignorecase: bool,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::from_settings(&DispatchSettings::default())
    }
}

impl CommandParser {
    pub fn from_settings(settings: &DispatchSettings) -> Self {
        Self {
            botnick_prefix: settings.command_prefix_botnick.clone(),
            char_prefix: settings.command_prefix_char.clone(),
            shlex: settings.command_args_shlex,
            ignorecase: settings.command_ignorecase,
        }
    }

    pub fn ignorecase(&self) -> bool {
        self.ignorecase
    }

    /// Regex alternation of accepted message prefixes, or None if no prefix
    /// style is enabled.
    fn prefix_alternation(&self, botnick: &str) -> Option<String> {
        let mut prefixes = Vec::new();

        let nick = match &self.botnick_prefix {
            BotnickPrefix::Enabled(true) => Some(botnick),
            BotnickPrefix::Enabled(false) => None,
            BotnickPrefix::Literal(literal) => Some(literal.as_str()),
        };
        if let Some(nick) = nick.filter(|n| !n.is_empty()) {
            // "helga foo", "helga: foo", "helga ---> foo"
            prefixes.push(format!(r"{}\W+", regex::escape(nick)));
        }

        if !self.char_prefix.is_empty() {
            prefixes.push(regex::escape(&self.char_prefix));
        }

        if prefixes.is_empty() {
            None
        } else {
            Some(prefixes.join("|"))
        }
    }

    fn pattern_source(&self, botnick: &str, spec: &CommandSpec) -> Option<String> {
        let prefixes = self.prefix_alternation(botnick)?;
        let choices = spec
            .choices()
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let token_flags = if self.ignorecase { "?i" } else { "?-i" };
        Some(format!(
            r"(?s)^(?i:{prefixes})({token_flags}:({choices}))(?:$|\s(.*)$)"
        ))
    }

    /// Extract the command token and args if `text` invokes `spec`.
    ///
    /// Returns None when the message does not address this command.
    pub fn parse(&self, botnick: &str, spec: &CommandSpec, text: &str) -> Option<ParsedCommand> {
        let source = self.pattern_source(botnick, spec)?;

        let mut cache = spec.cache.lock();
        let stale = cache.as_ref().map(|(src, _)| src != &source).unwrap_or(true);
        if stale {
            match Regex::new(&source) {
                Ok(re) => *cache = Some((source, re)),
                Err(e) => {
                    tracing::warn!(command = %spec.command, error = %e, "Failed to build command pattern");
                    return None;
                }
            }
        }
        let (_, re) = cache.as_ref()?;

        let caps = re.captures(text)?;
        let token = caps.get(1)?.as_str();
        let argstr = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        let token = if self.ignorecase {
            token.to_lowercase()
        } else {
            token.to_string()
        };

        Some(ParsedCommand {
            token,
            args: parse_argstr(argstr, self.shlex || spec.shlex),
        })
    }
}

/// Split an argument string into tokens. Empty tokens are dropped.
///
/// With `shlex` set, single and double quotes group words and a backslash
/// escapes the next character outside single quotes. An unterminated quote
/// falls back to plain whitespace splitting.
pub fn parse_argstr(argstr: &str, shlex: bool) -> Vec<String> {
    if shlex {
        if let Some(args) = shlex_split(argstr) {
            return args.into_iter().filter(|a| !a.is_empty()).collect();
        }
        tracing::debug!(argstr = %argstr, "Unbalanced quotes, falling back to whitespace split");
    }
    argstr.split_whitespace().map(str::to_string).collect()
}

/// POSIX-ish shell word splitting. Returns None on an unterminated quote or
/// trailing escape.
fn shlex_split(input: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('"'), '"') => quote = None,
            (Some('"'), '\\') => {
                let next = chars.next()?;
                if !matches!(next, '"' | '\\') {
                    current.push('\\');
                }
                current.push(next);
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '\\') => {
                current.push(chars.next()?);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_word {
        args.push(current);
    }
    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CommandParser {
        CommandParser::default()
    }

    #[test]
    fn test_parse_botnick_prefix() {
        let spec = CommandSpec::new("foo");
        let parsed = parser().parse("helga", &spec, "helga foo bar baz").unwrap();
        assert_eq!(parsed.token, "foo");
        assert_eq!(parsed.args, vec!["bar", "baz"]);
    }

    #[test]
    fn test_parse_botnick_with_separators() {
        let spec = CommandSpec::new("foo");
        for text in ["helga: foo", "helga, foo", "helga ---> foo", "HELGA: foo"] {
            let parsed = parser().parse("helga", &spec, text);
            assert!(parsed.is_some(), "expected a match for {:?}", text);
        }
    }

    #[test]
    fn test_parse_botnick_requires_separator() {
        let spec = CommandSpec::new("foo");
        assert!(parser().parse("helga", &spec, "helgafoo").is_none());
    }

    #[test]
    fn test_parse_char_prefix() {
        let spec = CommandSpec::new("foo");
        let parsed = parser().parse("helga", &spec, "!foo one").unwrap();
        assert_eq!(parsed.token, "foo");
        assert_eq!(parsed.args, vec!["one"]);
    }

    #[test]
    fn test_parse_no_args() {
        let spec = CommandSpec::new("foo");
        let parsed = parser().parse("helga", &spec, "!foo").unwrap();
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_parse_longest_alias_wins() {
        let spec = CommandSpec::new("b").with_aliases(["bar"]);
        let parsed = parser().parse("helga", &spec, "helga bar baz").unwrap();
        assert_eq!(parsed.token, "bar");
        assert_eq!(parsed.args, vec!["baz"]);
    }

    #[test]
    fn test_parse_rejects_token_prefix() {
        let spec = CommandSpec::new("foo");
        assert!(parser().parse("helga", &spec, "!foobar baz").is_none());
        assert!(parser().parse("helga", &spec, "just talking about foo").is_none());
    }

    #[test]
    fn test_parse_ignorecase_lowers_token() {
        let spec = CommandSpec::new("foo");
        let parsed = parser().parse("helga", &spec, "!FOO x").unwrap();
        assert_eq!(parsed.token, "foo");
    }

    #[test]
    fn test_parse_case_sensitive() {
        let settings = DispatchSettings {
            command_ignorecase: false,
            ..Default::default()
        };
        let parser = CommandParser::from_settings(&settings);
        let spec = CommandSpec::new("foo");
        assert!(parser.parse("helga", &spec, "!FOO x").is_none());
        // The nick prefix itself stays case-insensitive
        assert!(parser.parse("helga", &spec, "HELGA foo x").is_some());
    }

    #[test]
    fn test_parse_literal_botnick_prefix() {
        let settings = DispatchSettings {
            command_prefix_botnick: BotnickPrefix::Literal("bot".to_string()),
            ..Default::default()
        };
        let parser = CommandParser::from_settings(&settings);
        let spec = CommandSpec::new("foo");
        assert!(parser.parse("helga", &spec, "bot: foo").is_some());
        assert!(parser.parse("helga", &spec, "helga: foo").is_none());
    }

    #[test]
    fn test_parse_no_prefixes_enabled() {
        let settings = DispatchSettings {
            command_prefix_botnick: BotnickPrefix::Enabled(false),
            command_prefix_char: String::new(),
            ..Default::default()
        };
        let parser = CommandParser::from_settings(&settings);
        let spec = CommandSpec::new("foo");
        assert!(parser.parse("helga", &spec, "!foo").is_none());
        assert!(parser.parse("helga", &spec, "helga foo").is_none());
    }

    #[test]
    fn test_parse_per_command_shlex() {
        let spec = CommandSpec::new("say").with_shlex(true);
        let parsed = parser().parse("helga", &spec, r#"!say "hello world" now"#).unwrap();
        assert_eq!(parsed.args, vec!["hello world", "now"]);
    }

    #[test]
    fn test_parse_global_shlex_setting() {
        let shlex_parser = CommandParser::from_settings(&DispatchSettings {
            command_args_shlex: true,
            ..Default::default()
        });
        let spec = CommandSpec::new("say");
        let parsed = shlex_parser.parse("helga", &spec, r#"!say "hello world" now"#).unwrap();
        assert_eq!(parsed.args, vec!["hello world", "now"]);

        // Without the setting, quotes are ordinary characters
        let parsed = parser().parse("helga", &spec, r#"!say "hello world" now"#).unwrap();
        assert_eq!(parsed.args, vec!["\"hello", "world\"", "now"]);
    }

    #[test]
    fn test_parse_argstr_shlex() {
        assert_eq!(
            parse_argstr(r#"foo bar "baz qux""#, true),
            vec!["foo", "bar", "baz qux"]
        );
    }

    #[test]
    fn test_parse_argstr_plain() {
        assert_eq!(
            parse_argstr(r#"foo bar "baz qux""#, false),
            vec!["foo", "bar", "\"baz", "qux\""]
        );
    }

    #[test]
    fn test_parse_argstr_drops_empty_tokens() {
        assert_eq!(parse_argstr("  a   b  ", false), vec!["a", "b"]);
        assert_eq!(parse_argstr(r#"a "" b"#, true), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_argstr_unbalanced_quote_falls_back() {
        assert_eq!(
            parse_argstr(r#"it's fine"#, true),
            vec!["it's", "fine"]
        );
    }

    #[test]
    fn test_parse_argstr_escapes_and_joins() {
        assert_eq!(parse_argstr(r#"a\ b 'c d'e"#, true), vec!["a b", "c de"]);
    }

    #[test]
    fn test_choices_longest_first() {
        let spec = CommandSpec::new("b").with_aliases(["bar", "ba"]);
        assert_eq!(spec.choices(), vec!["bar", "ba", "b"]);
    }

    #[test]
    fn test_answers_to() {
        let spec = CommandSpec::new("plugins").with_aliases(["p"]);
        assert!(spec.answers_to("PLUGINS", true));
        assert!(!spec.answers_to("PLUGINS", false));
        assert!(spec.answers_to("p", false));
    }

    #[test]
    fn test_pattern_rebuilt_on_nick_change() {
        let spec = CommandSpec::new("foo");
        assert!(parser().parse("helga", &spec, "helga foo").is_some());
        assert!(parser().parse("olga", &spec, "olga foo").is_some());
        assert!(parser().parse("olga", &spec, "helga foo").is_none());
    }
}
