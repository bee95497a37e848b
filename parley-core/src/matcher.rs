// ABOUTME: Pattern evaluation for match plugins (regex find-all or arbitrary predicate)
// ABOUTME: A failing predicate counts as "no match" rather than an error

use anyhow::Result;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Predicate returning the substrings it considers matched; empty means no match.
pub type MatchPredicate = Arc<dyn Fn(&str) -> Result<Vec<String>> + Send + Sync>;

/// What a match plugin looks for in raw message text.
#[derive(Clone)]
pub enum MatchSpec {
    Regex(Regex),
    Predicate(MatchPredicate),
}

impl fmt::Debug for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl MatchSpec {
    /// Compile a regular expression pattern
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Evaluate against `text`. None means the plugin does not apply.
    pub fn find(&self, text: &str) -> Option<Vec<String>> {
        let matches = match self {
            Self::Regex(re) => find_all(re, text),
            Self::Predicate(predicate) => match predicate(text) {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::debug!(error = %e, "Match predicate failed, treating as no match");
                    return None;
                }
            },
        };

        if matches.is_empty() {
            None
        } else {
            Some(matches)
        }
    }
}

/// Find-all semantics: no groups yields whole matches, one group yields that
/// group, several groups yield every group of every match in order.
fn find_all(re: &Regex, text: &str) -> Vec<String> {
    let groups = re.captures_len() - 1;
    let mut found = Vec::new();

    for caps in re.captures_iter(text) {
        if groups == 0 {
            if let Some(m) = caps.get(0) {
                found.push(m.as_str().to_string());
            }
            continue;
        }
        for i in 1..=groups {
            found.push(caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default());
        }
    }

    found
}
