// ABOUTME: Error taxonomy for plugin registration and resolution.
// ABOUTME: Runtime plugin failures are never surfaced here; the registry logs and absorbs them.

use thiserror::Error;

/// Errors surfaced to callers of `Registry::register`, `Registry::load` and
/// `PluginSource::resolve`.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The value handed to `register` is not a usable plugin shape.
    #[error("Invalid plugin '{name}': {reason}")]
    InvalidPlugin { name: String, reason: String },

    /// No plugin by that name is known to the source or the catalog.
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    /// The plugin source failed while building the named plugin.
    #[error("Failed to resolve plugin '{name}': {source}")]
    Resolve {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PluginError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPlugin {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Name of the plugin this error is about
    pub fn plugin_name(&self) -> &str {
        match self {
            Self::InvalidPlugin { name, .. } => name,
            Self::UnknownPlugin(name) => name,
            Self::Resolve { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_plugin_message() {
        let err = PluginError::invalid("weather", "empty chain");
        assert_eq!(err.to_string(), "Invalid plugin 'weather': empty chain");
        assert_eq!(err.plugin_name(), "weather");
    }

    #[test]
    fn test_resolve_error_keeps_source() {
        let err = PluginError::Resolve {
            name: "facts".to_string(),
            source: anyhow::anyhow!("manifest missing"),
        };
        assert!(err.to_string().contains("manifest missing"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
