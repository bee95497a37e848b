// ABOUTME: Plugin discovery abstraction plus a compiled-in registration table
// ABOUTME: Plugins register factories by name; the registry resolves them at load/reload

use anyhow::Result;
use std::collections::BTreeMap;

use crate::error::PluginError;
use crate::plugin::PluginLike;

/// A plugin a source knows how to build
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginRef {
    pub name: String,
    /// Where it comes from (crate, manifest path, ...), for logs only
    pub origin: String,
}

impl PluginRef {
    pub fn new(name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
        }
    }
}

/// Enumerates and builds installable plugins.
///
/// `resolve` is called once per `load` and again on every `reload`, so an
/// implementation backed by manifests or dynamic libraries can pick up a
/// new version without restarting the process.
pub trait PluginSource: Send + Sync {
    fn list_available(&self) -> Vec<PluginRef>;

    fn resolve(&self, plugin: &PluginRef) -> Result<PluginLike, PluginError>;

    /// Look up a ref by plugin name
    fn find(&self, name: &str) -> Option<PluginRef> {
        self.list_available().into_iter().find(|r| r.name == name)
    }
}

/// Factory building a fresh plugin value
pub type PluginFactory = Box<dyn Fn() -> Result<PluginLike> + Send + Sync>;

/// Static source: a name → factory table filled in at startup
pub struct PluginTable {
    origin: String,
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginTable {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory by name. A later registration replaces an earlier one.
    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Result<PluginLike> + Send + Sync + 'static,
    {
        self.insert(name, factory);
        self
    }

    pub fn insert<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<PluginLike> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl PluginSource for PluginTable {
    fn list_available(&self) -> Vec<PluginRef> {
        self.factories
            .keys()
            .map(|name| PluginRef::new(name.clone(), self.origin.clone()))
            .collect()
    }

    fn resolve(&self, plugin: &PluginRef) -> Result<PluginLike, PluginError> {
        let factory = self
            .factories
            .get(&plugin.name)
            .ok_or_else(|| PluginError::UnknownPlugin(plugin.name.clone()))?;
        factory().map_err(|source| PluginError::Resolve {
            name: plugin.name.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PluginDescriptor, Response};

    fn echo() -> Result<PluginLike> {
        Ok(PluginDescriptor::command("echo")
            .handler(|call| Ok(Response::text(call.args.join(" "))))
            .into())
    }

    #[test]
    fn test_table_lists_sorted_names() {
        let table = PluginTable::new("builtin")
            .register("zeta", echo)
            .register("alpha", echo);
        let names: Vec<String> = table.list_available().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_table_resolves_known_plugin() {
        let table = PluginTable::new("builtin").register("echo", echo);
        let plugin_ref = table.find("echo").unwrap();
        assert_eq!(plugin_ref.origin, "builtin");
        assert!(matches!(
            table.resolve(&plugin_ref),
            Ok(PluginLike::Descriptor(_))
        ));
    }

    #[test]
    fn test_table_unknown_plugin() {
        let table = PluginTable::new("builtin");
        let err = table
            .resolve(&PluginRef::new("ghost", "builtin"))
            .err()
            .unwrap();
        assert!(matches!(err, PluginError::UnknownPlugin(ref name) if name == "ghost"));
    }

    #[test]
    fn test_table_factory_failure_is_resolve_error() {
        let table = PluginTable::new("builtin").register("broken", || anyhow::bail!("no config"));
        let err = table
            .resolve(&PluginRef::new("broken", "builtin"))
            .err()
            .unwrap();
        assert!(matches!(err, PluginError::Resolve { .. }));
        assert!(err.to_string().contains("no config"));
    }
}
