//! Name → factory registries for discoverers, service handlers and updaters.
//!
//! Registries are filled once at startup and only read afterwards, so they
//! can be shared by reference across worker threads.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use templating::TemplateEngine;

use crate::declaration::Declaration;
use crate::error::{Error, Result};
use crate::plugin::{Discoverer, HostContext, ServiceHandler, Updater};

/// Kinds of pluggable components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Host inventory source
    Discoverer,
    /// Service handler (evacuate/restore)
    Service,
    /// Update action
    Updater,
    /// Scheduling strategy
    Strategy,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Discoverer => write!(f, "discoverer"),
            PluginKind::Service => write!(f, "service"),
            PluginKind::Updater => write!(f, "updater"),
            PluginKind::Strategy => write!(f, "strategy"),
        }
    }
}

/// Factory building a discoverer from its arguments.
pub type DiscovererFactory =
    dyn Fn(&TemplateEngine, &Value) -> Result<Box<dyn Discoverer>> + Send + Sync;

/// Factory building a service handler for one host.
pub type ServiceFactory =
    dyn for<'a> Fn(&HostContext<'a>, &Value) -> Result<Box<dyn ServiceHandler>> + Send + Sync;

/// Factory building an updater for one host.
pub type UpdaterFactory =
    dyn for<'a> Fn(&HostContext<'a>, &Value) -> Result<Box<dyn Updater>> + Send + Sync;

/// A registry of named factories of one kind.
pub struct Registry<F: ?Sized> {
    kind: PluginKind,
    factories: BTreeMap<String, Box<F>>,
}

/// Registry of discoverers.
pub type DiscovererRegistry = Registry<DiscovererFactory>;
/// Registry of service handlers.
pub type ServiceRegistry = Registry<ServiceFactory>;
/// Registry of updaters.
pub type UpdaterRegistry = Registry<UpdaterFactory>;

impl<F: ?Sized> Registry<F> {
    fn empty(kind: PluginKind) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    /// Kind of plugin this registry holds.
    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Look up the factory for `name`.
    pub fn lookup(&self, name: &str) -> Result<&F> {
        self.factories
            .get(name)
            .map(Box::as_ref)
            .ok_or_else(|| Error::UnknownPlugin {
                kind: self.kind,
                name: name.to_string(),
            })
    }
}

impl<F: ?Sized> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DiscovererRegistry {
    /// Create an empty discoverer registry.
    pub fn new() -> Self {
        Self::empty(PluginKind::Discoverer)
    }

    /// Register a discoverer factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&TemplateEngine, &Value) -> Result<Box<dyn Discoverer>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Construct the discoverer a declaration names.
    pub fn build(&self, templates: &TemplateEngine, decl: &Declaration) -> Result<Box<dyn Discoverer>> {
        (self.lookup(&decl.name)?)(templates, &decl.args)
    }
}

impl ServiceRegistry {
    /// Create an empty service registry.
    pub fn new() -> Self {
        Self::empty(PluginKind::Service)
    }

    /// Register a service handler factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: for<'a> Fn(&HostContext<'a>, &Value) -> Result<Box<dyn ServiceHandler>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Construct the service handler a declaration names for one host.
    pub fn build(&self, ctx: &HostContext<'_>, decl: &Declaration) -> Result<Box<dyn ServiceHandler>> {
        (self.lookup(&decl.name)?)(ctx, &decl.args)
    }
}

impl UpdaterRegistry {
    /// Create an empty updater registry.
    pub fn new() -> Self {
        Self::empty(PluginKind::Updater)
    }

    /// Register an updater factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: for<'a> Fn(&HostContext<'a>, &Value) -> Result<Box<dyn Updater>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Construct the updater a declaration names for one host.
    pub fn build(&self, ctx: &HostContext<'_>, decl: &Declaration) -> Result<Box<dyn Updater>> {
        (self.lookup(&decl.name)?)(ctx, &decl.args)
    }
}

impl Default for DiscovererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for UpdaterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
