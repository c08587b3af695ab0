//! Collaborator traits and the per-host construction context.
//!
//! Every maintenance step is performed by one of three collaborator kinds:
//! - [`Discoverer`] produces the host inventory
//! - [`ServiceHandler`] evacuates and restores a workload on one host
//! - [`Updater`] performs one update action on one host
//!
//! Operations return `Ok(true)` on success and `Ok(false)` for an
//! operational failure. An `Err` is an unexpected fault; the executor treats
//! it like a failure and keeps going.

use std::fmt;

use anyhow::Result;
use serde_json::{Map, Value};
use templating::TemplateEngine;

/// Host identifier → host arguments, in discovery order.
pub type Inventory = Map<String, Value>;

/// Produces a host inventory.
pub trait Discoverer: fmt::Debug {
    /// Discover hosts. Malformed inputs are errors, never an empty inventory.
    fn discover(&self) -> Result<Inventory>;
}

/// Takes a service out of rotation on one host and brings it back.
///
/// Instances are built fresh for every host and never shared.
pub trait ServiceHandler: Send + fmt::Debug {
    /// Display name (e.g., "nova-compute")
    fn name(&self) -> &str;

    /// Evacuate the service from the host
    fn evacuate(&mut self) -> Result<bool>;

    /// Restore the service on the host
    fn restore(&mut self) -> Result<bool>;
}

/// Performs one maintenance action on one host.
pub trait Updater: Send + fmt::Debug {
    /// Display name (e.g., "apt")
    fn name(&self) -> &str;

    /// Run the action
    fn update(&mut self) -> Result<bool>;
}

/// Everything a service handler or updater factory gets to know about a host.
#[derive(Debug, Clone, Copy)]
pub struct HostContext<'a> {
    host: &'a str,
    args: &'a Value,
    templates: &'a TemplateEngine,
}

impl<'a> HostContext<'a> {
    /// Create a context for `host` with its inventory arguments.
    pub fn new(host: &'a str, args: &'a Value, templates: &'a TemplateEngine) -> Self {
        Self {
            host,
            args,
            templates,
        }
    }

    /// Raw host identifier from the inventory.
    pub fn host(&self) -> &'a str {
        self.host
    }

    /// Host arguments from the inventory.
    pub fn args(&self) -> &'a Value {
        self.args
    }

    /// Look up a single host argument.
    pub fn arg(&self, key: &str) -> Option<&'a Value> {
        self.args.get(key).filter(|v| !v.is_null())
    }

    /// Look up a string host argument.
    pub fn arg_str(&self, key: &str) -> Option<&'a str> {
        self.arg(key).and_then(Value::as_str)
    }

    /// Template engine shared by the job.
    pub fn templates(&self) -> &'a TemplateEngine {
        self.templates
    }

    /// Template variables for this host.
    ///
    /// The host's own argument keys come first, then `host` (the raw
    /// identifier) and `args` (the whole argument value) on top.
    pub fn variables(&self) -> Map<String, Value> {
        let mut vars = self.args.as_object().cloned().unwrap_or_default();
        vars.insert("host".to_string(), Value::String(self.host.to_string()));
        vars.insert("args".to_string(), self.args.clone());
        vars
    }

    /// Render `value` with the host variables plus `extra` on top.
    pub fn render(&self, value: &Value, extra: &Map<String, Value>) -> crate::Result<Value> {
        let mut vars = self.variables();
        vars.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(self.templates.render(value, &vars)?)
    }

    /// Effective host name for a plugin.
    ///
    /// When the plugin arguments carry a `fix-hostname` template it is
    /// rendered with `host` set to the raw identifier, letting a plugin
    /// address the host under a different name (e.g. an FQDN). Otherwise the
    /// raw identifier is used.
    pub fn fix_hostname(&self, plugin_args: &Value) -> crate::Result<String> {
        match plugin_args.get("fix-hostname").and_then(Value::as_str) {
            Some(template) => {
                let mut vars = Map::new();
                vars.insert("host".to_string(), Value::String(self.host.to_string()));
                Ok(self.templates.render_string(template, &vars)?)
            }
            None => Ok(self.host.to_string()),
        }
    }
}
