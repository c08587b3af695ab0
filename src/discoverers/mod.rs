//! Host discoverers: where the inventory of a job comes from.

mod netbox;
mod patchman;
mod static_hosts;

use anyhow::{Context, Result};
use lifecycle::{Declaration, DiscovererRegistry, Inventory, PluginArgs};
use log::{error, info};
use regex::Regex;
use serde_json::{Map, Value};
use templating::TemplateEngine;

use crate::http::Client;

/// Registry with every built-in discoverer.
pub fn registry(client: &Client) -> DiscovererRegistry {
    let mut registry = DiscovererRegistry::new();
    registry.register("static", static_hosts::build);

    let netbox_client = client.clone();
    registry.register("netbox", move |templates, args| {
        netbox::build(templates, args, netbox_client.clone())
    });

    let patchman_client = client.clone();
    registry.register("patchman", move |templates, args| {
        patchman::build(templates, args, patchman_client.clone())
    });

    registry
}

/// Run every discoverer declaration and merge the results.
///
/// Later declarations win on identical host identifiers. Unknown discoverer
/// names are logged and skipped; any other failure aborts discovery.
pub fn discover_all(
    registry: &DiscovererRegistry,
    templates: &TemplateEngine,
    declarations: &[Value],
) -> Result<Inventory> {
    let mut inventory = Inventory::new();

    for entry in declarations {
        let decl = Declaration::parse(entry)?;
        if !registry.contains(&decl.name) {
            error!("[drydock] Unknown host discoverer {}", decl.name);
            continue;
        }

        let discoverer = registry.build(templates, &decl)?;
        let found = discoverer
            .discover()
            .with_context(|| format!("Discoverer \"{}\" failed", decl.name))?;
        info!("[drydock] {} discovered {} host(s)", decl.name, found.len());

        inventory.extend(found);
    }

    Ok(inventory)
}

/// Fields shared by discoverers that turn API records into hosts.
#[derive(Debug, Clone)]
struct RecordMapping {
    /// Template producing the host identifier from `host` (the record)
    host_name: String,
    /// Template producing the host arguments from `host`
    host_args: Value,
    /// Records whose name does not match are skipped
    filter: Regex,
}

impl RecordMapping {
    fn from_args(args: &PluginArgs<'_>, templates: &TemplateEngine) -> lifecycle::Result<Self> {
        let host_name = args.required_str("host-name")?.to_string();
        let host_args = args
            .get("host-args")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let pattern = match args.str("filter-name") {
            Some(raw) => templates.render_string(raw, &Map::new())?,
            None => ".*".to_string(),
        };
        // Anchored at the start, like a prefix match on the record name
        let filter = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| args.invalid("filter-name", e.to_string()))?;

        Ok(Self {
            host_name,
            host_args,
            filter,
        })
    }

    fn matches(&self, name: &str) -> bool {
        self.filter.is_match(name)
    }

    /// Host identifier and arguments for one record.
    fn render(&self, templates: &TemplateEngine, record: &Value) -> Result<(String, Value)> {
        let mut context = Map::new();
        context.insert("host".to_string(), record.clone());

        let name = templates.render_string(&self.host_name, &context)?;
        let args = templates.render(&self.host_args, &context)?;
        Ok((name, args))
    }
}
