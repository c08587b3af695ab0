use anyhow::{Result, bail};
use lifecycle::{Discoverer, Inventory, PluginArgs, PluginKind};
use serde_json::{Map, Value};
use templating::TemplateEngine;

use super::RecordMapping;
use crate::http::Client;

/// Hosts from a NetBox REST API listing (devices or virtual machines).
#[derive(Debug)]
pub struct NetBox {
    url: String,
    mapping: RecordMapping,
    templates: TemplateEngine,
    client: Client,
}

pub fn build(
    templates: &TemplateEngine,
    args: &Value,
    client: Client,
) -> lifecycle::Result<Box<dyn Discoverer>> {
    let args = PluginArgs::new(PluginKind::Discoverer, "netbox", args);
    let url = templates.render_string(args.required_str("netbox-url")?, &Map::new())?;

    Ok(Box::new(NetBox {
        url,
        mapping: RecordMapping::from_args(&args, templates)?,
        templates: templates.clone(),
        client,
    }))
}

impl NetBox {
    fn hosts(&self, listing: &Value) -> Result<Inventory> {
        let mut inventory = Inventory::new();
        let Some(records) = listing.get("results") else {
            return Ok(inventory);
        };
        let Some(records) = records.as_array() else {
            bail!("\"results\" is not a list in response from {}", self.url);
        };

        for record in records {
            let Some(name) = record.get("name").and_then(Value::as_str) else {
                log::warn!("[netbox] Skipping record without a name: {record}");
                continue;
            };
            if !self.mapping.matches(name) {
                continue;
            }

            let (host, args) = self.mapping.render(&self.templates, record)?;
            inventory.insert(host, args);
        }

        Ok(inventory)
    }
}

impl Discoverer for NetBox {
    fn discover(&self) -> Result<Inventory> {
        let listing = self.client.get_json(&self.url)?;
        self.hosts(&listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn netbox(args: Value) -> NetBox {
        let templates = TemplateEngine::new();
        let args = PluginArgs::new(PluginKind::Discoverer, "netbox", &args);
        NetBox {
            url: args.required_str("netbox-url").unwrap().to_string(),
            mapping: RecordMapping::from_args(&args, &templates).unwrap(),
            templates,
            client: Client::new(),
        }
    }

    #[test]
    fn test_hosts_from_listing() {
        let discoverer = netbox(json!({
            "netbox-url": "https://netbox/api/dcim/devices/?role=compute",
            "host-name": "{{ host.name }}",
            "host-args": {"rack": "{{ host.rack.name }}"},
            "filter-name": "cn"
        }));

        let listing = json!({
            "count": 3,
            "results": [
                {"name": "cn01", "rack": {"name": "r1"}},
                {"name": "sn01", "rack": {"name": "r1"}},
                {"name": null},
                {"name": "cn02", "rack": {"name": "r2"}}
            ]
        });
        let inventory = discoverer.hosts(&listing).unwrap();

        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory["cn01"], json!({"rack": "r1"}));
        assert_eq!(inventory["cn02"], json!({"rack": "r2"}));
    }

    #[test]
    fn test_missing_results_is_empty() {
        let discoverer = netbox(json!({"netbox-url": "u", "host-name": "{{ host.name }}"}));
        assert!(discoverer.hosts(&json!({})).unwrap().is_empty());
        assert!(discoverer.hosts(&json!({"results": "nope"})).is_err());
    }

    #[test]
    fn test_required_arguments() {
        let templates = TemplateEngine::new();
        for args in [json!({"host-name": "x"}), json!({"netbox-url": "u"})] {
            let err = build(&templates, &args, Client::new()).unwrap_err();
            assert!(matches!(err, lifecycle::Error::MissingArgument { .. }));
        }
    }
}
