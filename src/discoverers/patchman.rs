use anyhow::{Result, bail};
use lifecycle::{Discoverer, Inventory, PluginArgs, PluginKind, truthy};
use serde_json::{Map, Value};
use templating::TemplateEngine;

use super::RecordMapping;
use crate::http::Client;

/// Hosts from the Patchman REST API, with update actions derived from the
/// pending updates and reboot flags Patchman reports.
#[derive(Debug)]
pub struct Patchman {
    url: String,
    mapping: RecordMapping,
    on_package_updates: Vec<Value>,
    on_reboot_required: Vec<Value>,
    skip_ok: bool,
    templates: TemplateEngine,
    client: Client,
}

pub fn build(
    templates: &TemplateEngine,
    args: &Value,
    client: Client,
) -> lifecycle::Result<Box<dyn Discoverer>> {
    let args = PluginArgs::new(PluginKind::Discoverer, "patchman", args);

    Ok(Box::new(Patchman {
        url: args.required_str("patchman-url")?.to_string(),
        mapping: RecordMapping::from_args(&args, templates)?,
        on_package_updates: args.list("on-package-updates")?.to_vec(),
        on_reboot_required: args.list("on-reboot-required")?.to_vec(),
        skip_ok: args.flag("skip-ok", false),
        templates: templates.clone(),
        client,
    }))
}

/// Fetch every page of a paginated listing, following `next` links.
fn collect_pages(first: &str, mut fetch: impl FnMut(&str) -> Result<Value>) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    let mut next = Some(first.to_string());

    while let Some(url) = next {
        let page = fetch(&url)?;
        match page.get("results") {
            Some(Value::Array(items)) => records.extend(items.iter().cloned()),
            Some(other) => bail!("\"results\" is not a list in response from {url}: {other}"),
            None => bail!("no \"results\" in response from {url}"),
        }
        next = page.get("next").and_then(Value::as_str).map(str::to_string);
    }

    Ok(records)
}

impl Patchman {
    fn hosts(&self, records: &[Value]) -> Result<Inventory> {
        let mut inventory = Inventory::new();

        for record in records {
            let Some(name) = record.get("hostname").and_then(Value::as_str) else {
                log::warn!("[patchman] Skipping record without a hostname: {record}");
                continue;
            };
            if !self.mapping.matches(name) {
                continue;
            }

            let (host, mut args) = self.mapping.render(&self.templates, record)?;

            if truthy(record.get("updates")) {
                append_updates(&mut args, &self.on_package_updates)?;
            }
            if truthy(record.get("reboot_required")) {
                append_updates(&mut args, &self.on_reboot_required)?;
            }

            // Nothing to do for this host
            if self.skip_ok && args.as_object().is_none_or(Map::is_empty) {
                log::debug!("[patchman] {host} has no pending actions, skipping");
                continue;
            }

            inventory.insert(host, args);
        }

        Ok(inventory)
    }
}

/// Extend the host's `updates` list, creating it when absent.
fn append_updates(args: &mut Value, extra: &[Value]) -> Result<()> {
    if extra.is_empty() {
        return Ok(());
    }
    if !args.is_object() {
        *args = Value::Object(Map::new());
    }
    let Some(map) = args.as_object_mut() else {
        return Ok(());
    };

    let updates = map
        .entry("updates")
        .or_insert_with(|| Value::Array(Vec::new()));
    if updates.is_null() {
        *updates = Value::Array(Vec::new());
    }
    match updates {
        Value::Array(list) => {
            list.extend(extra.iter().cloned());
            Ok(())
        }
        other => bail!("host \"updates\" must be a list, got {other}"),
    }
}

impl Discoverer for Patchman {
    fn discover(&self) -> Result<Inventory> {
        let records = collect_pages(&self.url, |url| self.client.get_json(url))?;
        log::debug!("[patchman] {} record(s) from {}", records.len(), self.url);
        self.hosts(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patchman(args: &Value) -> Patchman {
        let templates = TemplateEngine::new();
        let args = PluginArgs::new(PluginKind::Discoverer, "patchman", args);
        Patchman {
            url: args.required_str("patchman-url").unwrap().to_string(),
            mapping: RecordMapping::from_args(&args, &templates).unwrap(),
            on_package_updates: args.list("on-package-updates").unwrap().to_vec(),
            on_reboot_required: args.list("on-reboot-required").unwrap().to_vec(),
            skip_ok: args.flag("skip-ok", false),
            templates,
            client: Client::new(),
        }
    }

    fn records() -> Vec<Value> {
        vec![
            json!({"hostname": "web1", "updates": [1, 2], "reboot_required": false}),
            json!({"hostname": "web2", "updates": [], "reboot_required": true}),
            json!({"hostname": "web3", "updates": [], "reboot_required": false}),
            json!({"hostname": "db1", "updates": [3], "reboot_required": true}),
        ]
    }

    #[test]
    fn test_actions_from_flags() {
        let discoverer = patchman(&json!({
            "patchman-url": "https://patchman/api/host/",
            "host-name": "{{ host.hostname }}",
            "filter-name": "web",
            "on-package-updates": ["apt"],
            "on-reboot-required": [{"reboot": {"wait": true}}]
        }));

        let inventory = discoverer.hosts(&records()).unwrap();
        assert_eq!(inventory.keys().collect::<Vec<_>>(), vec!["web1", "web2", "web3"]);
        assert_eq!(inventory["web1"], json!({"updates": ["apt"]}));
        assert_eq!(inventory["web2"], json!({"updates": [{"reboot": {"wait": true}}]}));
        assert_eq!(inventory["web3"], json!({}));
    }

    #[test]
    fn test_skip_ok() {
        let discoverer = patchman(&json!({
            "patchman-url": "u",
            "host-name": "{{ host.hostname }}",
            "on-package-updates": ["apt"],
            "on-reboot-required": ["reboot"],
            "skip-ok": true
        }));

        let inventory = discoverer.hosts(&records()).unwrap();
        assert_eq!(inventory.keys().collect::<Vec<_>>(), vec!["web1", "web2", "db1"]);
        assert_eq!(inventory["db1"], json!({"updates": ["apt", "reboot"]}));
    }

    #[test]
    fn test_appends_to_existing_updates() {
        let mut args = json!({"updates": ["dummy"]});
        append_updates(&mut args, &[json!("apt")]).unwrap();
        assert_eq!(args, json!({"updates": ["dummy", "apt"]}));

        let mut bad = json!({"updates": "dummy"});
        assert!(append_updates(&mut bad, &[json!("apt")]).is_err());
    }

    #[test]
    fn test_collect_pages_follows_next() {
        let pages = [
            ("p1", json!({"next": "p2", "results": [{"hostname": "a"}]})),
            ("p2", json!({"next": "p3", "results": []})),
            ("p3", json!({"next": null, "results": [{"hostname": "b"}, {"hostname": "c"}]})),
        ];
        let mut visited = Vec::new();

        let records = collect_pages("p1", |url| {
            visited.push(url.to_string());
            let (_, page) = pages.iter().find(|(u, _)| *u == url).unwrap();
            Ok(page.clone())
        })
        .unwrap();

        assert_eq!(visited, vec!["p1", "p2", "p3"]);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_collect_pages_rejects_bad_page() {
        assert!(collect_pages("p1", |_| Ok(json!({"detail": "Not found."}))).is_err());
    }
}
