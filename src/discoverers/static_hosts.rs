use anyhow::Result;
use lifecycle::{Declaration, Discoverer, Inventory, PluginArgs, PluginKind};
use serde_json::{Map, Value};
use templating::TemplateEngine;

/// Hosts listed in the job file itself.
#[derive(Debug)]
pub struct StaticHosts {
    entries: Vec<Value>,
    templates: TemplateEngine,
}

pub fn build(templates: &TemplateEngine, args: &Value) -> lifecycle::Result<Box<dyn Discoverer>> {
    let Value::Array(entries) = args else {
        return Err(PluginArgs::new(PluginKind::Discoverer, "static", args)
            .invalid("hosts", format!("expected a list of hosts, got {args}")));
    };

    Ok(Box::new(StaticHosts {
        entries: entries.clone(),
        templates: templates.clone(),
    }))
}

impl Discoverer for StaticHosts {
    fn discover(&self) -> Result<Inventory> {
        let context = Map::new();
        let mut inventory = Inventory::new();

        for entry in &self.entries {
            // Host names are templates too, so mapping keys are rendered here
            let rendered = match entry {
                Value::Object(map) => Value::Object(
                    map.iter()
                        .map(|(name, args)| {
                            Ok((
                                self.templates.render_string(name, &context)?,
                                self.templates.render(args, &context)?,
                            ))
                        })
                        .collect::<templating::Result<Map<String, Value>>>()?,
                ),
                other => self.templates.render(other, &context)?,
            };
            let host = Declaration::parse(&rendered)?;
            inventory.insert(host.name, host.args);
        }
        Ok(inventory)
    }
}
