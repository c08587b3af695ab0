//! Job descriptions: discovery sources, default lifecycle lists, strategy.

use anyhow::{Context, Result, bail};
use lifecycle::{Inventory, Strategy};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

use crate::config::load_document;

/// A parsed job description.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobSpec {
    /// Discoverer declarations
    #[serde(default)]
    pub hosts: Vec<Value>,
    /// Default service declarations
    #[serde(default)]
    pub services: Vec<Value>,
    /// Default update declarations
    #[serde(default)]
    pub updates: Vec<Value>,
    /// Strategy declaration
    #[serde(default = "default_strategy")]
    pub strategy: Value,
    /// Per-host overrides: host → path → value
    #[serde(default)]
    pub host_overrides: Map<String, Value>,
}

fn default_strategy() -> Value {
    Value::String("serial".to_string())
}

impl JobSpec {
    /// Load a job file, applying `overrides` (path, value) to the raw tree
    /// before it is interpreted.
    pub fn load(path: &Path, overrides: &[(String, Value)]) -> Result<Self> {
        let tree = load_document(path)?;
        Self::from_value(tree, overrides)
            .with_context(|| format!("Invalid job description {}", path.display()))
    }

    pub fn from_value(mut tree: Value, overrides: &[(String, Value)]) -> Result<Self> {
        if !tree.is_object() {
            bail!("expected a mapping at the top level");
        }
        for (path, value) in overrides {
            templating::override_path(&mut tree, path, value.clone())?;
        }

        Ok(serde_json::from_value(tree)?)
    }

    /// The scheduling strategy this job asks for.
    pub fn strategy(&self) -> Result<Strategy> {
        Ok(Strategy::parse(&self.strategy)?)
    }

    /// Apply `host-overrides` to the discovered inventory.
    ///
    /// Overrides for hosts that were not discovered are ignored.
    pub fn apply_host_overrides(&self, inventory: &mut Inventory) -> Result<()> {
        for (host, overrides) in &self.host_overrides {
            let Some(args) = inventory.get_mut(host) else {
                log::debug!("[drydock] Override for undiscovered host \"{host}\" ignored");
                continue;
            };
            let Some(overrides) = overrides.as_object() else {
                bail!("host-overrides for \"{host}\" must be a mapping");
            };

            if !args.is_object() {
                *args = Value::Object(Map::new());
            }
            for (path, value) in overrides {
                templating::override_path(args, path, value.clone())
                    .with_context(|| format!("Invalid override for host \"{host}\""))?;
            }
        }

        Ok(())
    }
}
