//! Process-level settings: defaults, environment, config file, CLI flags.

use anyhow::{Context, Result, bail};
use lifecycle::truthy;
use log::LevelFilter;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

/// Settings shared by every collaborator of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Credentials file sourced before every OpenStack command
    pub openstack_rc: PathBuf,
    pub ssh_id_rsa_file: PathBuf,
    pub ssh_user: String,
    pub ssh_config_file: PathBuf,
    pub ssh_strict_host_key_checking: bool,
    /// Overrides the `-v`/`-q` log level when set
    pub log_level: Option<LevelFilter>,
    pub color: bool,
    /// Print the resolved inventory and stop
    pub list_hosts: bool,
    /// Default template variables
    pub variables: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openstack_rc: PathBuf::from("pilot.rc"),
            ssh_id_rsa_file: PathBuf::from("ssh_id_rsa"),
            ssh_user: "ubuntu".to_string(),
            ssh_config_file: PathBuf::from("ssh_config"),
            ssh_strict_host_key_checking: false,
            log_level: None,
            color: true,
            list_hosts: false,
            variables: Map::new(),
        }
    }
}

impl Settings {
    /// Load settings for this invocation.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut settings = Self::from_env(|key| std::env::var(key).ok());

        if let Some(path) = &cli.config {
            settings.apply_file(path)?;
        }
        settings.apply_cli(cli);

        Ok(settings)
    }

    /// Defaults overridden by environment variables.
    pub fn from_env(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(rc) = var("OPENSTACK_RC") {
            settings.openstack_rc = expand_path(&rc);
        }
        if let Some(key) = var("SSH_ID_RSA") {
            settings.ssh_id_rsa_file = expand_path(&key);
        }
        if let Some(user) = var("SSH_USER") {
            settings.ssh_user = user;
        }
        if let Some(file) = var("SSH_CONFIG_FILE") {
            settings.ssh_config_file = expand_path(&file);
        }

        settings
    }

    /// Apply a TOML or JSON config file.
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let document = load_document(path)?;
        self.apply_value(&document)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply a parsed config document. Unknown keys are ignored.
    pub fn apply_value(&mut self, document: &Value) -> Result<()> {
        let Some(entries) = document.as_object() else {
            bail!("expected a mapping at the top level");
        };

        for (key, value) in entries {
            match key.as_str() {
                "openstack_rc" => self.openstack_rc = expand_path(string(key, value)?),
                "ssh_id_rsa_file" => self.ssh_id_rsa_file = expand_path(string(key, value)?),
                "ssh_user" => self.ssh_user = string(key, value)?.to_string(),
                "ssh_config_file" => self.ssh_config_file = expand_path(string(key, value)?),
                "ssh_strict_host_key_checking" => {
                    self.ssh_strict_host_key_checking = truthy(Some(value));
                }
                "log_level" => self.log_level = Some(parse_log_level(value)?),
                "color" => self.color = truthy(Some(value)),
                "list_hosts" => self.list_hosts = truthy(Some(value)),
                "variables" => match value {
                    Value::Object(vars) => self
                        .variables
                        .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone()))),
                    Value::Null => {}
                    other => bail!("\"variables\" must be a mapping, got {other}"),
                },
                other => log::debug!("[drydock] Ignoring unknown config key \"{other}\""),
            }
        }

        Ok(())
    }

    /// Apply command line flags, which win over every other layer.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if cli.list_hosts {
            self.list_hosts = true;
        }
        if cli.no_color {
            self.color = false;
        }
        for (key, value) in &cli.vars {
            self.variables.insert(key.clone(), value.clone());
        }
    }
}

fn string<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .with_context(|| format!("\"{key}\" must be a string, got {value}"))
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Parse a log level name (`info`, `DEBUG`, ...) or a numeric level
/// (10 debug, 20 info, 30 warning, 40 error, 50 critical).
pub fn parse_log_level(value: &Value) -> Result<LevelFilter> {
    match value {
        Value::String(name) => match name.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(LevelFilter::Off),
            "critical" | "fatal" | "error" => Ok(LevelFilter::Error),
            "warning" | "warn" => Ok(LevelFilter::Warn),
            "info" => Ok(LevelFilter::Info),
            "debug" => Ok(LevelFilter::Debug),
            "trace" => Ok(LevelFilter::Trace),
            other => bail!("unknown log level \"{other}\""),
        },
        Value::Number(n) => match n.as_u64() {
            Some(0..=9) => Ok(LevelFilter::Trace),
            Some(10..=19) => Ok(LevelFilter::Debug),
            Some(20..=29) => Ok(LevelFilter::Info),
            Some(30..=39) => Ok(LevelFilter::Warn),
            Some(_) => Ok(LevelFilter::Error),
            None => bail!("invalid log level {n}"),
        },
        other => bail!("invalid log level {other}"),
    }
}

/// Read a TOML or JSON document into a JSON value.
///
/// The format follows the file extension. Other extensions are tried as
/// JSON first, then TOML.
pub fn load_document(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display())),
        Some("toml") => {
            toml::from_str(&content).with_context(|| format!("Invalid TOML in {}", path.display()))
        }
        _ => serde_json::from_str(&content).or_else(|_| {
            toml::from_str(&content).with_context(|| {
                format!("{} is neither valid JSON nor valid TOML", path.display())
            })
        }),
    }
}
