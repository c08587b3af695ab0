//! Typed access to plugin arguments.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::registry::PluginKind;

/// Whether a configuration value counts as "on".
///
/// `null`, `false`, `0`, empty strings/collections and the strings
/// `no`, `false`, `off`, `0` (any case) are false; everything else is true.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => {
            let s = s.trim().to_ascii_lowercase();
            !matches!(s.as_str(), "" | "0" | "no" | "false" | "off")
        }
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Parse a positive integer from a number or a numeric string.
pub fn positive_int(value: Option<&Value>) -> Option<u64> {
    let n = match value? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (n > 0).then_some(n)
}

/// Arguments of one plugin, with errors attributed to that plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginArgs<'a> {
    kind: PluginKind,
    name: &'a str,
    args: &'a Value,
}

impl<'a> PluginArgs<'a> {
    /// Wrap the raw arguments of plugin `name`.
    pub fn new(kind: PluginKind, name: &'a str, args: &'a Value) -> Self {
        Self { kind, name, args }
    }

    /// The raw argument value.
    pub fn raw(&self) -> &'a Value {
        self.args
    }

    /// Arguments as a mapping (empty when they are not one).
    pub fn map(&self) -> Map<String, Value> {
        self.args.as_object().cloned().unwrap_or_default()
    }

    /// Look up an argument.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.args.get(key).filter(|v| !v.is_null())
    }

    /// Look up a string argument.
    pub fn str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    /// A string argument that must be present.
    pub fn required_str(&self, key: &str) -> Result<&'a str> {
        match self.get(key) {
            None => Err(self.missing(key)),
            Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {other}"))),
        }
    }

    /// A required argument of any type.
    pub fn required(&self, key: &str) -> Result<&'a Value> {
        self.get(key).ok_or_else(|| self.missing(key))
    }

    /// A boolean-ish argument, `default` when absent.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.args.get(key) {
            None => default,
            value => truthy(value),
        }
    }

    /// A positive integer argument; absent or unusable values give `default`.
    pub fn positive_int_or(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            None => default,
            value => positive_int(value).unwrap_or_else(|| {
                log::debug!(
                    "[{}] Invalid \"{}\" value {:?}, defaulting to {}",
                    self.name,
                    key,
                    value,
                    default
                );
                default
            }),
        }
    }

    /// A list argument, empty when absent.
    pub fn list(&self, key: &str) -> Result<&'a [Value]> {
        match self.get(key) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(other) => Err(self.invalid(key, format!("expected a list, got {other}"))),
        }
    }

    /// Build a missing-argument error for this plugin.
    pub fn missing(&self, key: &str) -> Error {
        Error::MissingArgument {
            kind: self.kind,
            name: self.name.to_string(),
            argument: key.to_string(),
        }
    }

    /// Build an invalid-argument error for this plugin.
    pub fn invalid(&self, key: &str, message: impl Into<String>) -> Error {
        Error::InvalidArgument {
            kind: self.kind,
            name: self.name.to_string(),
            argument: key.to_string(),
            message: message.into(),
        }
    }
}
