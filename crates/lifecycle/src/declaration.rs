//! Plugin declarations: `"name"` or `{"name": {args}}`.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A parsed plugin declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Registered plugin name
    pub name: String,
    /// Plugin arguments; an empty mapping when none were given
    pub args: Value,
}

impl Declaration {
    /// A declaration with no arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Value::Object(Map::new()),
        }
    }

    /// Parse a configuration entry.
    ///
    /// ```
    /// use lifecycle::Declaration;
    /// use serde_json::json;
    ///
    /// let decl = Declaration::parse(&json!({"reboot": {"wait": false}})).unwrap();
    /// assert_eq!(decl.name, "reboot");
    /// assert_eq!(decl.args, json!({"wait": false}));
    /// ```
    pub fn parse(entry: &Value) -> Result<Self> {
        match entry {
            Value::String(name) => Ok(Self::named(name.as_str())),
            Value::Object(map) if map.len() == 1 => {
                let Some((name, args)) = map.iter().next() else {
                    return Err(bad(entry));
                };
                let args = if args.is_null() {
                    Value::Object(Map::new())
                } else {
                    args.clone()
                };
                Ok(Self {
                    name: name.clone(),
                    args,
                })
            }
            _ => Err(bad(entry)),
        }
    }

    /// Parse every entry of a declaration list, failing on the first bad one.
    pub fn parse_list(entries: &[Value]) -> Result<Vec<Self>> {
        entries.iter().map(Self::parse).collect()
    }
}

fn bad(entry: &Value) -> Error {
    Error::BadDeclaration {
        entry: entry.to_string(),
    }
}
