//! Structural template rendering over nested configuration values.
//!
//! Mappings render their values (never their keys), sequences render each
//! element, and string scalars are evaluated as templates. A scalar that is a
//! single `{{ expression }}` keeps the native type of its result, so a
//! template can produce booleans, numbers, lists and mappings that flow back
//! into structured configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::Object;
use minijinja::{Environment, UndefinedBehavior, Value as JinjaValue};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

const EXPR_START: &str = "{{";
const EXPR_END: &str = "}}";
const MARKERS: [&str; 3] = ["{{", "{%", "{#"];

/// Template engine with a set of process-wide default variables.
///
/// Rendering never fails on undefined variables. A sole expression that
/// resolves to undefined is returned verbatim; inside a larger string an
/// undefined variable renders as `{{ name }}` (attribute lookups extend the
/// name, `{{ host.name }}`), so a partially specified template can still be
/// inspected. Malformed expressions are reported as [`Error::Template`].
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    env: Environment<'static>,
    defaults: Map<String, Value>,
}

/// Variables of one render call, both as JSON and as a template value.
struct Scope {
    vars: Map<String, Value>,
    value: JinjaValue,
}

/// Stand-in for an undefined variable inside a text template.
#[derive(Debug)]
struct Placeholder(String);

impl Object for Placeholder {
    fn get_value(self: &Arc<Self>, key: &JinjaValue) -> Option<JinjaValue> {
        Some(JinjaValue::from_object(Placeholder(format!("{}.{key}", self.0))))
    }

    fn is_true(self: &Arc<Self>) -> bool {
        false
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result
    where
        Self: Sized + 'static,
    {
        write!(f, "{EXPR_START} {} {EXPR_END}", self.0)
    }
}

impl TemplateEngine {
    /// Create an engine with no default variables.
    pub fn new() -> Self {
        Self::with_defaults(Map::new())
    }

    /// Create an engine whose contexts start from `defaults`.
    pub fn with_defaults(defaults: Map<String, Value>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        Self { env, defaults }
    }

    /// Default variables merged under every render context.
    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Add or replace a default variable.
    pub fn set_default(&mut self, key: impl Into<String>, value: Value) {
        self.defaults.insert(key.into(), value);
    }

    /// Render `value` against `context` merged over the default variables.
    ///
    /// The result has the same shape as the input, with every string scalar
    /// evaluated.
    pub fn render(&self, value: &Value, context: &Map<String, Value>) -> Result<Value> {
        let scope = self.scope(context);
        self.render_value(value, &scope)
    }

    /// Render a single template string.
    pub fn render_str(&self, source: &str, context: &Map<String, Value>) -> Result<Value> {
        let scope = self.scope(context);
        self.render_scalar(source, &scope)
    }

    /// Render a template string and coerce the result to text.
    ///
    /// Used where the consumer needs a string regardless of what the
    /// expression produced (host names, URLs, commands).
    pub fn render_string(&self, source: &str, context: &Map<String, Value>) -> Result<String> {
        Ok(match self.render_str(source, context)? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    fn scope(&self, context: &Map<String, Value>) -> Scope {
        let mut vars = self.defaults.clone();
        vars.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        let value = JinjaValue::from_serialize(&vars);
        Scope { vars, value }
    }

    fn render_value(&self, value: &Value, scope: &Scope) -> Result<Value> {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.render_value(item, scope)?)))
                .collect::<Result<Map<String, Value>>>()
                .map(Value::Object),
            Value::Array(items) => items
                .iter()
                .map(|item| self.render_value(item, scope))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::String(source) => self.render_scalar(source, scope),
            other => Ok(other.clone()),
        }
    }

    fn render_scalar(&self, source: &str, scope: &Scope) -> Result<Value> {
        if let Some(expr) = sole_expression(source) {
            return match self.evaluate(source, expr, scope)? {
                Some(value) => Ok(serde_json::to_value(&value)?),
                None => Ok(Value::String(source.to_string())),
            };
        }

        if !MARKERS.iter().any(|marker| source.contains(marker)) {
            return Ok(Value::String(source.to_string()));
        }

        self.render_text(source, scope).map(Value::String)
    }

    /// Render a mixed string as a text template.
    fn render_text(&self, source: &str, scope: &Scope) -> Result<String> {
        let template = self
            .env
            .template_from_str(source)
            .map_err(|e| Error::template(source, &e))?;

        let missing: Vec<String> = template
            .undeclared_variables(false)
            .into_iter()
            .filter(|name| !scope.vars.contains_key(name) && !self.is_global(name))
            .collect();

        let rendered = if missing.is_empty() {
            template.render(&scope.value)
        } else {
            let mut vars: BTreeMap<String, JinjaValue> = scope
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), JinjaValue::from_serialize(v)))
                .collect();
            for name in missing {
                let placeholder = JinjaValue::from_object(Placeholder(name.clone()));
                vars.insert(name, placeholder);
            }
            template.render(vars)
        };

        rendered.map_err(|e| Error::template(source, &e))
    }

    fn is_global(&self, name: &str) -> bool {
        self.env.globals().any(|(global, _)| global == name)
    }

    /// Evaluate one expression; `None` means it resolved to undefined.
    fn evaluate(&self, source: &str, expr: &str, scope: &Scope) -> Result<Option<JinjaValue>> {
        let compiled = self
            .env
            .compile_expression(expr.trim())
            .map_err(|e| Error::template(source, &e))?;
        let value = compiled
            .eval(&scope.value)
            .map_err(|e| Error::template(source, &e))?;

        Ok((!value.is_undefined()).then_some(value))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// If `source` is exactly one `{{ ... }}` expression, return its body.
fn sole_expression(source: &str) -> Option<&str> {
    let inner = source
        .trim()
        .strip_prefix(EXPR_START)?
        .strip_suffix(EXPR_END)?;

    (!inner.contains(EXPR_START)).then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("context must be an object"),
        }
    }

    #[test]
    fn test_sole_expression_keeps_native_number() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(&json!({"k": "{{ x }}"}), &ctx(json!({"x": 5})))
            .unwrap();
        assert_eq!(rendered, json!({"k": 5}));
    }

    #[test]
    fn test_native_bool_list_and_mapping() {
        let engine = TemplateEngine::new();
        let context = ctx(json!({"n": 3}));

        assert_eq!(engine.render_str("{{ n > 2 }}", &context).unwrap(), json!(true));
        assert_eq!(
            engine.render_str("{{ [n, n * 2] }}", &context).unwrap(),
            json!([3, 6])
        );
        assert_eq!(
            engine
                .render_str("{{ {'reboot': {'wait': n == 4}} }}", &context)
                .unwrap(),
            json!({"reboot": {"wait": false}})
        );
    }

    #[test]
    fn test_mixed_string_interpolates() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render_str("{{ host }}.example.org", &ctx(json!({"host": "node1"})))
            .unwrap();
        assert_eq!(rendered, json!("node1.example.org"));
    }

    #[test]
    fn test_undefined_renders_placeholder() {
        let engine = TemplateEngine::new();
        let empty = Map::new();

        assert_eq!(
            engine.render_str("{{ missing }}", &empty).unwrap(),
            json!("{{ missing }}")
        );
        assert_eq!(
            engine.render_str("pre-{{ host.name }}-post", &empty).unwrap(),
            json!("pre-{{ host.name }}-post")
        );
    }

    #[test]
    fn test_closing_braces_inside_literals() {
        let engine = TemplateEngine::new();
        let context = ctx(json!({"host": "node1"}));

        assert_eq!(engine.render_str("a-{{ '}}' }}", &context).unwrap(), json!("a-}}"));
        assert_eq!(
            engine.render_str("{{ host }}-{{ '{{x}}' }}", &context).unwrap(),
            json!("node1-{{x}}")
        );
        assert_eq!(engine.render_str("{{ '}}' }}", &context).unwrap(), json!("}}"));
    }

    #[test]
    fn test_undefined_inside_text_template() {
        let engine = TemplateEngine::new();
        let context = ctx(json!({"host": "node1"}));

        assert_eq!(
            engine.render_str("{{ host }}.{{ domain }}", &context).unwrap(),
            json!("node1.{{ domain }}")
        );
        assert_eq!(
            engine
                .render_str("{% if missing %}yes{% else %}no{% endif %}", &context)
                .unwrap(),
            json!("no")
        );
        assert_eq!(
            engine.render_str("{% for i in range(2) %}{{ i }}{% endfor %}", &context).unwrap(),
            json!("01")
        );
    }

    #[test]
    fn test_trailing_newline_is_kept() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render_str("{{ host }} ok\n", &ctx(json!({"host": "node1"})))
            .unwrap();
        assert_eq!(rendered, json!("node1 ok\n"));
    }

    #[test]
    fn test_keys_are_not_rendered() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(
                &json!({"{{ x }}": ["{{ x }}", 1, null]}),
                &ctx(json!({"x": "y"})),
            )
            .unwrap();
        assert_eq!(rendered, json!({"{{ x }}": ["y", 1, null]}));
    }

    #[test]
    fn test_malformed_expression_is_error() {
        let engine = TemplateEngine::new();
        let err = engine.render_str("{{ 1 + }}", &Map::new()).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));

        let err = engine.render_str("a {{ b", &Map::new()).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }

    #[test]
    fn test_defaults_are_overridden_by_context() {
        let mut engine = TemplateEngine::with_defaults(ctx(json!({"site": "athens", "x": 1})));
        engine.set_default("zone", json!("b"));

        let rendered = engine
            .render_str("{{ site }}-{{ zone }}-{{ x }}", &ctx(json!({"x": 2})))
            .unwrap();
        assert_eq!(rendered, json!("athens-b-2"));
    }

    #[test]
    fn test_block_templates_render_to_text() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render_str("{% if ok %}yes{% else %}no{% endif %}", &ctx(json!({"ok": true})))
            .unwrap();
        assert_eq!(rendered, json!("yes"));
    }

    #[test]
    fn test_render_string_coerces() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render_string("{{ port }}", &ctx(json!({"port": 22})))
            .unwrap();
        assert_eq!(rendered, "22");
    }

    #[test]
    fn test_plain_scalars_pass_through() {
        let engine = TemplateEngine::new();
        let value = json!({"a": "plain", "b": 1.5, "c": false});
        assert_eq!(engine.render(&value, &Map::new()).unwrap(), value);
    }
}
