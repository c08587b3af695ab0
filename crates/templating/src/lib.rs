//! # templating
//!
//! Native-typed templating and path overrides over nested configuration
//! values (`serde_json::Value`).
//!
//! - [`TemplateEngine::render`] walks a value structurally and evaluates
//!   every string scalar as a template. A scalar made of a single
//!   `{{ expression }}` keeps the native type of the result.
//! - [`override_path`] mutates a value in place at a dotted/indexed path.
//!
//! ## Example
//!
//! ```
//! use serde_json::{json, Map};
//! use templating::TemplateEngine;
//!
//! let engine = TemplateEngine::new();
//! let mut context = Map::new();
//! context.insert("x".into(), json!(5));
//!
//! let rendered = engine.render(&json!({"k": "{{ x }}"}), &context).unwrap();
//! assert_eq!(rendered, json!({"k": 5}));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod path;

pub use engine::TemplateEngine;
pub use error::{Error, Result};
pub use path::{Segment, override_path, parse_path};
