//! Dotted/indexed path overrides on nested configuration values.
//!
//! Paths look like `a.b[1].c`, `[0][0]` or `[key]`. Dot segments address
//! mapping keys; bracket segments index sequences (integers) or mappings
//! (anything else).

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One step of an override path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `name` - a mapping key
    Key(String),
    /// `[n]` or `[name]` - a sequence index or a mapping key
    Index(String),
}

/// Parse an override path into segments.
pub fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars().peekable();
    // Whether the previous segment was closed by `]`, which allows `[0].a`
    let mut after_bracket = false;

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if key.is_empty() && !after_bracket {
                    return Err(Error::path(path, "empty key segment"));
                }
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                after_bracket = false;
                if chars.peek().is_none() {
                    return Err(Error::path(path, "trailing '.'"));
                }
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                let mut index = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('[') | None => return Err(Error::path(path, "unclosed '['")),
                        Some(c) => index.push(c),
                    }
                }
                if index.is_empty() {
                    return Err(Error::path(path, "empty '[]'"));
                }
                segments.push(Segment::Index(index));
                after_bracket = true;
            }
            ']' => return Err(Error::path(path, "unexpected ']'")),
            c => {
                if after_bracket {
                    return Err(Error::path(path, "expected '.' or '[' after ']'"));
                }
                key.push(c);
            }
        }
    }

    if !key.is_empty() {
        segments.push(Segment::Key(key));
    }
    if segments.is_empty() {
        return Err(Error::path(path, "empty path"));
    }

    Ok(segments)
}

/// Set `value` at `path` inside `tree`, in place.
///
/// Missing or non-container intermediate keys are replaced by empty mappings
/// so that partially specified trees can be overridden without declaring the
/// intermediate levels first. Sequence indices past the end are ignored and
/// leave the tree unchanged.
///
/// # Example
///
/// ```
/// use serde_json::json;
///
/// let mut tree = json!({"a": {"b": ["x", {"c": 1}]}});
/// templating::override_path(&mut tree, "a.b[1].c", json!(2)).unwrap();
/// assert_eq!(tree, json!({"a": {"b": ["x", {"c": 2}]}}));
/// ```
pub fn override_path(tree: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = parse_path(path)?;
    apply(tree, &segments, value);
    Ok(())
}

fn apply(node: &mut Value, segments: &[Segment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };

    let Some(slot) = slot_for(node, first, rest.is_empty()) else {
        return;
    };

    match rest.first() {
        None => *slot = value,
        Some(next) => {
            if !accepts(slot, next) {
                *slot = Value::Object(Map::new());
            }
            apply(slot, rest, value);
        }
    }
}

/// Locate (or create, for mapping keys) the child addressed by `segment`.
fn slot_for<'a>(node: &'a mut Value, segment: &Segment, last: bool) -> Option<&'a mut Value> {
    match (node, segment) {
        (Value::Object(map), Segment::Key(key) | Segment::Index(key)) => {
            if last {
                Some(map.entry(key.clone()).or_insert(Value::Null))
            } else {
                Some(
                    map.entry(key.clone())
                        .or_insert_with(|| Value::Object(Map::new())),
                )
            }
        }
        (Value::Array(items), Segment::Index(index)) => {
            let index: usize = index.trim().parse().ok()?;
            items.get_mut(index)
        }
        _ => None,
    }
}

/// Whether `node` can be descended into with `segment` as-is.
fn accepts(node: &Value, segment: &Segment) -> bool {
    match segment {
        Segment::Key(_) => node.is_object(),
        Segment::Index(_) => node.is_object() || node.is_array(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple() {
        let mut x = json!({"a": "b"});
        override_path(&mut x, "a", json!("c")).unwrap();
        assert_eq!(x, json!({"a": "c"}));
    }

    #[test]
    fn test_nested_mapping() {
        let mut x = json!({"a": {"b": "c"}});
        override_path(&mut x, "a.b", json!("d")).unwrap();
        assert_eq!(x, json!({"a": {"b": "d"}}));
    }

    #[test]
    fn test_mapping_inside_list() {
        let mut x = json!({"a": {"b": ["x", {"c": 1}]}});
        override_path(&mut x, "a.b[1].c", json!({"deep": true})).unwrap();
        assert_eq!(x, json!({"a": {"b": ["x", {"c": {"deep": true}}]}}));
    }

    #[test]
    fn test_list_in_list() {
        let mut x = json!([["a"]]);
        override_path(&mut x, "[0][0]", json!("b")).unwrap();
        assert_eq!(x, json!([["b"]]));
    }

    #[test]
    fn test_list_out_of_bounds_is_noop() {
        let mut x = json!([["a"]]);
        override_path(&mut x, "[0][2]", json!("b")).unwrap();
        assert_eq!(x, json!([["a"]]));

        let mut y = json!({"a": {"b": ["x"]}});
        override_path(&mut y, "a.b[5].c", json!(1)).unwrap();
        assert_eq!(y, json!({"a": {"b": ["x"]}}));
    }

    #[test]
    fn test_bracket_key_on_mapping() {
        let mut x = json!({"a": "b"});
        override_path(&mut x, "[a]", json!("c")).unwrap();
        assert_eq!(x, json!({"a": "c"}));
    }

    #[test]
    fn test_creates_missing_intermediate_mappings() {
        let mut x = json!({"a": 1});
        override_path(&mut x, "b.c.d", json!(true)).unwrap();
        assert_eq!(x, json!({"a": 1, "b": {"c": {"d": true}}}));
    }

    #[test]
    fn test_replaces_scalar_intermediate() {
        let mut x = json!({"a": "scalar"});
        override_path(&mut x, "a.b", json!(2)).unwrap();
        assert_eq!(x, json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_parse_path_segments() {
        assert_eq!(
            parse_path("a.b[1].c").unwrap(),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index("1".into()),
                Segment::Key("c".into()),
            ]
        );
        assert_eq!(
            parse_path("[0][k]").unwrap(),
            vec![Segment::Index("0".into()), Segment::Index("k".into())]
        );
    }

    #[test]
    fn test_parse_path_rejects_malformed() {
        for bad in ["", "a..b", "a.", "a[1", "a]", "[]", "[0]x"] {
            assert!(parse_path(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
