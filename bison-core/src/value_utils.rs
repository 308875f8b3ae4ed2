//! Value utility functions shared across modules
//!
//! Dotted-path access into JSON documents plus the value comparison used by
//! the query and update interpreters. Paths address Object keys only
//! ("address.city"); an intermediate segment that is missing or not an
//! Object ends the walk.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::{BisonError, Result};

/// Get a nested value with dot notation support
///
/// Returns `None` if any segment is missing or an intermediate segment is
/// not an Object.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use bison_core::value_utils::get_path;
///
/// let doc = json!({"address": {"city": "NYC"}});
/// assert_eq!(get_path(&doc, "address.city"), Some(&json!("NYC")));
/// ```
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get(part)?,
            _ => return None,
        }
    }
    Some(value)
}

/// Mutable variant of [`get_path`]
pub fn get_path_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get_mut(part)?,
            _ => return None,
        }
    }
    Some(value)
}

/// Assign the leaf at `path`, creating missing intermediate Objects
///
/// Fails with `InvalidPath` when an intermediate segment already exists but
/// is not an Object (the resolver never overwrites a scalar to make room).
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    match path.split_once('.') {
        None => {
            let map = as_object_mut(doc, path)?;
            map.insert(path.to_string(), value);
            Ok(())
        }
        Some((head, rest)) => {
            let map = as_object_mut(doc, path)?;
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                return Err(BisonError::InvalidPath(format!(
                    "segment '{}' exists but is not an object",
                    head
                )));
            }
            set_path(child, rest, value)
        }
    }
}

/// Remove the leaf key at `path`, returning the removed value
///
/// A missing leaf (or a walk that dead-ends on a non-Object) is a no-op and
/// returns `None`.
pub fn delete_path(doc: &mut Value, path: &str) -> Option<Value> {
    let map = doc.as_object_mut()?;
    match path.split_once('.') {
        // shift_remove keeps the order of the remaining keys intact;
        // plain remove would swap the last entry into the hole
        None => map.shift_remove(path),
        Some((head, rest)) => delete_path(map.get_mut(head)?, rest),
    }
}

fn as_object_mut<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>> {
    match doc {
        Value::Object(map) => Ok(map),
        _ => Err(BisonError::InvalidPath(format!(
            "cannot set '{}': target is not an object",
            path
        ))),
    }
}

/// Compare two JSON values for the ordering operators
///
/// Returns `Some(Ordering)` for Number vs Number (f64 comparison) and
/// String vs String (lexicographic); `None` for everything else.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use bison_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None); // incompatible
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        _ => None,
    }
}

/// Truthiness of a JSON value, used by the `$exists` operand
///
/// Null, false, 0, "", [] and {} are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
