// src/query.rs
//! Filter interpretation
//!
//! A filter is itself a JSON Object. Interpretation is recursive:
//!
//! - a leaf with a scalar value is an equality predicate,
//! - a leaf whose value is an Object of `$`-prefixed keys applies those
//!   operators to the leaf, AND-combined,
//! - a nested Object without operator keys descends into the document and
//!   is evaluated as a sub-filter,
//! - dotted keys ("address.city") resolve the same leaves as nesting.
//!
//! [`validate_filter`] walks the whole expression before any document is
//! touched, so a malformed filter can never affect state and never reaches
//! the cache.

pub mod operators;

use serde_json::{Map, Value};

use crate::error::{BisonError, Result};
use crate::value_utils::get_path;
use operators::{type_name, OPERATOR_REGISTRY};

/// Validate a filter expression without evaluating it
///
/// Rejects non-Object filters, unknown `$`-prefixed operators, operator
/// objects mixing operator and field keys, and ordering operators with
/// non-orderable operands.
pub fn validate_filter(filter: &Value) -> Result<()> {
    let obj = filter.as_object().ok_or_else(|| {
        BisonError::InvalidQuery(format!("filter must be an object, got {}", type_name(filter)))
    })?;
    validate_filter_object(obj)
}

fn validate_filter_object(obj: &Map<String, Value>) -> Result<()> {
    for (key, condition) in obj {
        if key.starts_with('$') {
            return Err(BisonError::InvalidQuery(format!(
                "operator '{}' is not valid in field position",
                key
            )));
        }
        if let Value::Object(cond_obj) = condition {
            if is_operator_object(cond_obj) {
                validate_operator_object(cond_obj)?;
            } else {
                // nested sub-filter
                validate_filter_object(cond_obj)?;
            }
        }
        // scalar and array leaves are equality predicates, always valid
    }
    Ok(())
}

fn validate_operator_object(cond_obj: &Map<String, Value>) -> Result<()> {
    for (op_name, operand) in cond_obj {
        if !op_name.starts_with('$') {
            return Err(BisonError::InvalidQuery(format!(
                "cannot mix operator and field keys ('{}' in an operator object)",
                op_name
            )));
        }
        let operator = OPERATOR_REGISTRY
            .get(op_name.as_str())
            .ok_or_else(|| BisonError::InvalidQuery(format!("unknown operator: {}", op_name)))?;
        operator.validate(operand)?;
    }
    Ok(())
}

/// An Object condition is an operator object when any key is `$`-prefixed;
/// mixed objects are rejected during validation
fn is_operator_object(obj: &Map<String, Value>) -> bool {
    !obj.is_empty() && obj.keys().any(|k| k.starts_with('$'))
}

/// Check whether a document matches a filter
///
/// The filter is assumed to have passed [`validate_filter`]; an empty
/// filter matches every document. Documents that are not Objects (possible
/// for collections seeded from a source document) match only the empty
/// filter.
pub fn matches_filter(document: &Value, filter: &Value) -> Result<bool> {
    let obj = filter.as_object().ok_or_else(|| {
        BisonError::InvalidQuery(format!("filter must be an object, got {}", type_name(filter)))
    })?;
    matches_filter_object(document, obj)
}

fn matches_filter_object(document: &Value, obj: &Map<String, Value>) -> Result<bool> {
    for (key, condition) in obj {
        let doc_value = get_path(document, key);
        let matched = match condition {
            Value::Object(cond_obj) if is_operator_object(cond_obj) => {
                matches_operator_object(doc_value, cond_obj)?
            }
            Value::Object(cond_obj) => {
                // descend: the sub-object is a filter over the sub-document
                match doc_value {
                    Some(sub @ Value::Object(_)) => matches_filter_object(sub, cond_obj)?,
                    _ => false,
                }
            }
            scalar => doc_value == Some(scalar),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_operator_object(doc_value: Option<&Value>, cond_obj: &Map<String, Value>) -> Result<bool> {
    for (op_name, operand) in cond_obj {
        let operator = OPERATOR_REGISTRY
            .get(op_name.as_str())
            .ok_or_else(|| BisonError::InvalidQuery(format!("unknown operator: {}", op_name)))?;
        if !operator.matches(doc_value, operand)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filter_matches_all() {
        let doc = json!({"a": 1});
        assert!(matches_filter(&doc, &json!({})).unwrap());
        // non-object documents match only the empty filter
        assert!(matches_filter(&json!("plain string"), &json!({})).unwrap());
        assert!(!matches_filter(&json!("plain string"), &json!({"a": 1})).unwrap());
    }

    #[test]
    fn test_simple_equality() {
        let doc = json!({"a": 10, "b": 20});
        assert!(matches_filter(&doc, &json!({"a": 10})).unwrap());
        assert!(!matches_filter(&doc, &json!({"a": 11})).unwrap());
        assert!(matches_filter(&doc, &json!({"a": 10, "b": 20})).unwrap());
        assert!(!matches_filter(&doc, &json!({"a": 10, "b": 21})).unwrap());
    }

    #[test]
    fn test_bool_and_string_equality() {
        let doc = json!({"a": true, "b": false, "name": "my_name"});
        assert!(matches_filter(&doc, &json!({"b": false})).unwrap());
        assert!(matches_filter(&doc, &json!({"name": "my_name"})).unwrap());
        assert!(!matches_filter(&doc, &json!({"a": false})).unwrap());
    }

    #[test]
    fn test_operator_leaf() {
        let doc = json!({"a": 101});
        assert!(matches_filter(&doc, &json!({"a": {"$gt": 100}})).unwrap());
        assert!(!matches_filter(&doc, &json!({"a": {"$gt": 101}})).unwrap());
        assert!(matches_filter(&doc, &json!({"a": {"$gte": 101}})).unwrap());
        assert!(matches_filter(&doc, &json!({"a": {"$ne": 100}})).unwrap());
    }

    #[test]
    fn test_operators_and_combined_on_one_leaf() {
        let doc = json!({"age": 25});
        assert!(matches_filter(&doc, &json!({"age": {"$gte": 18, "$lt": 30}})).unwrap());
        assert!(!matches_filter(&doc, &json!({"age": {"$gte": 18, "$lt": 25}})).unwrap());
    }

    #[test]
    fn test_nested_descend_and_dotted_path_agree() {
        let doc = json!({"address": {"city": "NYC", "zip": 10001}});
        assert!(matches_filter(&doc, &json!({"address": {"city": "NYC"}})).unwrap());
        assert!(matches_filter(&doc, &json!({"address.city": "NYC"})).unwrap());
        assert!(!matches_filter(&doc, &json!({"address": {"city": "LA"}})).unwrap());
        assert!(!matches_filter(&doc, &json!({"address.city": "LA"})).unwrap());
    }

    #[test]
    fn test_nested_filter_is_subset_match() {
        // descent applies a sub-filter, not deep equality
        let doc = json!({"address": {"city": "NYC", "zip": 10001}});
        assert!(matches_filter(&doc, &json!({"address": {"zip": 10001}})).unwrap());
        // deep equality via $eq requires the exact object
        assert!(!matches_filter(&doc, &json!({"address": {"$eq": {"zip": 10001}}})).unwrap());
        assert!(matches_filter(
            &doc,
            &json!({"address": {"$eq": {"city": "NYC", "zip": 10001}}})
        )
        .unwrap());
    }

    #[test]
    fn test_object_equality_with_eq() {
        let doc = json!({"a": {"myobj": 20}, "b": 20, "c": 120});
        let filter = json!({
            "a": {"$eq": {"myobj": 20}},
            "b": {"$gt": 19},
            "c": {"$lte": 120}
        });
        assert!(matches_filter(&doc, &filter).unwrap());
    }

    #[test]
    fn test_exists() {
        let doc = json!({"email": "x@example.com"});
        assert!(matches_filter(&doc, &json!({"email": {"$exists": true}})).unwrap());
        assert!(!matches_filter(&doc, &json!({"email": {"$exists": false}})).unwrap());
        assert!(matches_filter(&doc, &json!({"phone": {"$exists": false}})).unwrap());
        assert!(!matches_filter(&doc, &json!({"phone": {"$exists": true}})).unwrap());
    }

    #[test]
    fn test_empty_object_leaf_descends() {
        // {} is a sub-filter: leaf must exist and be an object
        let doc = json!({"a": {}});
        assert!(matches_filter(&doc, &json!({"a": {}})).unwrap());
        assert!(!matches_filter(&json!({"a": 5}), &json!({"a": {}})).unwrap());
        assert!(!matches_filter(&json!({"b": {}}), &json!({"a": {}})).unwrap());
    }

    #[test]
    fn test_validate_rejects_unknown_operator() {
        let err = validate_filter(&json!({"a": {"$regex": "x"}})).unwrap_err();
        assert!(matches!(err, BisonError::InvalidQuery(_)));
        let err = validate_filter(&json!({"a": {"$foo": 1}})).unwrap_err();
        assert!(matches!(err, BisonError::InvalidQuery(_)));
    }

    #[test]
    fn test_validate_rejects_operator_in_field_position() {
        let err = validate_filter(&json!({"$gt": 5})).unwrap_err();
        assert!(matches!(err, BisonError::InvalidQuery(_)));
    }

    #[test]
    fn test_validate_rejects_bad_ordering_operand() {
        let err = validate_filter(&json!({"a": {"$gt": false}})).unwrap_err();
        assert!(matches!(err, BisonError::InvalidQuery(_)));
        let err = validate_filter(&json!({"a": {"$lte": [1]}})).unwrap_err();
        assert!(matches!(err, BisonError::InvalidQuery(_)));
        // nested operators are validated too
        let err = validate_filter(&json!({"a": {"b": {"$gt": null}}})).unwrap_err();
        assert!(matches!(err, BisonError::InvalidQuery(_)));
    }

    #[test]
    fn test_validate_rejects_mixed_operator_object() {
        let err = validate_filter(&json!({"a": {"$gt": 1, "b": 2}})).unwrap_err();
        assert!(matches!(err, BisonError::InvalidQuery(_)));
    }

    #[test]
    fn test_validate_rejects_non_object_filter() {
        assert!(validate_filter(&json!([1, 2])).is_err());
        assert!(validate_filter(&json!(5)).is_err());
        assert!(validate_filter(&json!({})).is_ok());
    }

    #[test]
    fn test_missing_leaf_semantics() {
        let doc = json!({"a": 1});
        assert!(!matches_filter(&doc, &json!({"b": 1})).unwrap());
        assert!(!matches_filter(&doc, &json!({"b": {"$gt": 0}})).unwrap());
        // $ne on a missing leaf matches
        assert!(matches_filter(&doc, &json!({"b": {"$ne": 1}})).unwrap());
    }
}
