// src/query/operators.rs
//! Query operator trait definitions and implementations
//!
//! Each filter operator is a separate type implementing the
//! `OperatorMatcher` trait, dispatched through a global registry. Operand
//! validation is split out of matching so the whole filter can be checked
//! before any document is examined.

use crate::error::{BisonError, Result};
use crate::value_utils::{compare_values, is_truthy};
use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;

/// Trait for all query operators
///
/// `validate` checks the operand shape up front; `matches` evaluates one
/// document leaf against the operand. `doc_value` is `None` when the path
/// does not resolve in the document.
pub trait OperatorMatcher: Send + Sync {
    /// Returns the operator name (e.g., "$eq", "$gt")
    fn name(&self) -> &'static str;

    /// Validate the operand before evaluation; the default accepts anything
    fn validate(&self, _operand: &Value) -> Result<()> {
        Ok(())
    }

    /// Check whether a document leaf satisfies the operator
    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool>;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// $eq: deep equality between the document leaf and the operand
///
/// Shorthand: `{ field: value }`. A missing leaf never matches.
pub struct EqOperator;

impl OperatorMatcher for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(doc_value == Some(operand))
    }
}

/// $ne: deep inequality
///
/// A missing leaf counts as not-equal and matches.
pub struct NeOperator;

impl OperatorMatcher for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(doc_value != Some(operand))
    }
}

/// $gt: ordering match, numbers and strings only
pub struct GtOperator;

impl OperatorMatcher for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        validate_ordering_operand(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        compare_with_predicate(doc_value, operand, |ord| ord == std::cmp::Ordering::Greater)
    }
}

/// $gte: ordering match, greater than or equal
pub struct GteOperator;

impl OperatorMatcher for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        validate_ordering_operand(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        compare_with_predicate(doc_value, operand, |ord| {
            matches!(ord, std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        })
    }
}

/// $lt: ordering match, less than
pub struct LtOperator;

impl OperatorMatcher for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        validate_ordering_operand(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        compare_with_predicate(doc_value, operand, |ord| ord == std::cmp::Ordering::Less)
    }
}

/// $lte: ordering match, less than or equal
pub struct LteOperator;

impl OperatorMatcher for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn validate(&self, operand: &Value) -> Result<()> {
        validate_ordering_operand(self.name(), operand)
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        compare_with_predicate(doc_value, operand, |ord| {
            matches!(ord, std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        })
    }
}

// ============================================================================
// ELEMENT OPERATORS
// ============================================================================

/// $exists: presence of the leaf
///
/// The operand is read for truthiness: `{"$exists": true}` requires the
/// leaf, `{"$exists": false}` (or 0, "", null) requires its absence.
pub struct ExistsOperator;

impl OperatorMatcher for ExistsOperator {
    fn name(&self) -> &'static str {
        "$exists"
    }

    fn matches(&self, doc_value: Option<&Value>, operand: &Value) -> Result<bool> {
        Ok(doc_value.is_some() == is_truthy(operand))
    }
}

// ============================================================================
// OPERATOR REGISTRY
// ============================================================================

lazy_static! {
    /// Global registry of all query operators
    ///
    /// Initialized once at program startup and immutable thereafter; all
    /// operator implementations are `Send + Sync`.
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn OperatorMatcher>> = {
        let mut registry: HashMap<&'static str, Box<dyn OperatorMatcher>> = HashMap::new();

        registry.insert("$eq", Box::new(EqOperator));
        registry.insert("$ne", Box::new(NeOperator));
        registry.insert("$gt", Box::new(GtOperator));
        registry.insert("$gte", Box::new(GteOperator));
        registry.insert("$lt", Box::new(LtOperator));
        registry.insert("$lte", Box::new(LteOperator));
        registry.insert("$exists", Box::new(ExistsOperator));

        registry
    };
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Ordering operands must themselves be orderable
fn validate_ordering_operand(name: &str, operand: &Value) -> Result<()> {
    match operand {
        Value::Number(_) | Value::String(_) => Ok(()),
        other => Err(BisonError::InvalidQuery(format!(
            "{} requires a numeric or string operand, got {}",
            name,
            type_name(other)
        ))),
    }
}

/// Generic comparison helper for the $gt/$gte/$lt/$lte operators
///
/// A missing leaf or an incomparable leaf type never matches; only a
/// malformed operand is an error, and that is caught during validation.
fn compare_with_predicate<F>(doc_value: Option<&Value>, operand: &Value, predicate: F) -> Result<bool>
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    match doc_value {
        None => Ok(false),
        Some(v) => Ok(compare_values(v, operand).map(predicate).unwrap_or(false)),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
