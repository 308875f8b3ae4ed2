// src/update.rs
//! Update interpretation
//!
//! Update expressions mirror filters in structure: a bare scalar leaf is a
//! `$set` shorthand, an Object of `$`-prefixed keys applies the named
//! operators to the leaf, and a nested operator-free Object descends.
//! Expressions are compiled into a flat list of `(path, op)` pairs before
//! anything is mutated, so every structural error surfaces while the
//! document set is still untouched.

use serde_json::{Map, Number, Value};

use crate::error::{BisonError, Result};
use crate::value_utils::{delete_path, get_path_mut, set_path};

/// A single compiled mutation at one dotted path
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Overwrite the leaf, creating intermediate Objects as needed
    Set(Value),
    /// Numeric leaf += 1
    Inc,
    /// Numeric leaf -= 1
    Dec,
    /// Numeric leaf += operand
    Add(Number),
    /// Numeric leaf -= operand
    Substract(Number),
    /// Remove the leaf key; absent keys are a no-op
    Delete,
}

/// Compile an update expression into `(path, op)` pairs
///
/// Fails with `InvalidUpdate` on unknown `$` operators, operator objects
/// mixing operator and field keys, and non-numeric `$add`/`$substract`
/// operands. `$subtract` is accepted as an alias for the canonical
/// `$substract`.
pub fn parse_update(expr: &Value) -> Result<Vec<(String, UpdateOp)>> {
    let obj = expr.as_object().ok_or_else(|| {
        BisonError::InvalidUpdate("update expression must be an object".to_string())
    })?;
    let mut ops = Vec::new();
    flatten_update(obj, "", &mut ops)?;
    Ok(ops)
}

fn flatten_update(
    obj: &Map<String, Value>,
    prefix: &str,
    ops: &mut Vec<(String, UpdateOp)>,
) -> Result<()> {
    for (key, value) in obj {
        if key.starts_with('$') {
            return Err(BisonError::InvalidUpdate(format!(
                "operator '{}' is not valid in field position",
                key
            )));
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) if inner.keys().any(|k| k.starts_with('$')) => {
                parse_operator_object(inner, &path, ops)?;
            }
            Value::Object(inner) => {
                // operator-free object: descend
                flatten_update(inner, &path, ops)?;
            }
            scalar => ops.push((path, UpdateOp::Set(scalar.clone()))),
        }
    }
    Ok(())
}

fn parse_operator_object(
    obj: &Map<String, Value>,
    path: &str,
    ops: &mut Vec<(String, UpdateOp)>,
) -> Result<()> {
    for (op_name, operand) in obj {
        if !op_name.starts_with('$') {
            return Err(BisonError::InvalidUpdate(format!(
                "cannot mix operator and field keys ('{}' in an operator object)",
                op_name
            )));
        }
        let op = match op_name.as_str() {
            "$set" => UpdateOp::Set(operand.clone()),
            "$inc" => UpdateOp::Inc,
            "$dec" => UpdateOp::Dec,
            "$add" => UpdateOp::Add(numeric_operand(op_name, operand)?),
            "$substract" | "$subtract" => UpdateOp::Substract(numeric_operand(op_name, operand)?),
            "$delete" => UpdateOp::Delete,
            other => {
                return Err(BisonError::InvalidUpdate(format!(
                    "unknown update operator: {}",
                    other
                )))
            }
        };
        ops.push((path.to_string(), op));
    }
    Ok(())
}

fn numeric_operand(op_name: &str, operand: &Value) -> Result<Number> {
    match operand {
        Value::Number(n) => Ok(n.clone()),
        _ => Err(BisonError::InvalidUpdate(format!(
            "{} requires a numeric operand",
            op_name
        ))),
    }
}

/// Apply compiled ops to one document, in expression order
///
/// Numeric operators require the leaf to exist and be numeric
/// (`InvalidUpdate` otherwise); `$set` fails with `InvalidPath` when an
/// intermediate path segment is a non-Object. The caller is responsible for
/// applying to a scratch copy if it needs failed updates to leave no trace.
pub fn apply_update(document: &mut Value, ops: &[(String, UpdateOp)]) -> Result<()> {
    for (path, op) in ops {
        match op {
            UpdateOp::Set(value) => set_path(document, path, value.clone())?,
            UpdateOp::Delete => {
                delete_path(document, path);
            }
            UpdateOp::Inc => arithmetic(document, path, "$inc", &Number::from(1), false)?,
            UpdateOp::Dec => arithmetic(document, path, "$dec", &Number::from(1), true)?,
            UpdateOp::Add(n) => arithmetic(document, path, "$add", n, false)?,
            UpdateOp::Substract(n) => arithmetic(document, path, "$substract", n, true)?,
        }
    }
    Ok(())
}

/// Add `delta` (negated for the subtracting operators) to a numeric leaf
///
/// Integer arithmetic stays in i64 when both sides are integers, so `$inc`
/// on 100 yields 101 and not 101.0.
fn arithmetic(
    document: &mut Value,
    path: &str,
    op_name: &str,
    delta: &Number,
    negate: bool,
) -> Result<()> {
    let leaf = get_path_mut(document, path).ok_or_else(|| {
        BisonError::InvalidUpdate(format!("{}: no field at path '{}'", op_name, path))
    })?;
    let current = match leaf {
        Value::Number(n) => n.clone(),
        other => {
            return Err(BisonError::InvalidUpdate(format!(
                "{}: field '{}' is not numeric (got {})",
                op_name,
                path,
                crate::query::operators::type_name(other)
            )))
        }
    };

    if let (Some(a), Some(b)) = (current.as_i64(), delta.as_i64()) {
        let b = if negate { -b } else { b };
        *leaf = Value::from(a + b);
        return Ok(());
    }
    match (current.as_f64(), delta.as_f64()) {
        (Some(a), Some(b)) => {
            let b = if negate { -b } else { b };
            *leaf = Value::from(a + b);
            Ok(())
        }
        _ => Err(BisonError::InvalidUpdate(format!(
            "{}: cannot apply to field '{}'",
            op_name, path
        ))),
    }
}
