//! Condition evaluation for condition nodes.

use regex::Regex;
use serde_json::Value;

use crate::context::{value_to_text, ExecutionContext};
use crate::error::NodeError;
use crate::types::{Condition, ConditionConfig, ConditionLogic, ConditionOperator};

/// Evaluate a condition node's checks, combined with its logic.
///
/// An empty `and` holds; an empty `or` does not. Evaluation stops at the
/// first check that decides the outcome.
pub fn evaluate(config: &ConditionConfig, context: &ExecutionContext) -> Result<bool, NodeError> {
    match config.logic {
        ConditionLogic::And => {
            for condition in &config.conditions {
                if !evaluate_condition(condition, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ConditionLogic::Or => {
            for condition in &config.conditions {
                if evaluate_condition(condition, context)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Evaluate a single check.
///
/// A field missing from the context reads as `null`. Ordering comparisons
/// against non-numeric operands and invalid `matches` patterns are errors.
pub fn evaluate_condition(condition: &Condition, context: &ExecutionContext) -> Result<bool, NodeError> {
    let actual = context.get_path(&condition.field).unwrap_or(&Value::Null);
    let expected = &condition.value;

    let result = match condition.operator {
        ConditionOperator::Equals => loosely_equal(actual, expected),
        ConditionOperator::NotEquals => !loosely_equal(actual, expected),
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::NotContains => !contains(actual, expected),
        ConditionOperator::StartsWith => value_to_text(actual).starts_with(&value_to_text(expected)),
        ConditionOperator::EndsWith => value_to_text(actual).ends_with(&value_to_text(expected)),
        ConditionOperator::IsEmpty => is_empty(actual),
        ConditionOperator::IsNotEmpty => !is_empty(actual),
        ConditionOperator::GreaterThan => compare(condition, actual, expected)? > 0.0,
        ConditionOperator::LessThan => compare(condition, actual, expected)? < 0.0,
        ConditionOperator::GreaterOrEqual => compare(condition, actual, expected)? >= 0.0,
        ConditionOperator::LessOrEqual => compare(condition, actual, expected)? <= 0.0,
        ConditionOperator::Matches => {
            let pattern = value_to_text(expected);
            let regex = Regex::new(&pattern).map_err(|e| {
                NodeError::Evaluation(format!("invalid pattern '{}': {}", pattern, e))
            })?;
            regex.is_match(&value_to_text(actual))
        }
    };
    Ok(result)
}

/// Equality that treats numbers numerically and numeric strings as numbers.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => match (actual, expected) {
            (Value::String(a), Value::Bool(b)) | (Value::Bool(b), Value::String(a)) => {
                a.eq_ignore_ascii_case(&b.to_string())
            }
            _ => false,
        },
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, expected)),
        Value::Object(map) => map.contains_key(&value_to_text(expected)),
        Value::Null => false,
        other => value_to_text(other).contains(&value_to_text(expected)),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn compare(condition: &Condition, actual: &Value, expected: &Value) -> Result<f64, NodeError> {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => Ok(a - b),
        _ => Err(NodeError::Evaluation(format!(
            "cannot compare '{}' ({}) with {} numerically",
            condition.field,
            value_to_text(actual),
            expected
        ))),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
