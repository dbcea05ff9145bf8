//! `{{path}}` template interpolation over the execution context.
//!
//! Pure functions: resolving never fails. References that do not resolve are
//! replaced by the empty string and reported back to the caller, which
//! decides how to surface them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::context::{value_to_text, ExecutionContext};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder pattern is a valid regex")
});

/// Result of interpolating a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated<T> {
    pub value: T,
    /// Paths that did not resolve, in order of first appearance
    pub unresolved: Vec<String>,
}

/// Extract every placeholder path in a string.
pub fn placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|cap| cap[1].trim().to_string())
        .collect()
}

/// Interpolate a piece of text, always producing text.
pub fn interpolate_text(text: &str, context: &ExecutionContext) -> Interpolated<String> {
    let mut unresolved = Vec::new();
    let value = render(text, context, &mut unresolved);
    Interpolated { value, unresolved }
}

/// Interpolate every string inside a JSON value.
///
/// A string that consists of exactly one placeholder is replaced by the
/// referenced value itself, keeping its JSON type. Object keys are left
/// untouched.
pub fn interpolate_value(value: &Value, context: &ExecutionContext) -> Interpolated<Value> {
    let mut unresolved = Vec::new();
    let value = walk(value, context, &mut unresolved);
    Interpolated { value, unresolved }
}

/// Interpolate every string inside a JSON value, always producing strings.
///
/// Used where the value's shape is fixed, e.g. a config field that must
/// stay a string even when it holds a single placeholder.
pub fn interpolate_strings(value: &Value, context: &ExecutionContext) -> Interpolated<Value> {
    let mut unresolved = Vec::new();
    let value = walk_as_text(value, context, &mut unresolved);
    Interpolated { value, unresolved }
}

fn walk(value: &Value, context: &ExecutionContext, unresolved: &mut Vec<String>) -> Value {
    map_strings(value, &mut |text: &str| interpolate_string(text, context, unresolved))
}

fn walk_as_text(value: &Value, context: &ExecutionContext, unresolved: &mut Vec<String>) -> Value {
    map_strings(value, &mut |text: &str| Value::String(render(text, context, unresolved)))
}

fn map_strings(value: &Value, f: &mut dyn FnMut(&str) -> Value) -> Value {
    match value {
        Value::String(text) => f(text),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(map_strings(item, f));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                out.insert(key.clone(), map_strings(item, f));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn interpolate_string(text: &str, context: &ExecutionContext, unresolved: &mut Vec<String>) -> Value {
    if let Some(cap) = PLACEHOLDER.captures(text) {
        let whole = cap.get(0).map(|m| m.as_str().len()) == Some(text.trim().len());
        if whole && text.trim_start().starts_with("{{") {
            let path = cap[1].trim();
            return match context.get_path(path) {
                Some(resolved) => resolved.clone(),
                None => {
                    note(unresolved, path);
                    Value::String(String::new())
                }
            };
        }
    }
    Value::String(render(text, context, unresolved))
}

fn render(text: &str, context: &ExecutionContext, unresolved: &mut Vec<String>) -> String {
    PLACEHOLDER
        .replace_all(text, |cap: &regex::Captures<'_>| {
            let path = cap[1].trim();
            match context.get_path(path) {
                Some(resolved) => value_to_text(resolved),
                None => {
                    note(unresolved, path);
                    String::new()
                }
            }
        })
        .into_owned()
}

fn note(unresolved: &mut Vec<String>, path: &str) {
    if !unresolved.iter().any(|p| p == path) {
        unresolved.push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ExecutionContext {
        ExecutionContext::from_trigger(&json!({
            "user": {"name": "Ada", "age": 36},
            "items": [1, 2, 3]
        }))
    }

    #[test]
    fn test_interpolate_text() {
        let result = interpolate_text("Hello {{user.name}}, you are {{ user.age }}", &context());
        assert_eq!(result.value, "Hello Ada, you are 36");
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn test_unresolved_becomes_empty() {
        let result = interpolate_text("Hi {{user.email}}!{{user.email}}", &context());
        assert_eq!(result.value, "Hi !");
        assert_eq!(result.unresolved, vec!["user.email".to_string()]);
    }

    #[test]
    fn test_whole_placeholder_keeps_type() {
        let config = json!({
            "count": "{{user.age}}",
            "list": "{{items}}",
            "missing": "{{nope}}",
            "nested": [{"greeting": "Dear {{user.name}}"}],
            "flag": true
        });
        let result = interpolate_value(&config, &context());
        assert_eq!(
            result.value,
            json!({
                "count": 36,
                "list": [1, 2, 3],
                "missing": "",
                "nested": [{"greeting": "Dear Ada"}],
                "flag": true
            })
        );
        assert_eq!(result.unresolved, vec!["nope".to_string()]);
    }

    #[test]
    fn test_interpolate_strings_stays_textual() {
        let result = interpolate_strings(&json!({"prompt": "{{user.age}}"}), &context());
        assert_eq!(result.value, json!({"prompt": "36"}));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{{a.b}} and {{ c }}"),
            vec!["a.b".to_string(), "c".to_string()]
        );
        assert!(placeholders("no templates here").is_empty());
    }

    #[test]
    fn test_deterministic() {
        let config = json!({"a": "{{user.name}}", "b": "{{x}} {{y}}"});
        let first = interpolate_value(&config, &context());
        let second = interpolate_value(&config, &context());
        assert_eq!(first, second);
        assert_eq!(first.unresolved, vec!["x".to_string(), "y".to_string()]);
    }
}
