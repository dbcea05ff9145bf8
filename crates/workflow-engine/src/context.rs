//! Execution context: the key-value store threaded through one run.
//!
//! Values are addressed by dotted paths (`order.items.0.sku`): object keys
//! by name, array elements by index.

use serde_json::{Map, Value};

/// Data passed between the nodes of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    data: Map<String, Value>,
}

impl ExecutionContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded from trigger data.
    ///
    /// Object fields become top-level keys. Any other value is stored under
    /// `trigger` so it stays reachable.
    pub fn from_trigger(trigger_data: &Value) -> Self {
        let mut context = Self::new();
        match trigger_data {
            Value::Object(map) => context.data = map.clone(),
            Value::Null => {}
            other => {
                context.data.insert("trigger".to_string(), other.clone());
            }
        }
        context
    }

    /// Resolve a dotted path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let (first, rest) = match path.split_once('.') {
            Some((first, rest)) => (first.trim(), Some(rest)),
            None => (path.trim(), None),
        };
        if first.is_empty() {
            return None;
        }
        let root = self.data.get(first)?;
        match rest {
            Some(rest) => lookup(root, rest),
            None => Some(root),
        }
    }

    /// Write a value at a dotted path, creating intermediate objects.
    ///
    /// Intermediate values that are neither objects nor indexable arrays are
    /// replaced by objects.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        if last.is_empty() {
            return;
        }
        if parents.is_empty() {
            self.data.insert(last.to_string(), value);
            return;
        }

        let mut current = self
            .data
            .entry(parents[0].to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        for segment in &parents[1..] {
            current = descend(current, segment);
        }

        if let Value::Array(items) = current {
            if let Ok(index) = last.parse::<usize>() {
                if index < items.len() {
                    items[index] = value;
                    return;
                }
            }
        }
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        if let Value::Object(map) = current {
            map.insert(last.to_string(), value);
        }
    }

    /// Get a top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a top-level value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Remove a top-level value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Check if a top-level key exists in the context.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Get all data as a reference.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Snapshot of the whole context as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Get all data, consuming the context.
    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    /// Copy every top-level key of `other` into this context, except `skip`.
    pub fn merge_from(&mut self, other: &ExecutionContext, skip: &[&str]) {
        for (key, value) in &other.data {
            if !skip.contains(&key.as_str()) {
                self.data.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Resolve a dotted path inside a single value.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').map(str::trim) {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn descend<'a>(current: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match &*current {
        Value::Array(items) => segment.parse::<usize>().ok().filter(|i| *i < items.len()),
        _ => None,
    };
    match (index, current) {
        (Some(index), Value::Array(items)) => &mut items[index],
        (_, current) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            match current {
                Value::Object(map) => map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                other => other,
            }
        }
    }
}

/// Render a value the way it appears inside text.
///
/// Strings are inserted without quotes, `null` as the empty string, and
/// everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ExecutionContext {
        ExecutionContext::from_trigger(&json!({
            "user": {"name": "Ada", "tags": ["admin", "ops"]},
            "count": 3
        }))
    }

    #[test]
    fn test_get_path() {
        let context = sample();
        assert_eq!(context.get_path("count"), Some(&json!(3)));
        assert_eq!(context.get_path("user.name"), Some(&json!("Ada")));
        assert_eq!(context.get_path("user.tags.1"), Some(&json!("ops")));
        assert_eq!(context.get_path("user.tags.9"), None);
        assert_eq!(context.get_path("user.name.first"), None);
        assert_eq!(context.get_path(""), None);
    }

    #[test]
    fn test_set_path_creates_objects() {
        let mut context = ExecutionContext::new();
        context.set_path("result.summary.text", json!("done"));
        assert_eq!(context.get_path("result.summary.text"), Some(&json!("done")));

        // Scalars in the way are replaced
        context.set("flag", json!(true));
        context.set_path("flag.reason", json!("override"));
        assert_eq!(context.get_path("flag.reason"), Some(&json!("override")));
    }

    #[test]
    fn test_set_path_array_index() {
        let mut context = sample();
        context.set_path("user.tags.0", json!("root"));
        assert_eq!(context.get_path("user.tags"), Some(&json!(["root", "ops"])));
    }

    #[test]
    fn test_non_object_trigger_data() {
        let context = ExecutionContext::from_trigger(&json!([1, 2]));
        assert_eq!(context.get_path("trigger.1"), Some(&json!(2)));
        assert!(ExecutionContext::from_trigger(&Value::Null).data().is_empty());
    }

    #[test]
    fn test_merge_from_skips_keys() {
        let mut parent = sample();
        let mut child = parent.clone();
        child.set("item", json!("x"));
        child.set("count", json!(4));

        parent.merge_from(&child, &["item"]);
        assert_eq!(parent.get("count"), Some(&json!(4)));
        assert!(!parent.contains("item"));
    }

    #[test]
    fn test_lookup_inside_value() {
        let value = json!({"a": [{"b": 1}]});
        assert_eq!(lookup(&value, "a.0.b"), Some(&json!(1)));
        assert_eq!(lookup(&value, "a..b"), None);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("hi")), "hi");
        assert_eq!(value_to_text(&json!(null)), "");
        assert_eq!(value_to_text(&json!(2.5)), "2.5");
        assert_eq!(value_to_text(&json!({"a": 1})), "{\"a\":1}");
    }
}
