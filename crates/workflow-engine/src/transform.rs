//! Transform node: pure data reshaping over the execution context.
//!
//! Transformations run in order and each one sees the writes of the ones
//! before it, so their templates and expressions are resolved step by step
//! rather than once up front. The steps are staged on a copy of the context
//! and only land when all of them succeed.

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::constants::limits;
use crate::context::{lookup, value_to_text, ExecutionContext};
use crate::error::NodeError;
use crate::interpolate::interpolate_text;
use crate::types::{TransformConfig, TransformKind, Transformation};

/// Apply every transformation of a node to the context.
///
/// Returns the placeholder paths that did not resolve along the way. On error
/// the context is left as it was.
pub fn apply(config: &TransformConfig, context: &mut ExecutionContext) -> Result<Vec<String>, NodeError> {
    let mut staged = context.clone();
    let unresolved = apply_steps(config, &mut staged)?;
    *context = staged;
    Ok(unresolved)
}

fn apply_steps(config: &TransformConfig, context: &mut ExecutionContext) -> Result<Vec<String>, NodeError> {
    let mut unresolved = Vec::new();
    for (index, transformation) in config.transformations.iter().enumerate() {
        if transformation.target.trim().is_empty() {
            return Err(NodeError::Transform(format!(
                "transformation #{} has no target",
                index + 1
            )));
        }
        let value = evaluate(transformation, context, &mut unresolved)?;
        log::debug!(
            "Transform {:?} -> '{}'",
            transformation.kind,
            transformation.target
        );
        context.set_path(&transformation.target, value);
    }
    Ok(unresolved)
}

fn evaluate(
    transformation: &Transformation,
    context: &ExecutionContext,
    unresolved: &mut Vec<String>,
) -> Result<Value, NodeError> {
    match transformation.kind {
        TransformKind::Copy => {
            let source = required(&transformation.source, "copy", "source")?;
            Ok(context.get_path(source).cloned().unwrap_or(Value::Null))
        }
        TransformKind::Format => {
            let template = required(&transformation.template, "format", "template")?;
            let rendered = interpolate_text(template, context);
            note_all(unresolved, rendered.unresolved);
            Ok(Value::String(rendered.value))
        }
        TransformKind::Extract => extract(transformation, context),
        TransformKind::Combine => Ok(combine(transformation, context)),
        TransformKind::Calculate => {
            let expression = required(&transformation.expression, "calculate", "expression")?;
            let rendered = interpolate_text(expression, context);
            note_all(unresolved, rendered.unresolved);
            let result = Calculator::new(&rendered.value, context).evaluate()?;
            Ok(number_value(result))
        }
    }
}

fn required<'a>(field: &'a Option<String>, kind: &str, name: &str) -> Result<&'a str, NodeError> {
    field
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| NodeError::Transform(format!("{} transformation requires '{}'", kind, name)))
}

fn note_all(unresolved: &mut Vec<String>, paths: Vec<String>) {
    for path in paths {
        if !unresolved.contains(&path) {
            unresolved.push(path);
        }
    }
}

/// Pull a piece out of the source value: a nested path, a regex match, or both
/// (path first, then pattern over the result).
fn extract(transformation: &Transformation, context: &ExecutionContext) -> Result<Value, NodeError> {
    let source = required(&transformation.source, "extract", "source")?;
    let mut value = context.get_path(source).cloned().unwrap_or(Value::Null);

    if let Some(path) = transformation.path.as_deref().filter(|p| !p.is_empty()) {
        value = lookup(&value, path).cloned().unwrap_or(Value::Null);
    }

    if let Some(pattern) = transformation.pattern.as_deref().filter(|p| !p.is_empty()) {
        let regex = Regex::new(pattern)
            .map_err(|e| NodeError::Transform(format!("invalid pattern '{}': {}", pattern, e)))?;
        let text = value_to_text(&value);
        value = match regex.captures(&text) {
            Some(caps) => {
                let matched = caps.get(1).or_else(|| caps.get(0));
                matched
                    .map(|m| Value::String(m.as_str().to_string()))
                    .unwrap_or(Value::Null)
            }
            None => Value::Null,
        };
    }

    Ok(value)
}

/// Arrays are concatenated, objects merged (later sources win), anything else
/// joined as text with the separator.
fn combine(transformation: &Transformation, context: &ExecutionContext) -> Value {
    let values: Vec<Value> = transformation
        .sources
        .iter()
        .map(|path| context.get_path(path).cloned().unwrap_or(Value::Null))
        .collect();

    if !values.is_empty() && values.iter().all(Value::is_array) {
        let items = values
            .into_iter()
            .flat_map(|v| match v {
                Value::Array(items) => items,
                _ => Vec::new(),
            })
            .collect();
        return Value::Array(items);
    }

    if !values.is_empty() && values.iter().all(Value::is_object) {
        let mut merged = Map::new();
        for value in values {
            if let Value::Object(map) = value {
                merged.extend(map);
            }
        }
        return Value::Object(merged);
    }

    let separator = transformation.separator.as_deref().unwrap_or("");
    Value::String(
        values
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(separator),
    )
}

/// Whole results are stored as integers, everything else as floats.
fn number_value(result: f64) -> Value {
    if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        Value::Number(Number::from(result as i64))
    } else {
        Number::from_f64(result)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Recursive-descent evaluator for arithmetic expressions.
///
/// Grammar:
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := unary (('*' | '/' | '%') unary)*
/// unary  := '-' unary | atom
/// atom   := number | path | '(' expr ')'
/// ```
/// Bare paths (`order.total`) are looked up in the context and must hold
/// numbers or numeric strings. Nesting deeper than
/// [`limits::CALCULATION_DEPTH`] is rejected.
struct Calculator<'a> {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    context: &'a ExecutionContext,
}

impl<'a> Calculator<'a> {
    fn new(expression: &str, context: &'a ExecutionContext) -> Self {
        Self {
            chars: expression.chars().collect(),
            pos: 0,
            depth: 0,
            context,
        }
    }

    fn evaluate(mut self) -> Result<f64, NodeError> {
        let result = self.expr()?;
        self.skip_whitespace();
        if self.pos < self.chars.len() {
            return Err(self.error(format!("unexpected '{}'", self.chars[self.pos])));
        }
        if !result.is_finite() {
            return Err(self.error("result is not a finite number"));
        }
        Ok(result)
    }

    fn expr(&mut self) -> Result<f64, NodeError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some('-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, NodeError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(op @ ('/' | '%')) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(self.error("division by zero"));
                    }
                    value = if op == '/' { value / divisor } else { value % divisor };
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, NodeError> {
        if self.peek() == Some('-') {
            self.pos += 1;
            self.descend()?;
            let value = self.unary();
            self.depth -= 1;
            return Ok(-value?);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<f64, NodeError> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                self.descend()?;
                let value = self.expr();
                self.depth -= 1;
                let value = value?;
                if self.peek() != Some(')') {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let literal = self.take_while(|c| c.is_ascii_digit() || c == '.');
                literal
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("invalid number '{}'", literal)))
            }
            Some(c) if c.is_alphabetic() || c == '_' => {
                let path = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
                self.variable(&path)
            }
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn descend(&mut self) -> Result<(), NodeError> {
        if self.depth >= limits::CALCULATION_DEPTH {
            return Err(self.error(format!(
                "nested deeper than {} levels",
                limits::CALCULATION_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn variable(&self, path: &str) -> Result<f64, NodeError> {
        match self.context.get_path(path) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| self.error(format!("'{}' is not a finite number", path))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.error(format!("'{}' is not numeric", path))),
            Some(Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
            Some(_) => Err(self.error(format!("'{}' is not numeric", path))),
            None => Err(self.error(format!("'{}' is not in the context", path))),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.chars.get(self.pos).is_some_and(|c| pred(*c)) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn error(&self, message: impl Into<String>) -> NodeError {
        let expression: String = self.chars.iter().collect();
        NodeError::Transform(format!("cannot calculate '{}': {}", expression, message.into()))
    }
}
