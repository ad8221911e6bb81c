//! Value semantics shared by the evaluator and the filters: how values print,
//! when they count as true, and how they compare.

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// A runtime value plus whether it is already safe to emit unescaped.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Val {
    pub value: Value,
    pub safe: bool,
}

impl Val {
    pub fn plain(value: Value) -> Self {
        Self { value, safe: false }
    }

    pub fn safe(markup: String) -> Self {
        Self {
            value: Value::String(markup),
            safe: true,
        }
    }
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// How a value prints. Containers print as nothing.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn display_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// `empty` test: null, false, empty string and empty containers. Zero is not empty.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(true) | Value::Number(_) => false,
    }
}

/// Numeric view of a value, if it has one. Null and booleans count as numbers.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Array(_) | Value::Object(_) => None,
    }
}

pub(crate) fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => {
            is_empty(other) || other.as_f64() == Some(0.0)
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(x), Value::String(s)) | (Value::String(s), Value::Number(x)) => {
            match s.trim().parse::<f64>() {
                Ok(parsed) => x.as_f64() == Some(parsed),
                Err(_) => false,
            }
        }
        (Value::Bool(x), other) | (other, Value::Bool(x)) => *x == truthy(other),
        _ => a == b,
    }
}

pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match as_number(a).zip(as_number(b)) {
        Some((x, y)) => x.partial_cmp(&y),
        None => Some(display(a).cmp(&display(b))),
    }
}

pub(crate) fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::Object(map) => map.contains_key(&display(needle)),
        Value::String(s) => s.contains(display(needle).as_str()),
        _ => false,
    }
}
