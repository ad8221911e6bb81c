//! Style variables: `@name: value;` declarations in a widget's stylesheet
//! whose values can be taken from instance data.
//!
//! A name is a `-`-separated path into the instance. `@box-padding-top: 10px;`
//! reads `instance.box.padding.top`; array elements are addressed by their
//! decimal index. Anything that does not lead to a scalar is left out and
//! the stylesheet's own default stands.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::ops::Range;

/// Variable name → instance value. Values are always strings, numbers or booleans.
pub type StyleVariables = Map<String, Value>;

struct Declaration<'a> {
    name: &'a str,
    /// Byte range of the declared value, between `:` and `;`.
    value: Range<usize>,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Scan for `@name` + optional spaces + `:` + anything up to `;` on the same line.
fn declarations(source: &str) -> Vec<Declaration<'_>> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut found = Vec::new();
    let mut i = 0;

    while i < len {
        if bytes[i] != b'@' {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut j = start;
        while j < len && is_name_byte(bytes[j]) {
            j += 1;
        }
        if j == start {
            i += 1;
            continue;
        }
        let name = &source[start..j];

        while j < len && bytes[j] == b' ' {
            j += 1;
        }
        if j >= len || bytes[j] != b':' {
            i = j;
            continue;
        }
        j += 1;

        let value_start = j;
        while j < len && bytes[j] != b';' && bytes[j] != b'\n' {
            j += 1;
        }
        if j < len && bytes[j] == b';' {
            found.push(Declaration {
                name,
                value: value_start..j,
            });
            i = j + 1;
        } else {
            i = j;
        }
    }

    found
}

/// Names of all declared variables, first-seen order, without duplicates.
pub fn declared_variables(source: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    declarations(source)
        .into_iter()
        .filter(|decl| seen.insert(decl.name))
        .map(|decl| decl.name.to_string())
        .collect()
}

/// Resolve every declared variable against the instance. Best effort:
/// unresolvable names are omitted, never reported.
pub fn resolve_variables(source: &str, instance: &Value) -> StyleVariables {
    let mut vars = StyleVariables::new();
    for name in declared_variables(source) {
        if let Some(value) = lookup(instance, &name) {
            vars.insert(name, value.clone());
        }
    }
    vars
}

fn lookup<'v>(instance: &'v Value, name: &str) -> Option<&'v Value> {
    let mut current = instance;
    for segment in name.split('-') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(current),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Rewrite the value of each declaration named in `vars`, leaving every
/// other byte of the stylesheet untouched.
///
/// Values that could end the declaration or open a rule (`;`, `{`, `}` or a
/// line break) are not written; the declaration keeps its own value.
pub fn apply_variables(source: &str, vars: &StyleVariables) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for decl in declarations(source) {
        let Some(text) = vars.get(decl.name).and_then(style_text) else {
            continue;
        };
        if text.contains([';', '{', '}', '\n', '\r']) {
            tracing::warn!(
                variable = decl.name,
                "style value would break out of its declaration, keeping default"
            );
            continue;
        }
        let raw = &source[decl.value.clone()];
        let leading = raw.len() - raw.trim_start().len();

        out.push_str(&source[last..decl.value.start + leading]);
        out.push_str(&text);
        last = decl.value.end;
    }

    out.push_str(&source[last..]);
    out
}

fn style_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
