use serde_json::Value;

use super::value::{display, escape_html, is_empty, Val};
use crate::error::{WidgetError, WidgetResult};
use crate::helpers::{ImageOutput, RenderHelpers};

/// Every filter a template may use. Names are checked when the template
/// compiles, so a typo never silently renders blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Filter {
    Raw,
    Escape,
    Default,
    Upper,
    Lower,
    Capitalize,
    Trim,
    Length,
    Join,
    First,
    Last,
    Keys,
    Nl2br,
    JsonEncode,
    Image,
    PanelsRender,
}

impl Filter {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "raw" => Filter::Raw,
            "escape" | "e" => Filter::Escape,
            "default" => Filter::Default,
            "upper" => Filter::Upper,
            "lower" => Filter::Lower,
            "capitalize" => Filter::Capitalize,
            "trim" => Filter::Trim,
            "length" => Filter::Length,
            "join" => Filter::Join,
            "first" => Filter::First,
            "last" => Filter::Last,
            "keys" => Filter::Keys,
            "nl2br" => Filter::Nl2br,
            "json_encode" => Filter::JsonEncode,
            "image" => Filter::Image,
            "panels_render" => Filter::PanelsRender,
            _ => return None,
        })
    }

    /// Allowed argument count, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Filter::Default => (0, 1),
            Filter::Join => (0, 1),
            Filter::Escape => (0, 1),
            Filter::Image => (0, 2),
            _ => (0, 0),
        }
    }
}

pub(crate) fn apply(
    filter: Filter,
    input: Val,
    args: &[Value],
    helpers: &RenderHelpers<'_>,
) -> WidgetResult<Val> {
    let Val { value, safe } = input;

    Ok(match filter {
        Filter::Raw => Val { value, safe: true },
        Filter::Escape => {
            if let Some(strategy) = args.first() {
                if display(strategy) != "html" {
                    return Err(WidgetError::evaluation(format!(
                        "escape: unsupported strategy '{}'",
                        display(strategy)
                    )));
                }
            }
            if safe {
                Val { value, safe }
            } else {
                Val::safe(escape_html(&display(&value)))
            }
        }
        Filter::Default => {
            if is_empty(&value) {
                Val::plain(args.first().cloned().unwrap_or(Value::String(String::new())))
            } else {
                Val { value, safe }
            }
        }
        Filter::Upper => map_text(value, safe, |s| s.to_uppercase()),
        Filter::Lower => map_text(value, safe, |s| s.to_lowercase()),
        Filter::Trim => map_text(value, safe, |s| s.trim().to_string()),
        Filter::Capitalize => map_text(value, safe, |s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        }),
        Filter::Length => Val::plain(Value::from(length(&value))),
        Filter::Join => {
            let separator = args.first().map(display).unwrap_or_default();
            let joined = match &value {
                Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(&separator),
                Value::Object(map) => map.values().map(display).collect::<Vec<_>>().join(&separator),
                other => display(other),
            };
            Val::plain(Value::String(joined))
        }
        Filter::First => Val::plain(first_or_last(&value, true)),
        Filter::Last => Val::plain(first_or_last(&value, false)),
        Filter::Keys => Val::plain(match &value {
            Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
            Value::Array(items) => (0..items.len()).map(Value::from).collect(),
            _ => Value::Array(Vec::new()),
        }),
        Filter::Nl2br => {
            let text = if safe {
                display(&value)
            } else {
                escape_html(&display(&value))
            };
            Val::safe(text.replace('\n', "<br />\n"))
        }
        Filter::JsonEncode => Val::plain(Value::String(
            serde_json::to_string(&value)
                .map_err(|e| WidgetError::evaluation(format!("json_encode: {}", e)))?,
        )),
        Filter::Image => image(&value, args, helpers)?,
        Filter::PanelsRender => Val::plain(Value::String(helpers.resolve_embedded_content(&value))),
    })
}

fn map_text(value: Value, safe: bool, f: impl Fn(&str) -> String) -> Val {
    Val {
        value: Value::String(f(&display(&value))),
        safe,
    }
}

fn length(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => display(other).chars().count(),
    }
}

fn first_or_last(value: &Value, first: bool) -> Value {
    match value {
        Value::Array(items) => {
            let item = if first { items.first() } else { items.last() };
            item.cloned().unwrap_or(Value::Null)
        }
        Value::Object(map) => {
            let item = if first { map.values().next() } else { map.values().next_back() };
            item.cloned().unwrap_or(Value::Null)
        }
        Value::String(s) => {
            let c = if first { s.chars().next() } else { s.chars().next_back() };
            c.map(|c| Value::String(c.to_string())).unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

/// `image(kind = "html", size = "full")`
fn image(attachment: &Value, args: &[Value], helpers: &RenderHelpers<'_>) -> WidgetResult<Val> {
    let kind = match args.first() {
        None => "html".to_string(),
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => {
            return Err(WidgetError::evaluation(
                "image: output kind must be a string",
            ))
        }
    };
    let output = ImageOutput::parse(&kind).ok_or_else(|| {
        WidgetError::evaluation(format!(
            "image: unknown output kind '{}', expected html, src, width or height",
            kind
        ))
    })?;

    let size = match args.get(1) {
        None => "full".to_string(),
        Some(Value::String(size)) => size.clone(),
        Some(_) => return Err(WidgetError::evaluation("image: size must be a string")),
    };

    let resolved = helpers.resolve_image(attachment, output, &size)?;
    Ok(Val::plain(Value::String(resolved)))
}
