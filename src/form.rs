use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{WidgetError, WidgetResult};
use crate::schema::{FieldDefinition, FieldType, WidgetDefinition};

/// Repeaters inside sections inside repeaters... stop somewhere sane.
pub const MAX_FIELD_DEPTH: usize = 16;

/// One entry of the edit form: everything the form renderer needs to draw a
/// field, with nested containers compiled into `fields`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<CompiledForm>,
}

/// Insertion-ordered mapping from field variable to its form entry.
///
/// Order is significant: the form renderer draws fields in this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledForm {
    entries: Vec<(String, FormField)>,
}

impl CompiledForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, variable: &str) -> Option<&FormField> {
        self.entries
            .iter()
            .find(|(key, _)| key == variable)
            .map(|(_, field)| field)
    }

    pub fn contains_key(&self, variable: &str) -> bool {
        self.get(variable).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormField)> {
        self.entries.iter().map(|(key, field)| (key.as_str(), field))
    }

    /// Insert or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, variable: impl Into<String>, field: FormField) {
        let variable = variable.into();
        match self.entries.iter_mut().find(|(key, _)| *key == variable) {
            Some((_, existing)) => *existing = field,
            None => self.entries.push((variable, field)),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for CompiledForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, field) in &self.entries {
            map.serialize_entry(key, field)?;
        }
        map.end()
    }
}

/// Compile a field list into its edit form.
pub fn compile(fields: &[FieldDefinition]) -> WidgetResult<CompiledForm> {
    compile_level(fields, "", 0)
}

/// Compile a widget definition's form, prepending the synthetic `title`
/// field when the widget has a title.
pub fn compile_form(definition: &WidgetDefinition) -> WidgetResult<CompiledForm> {
    let compiled = compile(&definition.fields)?;
    if !definition.has_title {
        return Ok(compiled);
    }

    let mut form = CompiledForm::new();
    form.insert("title", title_field());
    for (variable, field) in compiled.entries {
        form.insert(variable, field);
    }
    Ok(form)
}

fn title_field() -> FormField {
    FormField {
        field_type: FieldType::Text,
        label: Some("Title".to_string()),
        options: Map::new(),
        fields: None,
    }
}

fn compile_level(
    fields: &[FieldDefinition],
    parent: &str,
    depth: usize,
) -> WidgetResult<CompiledForm> {
    if depth > MAX_FIELD_DEPTH {
        return Err(WidgetError::MaxNestingDepthExceeded {
            max_depth: MAX_FIELD_DEPTH,
        });
    }

    let mut form = CompiledForm::new();
    let mut seen = HashSet::new();

    for field in fields {
        let path = field_path(parent, &field.variable);
        validate_variable(&field.variable, &path)?;

        if !seen.insert(field.variable.as_str()) {
            return Err(WidgetError::schema(
                path,
                "variable is already used by a sibling field",
            ));
        }

        let nested = if field.field_type.is_container() {
            let sub_fields = field.sub_fields.as_deref().ok_or_else(|| {
                WidgetError::schema(
                    path.as_str(),
                    format!("{} field is missing sub_fields", field.field_type.as_str()),
                )
            })?;
            Some(compile_level(sub_fields, &path, depth + 1)?)
        } else {
            if field.sub_fields.is_some() {
                tracing::debug!(field = %path, "ignoring sub_fields on a non-container field");
            }
            None
        };

        form.entries.push((
            field.variable.clone(),
            FormField {
                field_type: field.field_type.clone(),
                label: field.label.clone(),
                options: field.options.clone(),
                fields: nested,
            },
        ));
    }

    Ok(form)
}

fn field_path(parent: &str, variable: &str) -> String {
    if parent.is_empty() {
        variable.to_string()
    } else {
        format!("{}.{}", parent, variable)
    }
}

fn validate_variable(variable: &str, path: &str) -> WidgetResult<()> {
    static ADDRESSABLE_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = ADDRESSABLE_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

    if variable.is_empty() {
        return Err(WidgetError::schema(path, "variable must not be empty"));
    }
    if !re.is_match(variable) {
        tracing::warn!(
            field = %path,
            "variable is not a plain identifier, templates can only reach it with ['...']"
        );
    }
    Ok(())
}
