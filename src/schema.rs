use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::WidgetResult;

/// The kind of input a field renders as in the edit form.
///
/// Unknown type names are kept verbatim so that a definition authored against
/// a newer form renderer still compiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Checkbox,
    Select,
    Radio,
    Color,
    Link,
    Image,
    Media,
    Builder,
    Repeater,
    Section,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Checkbox => "checkbox",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Color => "color",
            FieldType::Link => "link",
            FieldType::Image => "image",
            FieldType::Media => "media",
            FieldType::Builder => "builder",
            FieldType::Repeater => "repeater",
            FieldType::Section => "section",
            FieldType::Other(name) => name,
        }
    }

    /// Repeaters and sections own child fields.
    pub fn is_container(&self) -> bool {
        matches!(self, FieldType::Repeater | FieldType::Section)
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "text" => FieldType::Text,
            "textarea" => FieldType::Textarea,
            "number" => FieldType::Number,
            "checkbox" => FieldType::Checkbox,
            "select" => FieldType::Select,
            "radio" => FieldType::Radio,
            "color" => FieldType::Color,
            "link" => FieldType::Link,
            "image" => FieldType::Image,
            "media" => FieldType::Media,
            "builder" => FieldType::Builder,
            "repeater" => FieldType::Repeater,
            "section" => FieldType::Section,
            _ => FieldType::Other(name),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

/// One user-configurable input of a custom widget.
///
/// Container types (`repeater`, `section`) carry their children in
/// `sub_fields`; every other attribute the author set (`default`, `options`,
/// `description`, ...) lands in `options` and is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub variable: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_fields: Option<Vec<FieldDefinition>>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl FieldDefinition {
    pub fn new(variable: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            variable: variable.into(),
            field_type,
            label: None,
            sub_fields: None,
            options: Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_sub_fields(mut self, sub_fields: Vec<FieldDefinition>) -> Self {
        self.sub_fields = Some(sub_fields);
        self
    }
}

/// A script or stylesheet attached to a widget type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Attachment reference. Stored forms use either a number or a string.
    #[serde(default, deserialize_with = "attachment_ref")]
    pub file: String,
    /// Whether the asset needs jQuery loaded first.
    #[serde(default)]
    pub jquery: bool,
}

fn attachment_ref<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Str(String),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => (n as i64).to_string(),
        Raw::Str(s) => s.trim().to_string(),
        Raw::Null => String::new(),
    })
}

/// The admin-authored definition of one custom widget type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetDefinition {
    pub fields: Vec<FieldDefinition>,
    pub has_title: bool,
    pub template_code: String,
    #[serde(alias = "less_code")]
    pub style_code: String,
    pub scripts: Vec<AssetEntry>,
    pub styles: Vec<AssetEntry>,
    pub description: String,
}

impl WidgetDefinition {
    pub fn from_json(json: &str) -> WidgetResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> WidgetResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_type_round_trips_unknown_names() {
        let ty: FieldType = serde_json::from_value(json!("slider")).unwrap();
        assert_eq!(ty, FieldType::Other("slider".to_string()));
        assert_eq!(serde_json::to_value(&ty).unwrap(), json!("slider"));
    }

    #[test]
    fn only_repeater_and_section_are_containers() {
        assert!(FieldType::Repeater.is_container());
        assert!(FieldType::Section.is_container());
        assert!(!FieldType::Text.is_container());
        assert!(!FieldType::Other("repeaterish".into()).is_container());
    }

    #[test]
    fn field_keeps_type_specific_options() {
        let field: FieldDefinition = serde_json::from_value(json!({
            "variable": "align",
            "type": "select",
            "label": "Alignment",
            "options": { "left": "Left", "right": "Right" },
            "default": "left"
        }))
        .unwrap();

        assert_eq!(field.variable, "align");
        assert_eq!(field.field_type, FieldType::Select);
        assert_eq!(field.label.as_deref(), Some("Alignment"));
        assert_eq!(field.options.get("default"), Some(&json!("left")));
        assert!(field.options.contains_key("options"));
        assert!(!field.options.contains_key("variable"));
    }

    #[test]
    fn definition_accepts_less_code_alias_and_numeric_files() {
        let def = WidgetDefinition::from_json(
            r#"{
                "has_title": true,
                "less_code": "@color: red;",
                "scripts": [{ "file": 42, "jquery": true }],
                "styles": [{ "file": "7" }, { "file": null }]
            }"#,
        )
        .unwrap();

        assert!(def.has_title);
        assert_eq!(def.style_code, "@color: red;");
        assert_eq!(def.scripts[0].file, "42");
        assert!(def.scripts[0].jquery);
        assert_eq!(def.styles[0].file, "7");
        assert_eq!(def.styles[1].file, "");
        assert!(def.fields.is_empty());
    }

    #[test]
    fn definition_loads_from_yaml() {
        let yaml = r#"
has_title: false
template_code: "<p>{{ text }}</p>"
fields:
  - variable: items
    type: repeater
    sub_fields:
      - variable: text
        type: text
"#;
        let def = WidgetDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.fields[0].sub_fields.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn malformed_definition_is_a_deserialization_error() {
        let err = WidgetDefinition::from_json("{ \"fields\": 3 }").unwrap_err();
        assert!(matches!(err, crate::WidgetError::DeserializationError(_)));
    }
}
