use thiserror::Error;

pub type WidgetResult<T> = Result<T, WidgetError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WidgetError {
    // --- schema errors ---

    #[error("Schema error in field '{path}': {reason}")]
    Schema { path: String, reason: String },

    #[error("Maximum field nesting depth ({max_depth}) exceeded")]
    MaxNestingDepthExceeded { max_depth: usize },

    // --- template errors ---

    #[error("Template syntax error at line {line}, column {column}: {message}")]
    TemplateSyntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Template evaluation error: {0}")]
    TemplateEvaluation(String),

    // --- stored definition errors ---

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl WidgetError {
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        WidgetError::Schema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        WidgetError::TemplateEvaluation(msg.into())
    }

    /// True for errors the widget author has to fix in the definition itself.
    /// These must reach the admin-facing caller instead of degrading output.
    pub fn is_authoring_error(&self) -> bool {
        matches!(
            self,
            WidgetError::Schema { .. }
                | WidgetError::MaxNestingDepthExceeded { .. }
                | WidgetError::TemplateSyntax { .. }
        )
    }
}

impl From<serde_json::Error> for WidgetError {
    fn from(err: serde_json::Error) -> Self {
        WidgetError::DeserializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for WidgetError {
    fn from(err: serde_yaml::Error) -> Self {
        WidgetError::DeserializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_reports_location() {
        let err = WidgetError::TemplateSyntax {
            line: 3,
            column: 7,
            message: "unexpected '}}'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Template syntax error at line 3, column 7: unexpected '}}'"
        );
    }

    #[test]
    fn authoring_errors_are_flagged() {
        assert!(WidgetError::schema("items", "missing sub_fields").is_authoring_error());
        assert!(WidgetError::MaxNestingDepthExceeded { max_depth: 16 }.is_authoring_error());
        assert!(!WidgetError::evaluation("bad argument").is_authoring_error());
        assert!(!WidgetError::DeserializationError("eof".into()).is_authoring_error());
    }
}
