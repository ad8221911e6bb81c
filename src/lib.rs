//! # Custom Widget Builder
//!
//! Turns an admin-authored widget definition (typed fields, a template and
//! an optional stylesheet) into a widget type that renders per-placement
//! instances.
//!
//! ## Features
//! - Nested field schemas compiled into ordered edit forms
//! - A Twig-flavoured template language with HTML escaping on by default
//! - Image and page-builder helpers injected at render time
//! - Style variables (`@name: value;`) resolved from instance data
//! - Content-versioned script and stylesheet registration
//!
//! ## Example
//! ```ignore
//! use widget_builder::{CustomWidget, RenderArgs, RenderHelpers, WidgetDefinition};
//! use serde_json::json;
//!
//! let definition = WidgetDefinition::from_json(r#"{
//!   "has_title": true,
//!   "fields": [{ "variable": "body", "type": "textarea", "label": "Body" }],
//!   "template_code": "<div class=\"box\">{{ body|nl2br }}</div>"
//! }"#)?;
//!
//! let widget = CustomWidget::new("note", "Note", definition);
//! let html = widget.render(
//!     &json!({ "title": "Hello", "body": "line one\nline two" }),
//!     &RenderArgs::new("<h3>", "</h3>"),
//!     &RenderHelpers::default(),
//! )?;
//! ```

pub mod assets;
pub mod error;
pub mod form;
pub mod helpers;
pub mod schema;
pub mod style;
pub mod template;
pub mod widget;

// --- Core types ---
pub use error::{WidgetError, WidgetResult};
pub use form::{CompiledForm, FormField, MAX_FIELD_DEPTH};
pub use schema::{AssetEntry, FieldDefinition, FieldType, WidgetDefinition};
pub use style::StyleVariables;
pub use template::{Template, TemplateCache, MAX_TEMPLATE_DEPTH};
pub use widget::{CustomWidget, RenderArgs};

// --- Collaborators ---
pub use assets::{AssetKind, AssetRef, RegisteredAsset};
pub use helpers::{
    AssetResolver, ImageOutput, ImageRendition, MediaLibrary, NoAssets, NoMedia, PanelsRenderer,
    RenderHelpers, ResolvedAsset, PAGE_BUILDER_REQUIRED,
};

// --- Lifecycle operations ---
pub use widget::{
    build_edit_form, compute_style_variables, list_required_assets, render, validate_definition,
};

/// Compile a field list into an edit form.
pub fn compile_fields(fields: &[FieldDefinition]) -> WidgetResult<CompiledForm> {
    form::compile(fields)
}

/// Render a template against instance data, without title handling.
pub fn render_template(
    source: &str,
    instance: &serde_json::Value,
    helpers: &RenderHelpers<'_>,
) -> WidgetResult<String> {
    template::render(source, instance, helpers)
}

/// Resolve a stylesheet's variables against instance data.
pub fn resolve_style_variables(source: &str, instance: &serde_json::Value) -> StyleVariables {
    style::resolve_variables(source, instance)
}
