//! The runtime face of a custom widget type: edit form, render, style
//! variables and assets, all driven by one [`WidgetDefinition`].

use serde_json::Value;

use crate::assets::{self, AssetRef, RegisteredAsset};
use crate::error::WidgetResult;
use crate::form::{self, CompiledForm};
use crate::helpers::{AssetResolver, RenderHelpers};
use crate::schema::WidgetDefinition;
use crate::style::{self, StyleVariables};
use crate::template::{self, escape_html, Template, TemplateCache};

/// Markup placed around a widget's title by the host page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderArgs {
    pub before_title: String,
    pub after_title: String,
}

impl RenderArgs {
    pub fn new(before_title: impl Into<String>, after_title: impl Into<String>) -> Self {
        Self {
            before_title: before_title.into(),
            after_title: after_title.into(),
        }
    }
}

/// A published widget type. Holds no per-instance state, so one value can
/// render any number of instances from any number of threads.
#[derive(Debug)]
pub struct CustomWidget {
    id: String,
    class_name: String,
    name: String,
    definition: WidgetDefinition,
    templates: TemplateCache,
}

impl CustomWidget {
    /// `slug` is the URL-safe name of the widget type, e.g. `hero-banner`.
    pub fn new(slug: &str, name: impl Into<String>, definition: WidgetDefinition) -> Self {
        Self {
            id: format!("custom-{}", slug),
            class_name: format!("CustomWidget{}", pascal_case(slug)),
            name: name.into(),
            definition,
            templates: TemplateCache::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn definition(&self) -> &WidgetDefinition {
        &self.definition
    }

    pub fn build_edit_form(&self) -> WidgetResult<CompiledForm> {
        build_edit_form(&self.definition)
    }

    /// Render one instance. The compiled template is cached on first use.
    #[tracing::instrument(skip_all, fields(widget = %self.id))]
    pub fn render(
        &self,
        instance: &Value,
        args: &RenderArgs,
        helpers: &RenderHelpers<'_>,
    ) -> WidgetResult<String> {
        let template = self.templates.get_or_compile(&self.definition.template_code)?;
        let body = template.render(instance, helpers)?;
        Ok(with_title(&self.definition, instance, args, body))
    }

    pub fn compute_style_variables(&self, instance: &Value) -> StyleVariables {
        compute_style_variables(&self.definition, instance)
    }

    /// The widget's stylesheet with this instance's values filled in.
    pub fn style_source(&self, instance: &Value) -> String {
        let vars = self.compute_style_variables(instance);
        style::apply_variables(&self.definition.style_code, &vars)
    }

    pub fn required_assets(&self) -> Vec<AssetRef> {
        list_required_assets(&self.definition)
    }

    pub fn register_assets(&self, resolver: &dyn AssetResolver) -> Vec<RegisteredAsset> {
        assets::register_assets(&self.id, &self.definition, resolver)
    }

    pub fn validate(&self) -> WidgetResult<()> {
        validate_definition(&self.definition)
    }
}

pub fn build_edit_form(definition: &WidgetDefinition) -> WidgetResult<CompiledForm> {
    form::compile_form(definition)
}

/// Render one instance without a template cache.
pub fn render(
    definition: &WidgetDefinition,
    instance: &Value,
    args: &RenderArgs,
    helpers: &RenderHelpers<'_>,
) -> WidgetResult<String> {
    let body = template::render(&definition.template_code, instance, helpers)?;
    Ok(with_title(definition, instance, args, body))
}

pub fn compute_style_variables(definition: &WidgetDefinition, instance: &Value) -> StyleVariables {
    style::resolve_variables(&definition.style_code, instance)
}

pub fn list_required_assets(definition: &WidgetDefinition) -> Vec<AssetRef> {
    assets::list_required_assets(definition)
}

/// Check that the edit form and the template both compile.
pub fn validate_definition(definition: &WidgetDefinition) -> WidgetResult<()> {
    form::compile_form(definition)?;
    Template::compile(&definition.template_code)?;
    Ok(())
}

fn with_title(
    definition: &WidgetDefinition,
    instance: &Value,
    args: &RenderArgs,
    body: String,
) -> String {
    let title = match instance.get("title") {
        Some(Value::String(title)) if definition.has_title && !title.is_empty() => title,
        _ => return body,
    };

    let mut out = String::with_capacity(
        args.before_title.len() + title.len() + args.after_title.len() + body.len(),
    );
    out.push_str(&args.before_title);
    out.push_str(&escape_html(title));
    out.push_str(&args.after_title);
    out.push_str(&body);
    out
}

/// `hero-banner` → `HeroBanner`
fn pascal_case(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WidgetError;
    use crate::schema::{FieldDefinition, FieldType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn titled(template: &str) -> WidgetDefinition {
        WidgetDefinition {
            has_title: true,
            template_code: template.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn ids_and_class_names_follow_the_slug() {
        let widget = CustomWidget::new("hero-banner", "Hero banner", WidgetDefinition::default());
        assert_eq!(widget.id(), "custom-hero-banner");
        assert_eq!(widget.class_name(), "CustomWidgetHeroBanner");
        assert_eq!(widget.name(), "Hero banner");
    }

    #[test]
    fn title_is_wrapped_and_escaped() {
        let args = RenderArgs::new("<h3>", "</h3>");
        let out = render(
            &titled("<p>{{ body }}</p>"),
            &json!({ "title": "Fish & Chips", "body": "x" }),
            &args,
            &RenderHelpers::default(),
        )
        .unwrap();
        assert_eq!(out, "<h3>Fish &amp; Chips</h3><p>x</p>");
    }

    #[test]
    fn empty_or_missing_title_is_not_wrapped() {
        let args = RenderArgs::new("<h3>", "</h3>");
        let helpers = RenderHelpers::default();
        let definition = titled("body");
        assert_eq!(render(&definition, &json!({ "title": "" }), &args, &helpers).unwrap(), "body");
        assert_eq!(render(&definition, &json!({}), &args, &helpers).unwrap(), "body");
        assert_eq!(render(&definition, &json!({ "title": 5 }), &args, &helpers).unwrap(), "body");
    }

    #[test]
    fn title_ignored_when_widget_has_none() {
        let definition = WidgetDefinition {
            template_code: "body".into(),
            ..Default::default()
        };
        let out = render(
            &definition,
            &json!({ "title": "T" }),
            &RenderArgs::new("<h3>", "</h3>"),
            &RenderHelpers::default(),
        )
        .unwrap();
        assert_eq!(out, "body");
    }

    #[test]
    fn cached_render_matches_uncached() {
        let definition = titled("{% for s in slides %}[{{ s.caption }}]{% endfor %}");
        let widget = CustomWidget::new("slider", "Slider", definition.clone());
        let instance = json!({ "title": "S", "slides": [{ "caption": "a" }, { "caption": "b" }] });
        let args = RenderArgs::default();
        let helpers = RenderHelpers::default();

        let cached = widget.render(&instance, &args, &helpers).unwrap();
        let again = widget.render(&instance, &args, &helpers).unwrap();
        let uncached = render(&definition, &instance, &args, &helpers).unwrap();
        assert_eq!(cached, "S[a][b]");
        assert_eq!(cached, again);
        assert_eq!(cached, uncached);
    }

    #[test]
    fn style_source_fills_in_instance_values() {
        let definition = WidgetDefinition {
            style_code: "@accent: #000;\n.w { color: @accent; }".into(),
            ..Default::default()
        };
        let widget = CustomWidget::new("card", "Card", definition);
        let instance = json!({ "accent": "#0af" });
        assert_eq!(
            Value::Object(widget.compute_style_variables(&instance)),
            json!({ "accent": "#0af" })
        );
        assert_eq!(widget.style_source(&instance), "@accent: #0af;\n.w { color: @accent; }");
    }

    #[test]
    fn validation_surfaces_both_kinds_of_authoring_error() {
        let bad_form = WidgetDefinition {
            fields: vec![FieldDefinition::new("rows", FieldType::Repeater)],
            ..Default::default()
        };
        assert!(matches!(
            validate_definition(&bad_form),
            Err(WidgetError::Schema { .. })
        ));

        let bad_template = titled("{% for x in xs %}");
        assert!(matches!(
            validate_definition(&bad_template),
            Err(WidgetError::TemplateSyntax { .. })
        ));

        assert!(validate_definition(&titled("{{ title }}")).is_ok());
    }

    #[test]
    fn pascal_case_keeps_inner_capitals() {
        assert_eq!(pascal_case("my-cool-widget"), "MyCoolWidget");
        assert_eq!(pascal_case("faq"), "Faq");
        assert_eq!(pascal_case("a--b"), "AB");
    }
}
