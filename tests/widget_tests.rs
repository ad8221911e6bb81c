use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use widget_builder::{
    build_edit_form, compile_fields, compute_style_variables, list_required_assets, render,
    render_template, resolve_style_variables, validate_definition, CustomWidget, FieldDefinition,
    FieldType, ImageOutput, ImageRendition, MediaLibrary, PanelsRenderer, RenderArgs,
    RenderHelpers, WidgetDefinition, WidgetError, MAX_FIELD_DEPTH, PAGE_BUILDER_REQUIRED,
};

fn fixture_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("fixtures");
    path.push(filename);
    path
}

fn load(filename: &str) -> Result<WidgetDefinition, WidgetError> {
    let content = fs::read_to_string(fixture_path(filename)).unwrap();
    if filename.ends_with(".yaml") {
        WidgetDefinition::from_yaml(&content)
    } else {
        WidgetDefinition::from_json(&content)
    }
}

fn text(variable: &str) -> FieldDefinition {
    FieldDefinition::new(variable, FieldType::Text).with_label(variable)
}

struct Gallery;

impl MediaLibrary for Gallery {
    fn image_html(&self, id: &str, size: &str) -> Option<String> {
        (id == "7").then(|| format!("<img src=\"/img/7-{}.jpg\" alt=\"\">", size))
    }

    fn image_rendition(&self, id: &str, size: &str) -> Option<ImageRendition> {
        (id == "7").then(|| ImageRendition {
            url: format!("/img/7-{}.jpg", size),
            width: 1200,
            height: 630,
        })
    }
}

struct Panels;

impl PanelsRenderer for Panels {
    fn render_panels(&self, id: &str, _data: &Value) -> String {
        format!("<div id=\"pl-{}\"></div>", id)
    }
}

// Fixtures

#[test]
fn test_hero_fixture_is_valid() {
    let definition = load("hero.json").unwrap();
    assert!(validate_definition(&definition).is_ok());
    assert_eq!(definition.style_code, "@button-color: #333;\n.hero a { background: @button-color; }");
}

#[test]
fn test_faq_fixture_renders_rows() {
    let definition = load("faq.yaml").unwrap();
    let widget = CustomWidget::new("faq", "FAQ", definition);

    let out = widget
        .render(
            &json!({ "questions": [
                { "question": "Why?", "answer": "Because\nreasons" },
                { "question": "<How>", "answer": "Carefully" }
            ] }),
            &RenderArgs::default(),
            &RenderHelpers::default(),
        )
        .unwrap();
    assert_eq!(
        out,
        "<dl>\n  <dt>1. Why?</dt>\n  <dd>Because<br />\nreasons</dd>\n  <dt>2. &lt;How&gt;</dt>\n  <dd>Carefully</dd>\n</dl>"
    );

    let empty = widget
        .render(&json!({}), &RenderArgs::default(), &RenderHelpers::default())
        .unwrap();
    assert_eq!(empty, "<dl>\n  <dd>No questions yet</dd>\n</dl>");
}

#[test]
fn test_invalid_repeater_fixture() {
    let definition = load("invalid-repeater.json").unwrap();
    let err = validate_definition(&definition).unwrap_err();
    assert!(matches!(err, WidgetError::Schema { ref path, .. } if path == "slides"));
    assert!(err.is_authoring_error());
}

#[test]
fn test_invalid_template_fixture_reports_position() {
    let definition = load("invalid-template.yaml").unwrap();
    match validate_definition(&definition).unwrap_err() {
        WidgetError::TemplateSyntax { line, message, .. } => {
            assert_eq!(line, 3);
            assert!(message.contains("shout"), "message was: {}", message);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn test_malformed_definition_is_a_deserialization_error() {
    let err = WidgetDefinition::from_json("{ \"fields\": 3 }").unwrap_err();
    assert!(matches!(err, WidgetError::DeserializationError(_)));
}

// Schema compiler

#[test]
fn test_flat_fields_keep_order() {
    let form = compile_fields(&[text("zeta"), text("alpha"), text("mid")]).unwrap();
    assert_eq!(form.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_repeater_nests_its_sub_fields() {
    let fields = vec![FieldDefinition::new("slides", FieldType::Repeater)
        .with_sub_fields(vec![text("caption"), text("link"), text("alt")])];
    let form = compile_fields(&fields).unwrap();

    let nested = form.get("slides").and_then(|f| f.fields.as_ref()).unwrap();
    assert_eq!(nested.len(), 3);
    assert_eq!(nested.keys().collect::<Vec<_>>(), vec!["caption", "link", "alt"]);
}

#[test]
fn test_title_leads_when_widget_has_title() {
    let definition = WidgetDefinition {
        has_title: true,
        fields: vec![text("body"), text("title")],
        ..Default::default()
    };
    let form = build_edit_form(&definition).unwrap();
    assert_eq!(form.keys().collect::<Vec<_>>(), vec!["title", "body"]);
    assert_eq!(form.get("title").unwrap().label.as_deref(), Some("title"));

    let untitled = WidgetDefinition {
        fields: vec![text("body")],
        ..Default::default()
    };
    assert!(!build_edit_form(&untitled).unwrap().contains_key("title"));
}

#[test]
fn test_compiled_form_serializes_in_order() {
    let fields = vec![
        FieldDefinition::new("b", FieldType::Select)
            .with_label("B")
            .with_option("options", json!({ "x": "X" })),
        text("a"),
    ];
    let form = compile_fields(&fields).unwrap();
    let serialized = serde_json::to_string(&form).unwrap();
    assert!(serialized.find("\"b\"").unwrap() < serialized.find("\"a\"").unwrap());
    assert_eq!(form.to_json()["b"]["options"], json!({ "x": "X" }));
}

#[test]
fn test_deep_nesting_is_rejected() {
    let mut field = text("leaf");
    for depth in 0..=MAX_FIELD_DEPTH {
        field = FieldDefinition::new(format!("level{}", depth), FieldType::Section)
            .with_sub_fields(vec![field]);
    }
    assert!(matches!(
        compile_fields(&[field]),
        Err(WidgetError::MaxNestingDepthExceeded { .. })
    ));
}

// Template renderer

#[test]
fn test_literal_template_is_verbatim() {
    let src = "<p class=\"note\">5 > 3 & that's fine</p>";
    let out = render_template(src, &json!({}), &RenderHelpers::default()).unwrap();
    assert_eq!(out, src);
}

#[test]
fn test_instance_values_are_escaped_unless_raw() {
    let data = json!({ "title": "<b>Hi</b>" });
    let helpers = RenderHelpers::default();
    assert_eq!(
        render_template("{{ instance.title }}", &data, &helpers).unwrap(),
        "&lt;b&gt;Hi&lt;/b&gt;"
    );
    assert_eq!(render_template("{{ title|raw }}", &data, &helpers).unwrap(), "<b>Hi</b>");
}

#[test]
fn test_image_helper_outputs() {
    let helpers = RenderHelpers::new(&Gallery);
    let data = json!({ "bg": 7, "missing": 8 });
    let out = render_template(
        "{{ bg|image|raw }}|{{ bg|image('src', 'large') }}|{{ bg|image('width') }}|{{ missing|image('src') }}",
        &data,
        &helpers,
    )
    .unwrap();
    assert_eq!(out, "<img src=\"/img/7-full.jpg\" alt=\"\">|/img/7-large.jpg|1200|");
}

#[test]
fn test_helper_markup_is_escaped_without_raw() {
    let helpers = RenderHelpers::new(&Gallery).with_panels(&Panels);
    let data = json!({ "bg": 7, "layout": {} });
    let out = render_template("{{ bg|image }}", &data, &helpers).unwrap();
    assert_eq!(out, "&lt;img src=&quot;/img/7-full.jpg&quot; alt=&quot;&quot;&gt;");

    let out = render_template("{{ layout|panels_render }}", &data, &helpers).unwrap();
    assert!(out.starts_with("&lt;div id=&quot;pl-w"));
}

#[test]
fn test_image_resolution_never_fails_on_unknown_ids() {
    let helpers = RenderHelpers::default();
    assert_eq!(helpers.resolve_image(&json!(999), ImageOutput::Src, "full").unwrap(), "");
}

#[test]
fn test_embedded_content_with_and_without_builder() {
    let data = json!({ "layout": { "grids": [{ "cells": 2 }] } });
    let src = "{{ layout|panels_render|raw }}";

    let without = render_template(src, &data, &RenderHelpers::default()).unwrap();
    assert_eq!(without, PAGE_BUILDER_REQUIRED);

    let with = render_template(src, &data, &RenderHelpers::new(&Gallery).with_panels(&Panels)).unwrap();
    assert!(with.starts_with("<div id=\"pl-w"));
    assert_eq!(with, render_template(src, &data, &RenderHelpers::new(&Gallery).with_panels(&Panels)).unwrap());
}

#[test]
fn test_renders_do_not_leak_state() {
    let definition = WidgetDefinition {
        template_code: "{% set greeting = 'Hi ' ~ name %}{{ greeting }}{{ leftover }}".into(),
        ..Default::default()
    };
    let helpers = RenderHelpers::default();
    let args = RenderArgs::default();

    let a = render(&definition, &json!({ "name": "Ann" }), &args, &helpers).unwrap();
    let b = render(&definition, &json!({ "name": "Bo" }), &args, &helpers).unwrap();
    let a_again = render(&definition, &json!({ "name": "Ann" }), &args, &helpers).unwrap();
    assert_eq!(a, "Hi Ann");
    assert_eq!(b, "Hi Bo");
    assert_eq!(a, a_again);
}

#[test]
fn test_widget_renders_concurrently() {
    let definition = load("hero.json").unwrap();
    let widget = Arc::new(CustomWidget::new("hero", "Hero", definition));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let widget = Arc::clone(&widget);
            thread::spawn(move || {
                let instance = json!({
                    "title": format!("T{}", i),
                    "heading": format!("H{}", i),
                    "button": { "url": "/go", "text": "" }
                });
                widget
                    .render(&instance, &RenderArgs::new("<h2>", "</h2>"), &RenderHelpers::default())
                    .unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.join().unwrap();
        assert!(out.starts_with(&format!("<h2>T{}</h2><section", i)));
        assert!(out.contains(&format!("<h1>H{}</h1>", i)));
        assert!(out.contains("<a href=\"/go\">Learn more</a>"));
    }
}

// Style variables

#[test]
fn test_style_path_resolution() {
    let source = "@box-padding-top: 10px;";
    assert_eq!(
        Value::Object(resolve_style_variables(source, &json!({ "box": { "padding": { "top": 5 } } }))),
        json!({ "box-padding-top": 5 })
    );
    assert!(resolve_style_variables(source, &json!({})).is_empty());
}

#[test]
fn test_widget_style_variables_from_fixture() {
    let definition = load("hero.json").unwrap();
    let vars = compute_style_variables(&definition, &json!({ "button": { "color": "#e33" } }));
    assert_eq!(Value::Object(vars), json!({ "button-color": "#e33" }));

    let widget = CustomWidget::new("hero", "Hero", definition);
    assert_eq!(
        widget.style_source(&json!({})),
        "@button-color: #333;\n.hero a { background: @button-color; }"
    );
}

// Assets

#[test]
fn test_required_assets_from_fixture() {
    let definition = load("hero.json").unwrap();
    let assets = list_required_assets(&definition);
    let ids: Vec<_> = assets.iter().map(|a| a.stable_id()).collect();
    assert_eq!(ids, vec!["script-41", "style-42"]);
    assert!(assets[0].jquery);
    assert_eq!(assets[1].handle("custom-hero"), "custom-hero-style-42");
}
