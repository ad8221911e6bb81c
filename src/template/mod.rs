//! # Widget template language
//!
//! A small Twig-flavoured language for widget presentation templates.
//!
//! ```text
//! {% if has_items %}
//!   <ul>
//!   {% for item in items %}
//!     <li>{{ loop.index }}. {{ item.text|default('Untitled') }}</li>
//!   {% else %}
//!     <li>Nothing yet</li>
//!   {% endfor %}
//!   </ul>
//! {% endif %}
//! <img src="{{ hero|image('src', 'large') }}" alt="">
//! {{ layout|panels_render|raw }}
//! ```
//!
//! Every printed value is HTML-escaped unless it is marked safe with `raw` or
//! already escaped by `escape`. Helper markup (`image`, `panels_render`) is
//! escaped too; templates opt in with `|raw`.
//! Undefined names print as nothing. Syntax problems are reported when the
//! template compiles, with line and column.

mod ast;
mod cache;
mod eval;
mod filters;
mod lexer;
mod parser;
mod value;

pub use cache::TemplateCache;
pub use parser::MAX_TEMPLATE_DEPTH;
pub(crate) use value::escape_html;

use serde_json::Value;

use crate::error::WidgetResult;
use crate::helpers::RenderHelpers;
use ast::Node;

/// A compiled template, ready to render any number of instances.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Compile template source. Fails with `WidgetError::TemplateSyntax`.
    pub fn compile(source: &str) -> WidgetResult<Self> {
        let tokens = lexer::tokenize(source)?;
        let nodes = parser::parse(tokens)?;
        Ok(Self { nodes })
    }

    /// Render against one instance's data.
    pub fn render(&self, instance: &Value, helpers: &RenderHelpers<'_>) -> WidgetResult<String> {
        eval::render_nodes(&self.nodes, instance, helpers)
    }
}

/// Compile and render in one go.
pub fn render(source: &str, instance: &Value, helpers: &RenderHelpers<'_>) -> WidgetResult<String> {
    Template::compile(source)?.render(instance, helpers)
}
