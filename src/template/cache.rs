use dashmap::DashMap;
use std::sync::Arc;

use super::Template;
use crate::error::WidgetResult;

/// Compiled templates keyed by their full source text.
///
/// Two widget types share an entry only if their template source is
/// byte-for-byte identical. Sources that fail to compile are never stored.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: DashMap<String, Arc<Template>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, source: &str) -> WidgetResult<Arc<Template>> {
        if let Some(template) = self.templates.get(source) {
            tracing::trace!(len = source.len(), "template cache hit");
            return Ok(Arc::clone(template.value()));
        }

        tracing::trace!(len = source.len(), "template cache miss");
        let template = Arc::new(Template::compile(source)?);
        let entry = self
            .templates
            .entry(source.to_string())
            .or_insert(template);
        Ok(Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn clear(&self) {
        self.templates.clear();
    }
}
