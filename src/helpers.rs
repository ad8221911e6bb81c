//! Render-time collaborators and the two helper functions templates can call.
//!
//! The renderer never reaches for a global media library or page builder;
//! callers hand a [`RenderHelpers`] in, so templates stay testable without a
//! host environment.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::error::{WidgetError, WidgetResult};

/// Shown in place of embedded page-builder content when no renderer is available.
pub const PAGE_BUILDER_REQUIRED: &str = "Page builder is required to render this field.";

/// One concrete rendition of an image attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRendition {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Resolves image attachments stored in field values.
pub trait MediaLibrary: Send + Sync {
    /// Ready-made `<img>` markup for the attachment at `size`.
    fn image_html(&self, id: &str, size: &str) -> Option<String>;

    /// Best-matching rendition of the attachment at `size`.
    fn image_rendition(&self, id: &str, size: &str) -> Option<ImageRendition>;
}

/// Renders nested page-builder layouts stored in `builder` fields.
pub trait PanelsRenderer: Send + Sync {
    fn render_panels(&self, id: &str, data: &Value) -> String;
}

/// A script or stylesheet attachment resolved to something servable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub url: String,
    /// Local file backing the asset, hashed for cache-busting versions.
    pub path: PathBuf,
}

/// Resolves attachment references of widget scripts and styles.
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, file: &str) -> Option<ResolvedAsset>;
}

/// Media library with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMedia;

impl MediaLibrary for NoMedia {
    fn image_html(&self, _id: &str, _size: &str) -> Option<String> {
        None
    }

    fn image_rendition(&self, _id: &str, _size: &str) -> Option<ImageRendition> {
        None
    }
}

/// Asset resolver that knows no attachments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetResolver for NoAssets {
    fn resolve(&self, _file: &str) -> Option<ResolvedAsset> {
        None
    }
}

/// Which part of an image the `image` filter returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutput {
    Html,
    Src,
    Width,
    Height,
}

impl ImageOutput {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "html" => Some(ImageOutput::Html),
            "src" => Some(ImageOutput::Src),
            "width" => Some(ImageOutput::Width),
            "height" => Some(ImageOutput::Height),
            _ => None,
        }
    }
}

/// The capabilities a template may call into while rendering.
#[derive(Clone, Copy)]
pub struct RenderHelpers<'a> {
    media: &'a dyn MediaLibrary,
    panels: Option<&'a dyn PanelsRenderer>,
}

impl<'a> RenderHelpers<'a> {
    pub fn new(media: &'a dyn MediaLibrary) -> Self {
        Self {
            media,
            panels: None,
        }
    }

    pub fn with_panels(mut self, panels: &'a dyn PanelsRenderer) -> Self {
        self.panels = Some(panels);
        self
    }

    /// Resolve an image attachment to markup or one of its attributes.
    ///
    /// Unknown attachments give an empty string. Only container-valued
    /// references are rejected.
    pub fn resolve_image(
        &self,
        attachment: &Value,
        output: ImageOutput,
        size: &str,
    ) -> WidgetResult<String> {
        let id = match attachment {
            Value::Null => return Ok(String::new()),
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
                return Err(WidgetError::evaluation(
                    "image: attachment reference must be a number or a string",
                ))
            }
        };
        if id.is_empty() {
            return Ok(String::new());
        }

        if output == ImageOutput::Html {
            return Ok(self.media.image_html(&id, size).unwrap_or_default());
        }

        let Some(rendition) = self.media.image_rendition(&id, size) else {
            return Ok(String::new());
        };
        Ok(match output {
            ImageOutput::Src => rendition.url,
            ImageOutput::Width => rendition.width.to_string(),
            ImageOutput::Height => rendition.height.to_string(),
            ImageOutput::Html => unreachable!("handled above"),
        })
    }

    /// Render page-builder data through the panels collaborator, or return
    /// the fixed fallback message when there is none.
    pub fn resolve_embedded_content(&self, data: &Value) -> String {
        match self.panels {
            Some(panels) => panels.render_panels(&panels_id(data), data),
            None => PAGE_BUILDER_REQUIRED.to_string(),
        }
    }
}

impl Default for RenderHelpers<'_> {
    fn default() -> Self {
        RenderHelpers::new(&NoMedia)
    }
}

/// Stable, content-addressed identifier for a page-builder layout:
/// `w` followed by the first 8 hex digits of the SHA-256 of its JSON form.
pub fn panels_id(data: &Value) -> String {
    let serialized = serde_json::to_string(data).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("w{}", &digest[..8])
}
