//! Scripts and stylesheets a widget type needs on the page.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::fs;

use crate::helpers::AssetResolver;
use crate::schema::{AssetEntry, WidgetDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Script,
    Style,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Script => "script",
            AssetKind::Style => "style",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asset a widget type requires, before it is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub kind: AssetKind,
    pub file: String,
    pub jquery: bool,
}

impl AssetRef {
    /// `<kind>-<file>`, unique per widget type.
    pub fn stable_id(&self) -> String {
        format!("{}-{}", self.kind, self.file)
    }

    /// `<widget-id>-<kind>-<file>`, unique across widget types.
    pub fn handle(&self, widget_id: &str) -> String {
        format!("{}-{}", widget_id, self.stable_id())
    }
}

/// An asset ready to hand to the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredAsset {
    pub handle: String,
    pub url: String,
    pub deps: Vec<String>,
    /// Hex SHA-256 of the file contents, for cache busting.
    pub version: String,
}

/// Scripts first, then styles. Entries without a file are skipped and
/// repeats of the same asset are dropped.
pub fn list_required_assets(definition: &WidgetDefinition) -> Vec<AssetRef> {
    let scripts = definition.scripts.iter().map(|e| (AssetKind::Script, e));
    let styles = definition.styles.iter().map(|e| (AssetKind::Style, e));

    let mut seen = HashSet::new();
    let mut assets = Vec::new();
    for (kind, AssetEntry { file, jquery }) in scripts.chain(styles) {
        if file.is_empty() {
            continue;
        }
        let asset = AssetRef {
            kind,
            file: file.clone(),
            jquery: *jquery,
        };
        if seen.insert(asset.stable_id()) {
            assets.push(asset);
        }
    }
    assets
}

/// Resolve and version every required asset. Assets the resolver does not
/// know, or whose file cannot be read, are skipped with a warning.
pub fn register_assets(
    widget_id: &str,
    definition: &WidgetDefinition,
    resolver: &dyn AssetResolver,
) -> Vec<RegisteredAsset> {
    list_required_assets(definition)
        .into_iter()
        .filter_map(|asset| register_one(widget_id, &asset, resolver))
        .collect()
}

fn register_one(
    widget_id: &str,
    asset: &AssetRef,
    resolver: &dyn AssetResolver,
) -> Option<RegisteredAsset> {
    let handle = asset.handle(widget_id);

    let Some(resolved) = resolver.resolve(&asset.file) else {
        tracing::warn!(%handle, file = %asset.file, "asset attachment not found, skipping");
        return None;
    };
    if resolved.url.is_empty() {
        tracing::warn!(%handle, file = %asset.file, "asset has no url, skipping");
        return None;
    }

    let contents = match fs::read(&resolved.path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                %handle,
                path = %resolved.path.display(),
                error = %e,
                "asset file unreadable, skipping"
            );
            return None;
        }
    };

    Some(RegisteredAsset {
        handle,
        url: resolved.url,
        deps: if asset.jquery {
            vec!["jquery".to_string()]
        } else {
            Vec::new()
        },
        version: content_version(&contents),
    })
}

fn content_version(contents: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{NoAssets, ResolvedAsset};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn entry(file: &str, jquery: bool) -> AssetEntry {
        AssetEntry {
            file: file.to_string(),
            jquery,
        }
    }

    struct Attachments(HashMap<String, ResolvedAsset>);

    impl AssetResolver for Attachments {
        fn resolve(&self, file: &str) -> Option<ResolvedAsset> {
            self.0.get(file).cloned()
        }
    }

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "widget-builder-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn scripts_then_styles_without_empties_or_repeats() {
        let definition = WidgetDefinition {
            scripts: vec![entry("7", true), entry("", false), entry("7", false)],
            styles: vec![entry("7", false), entry("9", false)],
            ..Default::default()
        };

        let ids: Vec<_> = list_required_assets(&definition)
            .iter()
            .map(AssetRef::stable_id)
            .collect();
        assert_eq!(ids, vec!["script-7", "style-7", "style-9"]);
    }

    #[test]
    fn handle_includes_widget_id_and_kind() {
        let asset = AssetRef {
            kind: AssetKind::Style,
            file: "12".into(),
            jquery: false,
        };
        assert_eq!(asset.handle("custom-hero"), "custom-hero-style-12");
    }

    #[test]
    fn registration_versions_by_content() {
        let path = scratch_file("slider.js", "console.log('hi');");
        let resolver = Attachments(HashMap::from([(
            "3".to_string(),
            ResolvedAsset {
                url: "https://example.test/slider.js".into(),
                path: path.clone(),
            },
        )]));
        let definition = WidgetDefinition {
            scripts: vec![entry("3", true)],
            ..Default::default()
        };

        let registered = register_assets("custom-slider", &definition, &resolver);
        fs::remove_file(&path).ok();

        assert_eq!(registered.len(), 1);
        let asset = &registered[0];
        assert_eq!(asset.handle, "custom-slider-script-3");
        assert_eq!(asset.url, "https://example.test/slider.js");
        assert_eq!(asset.deps, vec!["jquery".to_string()]);
        assert_eq!(asset.version, content_version(b"console.log('hi');"));
        assert_eq!(asset.version.len(), 64);
    }

    #[test]
    fn version_is_lowercase_hex_sha256() {
        assert_eq!(
            content_version(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn unresolvable_and_unreadable_assets_are_skipped() {
        let resolver = Attachments(HashMap::from([(
            "5".to_string(),
            ResolvedAsset {
                url: "https://example.test/gone.css".into(),
                path: std::env::temp_dir().join("widget-builder-definitely-missing.css"),
            },
        )]));
        let definition = WidgetDefinition {
            scripts: vec![entry("4", false)],
            styles: vec![entry("5", false)],
            ..Default::default()
        };

        assert!(register_assets("custom-x", &definition, &resolver).is_empty());
        assert!(register_assets("custom-x", &definition, &NoAssets).is_empty());
    }
}
