// src/catalog.rs

//! Static font directory: family name → style variants → source identifier.
//!
//! The catalog is read once (from the embedded directory or a JSON file in the
//! same format) and never mutated afterwards. Style resolution is deliberately
//! forgiving: a missing style means `"regular"`, and a style the family does
//! not declare silently becomes the first declared variant.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Style requested when the caller does not name one.
pub const DEFAULT_STYLE: &str = "regular";

static BUILTIN_CATALOG: &str = include_str!("../assets/catalog.json");

/// Identifier of a font byte source (URL, path, or provider-specific name).
///
/// Faces are cached per source, not per family/style, because one file can
/// serve several styles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A variable-font axis range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontAxis {
    pub tag: String,
    pub start: f32,
    pub end: f32,
}

/// One family entry of the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontInfo {
    pub family: String,
    /// Declared styles, in catalog order, without duplicates.
    pub variants: Vec<String>,
    #[serde(default)]
    pub subsets: Vec<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub last_modified: String,
    /// Style → source. A style may be declared without a file of its own.
    #[serde(default)]
    pub files: BTreeMap<String, Option<SourceId>>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub kind: String,
    /// Source used when the resolved style has no file.
    pub menu: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<FontAxis>>,
}

impl FontInfo {
    /// Resolve a requested style against this family's variants.
    ///
    /// Never fails: absent → `"regular"`, undeclared → `variants[0]`.
    pub fn resolve_style<'a>(&'a self, style: Option<&'a str>) -> &'a str {
        let requested = style.unwrap_or(DEFAULT_STYLE);
        if self.variants.iter().any(|v| v == requested) {
            return requested;
        }
        // Catalog validation guarantees at least one variant.
        self.variants.first().map_or(requested, String::as_str)
    }

    /// Source for an already-resolved style: `files[style]`, else `menu`.
    pub fn source_for_style(&self, style: &str) -> &SourceId {
        self.files
            .get(style)
            .and_then(Option::as_ref)
            .unwrap_or(&self.menu)
    }

    pub fn supports(&self, style: &str) -> bool {
        self.variants.iter().any(|v| v == style)
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("family '{0}' declares no variants")]
    NoVariants(String),
}

/// Immutable family directory.
#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    fonts: Vec<FontInfo>,
}

impl FontCatalog {
    /// The directory compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let fonts: Vec<FontInfo> = serde_json::from_str(json)?;
        Self::from_fonts(fonts)
    }

    /// Build from already-parsed entries, enforcing the variant invariants.
    pub fn from_fonts(fonts: Vec<FontInfo>) -> Result<Self, CatalogError> {
        let mut validated = Vec::with_capacity(fonts.len());
        for mut font in fonts {
            let mut seen = HashSet::new();
            let before = font.variants.len();
            font.variants.retain(|v| seen.insert(v.clone()));
            if font.variants.len() != before {
                warn!(
                    "FontCatalog: dropped {} duplicate variant(s) of '{}'",
                    before - font.variants.len(),
                    font.family
                );
            }
            if font.variants.is_empty() {
                return Err(CatalogError::NoVariants(font.family));
            }
            validated.push(font);
        }
        debug!("FontCatalog: {} families", validated.len());
        Ok(Self { fonts: validated })
    }

    /// Family names in catalog order.
    pub fn families(&self) -> Vec<&str> {
        self.fonts.iter().map(|f| f.family.as_str()).collect()
    }

    pub fn lookup(&self, family: &str) -> Option<&FontInfo> {
        self.fonts.iter().find(|f| f.family == family)
    }

    /// Resolve `(family, style?)` to the canonical style and its source.
    ///
    /// Returns `None` only when the family is unknown.
    pub fn source_for(&self, family: &str, style: Option<&str>) -> Option<(String, SourceId)> {
        let info = self.lookup(family)?;
        let resolved = info.resolve_style(style);
        Some((resolved.to_string(), info.source_for_style(resolved).clone()))
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "family": "Licorice",
            "variants": ["regular"],
            "subsets": ["latin", "latin-ext", "vietnamese"],
            "version": "v6",
            "lastModified": "2022-09-22",
            "files": { "regular": "licorice/Licorice-Regular.ttf" },
            "category": "handwriting",
            "kind": "webfonts#webfont",
            "menu": "licorice/Licorice-Regular.menu.ttf"
        },
        {
            "family": "Sample Sans",
            "variants": ["300", "regular", "italic", "italic"],
            "files": { "300": "sample/Light.ttf", "regular": "sample/Regular.ttf", "italic": null },
            "category": "sans-serif",
            "menu": "sample/Menu.ttf",
            "axes": [{ "tag": "wght", "start": 300, "end": 700 }]
        }
    ]"#;

    fn catalog() -> FontCatalog {
        FontCatalog::from_json(CATALOG).unwrap()
    }

    #[test]
    fn test_families_keep_catalog_order() {
        assert_eq!(catalog().families(), vec!["Licorice", "Sample Sans"]);
    }

    #[test]
    fn test_lookup_unknown_family() {
        assert!(catalog().lookup("Nope").is_none());
        assert!(catalog().source_for("Nope", None).is_none());
    }

    #[test]
    fn test_duplicate_variants_are_dropped() {
        let cat = catalog();
        let info = cat.lookup("Sample Sans").unwrap();
        assert_eq!(info.variants, vec!["300", "regular", "italic"]);
        assert_eq!(info.axes.as_ref().unwrap()[0].tag, "wght");
    }

    #[test]
    fn test_missing_style_defaults_to_regular() {
        let (style, source) = catalog().source_for("Sample Sans", None).unwrap();
        assert_eq!(style, "regular");
        assert_eq!(source, SourceId::from("sample/Regular.ttf"));
    }

    #[test]
    fn test_unsupported_style_falls_back_to_first_variant() {
        let (style, source) = catalog()
            .source_for("Sample Sans", Some("nonexistent-style"))
            .unwrap();
        assert_eq!(style, "300");
        assert_eq!(source, SourceId::from("sample/Light.ttf"));
    }

    #[test]
    fn test_style_without_file_uses_menu() {
        let (style, source) = catalog().source_for("Sample Sans", Some("italic")).unwrap();
        assert_eq!(style, "italic");
        assert_eq!(source, SourceId::from("sample/Menu.ttf"));
    }

    #[test]
    fn test_family_without_variants_is_rejected() {
        let json = r#"[{ "family": "Empty", "variants": [], "menu": "x.ttf" }]"#;
        assert!(matches!(
            FontCatalog::from_json(json),
            Err(CatalogError::NoVariants(name)) if name == "Empty"
        ));
    }

    #[test]
    fn test_builtin_catalog_has_default_family() {
        let cat = FontCatalog::builtin().unwrap();
        let info = cat.lookup("Licorice").expect("default family must be built in");
        assert_eq!(info.resolve_style(None), "regular");
    }
}
