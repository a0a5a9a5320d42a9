// src/error.rs

//! Error types shared across the font pipeline.
//!
//! Failures are split by the layer that produces them: byte sources
//! (`SourceError`), the rasterization engine (`EngineError`), font loading
//! (`FontLoadError`) and drawing (`RenderError`). Style resolution problems
//! never appear here: an unsupported style silently falls back to the first
//! declared variant.

use thiserror::Error;

use crate::catalog::SourceId;

/// Failure reported by a `FontSourceProvider`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("failed to fetch font bytes from '{source_id}': {reason}")]
    FetchFailed { source_id: SourceId, reason: String },
    #[error("failed to resolve web font '{query}': {reason}")]
    ResolutionFailed { query: String, reason: String },
}

/// Failure reported by a `RasterEngine`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("font data could not be parsed: {0}")]
    InvalidFont(String),
    #[error("no face named '{family}' / '{style}' is loaded")]
    NoSuchFace { family: String, style: String },
    #[error("no face selected")]
    NoFaceSelected,
    #[error("invalid pixel size {width}x{height}")]
    InvalidPixelSize { width: u32, height: u32 },
    #[error("charmap {0:?} is not supported")]
    UnsupportedCharmap(crate::engine::CharmapEncoding),
    #[error("no glyph for U+{:04X}", code_point(.0))]
    GlyphLoadFailed(char),
}

fn code_point(ch: &char) -> u32 {
    u32::from(*ch)
}

/// Failure of `FontLoader::load`.
///
/// Callers are expected to fall back to a known-good family/style and retry
/// once; `TextView::redraw` does exactly that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FontLoadError {
    #[error("unknown font family '{0}'")]
    UnknownFamily(String),
    #[error(transparent)]
    FetchFailed(SourceError),
    #[error(transparent)]
    ResolutionFailed(SourceError),
    #[error("font source '{0}' produced no faces")]
    EmptyFaceSet(SourceId),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl FontLoadError {
    /// True when the selected font itself could not be obtained. Engine
    /// errors such as an invalid pixel size are not font failures.
    pub fn is_unavailable_font(&self) -> bool {
        matches!(
            self,
            FontLoadError::UnknownFamily(_)
                | FontLoadError::FetchFailed(_)
                | FontLoadError::ResolutionFailed(_)
                | FontLoadError::EmptyFaceSet(_)
        )
    }
}

impl From<SourceError> for FontLoadError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::FetchFailed { .. } => FontLoadError::FetchFailed(err),
            SourceError::ResolutionFailed { .. } => FontLoadError::ResolutionFailed(err),
        }
    }
}

/// Failure of a single render call. None of these poison later calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no drawing surface attached")]
    NoDrawingSurface,
    #[error(transparent)]
    Load(#[from] FontLoadError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
