// src/lib.rs

//! Font catalog, face/glyph caching and kerning-aware text rendering.
//!
//! The pipeline, leaves first:
//!
//! - [`catalog`] - family → styles → font source
//! - [`source`] - font bytes from disk, HTTP or memory
//! - [`engine`] - parsing and rasterization behind the [`RasterEngine`] trait
//! - [`context`] - scoped select-then-use access to the engine
//! - [`face_cache`] / [`glyph_cache`] - parsed faces per source, glyphs per (family, style)
//! - [`loader`] - load/unload lifecycle and glyph lookup
//! - [`layout`] / [`renderer`] - pen advancement with kerning, blitting
//! - [`view`] - the interactive selection + redraw flow

pub mod catalog;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod face_cache;
pub mod glyph_cache;
pub mod layout;
pub mod loader;
pub mod renderer;
pub mod source;
pub mod surface;
pub mod view;

pub use catalog::{FontCatalog, FontInfo, SourceId};
pub use config::{Config, CONFIG};
pub use engine::{GlyphEntry, HeadlessEngine, RasterEngine, TtfEngine, Vector26Dot6};
pub use error::{EngineError, FontLoadError, RenderError, SourceError};
pub use glyph_cache::GlyphCacheKey;
pub use layout::{layout_run, LayoutOptions, PenPosition, Run};
pub use loader::{FontLoader, LoaderOptions};
pub use renderer::{RenderRequest, TextRenderer};
pub use source::{FontSourceProvider, MemorySource, RoutingSource};
pub use surface::{Canvas, RecordingSurface, Rgba, Surface};
pub use view::{DrawOutcome, TextView};
