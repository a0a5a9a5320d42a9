// src/engine/mod.rs

//! Rasterization engine capability surface.
//!
//! This module defines the `RasterEngine` trait, the contract between the
//! caches and whatever parses font bytes and turns glyph outlines into
//! bitmaps. Like FreeType, an engine keeps a *current face* and *current pixel
//! size*: every glyph request is interpreted against whatever was selected
//! last. Callers never drive an engine directly; they go through
//! `RenderContext::select`, which re-asserts face and size on every batch.
//!
//! All lengths exchanged here are 26.6 fixed point (1/64 pixel) unless a field
//! says otherwise.

pub mod headless;
mod outline;
pub mod ttf;

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use headless::HeadlessEngine;
pub use ttf::TtfEngine;

/// Engine-internal glyph identity, used for kerning lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GlyphIndex(pub u32);

/// A 2D vector in 26.6 fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vector26Dot6 {
    pub x: i32,
    pub y: i32,
}

impl Vector26Dot6 {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Whole pixels, discarding the fraction with an arithmetic shift.
    pub const fn to_pixels(self) -> (i32, i32) {
        (to_pixels(self.x), to_pixels(self.y))
    }
}

/// Drop the 6 fractional bits of a 26.6 value (`v >> 6`).
///
/// This is a shift, not a rounding division: 150 → 2, -1 → -1.
pub const fn to_pixels(v: i32) -> i32 {
    v >> 6
}

/// Outline metrics of a loaded glyph, all in 26.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlyphMetrics {
    pub width: i32,
    pub height: i32,
    pub hori_bearing_x: i32,
    pub hori_bearing_y: i32,
    pub hori_advance: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelMode {
    /// 1 bit per pixel, most significant bit first.
    Mono,
    /// 8 bits of coverage per pixel.
    Gray,
}

/// A rendered glyph image.
#[derive(Clone, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub width: u32,
    pub rows: u32,
    /// Bytes per row.
    pub pitch: usize,
    pub pixel_mode: PixelMode,
    pub buffer: Vec<u8>,
}

impl GlyphBitmap {
    /// An all-clear bitmap of the given size.
    pub fn new(width: u32, rows: u32, pixel_mode: PixelMode) -> Self {
        let pitch = match pixel_mode {
            PixelMode::Mono => (width as usize).div_ceil(8),
            PixelMode::Gray => width as usize,
        };
        Self {
            width,
            rows,
            pitch,
            pixel_mode,
            buffer: vec![0; pitch * rows as usize],
        }
    }

    /// Coverage of pixel `(x, y)` as 0..=255. Out-of-range reads are clear.
    pub fn coverage(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.rows {
            return 0;
        }
        let row = y as usize * self.pitch;
        match self.pixel_mode {
            PixelMode::Mono => {
                let byte = self.buffer[row + x as usize / 8];
                if byte & (0x80 >> (x % 8)) != 0 {
                    255
                } else {
                    0
                }
            }
            PixelMode::Gray => self.buffer[row + x as usize],
        }
    }

    pub(crate) fn set(&mut self, x: u32, y: u32, coverage: u8) {
        if x >= self.width || y >= self.rows {
            return;
        }
        let row = y as usize * self.pitch;
        match self.pixel_mode {
            PixelMode::Mono => {
                let bit = 0x80 >> (x % 8);
                let byte = &mut self.buffer[row + x as usize / 8];
                if coverage >= 128 {
                    *byte |= bit;
                } else {
                    *byte &= !bit;
                }
            }
            PixelMode::Gray => self.buffer[row + x as usize] = coverage,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.rows == 0
    }
}

impl fmt::Debug for GlyphBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphBitmap")
            .field("width", &self.width)
            .field("rows", &self.rows)
            .field("pixel_mode", &self.pixel_mode)
            .finish_non_exhaustive()
    }
}

/// One glyph at one (face, pixel size). Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphEntry {
    pub ch: char,
    pub glyph_index: GlyphIndex,
    pub advance: Vector26Dot6,
    pub metrics: GlyphMetrics,
    /// Whole-pixel offset from the pen to the bitmap's left edge.
    pub bitmap_left: i32,
    /// Whole-pixel offset from the baseline up to the bitmap's top row.
    pub bitmap_top: i32,
    /// `None` for blank glyphs or when rendering was not requested.
    pub bitmap: Option<Arc<GlyphBitmap>>,
}

/// Engine-assigned identity of one parsed face.
///
/// Names inside a font file are not unique across sources, so engines key
/// their faces by this id and every parse yields fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FaceId(pub u64);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A parsed face. Shared read-only by every consumer of the Face Cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaceHandle {
    id: FaceId,
    family_name: String,
    style_name: String,
    face_index: u32,
    num_glyphs: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    has_kerning: bool,
}

impl FaceHandle {
    pub fn new(family_name: impl Into<String>, style_name: impl Into<String>) -> Self {
        Self {
            id: FaceId::default(),
            family_name: family_name.into(),
            style_name: style_name.into(),
            face_index: 0,
            num_glyphs: 0,
            units_per_em: 1000,
            ascender: 0,
            descender: 0,
            has_kerning: false,
        }
    }

    pub fn with_id(mut self, id: FaceId) -> Self {
        self.id = id;
        self
    }

    pub fn with_index(mut self, face_index: u32) -> Self {
        self.face_index = face_index;
        self
    }

    pub fn with_metrics(mut self, units_per_em: u16, ascender: i16, descender: i16) -> Self {
        self.units_per_em = units_per_em;
        self.ascender = ascender;
        self.descender = descender;
        self
    }

    pub fn with_glyph_count(mut self, num_glyphs: u32) -> Self {
        self.num_glyphs = num_glyphs;
        self
    }

    pub fn with_kerning(mut self, has_kerning: bool) -> Self {
        self.has_kerning = has_kerning;
        self
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    /// Family name as stored in the font file, not the catalog name.
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn style_name(&self) -> &str {
        &self.style_name
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn num_glyphs(&self) -> u32 {
        self.num_glyphs
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    pub fn descender(&self) -> i16 {
        self.descender
    }

    pub fn has_kerning(&self) -> bool {
        self.has_kerning
    }
}

/// Metrics of the selected size, in 26.6 unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeMetrics {
    /// Horizontal pixels per em (whole pixels).
    pub x_ppem: u32,
    /// Vertical pixels per em (whole pixels).
    pub y_ppem: u32,
    pub ascender: i32,
    pub descender: i32,
    pub height: i32,
}

bitflags! {
    /// Glyph loading options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct LoadFlags: u32 {
        /// Produce a bitmap, not just metrics.
        const RENDER     = 1 << 0;
        /// Render 1-bit bitmaps instead of 8-bit coverage.
        const MONOCHROME = 1 << 1;
        /// Keep fractional advances instead of snapping them to whole pixels.
        const NO_HINTING = 1 << 2;
    }
}

/// How kerning values are scaled, mirroring FreeType's kerning modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KerningMode {
    /// Scaled and rounded to whole pixels.
    #[default]
    Default,
    /// Scaled, fractional 26.6.
    Unfitted,
    /// Raw font units.
    Unscaled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharmapEncoding {
    #[default]
    Unicode,
    Symbol,
}

/// Font parsing, glyph loading and kerning primitives.
///
/// Implementors hold process-wide *selection state*: `select_face` and
/// `select_pixel_size` affect every later `load_glyphs`/`kerning` call.
pub trait RasterEngine: Send {
    /// Parse raw font bytes into one face per font in the file.
    ///
    /// The engine keeps whatever it needs to serve later requests for these
    /// faces. An empty result is not an error at this level.
    fn parse_faces(&mut self, bytes: Arc<[u8]>) -> Result<Vec<FaceHandle>, EngineError>;

    /// Make `face` current. Faces are matched by `FaceHandle::id`, never by
    /// name; a released or foreign handle fails with `NoSuchFace`.
    fn select_face(&mut self, face: &FaceHandle) -> Result<(), EngineError>;

    /// Set the nominal pixel size. A zero dimension copies the other one.
    fn select_pixel_size(&mut self, width: u32, height: u32) -> Result<SizeMetrics, EngineError>;

    fn select_charmap(&mut self, encoding: CharmapEncoding) -> Result<(), EngineError>;

    /// Load glyphs for `chars` from the current face at the current size.
    ///
    /// Returns one result per requested character, in request order. A
    /// failure for one character never affects the others.
    fn load_glyphs(
        &mut self,
        chars: &[char],
        flags: LoadFlags,
    ) -> Vec<(char, Result<GlyphEntry, EngineError>)>;

    /// Pair adjustment between two glyphs of the current face.
    fn kerning(&self, left: GlyphIndex, right: GlyphIndex, mode: KerningMode) -> Vector26Dot6;

    /// Release exactly `faces` and the font data behind them. Returns how
    /// many were held.
    fn unload_faces(&mut self, faces: &[FaceHandle]) -> usize;
}
