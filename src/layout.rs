// src/layout.rs

//! Pen advancement for a single run of glyphs.
//!
//! Layout is a pure function of the glyph entries, a kerning lookup and the
//! origin. All engine values are 26.6 fixed point and are converted with
//! `to_pixels` (`v >> 6`), which truncates. A kerning of 150 moves the pen
//! 2 pixels, not 2.34.

use std::sync::Arc;

use crate::engine::{to_pixels, GlyphBitmap, GlyphEntry, Vector26Dot6};

/// Running cursor in whole pixels. Y grows downward (surface convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PenPosition {
    pub x: i32,
    pub y: i32,
}

impl PenPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A bitmap placed at its top-left corner on the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blit {
    pub x: i32,
    pub y: i32,
    pub bitmap: Arc<GlyphBitmap>,
}

/// One glyph after kerning: `x`/`y` is the pen where it was drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedGlyph {
    pub ch: char,
    pub x: i32,
    pub y: i32,
    /// `None` for glyphs without ink (spaces, metrics-only loads).
    pub blit: Option<Blit>,
}

/// Result of laying out one line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Run {
    pub glyphs: Vec<PositionedGlyph>,
    /// Pen after the last glyph.
    pub pen: PenPosition,
    /// Characters without a glyph entry; they take no space.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutOptions {
    /// Also move the pen vertically by the kerning vector's y component.
    pub apply_vertical_kerning: bool,
}

/// Lay out `entries` left to right starting at `origin`.
///
/// `kerning` is asked for every pair of consecutive *present* glyphs; a
/// missing entry is skipped without breaking the pair chain.
pub fn layout_run<K>(
    entries: &[Option<GlyphEntry>],
    mut kerning: K,
    origin: PenPosition,
    options: LayoutOptions,
) -> Run
where
    K: FnMut(&GlyphEntry, &GlyphEntry) -> Vector26Dot6,
{
    let mut pen = origin;
    let mut prev: Option<&GlyphEntry> = None;
    let mut glyphs = Vec::with_capacity(entries.len());
    let mut skipped = 0;

    for entry in entries {
        let Some(glyph) = entry else {
            skipped += 1;
            continue;
        };

        if let Some(prev) = prev {
            let delta = kerning(prev, glyph);
            pen.x += to_pixels(delta.x);
            if options.apply_vertical_kerning {
                pen.y += to_pixels(delta.y);
            }
        }

        let blit = glyph
            .bitmap
            .as_ref()
            .filter(|bitmap| !bitmap.is_empty())
            .map(|bitmap| Blit {
                x: pen.x + glyph.bitmap_left,
                y: pen.y - glyph.bitmap_top,
                bitmap: Arc::clone(bitmap),
            });
        glyphs.push(PositionedGlyph {
            ch: glyph.ch,
            x: pen.x,
            y: pen.y,
            blit,
        });

        pen.x += to_pixels(glyph.advance.x);
        pen.y += to_pixels(glyph.advance.y);
        prev = Some(glyph);
    }

    Run {
        glyphs,
        pen,
        skipped,
    }
}
