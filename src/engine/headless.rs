// src/engine/headless.rs

//! Headless engine implementation.
//!
//! Produces deterministic box glyphs without touching real font data. "Font
//! bytes" for this engine are UTF-8 text with one `family:style` line per
//! face, so tests and dry runs can describe collections inline. Every request
//! is recorded in a shared `HeadlessStats` so callers can observe how often
//! parsing and glyph loading happened, and against which selection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::trace;

use super::{
    CharmapEncoding, FaceHandle, FaceId, GlyphBitmap, GlyphEntry, GlyphIndex, GlyphMetrics,
    KerningMode, LoadFlags, PixelMode, RasterEngine, SizeMetrics, Vector26Dot6,
};
use crate::error::EngineError;

/// Default advance: 10px in 26.6.
const DEFAULT_ADVANCE: i32 = 10 * 64;

/// One glyph request as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphRequest {
    pub family: String,
    pub style: String,
    pub pixel_height: u32,
    pub ch: char,
}

/// Request counters shared between the engine and its observers.
#[derive(Debug, Default)]
pub struct HeadlessStats {
    parse_calls: AtomicUsize,
    kerning_calls: AtomicUsize,
    requests: Mutex<Vec<GlyphRequest>>,
    released: Mutex<Vec<(String, String)>>,
    held: AtomicUsize,
}

impl HeadlessStats {
    pub fn parse_calls(&self) -> usize {
        self.parse_calls.load(Ordering::SeqCst)
    }

    pub fn kerning_calls(&self) -> usize {
        self.kerning_calls.load(Ordering::SeqCst)
    }

    /// Every glyph request so far, in order.
    pub fn requests(&self) -> Vec<GlyphRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// How many times `ch` was requested from the engine.
    pub fn requests_for(&self, ch: char) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| r.ch == ch)
            .count()
    }

    /// `(family, style)` of every face released so far, in order. Names are
    /// the ones inside the font bytes.
    pub fn released_faces(&self) -> Vec<(String, String)> {
        self.released
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Faces currently held by the engine.
    pub fn held_faces(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}

/// Deterministic engine for tests and dry runs.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    faces: Vec<FaceHandle>,
    next_id: u64,
    selected: Option<FaceHandle>,
    size: Option<(u32, u32)>,
    advances: HashMap<char, i32>,
    missing: HashSet<char>,
    kerning: HashMap<(u32, u32), Vector26Dot6>,
    stats: Arc<HeadlessStats>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font "bytes" describing the given faces, in the format this engine parses.
    pub fn font_bytes(faces: &[(&str, &str)]) -> Vec<u8> {
        faces
            .iter()
            .map(|(family, style)| format!("{family}:{style}\n"))
            .collect::<String>()
            .into_bytes()
    }

    /// Use `advance` (26.6) for `ch` instead of the 10px default.
    pub fn with_advance(mut self, ch: char, advance: i32) -> Self {
        self.advances.insert(ch, advance);
        self
    }

    /// Make every load of `ch` fail.
    pub fn with_missing(mut self, ch: char) -> Self {
        self.missing.insert(ch);
        self
    }

    /// Kerning vector (26.6) applied between `left` and `right`.
    pub fn with_kerning(mut self, left: char, right: char, kerning: Vector26Dot6) -> Self {
        self.kerning
            .insert((Self::index_of(left).0, Self::index_of(right).0), kerning);
        self
    }

    pub fn stats(&self) -> Arc<HeadlessStats> {
        Arc::clone(&self.stats)
    }

    /// Glyph index this engine assigns to `ch`.
    pub fn index_of(ch: char) -> GlyphIndex {
        GlyphIndex(ch as u32)
    }

    fn box_glyph(&self, ch: char, advance: i32, y_ppem: u32, flags: LoadFlags) -> GlyphEntry {
        let advance_px = (advance >> 6).max(0) as u32;
        let blank = ch.is_whitespace() || advance_px < 2;
        let (width, rows) = if blank {
            (0, 0)
        } else {
            (advance_px - 1, (y_ppem * 3 / 4).max(1))
        };

        let bitmap = if flags.contains(LoadFlags::RENDER) && !blank {
            let mode = if flags.contains(LoadFlags::MONOCHROME) {
                PixelMode::Mono
            } else {
                PixelMode::Gray
            };
            let mut bitmap = GlyphBitmap::new(width, rows, mode);
            for y in 0..rows {
                for x in 0..width {
                    bitmap.set(x, y, 255);
                }
            }
            Some(Arc::new(bitmap))
        } else {
            None
        };

        GlyphEntry {
            ch,
            glyph_index: Self::index_of(ch),
            advance: Vector26Dot6::new(advance, 0),
            metrics: GlyphMetrics {
                width: width as i32 * 64,
                height: rows as i32 * 64,
                hori_bearing_x: 64,
                hori_bearing_y: rows as i32 * 64,
                hori_advance: advance,
            },
            bitmap_left: if blank { 0 } else { 1 },
            bitmap_top: rows as i32,
            bitmap,
        }
    }
}

impl RasterEngine for HeadlessEngine {
    fn parse_faces(&mut self, bytes: Arc<[u8]>) -> Result<Vec<FaceHandle>, EngineError> {
        self.stats.parse_calls.fetch_add(1, Ordering::SeqCst);
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| EngineError::InvalidFont(format!("headless font is not UTF-8: {e}")))?;

        let mut parsed = Vec::new();
        for (index, line) in text.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
            let (family, style) = line.split_once(':').ok_or_else(|| {
                EngineError::InvalidFont(format!("expected 'family:style', got '{line}'"))
            })?;
            parsed.push(
                FaceHandle::new(family.trim(), style.trim())
                    .with_index(index as u32)
                    .with_metrics(1000, 800, -200)
                    .with_kerning(!self.kerning.is_empty()),
            );
        }

        // Ids are handed out only once the whole file parsed.
        let handles: Vec<FaceHandle> = parsed
            .into_iter()
            .map(|handle| {
                self.next_id += 1;
                handle.with_id(FaceId(self.next_id))
            })
            .collect();
        self.faces.extend(handles.iter().cloned());
        self.stats.held.store(self.faces.len(), Ordering::SeqCst);
        Ok(handles)
    }

    fn select_face(&mut self, face: &FaceHandle) -> Result<(), EngineError> {
        let held = self
            .faces
            .iter()
            .find(|f| f.id() == face.id())
            .cloned()
            .ok_or_else(|| EngineError::NoSuchFace {
                family: face.family_name().to_string(),
                style: face.style_name().to_string(),
            })?;
        self.selected = Some(held);
        Ok(())
    }

    fn select_pixel_size(&mut self, width: u32, height: u32) -> Result<SizeMetrics, EngineError> {
        let (x_ppem, y_ppem) = match (width, height) {
            (0, 0) => return Err(EngineError::InvalidPixelSize { width, height }),
            (0, h) => (h, h),
            (w, 0) => (w, w),
            (w, h) => (w, h),
        };
        if self.selected.is_none() {
            return Err(EngineError::NoFaceSelected);
        }
        self.size = Some((x_ppem, y_ppem));
        let ascender = y_ppem as i32 * 64 * 4 / 5;
        let descender = -(y_ppem as i32 * 64 / 5);
        Ok(SizeMetrics {
            x_ppem,
            y_ppem,
            ascender,
            descender,
            height: ascender - descender,
        })
    }

    fn select_charmap(&mut self, _encoding: CharmapEncoding) -> Result<(), EngineError> {
        Ok(())
    }

    fn load_glyphs(
        &mut self,
        chars: &[char],
        flags: LoadFlags,
    ) -> Vec<(char, Result<GlyphEntry, EngineError>)> {
        let (Some(face), Some((_, y_ppem))) = (self.selected.clone(), self.size) else {
            return chars
                .iter()
                .map(|&ch| (ch, Err(EngineError::NoFaceSelected)))
                .collect();
        };

        chars
            .iter()
            .map(|&ch| {
                self.stats
                    .requests
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(GlyphRequest {
                        family: face.family_name().to_string(),
                        style: face.style_name().to_string(),
                        pixel_height: y_ppem,
                        ch,
                    });
                if self.missing.contains(&ch) {
                    trace!("HeadlessEngine: refusing U+{:04X}", ch as u32);
                    return (ch, Err(EngineError::GlyphLoadFailed(ch)));
                }
                let advance = self.advances.get(&ch).copied().unwrap_or(DEFAULT_ADVANCE);
                (ch, Ok(self.box_glyph(ch, advance, y_ppem, flags)))
            })
            .collect()
    }

    fn kerning(&self, left: GlyphIndex, right: GlyphIndex, mode: KerningMode) -> Vector26Dot6 {
        self.stats.kerning_calls.fetch_add(1, Ordering::SeqCst);
        let kerning = self
            .kerning
            .get(&(left.0, right.0))
            .copied()
            .unwrap_or(Vector26Dot6::ZERO);
        match mode {
            KerningMode::Default => Vector26Dot6::new((kerning.x + 32) & !63, (kerning.y + 32) & !63),
            KerningMode::Unfitted | KerningMode::Unscaled => kerning,
        }
    }

    fn unload_faces(&mut self, faces: &[FaceHandle]) -> usize {
        let ids: HashSet<FaceId> = faces.iter().map(FaceHandle::id).collect();
        let (released, kept): (Vec<_>, Vec<_>) =
            self.faces.drain(..).partition(|f| ids.contains(&f.id()));
        self.faces = kept;
        if self.selected.as_ref().is_some_and(|f| ids.contains(&f.id())) {
            self.selected = None;
        }

        self.stats.held.store(self.faces.len(), Ordering::SeqCst);
        self.stats
            .released
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(
                released
                    .iter()
                    .map(|f| (f.family_name().to_string(), f.style_name().to_string())),
            );
        released.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_face() -> HeadlessEngine {
        let mut engine = HeadlessEngine::new().with_advance('i', 384);
        let bytes = HeadlessEngine::font_bytes(&[("Test", "Regular"), ("Test", "Bold")]);
        let faces = engine.parse_faces(Arc::from(bytes)).unwrap();
        assert_eq!(faces.len(), 2);
        engine
    }

    #[test]
    fn test_parse_collection_lines() {
        let engine = engine_with_face();
        assert_eq!(engine.stats().parse_calls(), 1);
        assert_eq!(engine.faces[1].style_name(), "Bold");
        assert_eq!(engine.faces[1].face_index(), 1);
    }

    #[test]
    fn test_empty_bytes_yield_no_faces() {
        let mut engine = HeadlessEngine::new();
        let faces = engine.parse_faces(Arc::from(&b"\n\n"[..])).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_malformed_line_is_invalid_font() {
        let mut engine = HeadlessEngine::new();
        let result = engine.parse_faces(Arc::from(&b"no separator"[..]));
        assert!(matches!(result, Err(EngineError::InvalidFont(_))));
    }

    #[test]
    fn test_glyphs_follow_selection() {
        let mut engine = engine_with_face().with_missing('x');
        let bold = engine.faces[1].clone();
        engine.select_face(&bold).unwrap();
        engine.select_pixel_size(0, 32).unwrap();

        let results = engine.load_glyphs(&['i', 'x', ' '], LoadFlags::RENDER | LoadFlags::MONOCHROME);
        let i = results[0].1.as_ref().unwrap();
        assert_eq!(i.advance, Vector26Dot6::new(384, 0));
        let bitmap = i.bitmap.as_ref().unwrap();
        assert_eq!((bitmap.width, bitmap.rows), (5, 24));
        assert_eq!(bitmap.pixel_mode, PixelMode::Mono);

        assert!(matches!(results[1].1, Err(EngineError::GlyphLoadFailed('x'))));
        assert!(results[2].1.as_ref().unwrap().bitmap.is_none());

        let requests = engine.stats().requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.style == "Bold" && r.pixel_height == 32));
    }

    #[test]
    fn test_default_kerning_mode_rounds_to_pixels() {
        let engine = engine_with_face().with_kerning('A', 'V', Vector26Dot6::new(-150, 0));
        let (a, v) = (HeadlessEngine::index_of('A'), HeadlessEngine::index_of('V'));
        assert_eq!(engine.kerning(a, v, KerningMode::Unfitted).x, -150);
        assert_eq!(engine.kerning(a, v, KerningMode::Default).x, -128);
        assert_eq!(engine.kerning(v, a, KerningMode::Default), Vector26Dot6::ZERO);
    }

    #[test]
    fn test_unload_faces_clears_selection() {
        let mut engine = engine_with_face();
        let regular = engine.faces[0].clone();
        engine.select_face(&regular).unwrap();
        assert_eq!(engine.unload_faces(&[regular.clone()]), 1);
        assert!(engine.select_face(&regular).is_err());
        assert!(matches!(
            engine.select_pixel_size(0, 32),
            Err(EngineError::NoFaceSelected)
        ));
        assert_eq!(
            engine.stats().released_faces(),
            vec![("Test".to_string(), "Regular".to_string())]
        );
        assert_eq!(engine.stats().held_faces(), 1);
    }

    #[test]
    fn test_same_names_from_two_files_stay_distinct() {
        let mut engine = engine_with_face();
        let again = engine
            .parse_faces(Arc::from(HeadlessEngine::font_bytes(&[("Test", "Regular")])))
            .unwrap();
        let first = engine.faces[0].clone();
        assert_ne!(first.id(), again[0].id());
        assert_eq!(engine.stats().held_faces(), 3);

        engine.unload_faces(&again);
        assert!(engine.select_face(&first).is_ok());
        assert!(engine.select_face(&again[0]).is_err());
    }
}
