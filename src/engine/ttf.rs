// src/engine/ttf.rs

//! `RasterEngine` backed by `ttf-parser`.
//!
//! Font bytes are kept alive in `Arc<[u8]>` and a borrowed `ttf_parser::Face`
//! is re-created for each batch, which is cheap (table directory parse only).
//! Glyph outlines are flattened and sampled by `outline::FlatOutline`.

use std::sync::Arc;

use log::{debug, trace, warn};
use ttf_parser::{name_id, Face, GlyphId};

use super::outline::FlatOutline;
use super::{
    CharmapEncoding, FaceHandle, FaceId, GlyphBitmap, GlyphEntry, GlyphIndex, GlyphMetrics,
    KerningMode, LoadFlags, PixelMode, RasterEngine, SizeMetrics, Vector26Dot6,
};
use crate::error::EngineError;

struct LoadedFace {
    handle: FaceHandle,
    data: Arc<[u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelSize {
    x_ppem: u32,
    y_ppem: u32,
}

/// Engine over TrueType/OpenType outlines (single fonts and collections).
#[derive(Default)]
pub struct TtfEngine {
    faces: Vec<LoadedFace>,
    next_id: u64,
    selected: Option<FaceId>,
    size: Option<PixelSize>,
    charmap: CharmapEncoding,
}

impl TtfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of faces currently held.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn charmap(&self) -> CharmapEncoding {
        self.charmap
    }

    fn find(&self, id: FaceId) -> Option<&LoadedFace> {
        self.faces.iter().find(|f| f.handle.id() == id)
    }

    fn current(&self) -> Option<&LoadedFace> {
        self.find(self.selected?)
    }
}

fn face_name(face: &Face<'_>, id: u16) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == id)
        .find_map(|name| name.to_string())
}

/// Scale font units to 26.6 at `ppem`, rounding to nearest.
fn scale_26_6(value: i32, ppem: u32, units_per_em: u16) -> i32 {
    let upem = i64::from(units_per_em.max(1));
    let scaled = i64::from(value) * i64::from(ppem) * 64;
    let rounded = if scaled >= 0 {
        (scaled + upem / 2) / upem
    } else {
        (scaled - upem / 2) / upem
    };
    rounded as i32
}

/// Snap a 26.6 value to the nearest whole pixel.
fn round_to_pixel(v: i32) -> i32 {
    (v + 32) & !63
}

impl RasterEngine for TtfEngine {
    fn parse_faces(&mut self, bytes: Arc<[u8]>) -> Result<Vec<FaceHandle>, EngineError> {
        let count = ttf_parser::fonts_in_collection(&bytes).unwrap_or(1);
        let mut handles = Vec::with_capacity(count as usize);

        for index in 0..count {
            let face =
                Face::parse(&bytes, index).map_err(|e| EngineError::InvalidFont(e.to_string()))?;
            let family = face_name(&face, name_id::FAMILY)
                .or_else(|| face_name(&face, name_id::TYPOGRAPHIC_FAMILY))
                .unwrap_or_else(|| "Unknown".to_string());
            let style = face_name(&face, name_id::SUBFAMILY)
                .or_else(|| face_name(&face, name_id::TYPOGRAPHIC_SUBFAMILY))
                .unwrap_or_else(|| "Regular".to_string());

            self.next_id += 1;
            let handle = FaceHandle::new(family, style)
                .with_id(FaceId(self.next_id))
                .with_index(index)
                .with_metrics(face.units_per_em(), face.ascender(), face.descender())
                .with_glyph_count(u32::from(face.number_of_glyphs()))
                .with_kerning(face.tables().kern.is_some());

            debug!(
                "TtfEngine: parsed face {} ({}) '{}' / '{}' ({} glyphs)",
                index,
                handle.id(),
                handle.family_name(),
                handle.style_name(),
                handle.num_glyphs()
            );

            handles.push(handle);
        }

        self.faces.extend(handles.iter().map(|handle| LoadedFace {
            handle: handle.clone(),
            data: Arc::clone(&bytes),
        }));
        Ok(handles)
    }

    fn select_face(&mut self, face: &FaceHandle) -> Result<(), EngineError> {
        if self.find(face.id()).is_none() {
            return Err(EngineError::NoSuchFace {
                family: face.family_name().to_string(),
                style: face.style_name().to_string(),
            });
        }
        self.selected = Some(face.id());
        Ok(())
    }

    fn select_pixel_size(&mut self, width: u32, height: u32) -> Result<SizeMetrics, EngineError> {
        let (x_ppem, y_ppem) = match (width, height) {
            (0, 0) => return Err(EngineError::InvalidPixelSize { width, height }),
            (0, h) => (h, h),
            (w, 0) => (w, w),
            (w, h) => (w, h),
        };
        let loaded = self.current().ok_or(EngineError::NoFaceSelected)?;
        let face = Face::parse(&loaded.data, loaded.handle.face_index())
            .map_err(|e| EngineError::InvalidFont(e.to_string()))?;
        let upem = face.units_per_em();

        let ascender = scale_26_6(i32::from(face.ascender()), y_ppem, upem);
        let descender = scale_26_6(i32::from(face.descender()), y_ppem, upem);
        let line_gap = scale_26_6(i32::from(face.line_gap()), y_ppem, upem);

        self.size = Some(PixelSize { x_ppem, y_ppem });
        Ok(SizeMetrics {
            x_ppem,
            y_ppem,
            ascender,
            descender,
            height: ascender - descender + line_gap,
        })
    }

    fn select_charmap(&mut self, encoding: CharmapEncoding) -> Result<(), EngineError> {
        match encoding {
            CharmapEncoding::Unicode => {
                self.charmap = encoding;
                Ok(())
            }
            CharmapEncoding::Symbol => Err(EngineError::UnsupportedCharmap(encoding)),
        }
    }

    fn load_glyphs(
        &mut self,
        chars: &[char],
        flags: LoadFlags,
    ) -> Vec<(char, Result<GlyphEntry, EngineError>)> {
        let (Some(loaded), Some(size)) = (self.current(), self.size) else {
            return chars
                .iter()
                .map(|&ch| (ch, Err(EngineError::NoFaceSelected)))
                .collect();
        };
        let face = match Face::parse(&loaded.data, loaded.handle.face_index()) {
            Ok(face) => face,
            Err(e) => {
                let err = EngineError::InvalidFont(e.to_string());
                return chars.iter().map(|&ch| (ch, Err(err.clone()))).collect();
            }
        };

        let upem = face.units_per_em().max(1);
        let sx = size.x_ppem as f32 / f32::from(upem);
        let sy = size.y_ppem as f32 / f32::from(upem);
        let mode = if flags.contains(LoadFlags::MONOCHROME) {
            PixelMode::Mono
        } else {
            PixelMode::Gray
        };

        chars
            .iter()
            .map(|&ch| {
                let Some(gid) = face.glyph_index(ch) else {
                    trace!("TtfEngine: no cmap entry for U+{:04X}", ch as u32);
                    return (ch, Err(EngineError::GlyphLoadFailed(ch)));
                };

                let raw_advance = i32::from(face.glyph_hor_advance(gid).unwrap_or(0));
                let mut advance_x = scale_26_6(raw_advance, size.x_ppem, upem);
                if !flags.contains(LoadFlags::NO_HINTING) {
                    advance_x = round_to_pixel(advance_x);
                }

                let bbox = face.glyph_bounding_box(gid);
                let (left, top, right, bottom) = match bbox {
                    Some(r) => (
                        (f32::from(r.x_min) * sx).floor() as i32,
                        (f32::from(r.y_max) * sy).ceil() as i32,
                        (f32::from(r.x_max) * sx).ceil() as i32,
                        (f32::from(r.y_min) * sy).floor() as i32,
                    ),
                    None => (0, 0, 0, 0),
                };
                let width = (right - left).max(0) as u32;
                let rows = (top - bottom).max(0) as u32;

                let metrics = GlyphMetrics {
                    width: (width as i32) * 64,
                    height: (rows as i32) * 64,
                    hori_bearing_x: left * 64,
                    hori_bearing_y: top * 64,
                    hori_advance: advance_x,
                };

                let bitmap = if flags.contains(LoadFlags::RENDER) && width > 0 && rows > 0 {
                    let mut outline = FlatOutline::new(sx, sy);
                    if face.outline_glyph(gid, &mut outline).is_some() && !outline.is_empty() {
                        Some(Arc::new(outline.rasterize(left, top, width, rows, mode)))
                    } else {
                        None
                    }
                } else {
                    None
                };

                let entry = GlyphEntry {
                    ch,
                    glyph_index: GlyphIndex(u32::from(gid.0)),
                    advance: Vector26Dot6::new(advance_x, 0),
                    metrics,
                    bitmap_left: left,
                    bitmap_top: top,
                    bitmap,
                };
                (ch, Ok(entry))
            })
            .collect()
    }

    fn kerning(&self, left: GlyphIndex, right: GlyphIndex, mode: KerningMode) -> Vector26Dot6 {
        let (Some(loaded), Ok(left), Ok(right)) = (
            self.current(),
            u16::try_from(left.0),
            u16::try_from(right.0),
        ) else {
            return Vector26Dot6::ZERO;
        };
        let Ok(face) = Face::parse(&loaded.data, loaded.handle.face_index()) else {
            return Vector26Dot6::ZERO;
        };
        let Some(kern) = face.tables().kern else {
            return Vector26Dot6::ZERO;
        };

        let mut raw = 0i32;
        for subtable in kern.subtables {
            if !subtable.horizontal || subtable.variable || subtable.has_cross_stream {
                continue;
            }
            if let Some(value) = subtable.glyphs_kerning(GlyphId(left), GlyphId(right)) {
                raw += i32::from(value);
            }
        }

        let x = match mode {
            KerningMode::Unscaled => raw,
            KerningMode::Unfitted | KerningMode::Default => {
                let Some(size) = self.size else {
                    warn!("TtfEngine: kerning requested before a pixel size was selected");
                    return Vector26Dot6::ZERO;
                };
                let scaled = scale_26_6(raw, size.x_ppem, face.units_per_em());
                if mode == KerningMode::Default {
                    round_to_pixel(scaled)
                } else {
                    scaled
                }
            }
        };
        Vector26Dot6::new(x, 0)
    }

    fn unload_faces(&mut self, faces: &[FaceHandle]) -> usize {
        let before = self.faces.len();
        self.faces
            .retain(|f| !faces.iter().any(|h| h.id() == f.handle.id()));
        if self
            .selected
            .is_some_and(|id| faces.iter().any(|h| h.id() == id))
        {
            self.selected = None;
        }
        let released = before - self.faces.len();
        debug!(
            "TtfEngine: released {} of {} face(s), {} still held",
            released,
            faces.len(),
            self.faces.len()
        );
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_rounds_to_nearest() {
        // 1000 units/em at 20px: 500 units = 10px = 640 in 26.6.
        assert_eq!(scale_26_6(500, 20, 1000), 640);
        assert_eq!(scale_26_6(-500, 20, 1000), -640);
        // 1 unit at 20px/1000 = 1.28 (26.6) → 1
        assert_eq!(scale_26_6(1, 20, 1000), 1);
    }

    #[test]
    fn test_round_to_pixel() {
        assert_eq!(round_to_pixel(150), 128);
        assert_eq!(round_to_pixel(160), 192);
        assert_eq!(round_to_pixel(-20), 0);
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let mut engine = TtfEngine::new();
        let result = engine.parse_faces(Arc::from(&b"definitely not a font"[..]));
        assert!(matches!(result, Err(EngineError::InvalidFont(_))));
        assert_eq!(engine.face_count(), 0);
    }

    #[test]
    fn test_requests_without_selection_fail_per_character() {
        let mut engine = TtfEngine::new();
        assert!(matches!(
            engine.select_face(&FaceHandle::new("Nope", "Regular")),
            Err(EngineError::NoSuchFace { .. })
        ));
        assert_eq!(engine.unload_faces(&[FaceHandle::new("Nope", "Regular")]), 0);
        assert!(matches!(
            engine.select_pixel_size(0, 32),
            Err(EngineError::NoFaceSelected)
        ));
        let results = engine.load_glyphs(&['a', 'b'], LoadFlags::RENDER);
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|(_, r)| matches!(r, Err(EngineError::NoFaceSelected))));
        assert_eq!(
            engine.kerning(GlyphIndex(1), GlyphIndex(2), KerningMode::Default),
            Vector26Dot6::ZERO
        );
    }

    #[test]
    fn test_zero_pixel_size_is_invalid() {
        let mut engine = TtfEngine::new();
        assert!(matches!(
            engine.select_pixel_size(0, 0),
            Err(EngineError::InvalidPixelSize { .. })
        ));
    }

    #[test]
    fn test_symbol_charmap_is_unsupported() {
        let mut engine = TtfEngine::new();
        assert!(engine.select_charmap(CharmapEncoding::Unicode).is_ok());
        assert!(matches!(
            engine.select_charmap(CharmapEncoding::Symbol),
            Err(EngineError::UnsupportedCharmap(CharmapEncoding::Symbol))
        ));
    }
}
