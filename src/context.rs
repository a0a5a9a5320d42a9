// src/context.rs

//! Scoped access to the shared rasterization engine.
//!
//! An engine's face and pixel-size selection is one shared register. Two
//! batches for different fonts must never interleave their select-then-use
//! sequences, so the engine lives behind a mutex and glyph requests are only
//! reachable through an `EngineSession`, which is created already holding the
//! lock with face, charmap and size asserted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::trace;

use crate::engine::{
    CharmapEncoding, FaceHandle, GlyphEntry, KerningMode, LoadFlags, RasterEngine, SizeMetrics,
    Vector26Dot6,
};
use crate::error::EngineError;

/// Owner of the process-wide engine.
pub struct RenderContext<E: RasterEngine> {
    engine: Mutex<E>,
}

impl<E: RasterEngine> RenderContext<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    fn lock(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse font bytes. Selection state is left untouched.
    pub fn parse_faces(&self, bytes: Arc<[u8]>) -> Result<Vec<FaceHandle>, EngineError> {
        self.lock().parse_faces(bytes)
    }

    /// Release `faces` from the engine. Returns how many it still held.
    pub fn unload_faces(&self, faces: &[FaceHandle]) -> usize {
        if faces.is_empty() {
            return 0;
        }
        self.lock().unload_faces(faces)
    }

    /// Lock the engine and select `face` at `width` x `height` pixels.
    ///
    /// The returned session keeps the engine locked until dropped.
    pub fn select(
        &self,
        face: &FaceHandle,
        width: u32,
        height: u32,
    ) -> Result<EngineSession<'_, E>, EngineError> {
        let mut engine = self.lock();
        engine.select_face(face)?;
        engine.select_charmap(CharmapEncoding::Unicode)?;
        let metrics = engine.select_pixel_size(width, height)?;
        trace!(
            "RenderContext: selected {} '{}' / '{}' at {}x{}",
            face.id(),
            face.family_name(),
            face.style_name(),
            width,
            height
        );
        Ok(EngineSession {
            engine,
            face: face.clone(),
            metrics,
        })
    }

    /// Consume the context and hand the engine back.
    pub fn into_inner(self) -> E {
        self.engine.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive, pre-selected access to the engine.
pub struct EngineSession<'a, E: RasterEngine> {
    engine: MutexGuard<'a, E>,
    face: FaceHandle,
    metrics: SizeMetrics,
}

impl<E: RasterEngine> EngineSession<'_, E> {
    pub fn face(&self) -> &FaceHandle {
        &self.face
    }

    pub fn metrics(&self) -> SizeMetrics {
        self.metrics
    }

    pub fn load_glyphs(
        &mut self,
        chars: &[char],
        flags: LoadFlags,
    ) -> Vec<(char, Result<GlyphEntry, EngineError>)> {
        self.engine.load_glyphs(chars, flags)
    }

    /// Kerning between two glyphs of the selected face.
    pub fn kerning(&self, prev: &GlyphEntry, current: &GlyphEntry, mode: KerningMode) -> Vector26Dot6 {
        self.engine
            .kerning(prev.glyph_index, current.glyph_index, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;
    use std::thread;

    fn context() -> (RenderContext<HeadlessEngine>, FaceHandle, FaceHandle) {
        let ctx = RenderContext::new(HeadlessEngine::new());
        let bytes = HeadlessEngine::font_bytes(&[("A", "Regular"), ("B", "Regular")]);
        let faces = ctx.parse_faces(Arc::from(bytes)).unwrap();
        (ctx, faces[0].clone(), faces[1].clone())
    }

    #[test]
    fn test_select_reasserts_face_and_size() {
        let (ctx, a, b) = context();
        let stats = ctx.lock().stats();

        ctx.select(&a, 0, 16).unwrap().load_glyphs(&['x'], LoadFlags::RENDER);
        ctx.select(&b, 0, 40).unwrap().load_glyphs(&['y'], LoadFlags::RENDER);
        ctx.select(&a, 0, 16).unwrap().load_glyphs(&['z'], LoadFlags::RENDER);

        let requests = stats.requests();
        assert_eq!((requests[0].family.as_str(), requests[0].pixel_height), ("A", 16));
        assert_eq!((requests[1].family.as_str(), requests[1].pixel_height), ("B", 40));
        assert_eq!((requests[2].family.as_str(), requests[2].pixel_height), ("A", 16));
    }

    #[test]
    fn test_released_face_can_no_longer_be_selected() {
        let (ctx, a, b) = context();
        assert_eq!(ctx.unload_faces(&[a.clone()]), 1);
        assert_eq!(ctx.unload_faces(&[]), 0);
        assert!(matches!(
            ctx.select(&a, 0, 16),
            Err(EngineError::NoSuchFace { .. })
        ));
        assert!(ctx.select(&b, 0, 16).is_ok());
    }

    #[test]
    fn test_select_unknown_face_fails_without_poisoning() {
        let (ctx, a, _) = context();
        let missing = FaceHandle::new("Nope", "Regular");
        assert!(matches!(
            ctx.select(&missing, 0, 16),
            Err(EngineError::NoSuchFace { .. })
        ));
        assert!(ctx.select(&a, 0, 16).is_ok());
    }

    #[test]
    fn test_concurrent_sessions_do_not_interleave() {
        let (ctx, a, b) = context();
        let ctx = Arc::new(ctx);
        let stats = ctx.lock().stats();

        let handles: Vec<_> = [(a, 16u32), (b, 40u32)]
            .into_iter()
            .map(|(face, size)| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let mut session = ctx.select(&face, 0, size).unwrap();
                        session.load_glyphs(&['a', 'b', 'c'], LoadFlags::RENDER);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let requests = stats.requests();
        assert_eq!(requests.len(), 300);
        for batch in requests.chunks(3) {
            let expected = if batch[0].family == "A" { 16 } else { 40 };
            assert!(batch
                .iter()
                .all(|r| r.family == batch[0].family && r.pixel_height == expected));
        }
    }
}
