// src/loader.rs

//! Font load/unload lifecycle and glyph lookup.
//!
//! The `FontLoader` is the only writer of the Face Cache and the Glyph
//! Caches. It resolves `(family, style?)` through the catalog, fetches and
//! parses each source at most once (concurrent loads of one source share a
//! single fetch), and hands out glyph runs populated under an
//! `EngineSession` so that face and size selection cannot interleave between
//! callers.
//!
//! Lock order: engine (session) before glyph caches. The Face Cache never
//! holds either while waiting on a slot owned by a caller that holds one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, trace, warn};

use crate::catalog::{FontCatalog, SourceId};
use crate::config::RenderConfig;
use crate::context::{EngineSession, RenderContext};
use crate::engine::{
    FaceHandle, GlyphEntry, KerningMode, LoadFlags, RasterEngine, Vector26Dot6,
};
use crate::error::{EngineError, FontLoadError};
use crate::face_cache::{FaceCache, FaceSet};
use crate::glyph_cache::{GlyphCache, GlyphCacheKey};
use crate::source::FontSourceProvider;

/// Glyph loading and kerning settings applied to every cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub load_flags: LoadFlags,
    pub kerning_mode: KerningMode,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            load_flags: LoadFlags::RENDER | LoadFlags::MONOCHROME,
            kerning_mode: KerningMode::Default,
        }
    }
}

impl LoaderOptions {
    pub fn from_config(render: &RenderConfig) -> Self {
        let mut load_flags = LoadFlags::RENDER;
        if render.monochrome {
            load_flags |= LoadFlags::MONOCHROME;
        }
        Self {
            load_flags,
            kerning_mode: render.kerning_mode,
        }
    }
}

/// Pick the face of a set that serves `style`.
///
/// Prefers a face whose style name matches case-insensitively; otherwise the
/// first face of the set.
fn pick_face<'a>(faces: &'a [FaceHandle], style: &str) -> Option<&'a FaceHandle> {
    faces
        .iter()
        .find(|f| f.style_name().eq_ignore_ascii_case(style))
        .or_else(|| faces.first())
}

/// Catalog-driven loader owning every font cache.
pub struct FontLoader<E: RasterEngine> {
    catalog: Arc<FontCatalog>,
    source: Arc<dyn FontSourceProvider>,
    context: RenderContext<E>,
    faces: FaceCache,
    caches: Mutex<HashMap<GlyphCacheKey, GlyphCache>>,
    /// Sources loaded per family, for releasing them with the family.
    family_sources: Mutex<HashMap<String, BTreeSet<SourceId>>>,
    options: LoaderOptions,
}

impl<E: RasterEngine> FontLoader<E> {
    pub fn new(catalog: Arc<FontCatalog>, source: Arc<dyn FontSourceProvider>, engine: E) -> Self {
        Self {
            catalog,
            source,
            context: RenderContext::new(engine),
            faces: FaceCache::new(),
            caches: Mutex::new(HashMap::new()),
            family_sources: Mutex::new(HashMap::new()),
            options: LoaderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &FontCatalog {
        &self.catalog
    }

    pub fn face_cache(&self) -> &FaceCache {
        &self.faces
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    fn caches(&self) -> MutexGuard<'_, HashMap<GlyphCacheKey, GlyphCache>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn family_sources(&self) -> MutexGuard<'_, HashMap<String, BTreeSet<SourceId>>> {
        self.family_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Normalize `(family, style?)` to its cache key and source.
    pub fn resolve(
        &self,
        family: &str,
        style: Option<&str>,
    ) -> Result<(GlyphCacheKey, SourceId), FontLoadError> {
        let (style, source) = self
            .catalog
            .source_for(family, style)
            .ok_or_else(|| FontLoadError::UnknownFamily(family.to_string()))?;
        Ok((GlyphCacheKey::new(family, style), source))
    }

    /// Faces for `source`, fetching and parsing on first use.
    fn faces_for(&self, source: &SourceId) -> Result<FaceSet, FontLoadError> {
        let (faces, fetched) = self.faces.get_or_try_load(source, || -> Result<FaceSet, FontLoadError> {
            debug!("FontLoader: fetching '{}'", source);
            let bytes = self.source.fetch_bytes(source)?;
            let faces = self.context.parse_faces(Arc::from(bytes))?;
            if faces.is_empty() {
                return Err(FontLoadError::EmptyFaceSet(source.clone()));
            }
            Ok(FaceSet::from(faces))
        })?;
        if !fetched {
            trace!("FontLoader: '{}' already parsed", source);
        }
        Ok(faces)
    }

    /// Register a glyph cache for `key`. With `reset`, an existing cache is
    /// replaced; otherwise it is kept, since a concurrent caller may already
    /// have populated it.
    fn install(
        &self,
        key: GlyphCacheKey,
        source: SourceId,
        reset: bool,
    ) -> Result<FaceHandle, FontLoadError> {
        let faces = self.faces_for(&source)?;
        let face = pick_face(&faces, &key.style)
            .cloned()
            .ok_or_else(|| FontLoadError::EmptyFaceSet(source.clone()))?;

        self.family_sources()
            .entry(key.family.clone())
            .or_default()
            .insert(source.clone());

        info!(
            "FontLoader: loaded {} from '{}' (face '{}' / '{}')",
            key,
            source,
            face.family_name(),
            face.style_name()
        );
        let cache = GlyphCache::new(key.clone(), source, face.clone(), self.options.load_flags);
        let mut caches = self.caches();
        if reset {
            caches.insert(key, cache);
            return Ok(face);
        }
        Ok(caches.entry(key).or_insert(cache).face().clone())
    }

    /// Load `family` in `style` (default `"regular"`, unsupported styles fall
    /// back to the family's first variant).
    ///
    /// Re-loading an already loaded key resets its glyph cache but reuses the
    /// parsed faces.
    pub fn load(&self, family: &str, style: Option<&str>) -> Result<GlyphCacheKey, FontLoadError> {
        let (key, source) = self.resolve(family, style)?;
        self.install(key.clone(), source, true)?;
        Ok(key)
    }

    /// Drop the glyph cache of `(family, style)`.
    ///
    /// When no other style of the family remains loaded, the family's sources
    /// leave the Face Cache and the engine releases the faces parsed from
    /// them, so a later load fetches again. Sources another loaded family
    /// also uses are kept.
    pub fn unload(&self, family: &str, style: Option<&str>) -> Result<bool, FontLoadError> {
        let (key, _) = self.resolve(family, style)?;
        let (removed, family_in_use) = {
            let mut caches = self.caches();
            let removed = caches.remove(&key).is_some();
            let in_use = caches.keys().any(|k| k.family == key.family);
            (removed, in_use)
        };
        if !removed {
            debug!("FontLoader: {} was not loaded", key);
            return Ok(false);
        }
        info!("FontLoader: unloaded {}", key);

        if !family_in_use {
            let sources: Vec<SourceId> = {
                let mut family_sources = self.family_sources();
                let sources = family_sources.remove(&key.family).unwrap_or_default();
                sources
                    .into_iter()
                    .filter(|s| !family_sources.values().any(|other| other.contains(s)))
                    .collect()
            };
            let released = self.release_sources(&sources);
            info!(
                "FontLoader: released family '{}' ({} source(s), {} face(s))",
                key.family,
                sources.len(),
                released
            );
        }
        Ok(true)
    }

    /// Drop `sources` from the Face Cache and release their faces from the
    /// engine. Returns how many faces the engine released.
    fn release_sources(&self, sources: &[SourceId]) -> usize {
        let mut faces = Vec::new();
        for source in sources {
            if let Some(set) = self.faces.get(source) {
                faces.extend(set.iter().cloned());
            }
            self.faces.invalidate(source);
        }
        self.context.unload_faces(&faces)
    }

    pub fn is_loaded(&self, family: &str, style: Option<&str>) -> bool {
        self.resolve(family, style)
            .map(|(key, _)| self.caches().contains_key(&key))
            .unwrap_or(false)
    }

    /// Loaded keys, sorted.
    pub fn loaded_keys(&self) -> Vec<GlyphCacheKey> {
        let mut keys: Vec<_> = self.caches().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Face the cache for `key` selects, loading the key when needed.
    fn face_for(&self, key: &GlyphCacheKey, source: &SourceId) -> Result<FaceHandle, FontLoadError> {
        if let Some(cache) = self.caches().get(key) {
            return Ok(cache.face().clone());
        }
        debug!("FontLoader: {} not loaded, loading on demand", key);
        self.install(key.clone(), source.clone(), false)
    }

    /// Select the face of `key` at the given size.
    ///
    /// If the engine no longer holds the cached face, the source is dropped,
    /// parsed again and the key's glyph cache reset.
    fn select(
        &self,
        key: &GlyphCacheKey,
        source: &SourceId,
        width: u32,
        height: u32,
    ) -> Result<(FaceHandle, EngineSession<'_, E>), FontLoadError> {
        let face = self.face_for(key, source)?;
        match self.context.select(&face, width, height) {
            Err(EngineError::NoSuchFace { .. }) => {
                warn!(
                    "FontLoader: engine lost face {} of '{}', parsing it again",
                    face.id(),
                    source
                );
                self.release_sources(std::slice::from_ref(source));
                let face = self.install(key.clone(), source.clone(), true)?;
                let session = self.context.select(&face, width, height)?;
                Ok((face, session))
            }
            result => Ok((face, result?)),
        }
    }

    /// Populate the glyphs of `text` and run `f` on them while the engine is
    /// still selected for this key.
    ///
    /// `f` receives one slot per character of `text` (`None` for characters
    /// the face cannot provide) and the session, which it may use for kerning.
    pub fn with_glyphs<R>(
        &self,
        family: &str,
        style: Option<&str>,
        width: u32,
        height: u32,
        text: &str,
        f: impl FnOnce(&[Option<GlyphEntry>], &EngineSession<'_, E>) -> R,
    ) -> Result<R, FontLoadError> {
        let (key, source) = self.resolve(family, style)?;
        let (face, mut session) = self.select(&key, &source, width, height)?;
        let run = {
            let mut caches = self.caches();
            let cache = caches.entry(key.clone()).or_insert_with(|| {
                GlyphCache::new(key, source, face, self.options.load_flags)
            });
            cache.ensure_populated(&mut session, text);
            cache.lookup_run(text)
        };
        Ok(f(&run, &session))
    }

    /// Glyphs for every character of `text`, in order.
    pub fn glyphs(
        &self,
        family: &str,
        style: Option<&str>,
        width: u32,
        height: u32,
        text: &str,
    ) -> Result<Vec<Option<GlyphEntry>>, FontLoadError> {
        self.with_glyphs(family, style, width, height, text, |run, _| run.to_vec())
    }

    /// Kerning between two glyphs of `(family, style)` at the given size,
    /// using the configured kerning mode.
    pub fn kerning(
        &self,
        family: &str,
        style: Option<&str>,
        width: u32,
        height: u32,
        prev: &GlyphEntry,
        current: &GlyphEntry,
    ) -> Result<Vector26Dot6, FontLoadError> {
        let (key, source) = self.resolve(family, style)?;
        let (_, session) = self.select(&key, &source, width, height)?;
        Ok(session.kerning(prev, current, self.options.kerning_mode))
    }

    /// Resolve a web-font query and parse every file its stylesheet lists.
    ///
    /// Returns family → style names found in those files. Files go through
    /// the Face Cache, so repeated discovery does not refetch. Discovered
    /// sources belong to no catalog family and stay resident until a catalog
    /// family loading the same source is unloaded.
    pub fn discover_web_font(
        &self,
        query: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, FontLoadError> {
        let sources = self.source.resolve_web_font(query)?;
        info!(
            "FontLoader: '{}' resolved to {} font file(s)",
            query,
            sources.len()
        );
        let mut families: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for source in &sources {
            for face in self.faces_for(source)?.iter() {
                families
                    .entry(face.family_name().to_string())
                    .or_default()
                    .insert(face.style_name().to_string());
            }
        }
        Ok(families)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;
    use crate::error::{EngineError, SourceError};
    use crate::source::MemorySource;
    use std::thread;
    use std::time::Duration;
    use test_log::test;

    const CATALOG: &str = r#"[
        {
            "family": "Licorice",
            "variants": ["regular"],
            "files": { "regular": "licorice.ttf" },
            "menu": "licorice-menu.ttf"
        },
        {
            "family": "Duo",
            "variants": ["regular", "italic"],
            "files": { "regular": "duo.ttc", "italic": "duo.ttc" },
            "menu": "duo.ttc"
        },
        {
            "family": "Hollow",
            "variants": ["regular"],
            "files": { "regular": "hollow.ttf" },
            "menu": "hollow.ttf"
        },
        {
            "family": "Gone",
            "variants": ["regular"],
            "files": { "regular": "gone.ttf" },
            "menu": "gone.ttf"
        }
    ]"#;

    fn memory_source() -> MemorySource {
        MemorySource::new()
            .with_font(
                "licorice.ttf",
                HeadlessEngine::font_bytes(&[("Licorice", "Regular")]),
            )
            .with_font(
                "duo.ttc",
                HeadlessEngine::font_bytes(&[("Duo", "Regular"), ("Duo", "Italic")]),
            )
            .with_font("hollow.ttf", Vec::new())
    }

    fn loader_with(
        source: Arc<MemorySource>,
        engine: HeadlessEngine,
    ) -> FontLoader<HeadlessEngine> {
        let catalog = Arc::new(FontCatalog::from_json(CATALOG).unwrap());
        FontLoader::new(catalog, source, engine)
    }

    #[test]
    fn test_load_twice_fetches_once() {
        let source = Arc::new(memory_source());
        let engine = HeadlessEngine::new();
        let stats = engine.stats();
        let loader = loader_with(Arc::clone(&source), engine);

        loader.load("Licorice", Some("regular")).unwrap();
        loader.load("Licorice", Some("regular")).unwrap();

        assert_eq!(source.fetch_count(&SourceId::from("licorice.ttf")), 1);
        assert_eq!(stats.parse_calls(), 1);
        assert!(loader.is_loaded("Licorice", None));
    }

    #[test]
    fn test_concurrent_loads_share_one_fetch() {
        let source = Arc::new(memory_source().with_latency(Duration::from_millis(50)));
        let loader = Arc::new(loader_with(Arc::clone(&source), HeadlessEngine::new()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let loader = Arc::clone(&loader);
                thread::spawn(move || loader.load("Licorice", None))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(source.total_fetches(), 1);
    }

    #[test]
    fn test_styles_sharing_a_source_fetch_once() {
        let source = Arc::new(memory_source());
        let loader = loader_with(Arc::clone(&source), HeadlessEngine::new());
        loader.load("Duo", Some("regular")).unwrap();
        loader.load("Duo", Some("italic")).unwrap();
        assert_eq!(source.fetch_count(&SourceId::from("duo.ttc")), 1);

        let italic = loader.glyphs("Duo", Some("italic"), 0, 16, "a").unwrap();
        assert!(italic[0].is_some());
    }

    #[test]
    fn test_unsupported_style_falls_back_silently() {
        let loader = loader_with(Arc::new(memory_source()), HeadlessEngine::new());
        let key = loader.load("Duo", Some("nonexistent-style")).unwrap();
        assert_eq!(key, GlyphCacheKey::new("Duo", "regular"));
    }

    #[test]
    fn test_load_errors() {
        let loader = loader_with(Arc::new(memory_source()), HeadlessEngine::new());
        assert_eq!(
            loader.load("Nope", None).unwrap_err(),
            FontLoadError::UnknownFamily("Nope".to_string())
        );
        assert!(matches!(
            loader.load("Gone", None),
            Err(FontLoadError::FetchFailed(SourceError::FetchFailed { .. }))
        ));
        assert_eq!(
            loader.load("Hollow", None).unwrap_err(),
            FontLoadError::EmptyFaceSet(SourceId::from("hollow.ttf"))
        );
        assert!(loader.loaded_keys().is_empty());
    }

    #[test]
    fn test_glyphs_load_on_demand_and_keep_order() {
        let engine = HeadlessEngine::new().with_missing('#');
        let loader = loader_with(Arc::new(memory_source()), engine);
        let run = loader.glyphs("Licorice", None, 0, 32, "a#a").unwrap();
        assert_eq!(run.len(), 3);
        assert_eq!(run[0].as_ref().unwrap().ch, 'a');
        assert!(run[1].is_none());
        assert_eq!(run[2].as_ref().unwrap().ch, 'a');
        assert_eq!(
            loader.loaded_keys(),
            vec![GlyphCacheKey::new("Licorice", "regular")]
        );
    }

    #[test]
    fn test_unload_clears_glyph_cache() {
        let engine = HeadlessEngine::new();
        let stats = engine.stats();
        let source = Arc::new(memory_source());
        let loader = loader_with(Arc::clone(&source), engine);

        loader.glyphs("Licorice", None, 0, 32, "ab").unwrap();
        assert!(loader.unload("Licorice", None).unwrap());
        assert!(!loader.unload("Licorice", None).unwrap());
        assert_eq!(
            stats.released_faces(),
            vec![("Licorice".to_string(), "Regular".to_string())]
        );

        loader.glyphs("Licorice", None, 0, 32, "ab").unwrap();
        assert_eq!(stats.requests_for('a'), 2);
        assert_eq!(stats.requests_for('b'), 2);
        assert_eq!(source.fetch_count(&SourceId::from("licorice.ttf")), 2);
    }

    #[test]
    fn test_unload_keeps_family_while_other_style_loaded() {
        let engine = HeadlessEngine::new();
        let stats = engine.stats();
        let loader = loader_with(Arc::new(memory_source()), engine);

        loader.load("Duo", Some("regular")).unwrap();
        loader.load("Duo", Some("italic")).unwrap();
        loader.unload("Duo", Some("regular")).unwrap();
        assert!(stats.released_faces().is_empty());
        assert!(loader.glyphs("Duo", Some("italic"), 0, 16, "x").unwrap()[0].is_some());

        loader.unload("Duo", Some("italic")).unwrap();
        assert_eq!(
            stats.released_faces(),
            vec![
                ("Duo".to_string(), "Regular".to_string()),
                ("Duo".to_string(), "Italic".to_string()),
            ]
        );
        assert_eq!(stats.held_faces(), 0);
        assert!(loader.face_cache().is_empty());
    }

    /// Families whose catalog names differ from the names inside their
    /// files, and two families sharing one file.
    const RENAMED_CATALOG: &str = r#"[
        {
            "family": "Shared",
            "variants": ["regular"],
            "files": { "regular": "a.ttf" },
            "menu": "a.ttf"
        },
        {
            "family": "Shared Bold",
            "variants": ["regular"],
            "files": { "regular": "b.ttf" },
            "menu": "b.ttf"
        },
        {
            "family": "Body",
            "variants": ["regular"],
            "files": { "regular": "body.ttf" },
            "menu": "body.ttf"
        },
        {
            "family": "Body Copy",
            "variants": ["regular"],
            "files": { "regular": "body.ttf" },
            "menu": "body.ttf"
        }
    ]"#;

    fn renamed_loader(
        source: Arc<MemorySource>,
        engine: HeadlessEngine,
    ) -> FontLoader<HeadlessEngine> {
        let catalog = Arc::new(FontCatalog::from_json(RENAMED_CATALOG).unwrap());
        FontLoader::new(catalog, source, engine)
    }

    fn renamed_source() -> MemorySource {
        MemorySource::new()
            .with_font("a.ttf", HeadlessEngine::font_bytes(&[("Shared", "Regular")]))
            .with_font("b.ttf", HeadlessEngine::font_bytes(&[("Shared", "Bold")]))
            .with_font("body.ttf", HeadlessEngine::font_bytes(&[("DejaVu Sans", "Book")]))
    }

    #[test]
    fn test_unload_keeps_family_with_same_face_name() {
        let source = Arc::new(renamed_source());
        let engine = HeadlessEngine::new();
        let stats = engine.stats();
        let loader = renamed_loader(Arc::clone(&source), engine);

        loader.load("Shared", None).unwrap();
        loader.load("Shared Bold", None).unwrap();
        loader.glyphs("Shared Bold", None, 0, 32, "ab").unwrap();

        assert!(loader.unload("Shared", None).unwrap());
        assert!(loader.is_loaded("Shared Bold", None));
        assert_eq!(
            stats.released_faces(),
            vec![("Shared".to_string(), "Regular".to_string())]
        );
        assert_eq!(stats.held_faces(), 1);

        let run = loader.glyphs("Shared Bold", None, 0, 32, "abc").unwrap();
        assert!(run.iter().all(Option::is_some));
        let last = stats.requests().pop().unwrap();
        assert_eq!((last.family.as_str(), last.style.as_str(), last.ch), ("Shared", "Bold", 'c'));
        assert_eq!(stats.requests_for('a'), 1);

        loader.load("Shared Bold", None).unwrap();
        assert_eq!(source.fetch_count(&SourceId::from("b.ttf")), 1);
        assert_eq!(stats.parse_calls(), 2);
    }

    #[test]
    fn test_unload_releases_faces_named_differently_from_family() {
        let source = Arc::new(renamed_source());
        let engine = HeadlessEngine::new();
        let stats = engine.stats();
        let loader = renamed_loader(Arc::clone(&source), engine);

        loader.glyphs("Body", None, 0, 32, "ab").unwrap();
        assert_eq!(stats.held_faces(), 1);

        assert!(loader.unload("Body", None).unwrap());
        assert_eq!(
            stats.released_faces(),
            vec![("DejaVu Sans".to_string(), "Book".to_string())]
        );
        assert_eq!(stats.held_faces(), 0);
        assert!(loader.face_cache().is_empty());

        loader.glyphs("Body", None, 0, 32, "ab").unwrap();
        assert_eq!(source.fetch_count(&SourceId::from("body.ttf")), 2);
    }

    #[test]
    fn test_source_shared_by_two_families_outlives_one_unload() {
        let source = Arc::new(renamed_source());
        let engine = HeadlessEngine::new();
        let stats = engine.stats();
        let loader = renamed_loader(Arc::clone(&source), engine);
        let id = SourceId::from("body.ttf");

        loader.load("Body", None).unwrap();
        loader.load("Body Copy", None).unwrap();
        assert_eq!(source.fetch_count(&id), 1);

        loader.unload("Body", None).unwrap();
        assert!(stats.released_faces().is_empty());
        assert!(loader.face_cache().contains(&id));
        assert!(loader.glyphs("Body Copy", None, 0, 16, "x").unwrap()[0].is_some());

        loader.unload("Body Copy", None).unwrap();
        assert_eq!(stats.released_faces().len(), 1);
        assert!(!loader.face_cache().contains(&id));
    }

    #[test]
    fn test_face_dropped_by_engine_is_parsed_again() {
        let source = Arc::new(memory_source());
        let engine = HeadlessEngine::new();
        let stats = engine.stats();
        let loader = loader_with(Arc::clone(&source), engine);
        let id = SourceId::from("licorice.ttf");

        loader.glyphs("Licorice", None, 0, 32, "a").unwrap();
        let faces: Vec<FaceHandle> = loader.faces.get(&id).unwrap().iter().cloned().collect();
        assert_eq!(loader.context.unload_faces(&faces), 1);

        let run = loader.glyphs("Licorice", None, 0, 32, "a").unwrap();
        assert_eq!(run[0].as_ref().unwrap().ch, 'a');
        assert_eq!(source.fetch_count(&id), 2);
        assert_eq!(stats.parse_calls(), 2);
        assert_eq!(stats.requests_for('a'), 2);
        assert!(loader.is_loaded("Licorice", None));
    }

    #[test]
    fn test_kerning_uses_configured_mode() {
        let engine =
            HeadlessEngine::new().with_kerning('A', 'V', Vector26Dot6::new(-150, 0));
        let loader = loader_with(Arc::new(memory_source()), engine).with_options(LoaderOptions {
            kerning_mode: KerningMode::Unfitted,
            ..LoaderOptions::default()
        });
        let run = loader.glyphs("Licorice", None, 0, 32, "AV").unwrap();
        let (a, v) = (run[0].as_ref().unwrap(), run[1].as_ref().unwrap());
        let kerning = loader.kerning("Licorice", None, 0, 32, a, v).unwrap();
        assert_eq!(kerning, Vector26Dot6::new(-150, 0));
    }

    #[test]
    fn test_invalid_size_is_an_engine_error() {
        let loader = loader_with(Arc::new(memory_source()), HeadlessEngine::new());
        assert!(matches!(
            loader.glyphs("Licorice", None, 0, 0, "a"),
            Err(FontLoadError::Engine(EngineError::InvalidPixelSize { .. }))
        ));
    }

    #[test]
    fn test_discover_web_font_groups_styles() {
        let source = Arc::new(memory_source().with_stylesheet(
            "Duo",
            vec![SourceId::from("duo.ttc"), SourceId::from("licorice.ttf")],
        ));
        let loader = loader_with(Arc::clone(&source), HeadlessEngine::new());

        let families = loader.discover_web_font("Duo").unwrap();
        assert_eq!(
            families["Duo"].iter().collect::<Vec<_>>(),
            vec!["Italic", "Regular"]
        );
        assert!(families.contains_key("Licorice"));

        loader.discover_web_font("Duo").unwrap();
        assert_eq!(source.total_fetches(), 2);

        assert!(matches!(
            loader.discover_web_font("Missing"),
            Err(FontLoadError::ResolutionFailed(_))
        ));
    }
}
