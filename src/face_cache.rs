// src/face_cache.rs

//! Parsed faces keyed by font source.
//!
//! Each source gets one `OnceCell` slot. The first caller to ask for an
//! uncached source runs the fetch+parse; concurrent callers for the same
//! source block on that slot and receive the same result instead of starting
//! their own. A failed initialisation leaves the slot empty, so the next
//! caller retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};
use once_cell::sync::OnceCell;

use crate::catalog::SourceId;
use crate::engine::FaceHandle;

/// Faces parsed from one source, shared read-only.
pub type FaceSet = Arc<[FaceHandle]>;

type Slot = Arc<OnceCell<FaceSet>>;

/// Source id → parsed faces. Entries are only removed by `invalidate`.
#[derive(Debug, Default)]
pub struct FaceCache {
    slots: Mutex<HashMap<SourceId, Slot>>,
}

impl FaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SourceId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, source: &SourceId) -> Slot {
        Arc::clone(self.slots().entry(source.clone()).or_default())
    }

    /// Faces for `source`, if a load has completed.
    pub fn get(&self, source: &SourceId) -> Option<FaceSet> {
        self.slots()
            .get(source)
            .and_then(|slot| slot.get())
            .map(Arc::clone)
    }

    /// Store faces for `source`. An existing completed entry is kept.
    pub fn put(&self, source: SourceId, faces: impl Into<FaceSet>) -> FaceSet {
        let slot = self.slot(&source);
        let faces = faces.into();
        Arc::clone(slot.get_or_init(|| faces))
    }

    /// Faces for `source`, running `load` if no completed entry exists.
    ///
    /// At most one `load` runs per source at a time; callers arriving while
    /// it runs wait for it. The returned flag is `true` when this call ran
    /// `load` itself.
    pub fn get_or_try_load<F, E>(&self, source: &SourceId, load: F) -> Result<(FaceSet, bool), E>
    where
        F: FnOnce() -> Result<FaceSet, E>,
    {
        // The map lock is released before `load` runs; only the slot blocks.
        let slot = self.slot(source);
        if let Some(faces) = slot.get() {
            trace!("FaceCache: hit for '{}'", source);
            return Ok((Arc::clone(faces), false));
        }

        let mut loaded_here = false;
        let faces = slot.get_or_try_init(|| {
            loaded_here = true;
            load()
        })?;
        if loaded_here {
            debug!("FaceCache: stored {} face(s) for '{}'", faces.len(), source);
        } else {
            trace!("FaceCache: joined in-flight load of '{}'", source);
        }
        Ok((Arc::clone(faces), loaded_here))
    }

    /// Forget `source`. A load still running for it completes into a
    /// detached slot and is not observed by later callers.
    pub fn invalidate(&self, source: &SourceId) -> bool {
        let removed = self.slots().remove(source).is_some();
        if removed {
            debug!("FaceCache: invalidated '{}'", source);
        }
        removed
    }

    pub fn contains(&self, source: &SourceId) -> bool {
        self.get(source).is_some()
    }

    /// Number of sources with completed entries.
    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn faces(family: &str) -> FaceSet {
        Arc::from(vec![FaceHandle::new(family, "Regular")])
    }

    #[test]
    fn test_put_then_get() {
        let cache = FaceCache::new();
        let id = SourceId::from("a.ttf");
        assert!(cache.get(&id).is_none());
        cache.put(id.clone(), faces("A"));
        assert_eq!(cache.get(&id).unwrap()[0].family_name(), "A");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_second_load_is_a_hit() {
        let cache = FaceCache::new();
        let id = SourceId::from("a.ttf");
        let calls = AtomicUsize::new(0);
        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(faces("A"))
        };
        let (_, first) = cache.get_or_try_load(&id, load).unwrap();
        let (_, second) = cache.get_or_try_load(&id, load).unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_loads_run_once() {
        let cache = Arc::new(FaceCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));
        let id = SourceId::from("shared.ttf");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (cache, calls, barrier, id) =
                    (Arc::clone(&cache), Arc::clone(&calls), Arc::clone(&barrier), id.clone());
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_try_load(&id, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            Ok::<_, String>(faces("Shared"))
                        })
                        .unwrap()
                        .0
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap()[0].family_name(), "Shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = FaceCache::new();
        let id = SourceId::from("flaky.ttf");
        let err = cache
            .get_or_try_load(&id, || Err::<FaceSet, _>("offline".to_string()))
            .unwrap_err();
        assert_eq!(err, "offline");
        assert!(!cache.contains(&id));

        let (faces, loaded) = cache.get_or_try_load(&id, || Ok::<_, String>(faces("B"))).unwrap();
        assert!(loaded);
        assert_eq!(faces[0].family_name(), "B");
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let cache = FaceCache::new();
        let id = SourceId::from("a.ttf");
        cache.put(id.clone(), faces("A"));
        assert!(cache.invalidate(&id));
        assert!(!cache.invalidate(&id));
        assert!(cache.is_empty());
        let (_, loaded) = cache.get_or_try_load(&id, || Ok::<_, String>(faces("A"))).unwrap();
        assert!(loaded);
    }
}
