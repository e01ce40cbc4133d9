//! Per-track suggestion cache keyed by (track id, index version).
//!
//! An entry only answers for the version it was computed against. A lookup
//! under a newer version reports the stale entry and recomputes; the
//! computation itself runs outside the map lock so sweeps do not serialize.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{report, Error, Result};
use crate::models::{FixSuggestion, IndexVersion};

struct CacheEntry {
    version: IndexVersion,
    suggestions: Arc<Vec<FixSuggestion>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
pub struct SuggestionCache {
    entries: Mutex<FxHashMap<i64, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SuggestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached suggestions for `track_id` at `version`, if any.
    ///
    /// An entry from another version is an [`Error::IndexStale`]; it is
    /// dropped and the caller recomputes.
    pub fn get(&self, track_id: i64, version: IndexVersion) -> Result<Option<Arc<Vec<FixSuggestion>>>> {
        let mut entries = self.entries.lock();
        match entries.get(&track_id) {
            None => Ok(None),
            Some(entry) if entry.version == version => Ok(Some(entry.suggestions.clone())),
            Some(entry) => {
                let cached = entry.version;
                entries.remove(&track_id);
                Err(Error::IndexStale {
                    cached,
                    current: version,
                })
            }
        }
    }

    pub fn insert(
        &self,
        track_id: i64,
        version: IndexVersion,
        suggestions: Vec<FixSuggestion>,
    ) -> Arc<Vec<FixSuggestion>> {
        let suggestions = Arc::new(suggestions);
        let mut entries = self.entries.lock();
        // A concurrent compute for a newer version wins
        match entries.get(&track_id) {
            Some(existing) if existing.version > version => existing.suggestions.clone(),
            _ => {
                entries.insert(
                    track_id,
                    CacheEntry {
                        version,
                        suggestions: suggestions.clone(),
                    },
                );
                suggestions
            }
        }
    }

    /// Return the cached list or compute, store and return a fresh one.
    pub fn get_or_compute<F>(
        &self,
        track_id: i64,
        version: IndexVersion,
        compute: F,
    ) -> Result<Arc<Vec<FixSuggestion>>>
    where
        F: FnOnce() -> Result<Vec<FixSuggestion>>,
    {
        match self.get(track_id, version) {
            Ok(Some(hit)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(hit);
            }
            Ok(None) => {}
            Err(err) => report(&err, "suggestion cache"),
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let fresh = compute()?;
        Ok(self.insert(track_id, version, fresh))
    }

    pub fn invalidate(&self, track_id: i64) {
        self.entries.lock().remove(&track_id);
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped, "suggestion cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchTier;

    fn suggestion(version: IndexVersion) -> FixSuggestion {
        FixSuggestion {
            id: None,
            track_id: 1,
            music_file_id: 9,
            candidate_path: "/m/a.mp3".to_string(),
            tier: MatchTier::ExactPath,
            similarity_score: 100,
            index_version: version,
            created_at: None,
            applied: false,
        }
    }

    #[test]
    fn test_hit_after_compute() {
        let cache = SuggestionCache::new();
        let first = cache.get_or_compute(1, 1, || Ok(vec![suggestion(1)])).unwrap();
        let second = cache
            .get_or_compute(1, 1, || panic!("should be cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn test_stale_entry_is_recomputed() {
        let cache = SuggestionCache::new();
        cache.get_or_compute(1, 1, || Ok(vec![suggestion(1)])).unwrap();

        assert!(matches!(
            cache.get(1, 2),
            Err(Error::IndexStale { cached: 1, current: 2 })
        ));
        // The stale entry was dropped by the failed lookup
        assert!(cache.is_empty());

        let fresh = cache.get_or_compute(1, 2, || Ok(vec![suggestion(2)])).unwrap();
        assert_eq!(fresh[0].index_version, 2);
    }

    #[test]
    fn test_older_insert_does_not_replace_newer() {
        let cache = SuggestionCache::new();
        cache.insert(1, 3, vec![suggestion(3)]);
        let kept = cache.insert(1, 2, vec![suggestion(2)]);
        assert_eq!(kept[0].index_version, 3);
    }

    #[test]
    fn test_compute_error_is_not_cached() {
        let cache = SuggestionCache::new();
        let err = cache.get_or_compute(1, 1, || Err(Error::not_found("track", 1)));
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = SuggestionCache::new();
        cache.insert(1, 1, vec![]);
        cache.insert(2, 1, vec![]);
        cache.invalidate(1);
        assert_eq!(cache.len(), 1);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
