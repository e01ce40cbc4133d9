//! Inverted word index over music files and tracks.
//!
//! Tokenization fans out over rayon; writes funnel into the store's single
//! batched-insert path. A full rebuild holds the index lock exclusively for
//! its whole duration, so anyone reading under [`WordIndex::read`] sees the
//! old version or the new one, never a half-written index.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rayon::prelude::*;
use std::sync::Arc;

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::models::{EntityKind, Indexable, IndexVersion, WordEntry};
use crate::normalize::normalize;
use crate::progress::Phase;
use crate::store::Store;

/// Word rows for one entity, one per token occurrence.
pub fn word_entries(entity_id: i64, name: &str) -> Vec<WordEntry> {
    normalize(name)
        .tokens
        .into_iter()
        .enumerate()
        .map(|(position, word)| WordEntry {
            entity_id,
            word_length: word.len(),
            word_position: position,
            word,
        })
        .collect()
}

/// Tokenize entities in parallel, stopping early once `cancel` is set.
fn tokenize_all<E: Indexable>(entities: &[E], cancel: &CancelFlag) -> Result<Vec<WordEntry>> {
    let per_entity: Vec<Option<Vec<WordEntry>>> = entities
        .par_iter()
        .map(|e| {
            if cancel.is_cancelled() {
                None
            } else {
                Some(word_entries(e.entity_id(), e.index_name()))
            }
        })
        .collect();

    cancel.check()?;
    Ok(per_entity.into_iter().flatten().flatten().collect())
}

pub struct WordIndex {
    store: Arc<Store>,
    batch_size: usize,
    lock: RwLock<()>,
}

impl WordIndex {
    pub fn new(store: Arc<Store>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size,
            lock: RwLock::new(()),
        }
    }

    pub fn current_version(&self) -> Result<IndexVersion> {
        self.store.index_version()
    }

    /// Shared guard held by readers that need a consistent view of one version.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Exclusive guard for imports that change library rows and their word
    /// rows as one step.
    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }

    /// Index freshly imported entities under the current version (no bump).
    /// Rows of these entities from earlier indexing are replaced.
    pub fn index_entities<E: Indexable>(&self, entities: &[E], kind: EntityKind) -> Result<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.read();
        self.index_entities_locked(entities, kind)
    }

    /// [`WordIndex::index_entities`] for a caller already holding a guard.
    pub fn index_entities_locked<E: Indexable>(&self, entities: &[E], kind: EntityKind) -> Result<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        let version = self.store.index_version()?;

        let rows = tokenize_all(entities, &CancelFlag::new())?;
        let ids: Vec<i64> = entities.iter().map(|e| e.entity_id()).collect();
        let written = self
            .store
            .append_words(kind, &ids, &rows, version, self.batch_size)?;

        tracing::debug!(
            kind = kind.words_table(),
            entities = entities.len(),
            rows = written,
            version,
            "indexed entities"
        );
        Ok(written)
    }

    /// Drop and re-derive the whole index as version `previous + 1`.
    ///
    /// On failure or cancellation the store rolls back and the version is
    /// unchanged; the exclusive lock is released when the guard drops.
    pub fn rebuild_all(&self, cancel: &CancelFlag) -> Result<IndexVersion> {
        let _guard = self.lock.write();
        let phase = Phase::spinner("Rebuilding word index");

        let result = self.rebuild_locked(cancel);
        match &result {
            Ok(version) => phase.finish(format!("Word index rebuilt (version {})", version)),
            Err(Error::Cancelled) => phase.abandon("Word index rebuild cancelled".to_string()),
            Err(err) => {
                tracing::error!(error = %err, "word index rebuild failed");
                phase.abandon("Word index rebuild aborted".to_string());
            }
        }
        result
    }

    fn rebuild_locked(&self, cancel: &CancelFlag) -> Result<IndexVersion> {
        let music_files = self.store.music_files()?;
        let tracks = self.store.tracks()?;
        cancel.check()?;

        let music_rows = tokenize_all(&music_files, cancel)?;
        let track_rows = tokenize_all(&tracks, cancel)?;
        tracing::debug!(
            music_files = music_files.len(),
            tracks = tracks.len(),
            music_rows = music_rows.len(),
            track_rows = track_rows.len(),
            "tokenized library"
        );

        self.store
            .replace_all_words(&music_rows, &track_rows, self.batch_size, cancel)
    }
}
