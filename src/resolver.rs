//! The engine's public face: one [`Resolver`] owns the store, the word index,
//! the suggestion cache and the fix applier, and exposes every operation the
//! CLI needs.
//!
//! Matching reads an `Arc<LibrarySnapshot>` pinned to one index version. The
//! snapshot is reloaded lazily whenever the stored version moves, and dropped
//! outright after imports, so a reader never mixes rows from two versions.
//!
//! Imports take the index lock exclusively while they write library rows and
//! drop derived state, so a snapshot load or a suggestion computation never
//! straddles an import.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheStats, SuggestionCache};
use crate::cancel::CancelFlag;
use crate::config::ResolverConfig;
use crate::error::{report, Result};
use crate::fixer::FixApplier;
use crate::index::WordIndex;
use crate::matcher::{Evaluation, MatchOptions, SimilarityMatcher};
use crate::models::{
    EntityKind, FixResult, FixSuggestion, IndexVersion, MatchTier, MusicFile, NewMusicFile,
    SimilarityStats, StatusSummary, SuggestionFilter, SuggestionListing, TierStats, Track,
    TrackStatus,
};
use crate::progress::Phase;
use crate::safety::validate_playlist;
use crate::scan::{scan_directory, ScanSummary};
use crate::snapshot::LibrarySnapshot;
use crate::store::Store;

pub struct Resolver {
    store: Arc<Store>,
    index: WordIndex,
    cache: SuggestionCache,
    fixer: FixApplier,
    config: ResolverConfig,
    snapshot: RwLock<Option<Arc<LibrarySnapshot>>>,
}

impl Resolver {
    pub fn new(store: Arc<Store>, config: ResolverConfig) -> Self {
        let config = config.sanitized();
        Self {
            index: WordIndex::new(store.clone(), config.write_batch_size),
            fixer: FixApplier::new(store.clone()),
            cache: SuggestionCache::new(),
            snapshot: RwLock::new(None),
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn index_version(&self) -> Result<IndexVersion> {
        self.index.current_version()
    }

    fn options(&self) -> MatchOptions {
        MatchOptions::from(&self.config)
    }

    /// Snapshot for the current version. Caller must hold `self.index.read()`.
    fn snapshot_locked(&self) -> Result<Arc<LibrarySnapshot>> {
        let current = self.store.index_version()?;
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            if snapshot.version() == current {
                return Ok(snapshot.clone());
            }
        }

        let start = Instant::now();
        let snapshot = Arc::new(LibrarySnapshot::from_rows(self.store.load_library()?));
        tracing::debug!(
            version = snapshot.version(),
            files = snapshot.len(),
            words = snapshot.word_count(),
            built_at = %snapshot.built_at(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "library snapshot loaded"
        );
        *self.snapshot.write() = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn current_snapshot(&self) -> Result<Arc<LibrarySnapshot>> {
        let _index = self.index.read();
        self.snapshot_locked()
    }

    /// Drop everything derived from the library contents: cached and
    /// persisted suggestions and the loaded snapshot. Caller holds
    /// `self.index.write()`.
    fn invalidate_derived(&self) -> Result<()> {
        self.cache.invalidate_all();
        *self.snapshot.write() = None;
        self.store.clear_suggestions()
    }

    // ------------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------------

    /// Register music files and index them under the current version.
    pub fn import_music_files(&self, files: &[NewMusicFile]) -> Result<Vec<MusicFile>> {
        let _index = self.index.write();
        let stored = self.store.upsert_music_files(files)?;
        self.index.index_entities_locked(&stored, EntityKind::MusicFile)?;
        self.invalidate_derived()?;
        tracing::info!(files = stored.len(), "music files imported");
        Ok(stored)
    }

    /// Walk `root` for media files and import them.
    pub fn scan_library(&self, root: &Path) -> Result<ScanSummary> {
        let phase = Phase::spinner("Scanning library");
        let report = match scan_directory(root) {
            Ok(report) => report,
            Err(err) => {
                phase.abandon(format!("Scan of {} failed", root.display()));
                return Err(err);
            }
        };
        let imported = self.import_music_files(&report.files)?;
        phase.finish(format!("Scanned {} media files", imported.len()));

        Ok(ScanSummary {
            root: root.display().to_string(),
            discovered: report.files.len(),
            imported: imported.len(),
            errors: report.errors,
        })
    }

    /// Create or update a playlist and replace its track list. Each track's
    /// status is set from whether its file currently exists.
    pub fn import_playlist(&self, name: &str, path: &str, track_paths: &[String]) -> Result<Vec<Track>> {
        validate_playlist(name, path)?;
        let entries: Vec<(String, TrackStatus)> = track_paths
            .par_iter()
            .map(|p| (p.clone(), file_status(p)))
            .collect();

        let tracks = {
            let _index = self.index.write();
            let playlist = self.store.upsert_playlist(name, path)?;
            let tracks = self.store.replace_playlist_tracks(playlist.meta.id, &entries)?;
            self.index.index_entities_locked(&tracks, EntityKind::Track)?;
            self.invalidate_derived()?;
            tracks
        };

        let missing = tracks.iter().filter(|t| t.status == TrackStatus::Missing).count();
        tracing::info!(playlist = name, tracks = tracks.len(), missing, "playlist imported");
        Ok(tracks)
    }

    /// Re-check every track's file on disk and persist status changes.
    pub fn check_track_status(&self) -> Result<StatusSummary> {
        let tracks = self.store.tracks()?;
        let phase = Phase::bar("Checking tracks", tracks.len() as u64);

        let observed: Vec<(i64, TrackStatus, TrackStatus)> = tracks
            .par_iter()
            .map(|t| {
                let status = file_status(&t.path);
                phase.inc();
                (t.id(), t.status, status)
            })
            .collect();

        let updates: Vec<(i64, TrackStatus)> = observed
            .iter()
            .filter(|(_, old, new)| old != new)
            .map(|&(id, _, new)| (id, new))
            .collect();
        let changed = {
            let _index = self.index.write();
            let changed = self.store.update_track_statuses(&updates)?;
            if changed > 0 {
                // The set of missing tracks moved; the persisted batch no longer covers it
                self.store.clear_suggestions()?;
            }
            changed
        };

        let count = |status: TrackStatus| observed.iter().filter(|(_, _, s)| *s == status).count();
        let summary = StatusSummary {
            checked: observed.len(),
            found: count(TrackStatus::Found),
            missing: count(TrackStatus::Missing),
            changed,
        };
        phase.finish(format!(
            "{} tracks checked, {} missing, {} changed",
            summary.checked, summary.missing, summary.changed
        ));
        Ok(summary)
    }

    // ------------------------------------------------------------------------
    // Index
    // ------------------------------------------------------------------------

    /// Rebuild the word index from scratch as a new version. Every cached
    /// suggestion from the previous version stops being served.
    pub fn rebuild_index(&self, cancel: &CancelFlag) -> Result<IndexVersion> {
        let version = self.index.rebuild_all(cancel)?;
        let _index = self.index.write();
        self.invalidate_derived()?;
        Ok(version)
    }

    // ------------------------------------------------------------------------
    // Suggestions
    // ------------------------------------------------------------------------

    /// Authoritative ranked suggestions for one track, served from the cache
    /// when it holds an entry for the current version.
    pub fn suggestions_for_track(&self, track_id: i64) -> Result<Arc<Vec<FixSuggestion>>> {
        let _index = self.index.read();
        let track = self.store.track(track_id)?;
        let snapshot = self.snapshot_locked()?;
        self.cached_suggestions(&snapshot, &track)
    }

    fn cached_suggestions(&self, snapshot: &LibrarySnapshot, track: &Track) -> Result<Arc<Vec<FixSuggestion>>> {
        let options = self.options();
        self.cache.get_or_compute(track.id(), snapshot.version(), || {
            Ok(SimilarityMatcher::new(snapshot, options).suggest(track))
        })
    }

    /// Compute suggestions for every missing track and persist them as the
    /// batch for the snapshot's version. Caller holds the index read lock.
    fn generate_suggestions_locked(&self, snapshot: &LibrarySnapshot) -> Result<usize> {
        let missing = self.store.tracks_with_status(TrackStatus::Missing)?;
        let phase = Phase::bar("Generating suggestions", missing.len() as u64);

        let per_track: Vec<Vec<FixSuggestion>> = missing
            .par_iter()
            .filter_map(|track| {
                let result = self.cached_suggestions(snapshot, track);
                phase.inc();
                match result {
                    Ok(list) => Some(Vec::clone(&list)),
                    Err(err) => {
                        report(&err, &track.path);
                        None
                    }
                }
            })
            .collect();

        let suggestions: Vec<FixSuggestion> = per_track.into_iter().flatten().collect();
        let written = self.store.replace_suggestions(
            snapshot.version(),
            &suggestions,
            self.config.write_batch_size,
        )?;
        phase.finish(format!(
            "{} suggestions for {} missing tracks (version {})",
            written,
            missing.len(),
            snapshot.version()
        ));
        Ok(written)
    }

    /// Persisted suggestions for the current version, filtered and paged.
    /// The batch is regenerated first when it was built for an older version.
    pub fn get_suggestions(&self, filter: &SuggestionFilter) -> Result<Vec<SuggestionListing>> {
        let _index = self.index.read();
        let snapshot = self.snapshot_locked()?;
        if self.store.suggestions_version()? != Some(snapshot.version()) {
            self.generate_suggestions_locked(&snapshot)?;
        }
        self.store.list_suggestions(filter, snapshot.version())
    }

    /// Regenerate and persist the suggestion batch unconditionally.
    pub fn generate_suggestions(&self) -> Result<usize> {
        let _index = self.index.read();
        let snapshot = self.snapshot_locked()?;
        self.generate_suggestions_locked(&snapshot)
    }

    fn evaluate_missing(&self, snapshot: &LibrarySnapshot, label: &'static str) -> Result<Vec<(Track, Evaluation)>> {
        let missing = self.store.tracks_with_status(TrackStatus::Missing)?;
        let phase = Phase::bar(label, missing.len() as u64);
        let matcher = SimilarityMatcher::new(snapshot, self.options());

        let evaluations: Vec<(Track, Evaluation)> = missing
            .into_par_iter()
            .map(|track| {
                let eval = matcher.evaluate_all(&track);
                phase.inc();
                (track, eval)
            })
            .collect();
        phase.finish(format!("{} missing tracks evaluated", evaluations.len()));
        Ok(evaluations)
    }

    /// Library-wide diagnostics: every tier evaluated for every missing track.
    pub fn get_statistics(&self) -> Result<SimilarityStats> {
        let start = Instant::now();
        let snapshot = self.current_snapshot()?;
        let evaluations = self.evaluate_missing(&snapshot, "Collecting statistics")?;

        let mut tiers: Vec<TierStats> = MatchTier::ALL
            .into_iter()
            .map(|tier| TierStats {
                tier: Some(tier),
                ..Default::default()
            })
            .collect();
        let mut score_sums = [0u64; 5];

        for (_, eval) in &evaluations {
            for (stats, outcome) in tiers.iter_mut().zip(&eval.tiers) {
                stats.candidate_count += outcome.candidates.len();
                stats.elapsed_ms += outcome.elapsed.as_secs_f64() * 1000.0;
                if !outcome.candidates.is_empty() {
                    stats.tracks_with_candidates += 1;
                }
            }
            if let (Some(tier), Some(top)) = (eval.authoritative_tier(), eval.authoritative.first()) {
                let slot = usize::from(tier.number() - 1);
                tiers[slot].authoritative_count += 1;
                score_sums[slot] += u64::from(top.similarity_score);
            }
        }
        for (stats, sum) in tiers.iter_mut().zip(score_sums) {
            if stats.authoritative_count > 0 {
                stats.average_score = sum as f64 / stats.authoritative_count as f64;
            }
        }

        let matched = evaluations
            .iter()
            .filter(|(_, e)| !e.authoritative.is_empty())
            .count();
        let stats = SimilarityStats {
            index_version: snapshot.version(),
            missing_tracks: evaluations.len(),
            matched_tracks: matched,
            unmatched_tracks: evaluations.len() - matched,
            tiers,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };
        stats.log();
        Ok(stats)
    }

    /// Missing tracks for which no tier yields a candidate, by ascending id.
    pub fn get_unmatched_tracks(&self, limit: Option<usize>) -> Result<Vec<Track>> {
        let snapshot = self.current_snapshot()?;
        let mut unmatched: Vec<Track> = self
            .evaluate_missing(&snapshot, "Finding unmatched tracks")?
            .into_iter()
            .filter(|(_, eval)| eval.is_unmatched())
            .map(|(track, _)| track)
            .collect();
        unmatched.sort_by_key(Track::id);
        if let Some(limit) = limit {
            unmatched.truncate(limit);
        }
        Ok(unmatched)
    }

    // ------------------------------------------------------------------------
    // Repair
    // ------------------------------------------------------------------------

    /// Replace `old_path` with `new_path` in every playlist file that uses it
    /// and move the tracks in the database.
    pub fn apply_fix(&self, old_path: &str, new_path: &str, cancel: &CancelFlag) -> Result<FixResult> {
        let _index = self.index.read();
        let version = self.store.index_version()?;
        let result = self.fixer.apply(old_path, new_path, version, cancel)?;
        if result.tracks_updated > 0 {
            self.cache.invalidate_all();
        }
        Ok(result)
    }

    /// Drop every cached and persisted suggestion; the next query recomputes.
    pub fn refresh_cache(&self) -> Result<()> {
        let entries = self.cache.len();
        let _index = self.index.write();
        self.invalidate_derived()?;
        tracing::info!(entries, "suggestion cache refreshed");
        Ok(())
    }
}

fn file_status(path: &str) -> TrackStatus {
    match Path::new(path).try_exists() {
        Ok(true) => TrackStatus::Found,
        Ok(false) => TrackStatus::Missing,
        Err(err) => {
            tracing::warn!(path, error = %err, "cannot check track file");
            TrackStatus::Error
        }
    }
}
