//! Bulk repair of a broken path across every playlist that references it.
//!
//! Files are rewritten one at a time, each under a lock for its playlist
//! path, so two repairs touching the same playlist never interleave their
//! read-modify-write. The database moves all matching tracks in a single
//! statement once the file loop is done.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancelFlag;
use crate::error::{report, Error, Result};
use crate::models::{FileFixDetail, FileFixStatus, FixResult, IndexVersion, TrackStatus};
use crate::normalize::{normalize, split_path};
use crate::safety::validate_fix_paths;
use crate::store::Store;

/// One mutex per playlist path, created on demand.
///
/// Paths are compared as given; two spellings of the same file get two locks.
#[derive(Default)]
pub struct PathLocks {
    locks: Mutex<FxHashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    fn handle(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        // Drop locks nobody is holding or waiting on
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Run `f` while holding the lock for `path`.
    pub fn with_lock<R>(&self, path: &Path, f: impl FnOnce() -> R) -> R {
        let handle = self.handle(path);
        let _guard = handle.lock();
        f()
    }
}

/// Replace every occurrence of `old` in the file. Returns the count.
fn rewrite_playlist(path: &Path, old: &str, new: &str) -> Result<usize> {
    let content = fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
    let changes = content.matches(old).count();
    if changes == 0 {
        return Ok(0);
    }
    fs::write(path, content.replace(old, new)).map_err(|e| Error::file_io(path, e))?;
    Ok(changes)
}

pub struct FixApplier {
    store: Arc<Store>,
    locks: PathLocks,
}

impl FixApplier {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            locks: PathLocks::default(),
        }
    }

    /// Rewrite `old_path` to `new_path` in every referencing playlist, then
    /// move the matching track rows. Word rows for moved tracks are written
    /// under `version`.
    ///
    /// Per-file failures are recorded in the result and do not stop the run.
    /// On cancellation the files already written stay written and the
    /// database is left untouched, so the same call can simply be repeated.
    pub fn apply(
        &self,
        old_path: &str,
        new_path: &str,
        version: IndexVersion,
        cancel: &CancelFlag,
    ) -> Result<FixResult> {
        validate_fix_paths(old_path, new_path)?;

        let playlists = self.store.playlists_referencing(old_path)?;
        let mut result = FixResult {
            affected_playlists: playlists.len(),
            ..Default::default()
        };

        for playlist in &playlists {
            if cancel.is_cancelled() {
                tracing::warn!(
                    old_path,
                    processed = result.details.len(),
                    remaining = playlists.len() - result.details.len(),
                    "fix cancelled, database not updated"
                );
                result.cancelled = true;
                return Ok(result);
            }

            let path = Path::new(&playlist.path);
            let status = match self
                .locks
                .with_lock(path, || rewrite_playlist(path, old_path, new_path))
            {
                Ok(0) => FileFixStatus::NoChanges,
                Ok(changes) => {
                    result.files_updated += 1;
                    FileFixStatus::Updated { changes }
                }
                Err(err) => {
                    report(&err, &playlist.name);
                    result.files_failed += 1;
                    FileFixStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            tracing::debug!(playlist = %playlist.path, ?status, "playlist processed");
            result.details.push(FileFixDetail {
                playlist_name: playlist.name.clone(),
                playlist_path: playlist.path.clone(),
                status,
            });
        }

        let status = if Path::new(new_path).exists() {
            TrackStatus::Found
        } else {
            TrackStatus::Missing
        };
        let tokens = normalize(split_path(new_path).1).tokens;
        result.tracks_updated =
            self.store
                .move_track_path(old_path, new_path, status, &tokens, version)?;

        tracing::info!(
            old_path,
            new_path,
            playlists = result.affected_playlists,
            files_updated = result.files_updated,
            files_failed = result.files_failed,
            tracks_updated = result.tracks_updated,
            "fix applied"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<Store>,
        playlists: Vec<PathBuf>,
    }

    /// Playlists on disk, each holding the given lines and registered in the store.
    fn fixture(playlists: &[&[&str]]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut paths = Vec::new();
        for (i, lines) in playlists.iter().enumerate() {
            let path = dir.path().join(format!("list{}.m3u", i));
            fs::write(&path, lines.join("\n")).unwrap();
            let path_str = path.to_string_lossy().into_owned();
            let playlist = store.upsert_playlist(&format!("List {}", i), &path_str).unwrap();
            let tracks: Vec<(String, TrackStatus)> = lines
                .iter()
                .map(|l| (l.to_string(), TrackStatus::Missing))
                .collect();
            store.replace_playlist_tracks(playlist.meta.id, &tracks).unwrap();
            paths.push(path);
        }
        Fixture {
            _dir: dir,
            store,
            playlists: paths,
        }
    }

    #[test]
    fn test_rewrites_every_referencing_playlist() {
        let fx = fixture(&[&["/old/a.mp3", "/old/b.mp3"], &["/old/a.mp3"], &["/old/c.mp3"]]);
        let applier = FixApplier::new(fx.store.clone());

        let result = applier
            .apply("/old/a.mp3", "/new/a.mp3", 0, &CancelFlag::new())
            .unwrap();
        assert_eq!(result.affected_playlists, 2);
        assert_eq!(result.files_updated, 2);
        assert_eq!(result.files_failed, 0);
        assert_eq!(result.tracks_updated, 2);
        assert!(!result.cancelled);

        let first = fs::read_to_string(&fx.playlists[0]).unwrap();
        assert_eq!(first, "/new/a.mp3\n/old/b.mp3");
        let untouched = fs::read_to_string(&fx.playlists[2]).unwrap();
        assert_eq!(untouched, "/old/c.mp3");

        let moved: Vec<_> = fx
            .store
            .tracks()
            .unwrap()
            .into_iter()
            .filter(|t| t.path == "/new/a.mp3")
            .collect();
        assert_eq!(moved.len(), 2);
        assert!(moved.iter().all(|t| t.status == TrackStatus::Missing));
    }

    #[test]
    fn test_repeat_is_a_no_op() {
        let fx = fixture(&[&["/old/a.mp3"]]);
        let applier = FixApplier::new(fx.store.clone());
        applier
            .apply("/old/a.mp3", "/new/a.mp3", 0, &CancelFlag::new())
            .unwrap();

        let again = applier
            .apply("/old/a.mp3", "/new/a.mp3", 0, &CancelFlag::new())
            .unwrap();
        assert_eq!(again, FixResult::default());
    }

    #[test]
    fn test_missing_playlist_file_is_reported() {
        let fx = fixture(&[&["/old/a.mp3"], &["/old/a.mp3"]]);
        fs::remove_file(&fx.playlists[0]).unwrap();
        let applier = FixApplier::new(fx.store.clone());

        let result = applier
            .apply("/old/a.mp3", "/new/a.mp3", 0, &CancelFlag::new())
            .unwrap();
        assert_eq!(result.files_failed, 1);
        assert_eq!(result.files_updated, 1);
        assert!(matches!(result.details[0].status, FileFixStatus::Failed { .. }));
        // DB update still covers every track
        assert_eq!(result.tracks_updated, 2);
    }

    #[test]
    fn test_externally_edited_playlist_reports_no_changes() {
        let fx = fixture(&[&["/old/a.mp3"]]);
        fs::write(&fx.playlists[0], "/somewhere/else.mp3").unwrap();
        let applier = FixApplier::new(fx.store.clone());

        let result = applier
            .apply("/old/a.mp3", "/new/a.mp3", 0, &CancelFlag::new())
            .unwrap();
        assert_eq!(result.details[0].status, FileFixStatus::NoChanges);
        assert_eq!(result.files_updated, 0);
        // The database follows the requested move even though the file disagrees
        assert_eq!(result.tracks_updated, 1);
    }

    #[test]
    fn test_cancelled_fix_leaves_database_alone() {
        let fx = fixture(&[&["/old/a.mp3"]]);
        let applier = FixApplier::new(fx.store.clone());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = applier.apply("/old/a.mp3", "/new/a.mp3", 0, &cancel).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.tracks_updated, 0);
        assert_eq!(fx.store.tracks().unwrap()[0].path, "/old/a.mp3");
        assert_eq!(fs::read_to_string(&fx.playlists[0]).unwrap(), "/old/a.mp3");
    }

    #[test]
    fn test_found_status_when_new_file_exists() {
        let fx = fixture(&[&["/old/a.mp3"]]);
        let target = fx.playlists[0].with_file_name("a.mp3");
        fs::write(&target, b"").unwrap();
        let target = target.to_string_lossy().into_owned();
        let applier = FixApplier::new(fx.store.clone());

        applier
            .apply("/old/a.mp3", &target, 0, &CancelFlag::new())
            .unwrap();
        assert_eq!(fx.store.tracks().unwrap()[0].status, TrackStatus::Found);
    }

    #[test]
    fn test_invalid_request_rejected() {
        let fx = fixture(&[&["/old/a.mp3"]]);
        let applier = FixApplier::new(fx.store.clone());
        assert!(matches!(
            applier.apply("/old/a.mp3", "/old/a.mp3", 0, &CancelFlag::new()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_path_locks_serialize_same_path() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        let locks = Arc::new(PathLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                thread::spawn(move || {
                    locks.with_lock(Path::new("/p.m3u"), || {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::sleep(std::time::Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
