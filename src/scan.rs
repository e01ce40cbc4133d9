//! Music library discovery.
//!
//! Two phases: a sequential walkdir traversal collects candidate paths with a
//! media extension, then rayon reads their metadata in parallel. Unreadable
//! entries are logged and counted, never fatal.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{report, Error, Result};
use crate::models::NewMusicFile;
use crate::normalize::MEDIA_EXTENSION;

/// Directory names skipped during traversal.
const IGNORED_NAMES: &[&str] = &[".git", ".svn", "@eaDir", ".Trash", "$RECYCLE.BIN"];

#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<NewMusicFile>,
    pub errors: usize,
}

/// Counts shown after a scan is imported.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub root: String,
    pub discovered: usize,
    pub imported: usize,
    pub errors: usize,
}

fn is_ignored(entry: &DirEntry) -> bool {
    // The root itself is always walked
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_NAMES.contains(&name))
}

fn is_media_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| MEDIA_EXTENSION.is_match(name))
}

fn read_entry(path: &Path) -> Result<NewMusicFile> {
    let metadata = fs::metadata(path).map_err(|e| Error::file_io(path, e))?;
    let modified_time = metadata.modified().ok().map(DateTime::<Utc>::from);
    Ok(NewMusicFile::new(
        path.to_string_lossy().into_owned(),
        metadata.len() as i64,
        modified_time,
    ))
}

/// Recursively collect media files under `root`, sorted by path.
pub fn scan_directory(root: &Path) -> Result<ScanReport> {
    if !root.is_dir() {
        return Err(Error::InvalidInput(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut errors = 0usize;
    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_media_file(entry.path()) => {
                candidates.push(entry.into_path());
            }
            Ok(_) => {}
            Err(err) => {
                errors += 1;
                tracing::warn!(error = %err, "skipping unreadable entry");
            }
        }
    }
    tracing::debug!(candidates = candidates.len(), root = %root.display(), "traversal complete");

    let results: Vec<Result<NewMusicFile>> = candidates.par_iter().map(|p| read_entry(p)).collect();

    let mut files = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(file) => files.push(file),
            Err(err) => {
                errors += 1;
                report(&err, "library scan");
            }
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ScanReport { files, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_finds_media_files_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("artist/album")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("artist/album/01 Song.MP3"), b"abc").unwrap();
        fs::write(root.join("artist/album/cover.jpg"), b"x").unwrap();
        fs::write(root.join("loose.flac"), b"").unwrap();
        fs::write(root.join(".git/hidden.mp3"), b"").unwrap();

        let report = scan_directory(root).unwrap();
        let names: Vec<String> = report
            .files
            .iter()
            .map(|f| f.parts().file_name)
            .collect();
        assert_eq!(names, vec!["01 Song.MP3", "loose.flac"]);
        assert_eq!(report.files[0].size, 3);
        assert!(report.files[0].modified_time.is_some());
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn test_scan_rejects_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(scan_directory(&missing), Err(Error::InvalidInput(_))));
    }
}
