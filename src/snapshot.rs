//! Read-only view of the music library pinned to one index version.
//!
//! Built once per version from the store's rows and shared as
//! `Arc<LibrarySnapshot>`, so any number of matcher threads can read it
//! without locking. Lookup tables mirror the tiers: full path, folder + stem,
//! normalized name, and the inverted word index.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::models::{IndexVersion, MusicFile, WordEntry};
use crate::normalize::{directory_key, path_key, split_path, CANONICAL_DELIMITER};
use crate::store::LibraryRows;

/// Music file plus the comparison keys the matcher needs.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    pub file: MusicFile,
    pub dir_key: String,
    pub tokens: Vec<String>,
}

#[derive(Debug)]
pub struct LibrarySnapshot {
    version: IndexVersion,
    built_at: DateTime<Utc>,
    files: Vec<SnapshotFile>,
    by_path: FxHashMap<String, Vec<usize>>,
    by_folder_stem: FxHashMap<(String, String), Vec<usize>>,
    by_normalized: FxHashMap<String, Vec<usize>>,
    by_word: FxHashMap<String, Vec<usize>>,
}

impl LibrarySnapshot {
    pub fn from_rows(rows: LibraryRows) -> Self {
        Self::build(rows.version, rows.music_files, &rows.music_words)
    }

    pub fn build(version: IndexVersion, music_files: Vec<MusicFile>, words: &[WordEntry]) -> Self {
        let mut by_path: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut by_folder_stem: FxHashMap<(String, String), Vec<usize>> = FxHashMap::default();
        let mut by_normalized: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut slot_by_id: FxHashMap<i64, usize> = FxHashMap::default();

        let files: Vec<SnapshotFile> = music_files
            .into_iter()
            .enumerate()
            .map(|(slot, file)| {
                let (dir, _) = split_path(&file.path);
                let dir_key = directory_key(dir);

                by_path.entry(path_key(&file.path)).or_default().push(slot);
                by_folder_stem
                    .entry((dir_key.clone(), file.file_name_only.to_lowercase()))
                    .or_default()
                    .push(slot);
                if !file.normalized_file_name.is_empty() {
                    by_normalized
                        .entry(file.normalized_file_name.clone())
                        .or_default()
                        .push(slot);
                }
                slot_by_id.insert(file.meta.id, slot);

                let tokens = file
                    .normalized_file_name
                    .split(CANONICAL_DELIMITER)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                SnapshotFile {
                    file,
                    dir_key,
                    tokens,
                }
            })
            .collect();

        // Word rows of entities that no longer exist are ignored
        let mut by_word: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for entry in words {
            if let Some(&slot) = slot_by_id.get(&entry.entity_id) {
                by_word.entry(entry.word.clone()).or_default().push(slot);
            }
        }
        for slots in by_word.values_mut() {
            slots.sort_unstable();
            slots.dedup();
        }

        Self {
            version,
            built_at: Utc::now(),
            files,
            by_path,
            by_folder_stem,
            by_normalized,
            by_word,
        }
    }

    pub fn version(&self) -> IndexVersion {
        self.version
    }

    /// Timestamp stamped on suggestions generated from this snapshot.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, slot: usize) -> &SnapshotFile {
        &self.files[slot]
    }

    pub fn by_path(&self, path: &str) -> &[usize] {
        self.by_path.get(&path_key(path)).map_or(&[], Vec::as_slice)
    }

    /// Files in `dir_key` whose stem equals `stem_lower`.
    pub fn by_folder_stem(&self, dir_key: &str, stem_lower: &str) -> &[usize] {
        self.by_folder_stem
            .get(&(dir_key.to_string(), stem_lower.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    pub fn by_normalized(&self, canonical: &str) -> &[usize] {
        self.by_normalized.get(canonical).map_or(&[], Vec::as_slice)
    }

    /// Files sharing at least one word with `tokens`, ascending slot order.
    pub fn sharing_words<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        let mut slots: Vec<usize> = tokens
            .iter()
            .filter_map(|t| self.by_word.get(t.as_ref()))
            .flatten()
            .copied()
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// Number of distinct words in the inverted index.
    pub fn word_count(&self) -> usize {
        self.by_word.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::word_entries;
    use crate::models::EntityMeta;
    use crate::normalize::FileNameParts;

    fn music_file(id: i64, path: &str) -> MusicFile {
        let parts = FileNameParts::from_path(path);
        MusicFile {
            meta: EntityMeta {
                id,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            path: path.to_string(),
            file_name: parts.file_name,
            file_name_only: parts.file_name_only,
            normalized_file_name: parts.normalized_file_name,
            extension: parts.extension,
            size: 0,
            modified_time: None,
        }
    }

    fn snapshot(paths: &[&str]) -> LibrarySnapshot {
        let files: Vec<MusicFile> = paths
            .iter()
            .enumerate()
            .map(|(i, p)| music_file(i as i64 + 1, p))
            .collect();
        let words: Vec<WordEntry> = files
            .iter()
            .flat_map(|f| word_entries(f.meta.id, &f.file_name))
            .collect();
        LibrarySnapshot::build(1, files, &words)
    }

    #[test]
    fn test_lookup_tables() {
        let snap = snapshot(&["/Music/Song.mp3", "/music/song.flac", "/other/Song.mp3"]);
        assert_eq!(snap.by_path("/MUSIC/SONG.MP3"), &[0]);
        assert_eq!(snap.by_folder_stem("/music", "song"), &[0, 1]);
        assert_eq!(snap.by_normalized("song"), &[0, 1, 2]);
        assert!(snap.by_normalized("").is_empty());
    }

    #[test]
    fn test_sharing_words_dedups() {
        let snap = snapshot(&["/a/la la land.mp3", "/b/land of hope.mp3", "/c/other.mp3"]);
        assert_eq!(snap.sharing_words(&["land", "la"]), vec![0, 1]);
        assert!(snap.sharing_words(&["missing"]).is_empty());
        assert_eq!(snap.word_count(), 5);
    }

    #[test]
    fn test_orphan_word_rows_ignored() {
        let files = vec![music_file(1, "/a/one.mp3")];
        let mut words = word_entries(1, "one.mp3");
        words.extend(word_entries(99, "ghost.mp3"));
        let snap = LibrarySnapshot::build(3, files, &words);
        assert!(snap.sharing_words(&["ghost"]).is_empty());
        assert_eq!(snap.version(), 3);
        assert_eq!(snap.len(), 1);
    }
}
