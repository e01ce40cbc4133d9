//! SQLite storage for library entities, word index rows and suggestions.
//!
//! One connection behind a mutex: every write goes through a single
//! serialized path, and a multi-statement read (see [`Store::load_library`])
//! holds the connection for its whole duration so it can never interleave
//! with a rebuild transaction.
//!
//! ## Schema
//!
//! ```sql
//! music_files (id, path UNIQUE, file_name, file_name_only, normalized_file_name,
//!              extension, size, modified_time, created_at, updated_at)
//! playlists   (id, name, path UNIQUE, created_at, updated_at)
//! tracks      (id, playlist_id, path, file_name, file_name_only,
//!              normalized_file_name, status, created_at, updated_at)
//! music_words / track_words (entity_id, word, word_length, word_position, index_version)
//! fix_suggestions (id, track_id, music_file_id, candidate_path, tier,
//!                  similarity_score, index_version, created_at, applied)
//! index_meta  (key PRIMARY KEY, value)
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::models::{
    EntityKind, EntityMeta, FixSuggestion, IndexVersion, MatchTier, MusicFile, NewMusicFile,
    Playlist, SuggestionFilter, SuggestionListing, Track, TrackStatus, WordEntry,
};
use crate::normalize::FileNameParts;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS index_meta (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS music_files (
        id INTEGER PRIMARY KEY,
        path TEXT NOT NULL UNIQUE,
        file_name TEXT NOT NULL,
        file_name_only TEXT NOT NULL,
        normalized_file_name TEXT NOT NULL,
        extension TEXT NOT NULL,
        size INTEGER NOT NULL DEFAULT 0,
        modified_time TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS playlists (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        path TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tracks (
        id INTEGER PRIMARY KEY,
        playlist_id INTEGER NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
        path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_name_only TEXT NOT NULL,
        normalized_file_name TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tracks_path ON tracks(path);
    CREATE INDEX IF NOT EXISTS idx_tracks_status ON tracks(status);

    CREATE TABLE IF NOT EXISTS music_words (
        entity_id INTEGER NOT NULL,
        word TEXT NOT NULL,
        word_length INTEGER NOT NULL,
        word_position INTEGER NOT NULL,
        index_version INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_music_words_version_word ON music_words(index_version, word);
    CREATE INDEX IF NOT EXISTS idx_music_words_entity ON music_words(entity_id);

    CREATE TABLE IF NOT EXISTS track_words (
        entity_id INTEGER NOT NULL,
        word TEXT NOT NULL,
        word_length INTEGER NOT NULL,
        word_position INTEGER NOT NULL,
        index_version INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_track_words_version_word ON track_words(index_version, word);
    CREATE INDEX IF NOT EXISTS idx_track_words_entity ON track_words(entity_id);

    CREATE TABLE IF NOT EXISTS fix_suggestions (
        id INTEGER PRIMARY KEY,
        track_id INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
        music_file_id INTEGER NOT NULL REFERENCES music_files(id) ON DELETE CASCADE,
        candidate_path TEXT NOT NULL,
        tier INTEGER NOT NULL,
        similarity_score INTEGER NOT NULL,
        index_version INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        applied INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_fix_suggestions_version ON fix_suggestions(index_version, similarity_score);
";

const META_INDEX_VERSION: &str = "index_version";
const META_SUGGESTIONS_VERSION: &str = "suggestions_version";

// ============================================================================
// Column conversions
// ============================================================================

impl ToSql for TrackStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TrackStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for MatchTier {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.number() as i64))
    }
}

impl FromSql for MatchTier {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let n = value.as_i64()?;
        u8::try_from(n)
            .ok()
            .and_then(MatchTier::from_number)
            .ok_or(FromSqlError::OutOfRange(n))
    }
}

fn row_to_meta(row: &Row) -> rusqlite::Result<EntityMeta> {
    Ok(EntityMeta {
        id: row.get("id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_music_file(row: &Row) -> rusqlite::Result<MusicFile> {
    Ok(MusicFile {
        meta: row_to_meta(row)?,
        path: row.get("path")?,
        file_name: row.get("file_name")?,
        file_name_only: row.get("file_name_only")?,
        normalized_file_name: row.get("normalized_file_name")?,
        extension: row.get("extension")?,
        size: row.get("size")?,
        modified_time: row.get("modified_time")?,
    })
}

fn row_to_playlist(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        meta: row_to_meta(row)?,
        name: row.get("name")?,
        path: row.get("path")?,
    })
}

fn row_to_track(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        meta: row_to_meta(row)?,
        path: row.get("path")?,
        file_name: row.get("file_name")?,
        file_name_only: row.get("file_name_only")?,
        normalized_file_name: row.get("normalized_file_name")?,
        playlist_id: row.get("playlist_id")?,
        status: row.get("status")?,
    })
}

fn row_to_suggestion(row: &Row) -> rusqlite::Result<FixSuggestion> {
    Ok(FixSuggestion {
        id: row.get("id")?,
        track_id: row.get("track_id")?,
        music_file_id: row.get("music_file_id")?,
        candidate_path: row.get("candidate_path")?,
        tier: row.get("tier")?,
        similarity_score: row.get("similarity_score")?,
        index_version: row.get::<_, i64>("index_version")? as IndexVersion,
        created_at: Some(row.get("created_at")?),
        applied: row.get::<_, i64>("applied")? != 0,
    })
}

fn read_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row("SELECT value FROM index_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
}

fn write_meta(conn: &Connection, key: &str, value: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn read_index_version(conn: &Connection) -> rusqlite::Result<IndexVersion> {
    Ok(read_meta(conn, META_INDEX_VERSION)?.unwrap_or(0) as IndexVersion)
}

/// Insert word rows in chunks, checking for cancellation between chunks.
fn insert_word_rows(
    tx: &Transaction,
    kind: EntityKind,
    rows: &[WordEntry],
    version: IndexVersion,
    batch_size: usize,
    cancel: &CancelFlag,
) -> Result<usize> {
    let sql = format!(
        "INSERT INTO {} (entity_id, word, word_length, word_position, index_version)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        kind.words_table()
    );
    let mut stmt = tx.prepare_cached(&sql)?;

    for chunk in rows.chunks(batch_size.max(1)) {
        cancel.check()?;
        for row in chunk {
            stmt.execute(params![
                row.entity_id,
                row.word,
                row.word_length as i64,
                row.word_position as i64,
                version as i64,
            ])?;
        }
    }
    Ok(rows.len())
}

/// Rows read under a single lock for building a matcher snapshot.
#[derive(Debug, Default)]
pub struct LibraryRows {
    pub version: IndexVersion,
    pub music_files: Vec<MusicFile>,
    pub music_words: Vec<WordEntry>,
}

// ============================================================================
// Store
// ============================================================================

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a library database on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ------------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------------

    pub fn index_version(&self) -> Result<IndexVersion> {
        Ok(read_index_version(&self.conn.lock())?)
    }

    /// Version the persisted suggestion batch was generated for, if any.
    pub fn suggestions_version(&self) -> Result<Option<IndexVersion>> {
        Ok(read_meta(&self.conn.lock(), META_SUGGESTIONS_VERSION)?.map(|v| v as IndexVersion))
    }

    // ------------------------------------------------------------------------
    // Music files
    // ------------------------------------------------------------------------

    /// Insert new files and refresh size/mtime of known paths. Returns the stored rows.
    pub fn upsert_music_files(&self, files: &[NewMusicFile]) -> Result<Vec<MusicFile>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut stored = Vec::with_capacity(files.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO music_files
                 (path, file_name, file_name_only, normalized_file_name, extension,
                  size, modified_time, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(path) DO UPDATE SET
                    size = excluded.size,
                    modified_time = excluded.modified_time,
                    updated_at = excluded.updated_at
                 RETURNING *",
            )?;
            let now = Utc::now();
            for file in files {
                let parts = file.parts();
                let row = stmt.query_row(
                    params![
                        file.path,
                        parts.file_name,
                        parts.file_name_only,
                        parts.normalized_file_name,
                        parts.extension,
                        file.size,
                        file.modified_time,
                        now,
                    ],
                    row_to_music_file,
                )?;
                stored.push(row);
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    pub fn music_files(&self) -> Result<Vec<MusicFile>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM music_files ORDER BY id")?;
        let rows = stmt.query_map([], row_to_music_file)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn music_file(&self, id: i64) -> Result<MusicFile> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM music_files WHERE id = ?1", [id], row_to_music_file)
            .optional()?
            .ok_or_else(|| Error::not_found("music file", id))
    }

    // ------------------------------------------------------------------------
    // Playlists and tracks
    // ------------------------------------------------------------------------

    pub fn upsert_playlist(&self, name: &str, path: &str) -> Result<Playlist> {
        let conn = self.conn.lock();
        let now = Utc::now();
        Ok(conn.query_row(
            "INSERT INTO playlists (name, path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(path) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at
             RETURNING *",
            params![name, path, now],
            row_to_playlist,
        )?)
    }

    pub fn playlist(&self, id: i64) -> Result<Playlist> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM playlists WHERE id = ?1", [id], row_to_playlist)
            .optional()?
            .ok_or_else(|| Error::not_found("playlist", id))
    }

    /// Replace a playlist's tracks (reimport). Word rows of the old tracks go with them.
    pub fn replace_playlist_tracks(
        &self,
        playlist_id: i64,
        entries: &[(String, TrackStatus)],
    ) -> Result<Vec<Track>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM track_words WHERE entity_id IN (SELECT id FROM tracks WHERE playlist_id = ?1)",
            [playlist_id],
        )?;
        tx.execute("DELETE FROM tracks WHERE playlist_id = ?1", [playlist_id])?;

        let mut stored = Vec::with_capacity(entries.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO tracks
                 (playlist_id, path, file_name, file_name_only, normalized_file_name,
                  status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 RETURNING *",
            )?;
            let now = Utc::now();
            for (path, status) in entries {
                let parts = FileNameParts::from_path(path);
                stored.push(stmt.query_row(
                    params![
                        playlist_id,
                        path,
                        parts.file_name,
                        parts.file_name_only,
                        parts.normalized_file_name,
                        status,
                        now,
                    ],
                    row_to_track,
                )?);
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    pub fn tracks(&self) -> Result<Vec<Track>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM tracks ORDER BY id")?;
        let rows = stmt.query_map([], row_to_track)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn tracks_with_status(&self, status: TrackStatus) -> Result<Vec<Track>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM tracks WHERE status = ?1 ORDER BY id")?;
        let rows = stmt.query_map([status], row_to_track)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn track(&self, id: i64) -> Result<Track> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM tracks WHERE id = ?1", [id], row_to_track)
            .optional()?
            .ok_or_else(|| Error::not_found("track", id))
    }

    /// Apply status changes in one transaction. Returns rows changed.
    pub fn update_track_statuses(&self, updates: &[(i64, TrackStatus)]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE tracks SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status != ?2",
            )?;
            let now = Utc::now();
            for (id, status) in updates {
                changed += stmt.execute(params![id, status, now])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Playlists containing at least one track with exactly this path.
    pub fn playlists_referencing(&self, path: &str) -> Result<Vec<Playlist>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT p.* FROM playlists p
             JOIN tracks t ON t.playlist_id = p.id
             WHERE t.path = ?1
             ORDER BY p.path",
        )?;
        let rows = stmt.query_map([path], row_to_playlist)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Move every track from `old_path` to `new_path` in one statement, refresh
    /// their word rows and mark the suggestions that pointed there as applied.
    /// Returns the number of track rows changed.
    pub fn move_track_path(
        &self,
        old_path: &str,
        new_path: &str,
        status: TrackStatus,
        tokens: &[String],
        version: IndexVersion,
    ) -> Result<usize> {
        let parts = FileNameParts::from_path(new_path);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM tracks WHERE path = ?1")?;
            let rows = stmt.query_map([old_path], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let changed = tx.execute(
            "UPDATE tracks
             SET path = ?2, file_name = ?3, file_name_only = ?4, normalized_file_name = ?5,
                 status = ?6, updated_at = ?7
             WHERE path = ?1",
            params![
                old_path,
                new_path,
                parts.file_name,
                parts.file_name_only,
                parts.normalized_file_name,
                status,
                Utc::now(),
            ],
        )?;

        {
            let mut delete_words = tx.prepare_cached("DELETE FROM track_words WHERE entity_id = ?1")?;
            let mut insert_word = tx.prepare_cached(
                "INSERT INTO track_words (entity_id, word, word_length, word_position, index_version)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut mark_applied = tx.prepare_cached(
                "UPDATE fix_suggestions SET applied = 1 WHERE track_id = ?1 AND candidate_path = ?2",
            )?;
            for id in &ids {
                delete_words.execute([id])?;
                for (position, word) in tokens.iter().enumerate() {
                    insert_word.execute(params![
                        id,
                        word,
                        word.len() as i64,
                        position as i64,
                        version as i64
                    ])?;
                }
                mark_applied.execute(params![id, new_path])?;
            }
        }

        tx.commit()?;
        Ok(changed)
    }

    // ------------------------------------------------------------------------
    // Word index
    // ------------------------------------------------------------------------

    /// Replace the word rows of the given entities under `version`, in one transaction.
    pub fn append_words(
        &self,
        kind: EntityKind,
        entity_ids: &[i64],
        rows: &[WordEntry],
        version: IndexVersion,
        batch_size: usize,
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let sql = format!("DELETE FROM {} WHERE entity_id = ?1", kind.words_table());
            let mut stmt = tx.prepare_cached(&sql)?;
            for id in entity_ids {
                stmt.execute([id])?;
            }
        }
        let written = insert_word_rows(&tx, kind, rows, version, batch_size, &CancelFlag::new())?;
        tx.commit()?;
        Ok(written)
    }

    /// Drop every word row and write a fresh index as `previous + 1`.
    ///
    /// Single transaction: on error or cancellation nothing changes and the
    /// version is not bumped.
    pub fn replace_all_words(
        &self,
        music_rows: &[WordEntry],
        track_rows: &[WordEntry],
        batch_size: usize,
        cancel: &CancelFlag,
    ) -> Result<IndexVersion> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let next = read_index_version(&tx)? + 1;
        tx.execute("DELETE FROM music_words", [])?;
        tx.execute("DELETE FROM track_words", [])?;

        insert_word_rows(&tx, EntityKind::MusicFile, music_rows, next, batch_size, cancel)?;
        insert_word_rows(&tx, EntityKind::Track, track_rows, next, batch_size, cancel)?;

        cancel.check()?;
        write_meta(&tx, META_INDEX_VERSION, next as i64)?;
        tx.commit()?;
        Ok(next)
    }

    pub fn words(&self, kind: EntityKind, version: IndexVersion) -> Result<Vec<WordEntry>> {
        let conn = self.conn.lock();
        Self::query_words(&conn, kind, version)
    }

    fn query_words(conn: &Connection, kind: EntityKind, version: IndexVersion) -> Result<Vec<WordEntry>> {
        let sql = format!(
            "SELECT entity_id, word, word_length, word_position FROM {}
             WHERE index_version = ?1
             ORDER BY entity_id, word_position",
            kind.words_table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([version as i64], |row| {
            Ok(WordEntry {
                entity_id: row.get(0)?,
                word: row.get(1)?,
                word_length: row.get::<_, i64>(2)? as usize,
                word_position: row.get::<_, i64>(3)? as usize,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Current version, all music files and that version's music word rows,
    /// read while holding the connection.
    pub fn load_library(&self) -> Result<LibraryRows> {
        let conn = self.conn.lock();
        let version = read_index_version(&conn)?;
        let music_files = {
            let mut stmt = conn.prepare("SELECT * FROM music_files ORDER BY id")?;
            let rows = stmt.query_map([], row_to_music_file)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        let music_words = Self::query_words(&conn, EntityKind::MusicFile, version)?;
        Ok(LibraryRows {
            version,
            music_files,
            music_words,
        })
    }

    // ------------------------------------------------------------------------
    // Suggestions
    // ------------------------------------------------------------------------

    /// Replace the persisted suggestion batch with one generated for `version`.
    pub fn replace_suggestions(
        &self,
        version: IndexVersion,
        suggestions: &[FixSuggestion],
        batch_size: usize,
    ) -> Result<usize> {
        let created_at = Utc::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM fix_suggestions", [])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO fix_suggestions
                 (track_id, music_file_id, candidate_path, tier, similarity_score,
                  index_version, created_at, applied)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for chunk in suggestions.chunks(batch_size.max(1)) {
                for s in chunk {
                    stmt.execute(params![
                        s.track_id,
                        s.music_file_id,
                        s.candidate_path,
                        s.tier,
                        s.similarity_score,
                        version as i64,
                        created_at,
                        s.applied,
                    ])?;
                }
            }
        }
        write_meta(&tx, META_SUGGESTIONS_VERSION, version as i64)?;
        tx.commit()?;
        Ok(suggestions.len())
    }

    /// Persisted suggestions for `version`, ordered by score, then path.
    pub fn list_suggestions(
        &self,
        filter: &SuggestionFilter,
        version: IndexVersion,
    ) -> Result<Vec<SuggestionListing>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.*, t.path AS track_path
             FROM fix_suggestions s
             JOIN tracks t ON t.id = s.track_id
             WHERE s.index_version = ?1
               AND (?2 IS NULL OR s.tier = ?2)
               AND s.similarity_score >= ?3
             ORDER BY s.similarity_score DESC,
                      length(s.candidate_path) ASC,
                      s.candidate_path ASC,
                      s.track_id ASC,
                      s.music_file_id ASC
             LIMIT ?4 OFFSET ?5",
        )?;
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt.query_map(
            params![
                version as i64,
                filter.tier,
                filter.min_score.unwrap_or(0),
                limit,
                filter.offset as i64,
            ],
            |row| {
                Ok(SuggestionListing {
                    suggestion: row_to_suggestion(row)?,
                    track_path: row.get("track_path")?,
                })
            },
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn clear_suggestions(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "DELETE FROM fix_suggestions;
             DELETE FROM index_meta WHERE key = 'suggestions_version';",
        )?;
        Ok(())
    }
}
