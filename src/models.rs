//! Core data models for the resolution engine.
//!
//! Entity records mirror the store's rows. Shared identity/timestamp fields
//! live in [`EntityMeta`], embedded by value in each record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalize::FileNameParts;

// ============================================================================
// Type Aliases
// ============================================================================

/// Monotonic tag of the full rebuild that produced index rows and suggestions.
pub type IndexVersion = u64;

// ============================================================================
// Entities
// ============================================================================

/// Identity and timestamps shared by every persisted entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityMeta {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Physical file discovered on disk during a library scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MusicFile {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub path: String,
    pub file_name: String,
    pub file_name_only: String,
    pub normalized_file_name: String,
    pub extension: String,
    pub size: i64,
    pub modified_time: Option<DateTime<Utc>>,
}

/// Music file record as produced by the scan/import side, before it has an id.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewMusicFile {
    pub path: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl NewMusicFile {
    pub fn new(path: impl Into<String>, size: i64, modified_time: Option<DateTime<Utc>>) -> Self {
        Self {
            path: path.into(),
            size,
            modified_time,
        }
    }

    pub fn parts(&self) -> FileNameParts {
        FileNameParts::from_path(&self.path)
    }
}

/// Playlist file on disk (M3U, VDJ folder file, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Playlist {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub path: String,
}

/// Existence state of a playlist track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Found,
    Missing,
    Error,
    Processing,
}

impl TrackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackStatus::Found => "found",
            TrackStatus::Missing => "missing",
            TrackStatus::Error => "error",
            TrackStatus::Processing => "processing",
        }
    }
}

impl FromStr for TrackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "found" => Ok(TrackStatus::Found),
            "missing" => Ok(TrackStatus::Missing),
            "error" => Ok(TrackStatus::Error),
            "processing" => Ok(TrackStatus::Processing),
            other => Err(format!("unknown track status '{}'", other)),
        }
    }
}

/// Playlist entry referencing a file path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Track {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub path: String,
    pub file_name: String,
    pub file_name_only: String,
    pub normalized_file_name: String,
    pub playlist_id: i64,
    pub status: TrackStatus,
}

impl Track {
    pub fn id(&self) -> i64 {
        self.meta.id
    }
}

impl MusicFile {
    pub fn id(&self) -> i64 {
        self.meta.id
    }
}

/// Which word table an entity is indexed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    MusicFile,
    Track,
}

impl EntityKind {
    pub fn words_table(self) -> &'static str {
        match self {
            EntityKind::MusicFile => "music_words",
            EntityKind::Track => "track_words",
        }
    }
}

/// Anything that can be tokenized into the inverted index.
pub trait Indexable: Sync {
    fn entity_id(&self) -> i64;
    fn index_name(&self) -> &str;
}

impl Indexable for MusicFile {
    fn entity_id(&self) -> i64 {
        self.meta.id
    }

    fn index_name(&self) -> &str {
        &self.file_name
    }
}

impl Indexable for Track {
    fn entity_id(&self) -> i64 {
        self.meta.id
    }

    fn index_name(&self) -> &str {
        &self.file_name
    }
}

/// One token occurrence of an entity's canonical filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordEntry {
    pub entity_id: i64,
    pub word: String,
    pub word_length: usize,
    pub word_position: usize,
}

// ============================================================================
// Match Tiers
// ============================================================================

/// Match-confidence class of a candidate, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Case-insensitive full path equality
    ExactPath,
    /// Same directory and stem, other extension
    SameFolderDifferentExtension,
    /// Same normalized name and extension, other directory
    SameNameSameExtension,
    /// Same normalized name, other extension and directory
    SameNameDifferentExtension,
    /// Shared tokens, scored by Jaccard + edit distance
    Fuzzy,
}

impl MatchTier {
    pub const ALL: [MatchTier; 5] = [
        MatchTier::ExactPath,
        MatchTier::SameFolderDifferentExtension,
        MatchTier::SameNameSameExtension,
        MatchTier::SameNameDifferentExtension,
        MatchTier::Fuzzy,
    ];

    /// 1-based tier number as stored in the database.
    pub fn number(self) -> u8 {
        match self {
            MatchTier::ExactPath => 1,
            MatchTier::SameFolderDifferentExtension => 2,
            MatchTier::SameNameSameExtension => 3,
            MatchTier::SameNameDifferentExtension => 4,
            MatchTier::Fuzzy => 5,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        MatchTier::ALL.get((n as usize).checked_sub(1)?).copied()
    }

    /// Fixed score for the structural tiers; fuzzy candidates carry their own.
    pub fn base_score(self) -> Option<u8> {
        match self {
            MatchTier::ExactPath => Some(100),
            MatchTier::SameFolderDifferentExtension => Some(95),
            MatchTier::SameNameSameExtension => Some(85),
            MatchTier::SameNameDifferentExtension => Some(75),
            MatchTier::Fuzzy => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchTier::ExactPath => "exact_path",
            MatchTier::SameFolderDifferentExtension => "same_folder_different_extension",
            MatchTier::SameNameSameExtension => "same_name_same_extension",
            MatchTier::SameNameDifferentExtension => "same_name_different_extension",
            MatchTier::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchTier {
    type Err = String;

    /// Accepts the snake_case name or the tier number ("1".."5").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<u8>() {
            return MatchTier::from_number(n).ok_or_else(|| format!("tier must be 1-5, got {}", n));
        }
        MatchTier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown match tier '{}'", s))
    }
}

// ============================================================================
// Suggestions
// ============================================================================

/// Candidate replacement file for a track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FixSuggestion {
    /// Assigned when the suggestion is persisted
    pub id: Option<i64>,
    pub track_id: i64,
    pub music_file_id: i64,
    pub candidate_path: String,
    pub tier: MatchTier,
    pub similarity_score: u8,
    pub index_version: IndexVersion,
    /// Persistence time; `None` for suggestions computed on demand
    pub created_at: Option<DateTime<Utc>>,
    pub applied: bool,
}

/// Filters for listing persisted suggestions.
#[derive(Clone, Debug, Default)]
pub struct SuggestionFilter {
    pub tier: Option<MatchTier>,
    pub min_score: Option<u8>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Persisted suggestion joined with the track it repairs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SuggestionListing {
    #[serde(flatten)]
    pub suggestion: FixSuggestion,
    pub track_path: String,
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-tier figures for a statistics sweep.
#[derive(Default, Debug, Clone, Serialize)]
pub struct TierStats {
    pub tier: Option<MatchTier>,
    /// Candidates found at this tier, summed over all tracks
    pub candidate_count: usize,
    /// Tracks with at least one candidate at this tier
    pub tracks_with_candidates: usize,
    /// Tracks whose authoritative suggestion came from this tier
    pub authoritative_count: usize,
    /// Mean score of the authoritative top suggestions from this tier
    pub average_score: f64,
    pub elapsed_ms: f64,
}

/// Library-wide diagnostics over all missing tracks.
#[derive(Default, Debug, Clone, Serialize)]
pub struct SimilarityStats {
    pub index_version: IndexVersion,
    pub missing_tracks: usize,
    pub matched_tracks: usize,
    pub unmatched_tracks: usize,
    pub tiers: Vec<TierStats>,
    pub elapsed_seconds: f64,
}

impl SimilarityStats {
    /// Share of missing tracks with an authoritative suggestion, as a percentage
    pub fn match_rate(&self) -> f64 {
        if self.missing_tracks == 0 {
            0.0
        } else {
            100.0 * self.matched_tracks as f64 / self.missing_tracks as f64
        }
    }

    /// Log stats in JSON format
    pub fn log(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!(match_rate = self.match_rate(), "similarity stats\n{}", json);
        }
    }
}

/// Result of a file-existence check over all tracks.
#[derive(Default, Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub checked: usize,
    pub found: usize,
    pub missing: usize,
    pub changed: usize,
}

// ============================================================================
// Fix Results
// ============================================================================

/// Outcome for one playlist file during a bulk repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileFixStatus {
    /// Occurrences replaced and file written back
    Updated { changes: usize },
    /// DB said the playlist referenced the path, but the file does not contain it
    NoChanges,
    /// File missing or unreadable/unwritable
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFixDetail {
    pub playlist_name: String,
    pub playlist_path: String,
    #[serde(flatten)]
    pub status: FileFixStatus,
}

/// Aggregate result of `apply_fix`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub affected_playlists: usize,
    pub files_updated: usize,
    pub files_failed: usize,
    /// Track rows moved from the old path to the new one
    pub tracks_updated: usize,
    pub details: Vec<FileFixDetail>,
    /// Stopped before every playlist was processed; the database was not updated
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_numbers_round_trip_through_from_number() {
        for tier in MatchTier::ALL {
            assert_eq!(MatchTier::from_number(tier.number()), Some(tier));
        }
        assert_eq!(MatchTier::from_number(0), None);
        assert_eq!(MatchTier::from_number(6), None);
    }

    #[test]
    fn test_tier_order_matches_evaluation_order() {
        let mut sorted = MatchTier::ALL;
        sorted.sort();
        assert_eq!(sorted, MatchTier::ALL);
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("fuzzy".parse::<MatchTier>(), Ok(MatchTier::Fuzzy));
        assert_eq!("1".parse::<MatchTier>(), Ok(MatchTier::ExactPath));
        assert!("9".parse::<MatchTier>().is_err());
        assert!("close".parse::<MatchTier>().is_err());
    }

    #[test]
    fn test_base_scores() {
        assert_eq!(MatchTier::ExactPath.base_score(), Some(100));
        assert_eq!(MatchTier::SameNameDifferentExtension.base_score(), Some(75));
        assert_eq!(MatchTier::Fuzzy.base_score(), None);
    }

    #[test]
    fn test_file_fix_status_serializes_tagged() {
        let detail = FileFixDetail {
            playlist_name: "Set".into(),
            playlist_path: "/p/set.m3u".into(),
            status: FileFixStatus::Updated { changes: 2 },
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["status"], "updated");
        assert_eq!(json["changes"], 2);
    }

    #[test]
    fn test_match_rate() {
        let stats = SimilarityStats {
            missing_tracks: 4,
            matched_tracks: 3,
            ..Default::default()
        };
        assert_eq!(stats.match_rate(), 75.0);
        assert_eq!(SimilarityStats::default().match_rate(), 0.0);
    }
}
