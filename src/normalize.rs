//! Filename normalization and path helpers.
//!
//! Every index row, tier comparison and fuzzy score is computed from the
//! output of [`normalize`], so changes here change matching results for the
//! whole library. Run tests after changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Matches a playable media extension at the end of a filename.
pub static MEDIA_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\.(?:mp3|flac|wav|m4a|aac|ogg|oga|opus|wma|aif|aiff|alac|ape|wv|mp4|m4v|mov|avi|mkv|webm|mpg|mpeg)$",
    )
    .unwrap()
});

/// Runs of anything that is not an ASCII letter or digit (applied after folding).
pub static TOKEN_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Tokens shorter than this are dropped ("a", "-", track letters).
pub const MIN_TOKEN_LEN: usize = 2;

/// Delimiter used to join tokens into the canonical string.
pub const CANONICAL_DELIMITER: &str = " ";

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    // Strip diacritics via NFKD decomposition first
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Then transliterate whatever is left (Cyrillic, Greek, CJK, ...)
    any_ascii(&stripped).to_lowercase()
}

/// Remove a known media extension from the end of a filename, if present.
pub fn strip_media_extension(name: &str) -> &str {
    match MEDIA_EXTENSION.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Canonical form of a filename.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Normalized {
    /// Tokens joined by [`CANONICAL_DELIMITER`]; used for equality and distance
    pub canonical: String,
    /// Tokens in original order, duplicates kept
    pub tokens: Vec<String>,
}

/// Normalize a filename into its canonical string and token sequence.
///
/// Total: never fails, empty or punctuation-only input yields no tokens.
pub fn normalize(name: &str) -> Normalized {
    let folded = fold_to_ascii(strip_media_extension(name));

    let tokens: Vec<String> = TOKEN_SEPARATOR
        .split(&folded)
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect();

    Normalized {
        canonical: tokens.join(CANONICAL_DELIMITER),
        tokens,
    }
}

// ============================================================================
// PATH HELPERS
// ============================================================================

// Playlist paths come from many machines, so these work on strings and accept
// both separators instead of going through std::path.

/// Split a path into (directory, file name). The directory has no trailing separator.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\']) {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// File name without its extension. Dotfiles keep their full name.
pub fn file_name_only(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Lowercase extension without the dot, or an empty string.
pub fn extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// Comparison key for a directory: unified separators, lowercase.
pub fn directory_key(dir: &str) -> String {
    dir.replace('\\', "/").trim_end_matches('/').to_lowercase()
}

/// Comparison key for a full path (case-insensitive equality).
pub fn path_key(path: &str) -> String {
    path.to_lowercase()
}

/// Derived filename fields shared by music files and tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameParts {
    pub file_name: String,
    pub file_name_only: String,
    pub normalized_file_name: String,
    pub extension: String,
}

impl FileNameParts {
    pub fn from_path(path: &str) -> Self {
        let (_, file_name) = split_path(path);
        Self {
            file_name: file_name.to_string(),
            file_name_only: file_name_only(file_name).to_string(),
            normalized_file_name: normalize(file_name).canonical,
            extension: extension(file_name),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        let n = normalize("Artist - Song Title.mp3");
        assert_eq!(n.canonical, "artist song title");
        assert_eq!(n.tokens, vec!["artist", "song", "title"]);
    }

    #[test]
    fn test_normalize_strips_extension_case_insensitive() {
        assert_eq!(normalize("Track.FLAC").canonical, "track");
        assert_eq!(normalize("Track.Mp3").canonical, "track");
        // Unknown extensions are just another token
        assert_eq!(normalize("notes.txt").canonical, "notes txt");
        // Only the tail extension is stripped
        assert_eq!(normalize("mix.flac.mp3").canonical, "mix flac");
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Motörhead"), "motorhead");
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
    }

    #[test]
    fn test_normalize_diacritics() {
        assert_eq!(normalize("Sigur Rós - Hoppípolla.flac").canonical, "sigur ros hoppipolla");
    }

    #[test]
    fn test_short_tokens_dropped() {
        let n = normalize("A - B - Love Me.mp3");
        assert_eq!(n.tokens, vec!["love", "me"]);
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        let n = normalize("la la land - la.mp3");
        assert_eq!(n.tokens, vec!["la", "la", "land", "la"]);
    }

    #[test]
    fn test_normalize_total_on_degenerate_input() {
        for input in ["", ".mp3", "---", "   ", "a", "!!!.flac", "\u{0301}"] {
            let n = normalize(input);
            assert!(n.tokens.is_empty(), "input {:?}", input);
            assert_eq!(n.canonical, "");
        }
    }

    #[test]
    fn test_normalize_idempotent_on_canonical() {
        let inputs = [
            "Artist - Song.mp3",
            "foo_bar.mp3",
            "Ünïcödé Tïtlé (Remix) [2020].flac",
            "кино - группа крови.mp3",
            "01. Intro.wav",
            "",
            "a.b.c",
            "mix.flac.mp3",
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once.canonical);
            assert_eq!(once, twice, "input {:?}", input);
        }
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/music/A - Song.mp3"), ("/music", "A - Song.mp3"));
        assert_eq!(split_path(r"C:\Music\x.mp3"), (r"C:\Music", "x.mp3"));
        assert_eq!(split_path("x.mp3"), ("", "x.mp3"));
    }

    #[test]
    fn test_file_name_only_and_extension() {
        assert_eq!(file_name_only("Song.MP3"), "Song");
        assert_eq!(extension("Song.MP3"), "mp3");
        assert_eq!(file_name_only(".hidden"), ".hidden");
        assert_eq!(extension(".hidden"), "");
        assert_eq!(extension("noext"), "");
    }

    #[test]
    fn test_directory_key() {
        assert_eq!(directory_key(r"C:\Music\Rock\"), "c:/music/rock");
        assert_eq!(directory_key("/Music/Rock"), "/music/rock");
    }

    #[test]
    fn test_file_name_parts() {
        let parts = FileNameParts::from_path("/backup/A - Song.flac");
        assert_eq!(parts.file_name, "A - Song.flac");
        assert_eq!(parts.file_name_only, "A - Song");
        assert_eq!(parts.normalized_file_name, "song");
        assert_eq!(parts.extension, "flac");
    }
}
