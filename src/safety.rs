//! Input checks that run before anything touches playlist files.
//!
//! A bad replacement string would be written verbatim into every playlist
//! that references the old path, so these reject it up front.

use crate::error::{Error, Result};

/// Validates a repair request.
///
/// Checks:
/// - Neither path is empty or whitespace only
/// - The new path differs from the old one
/// - Neither path contains a line break (playlists are line-oriented)
pub fn validate_fix_paths(old_path: &str, new_path: &str) -> Result<()> {
    for (label, path) in [("old path", old_path), ("new path", new_path)] {
        if path.trim().is_empty() {
            return Err(Error::InvalidInput(format!("{} is empty", label)));
        }
        if path.contains(['\n', '\r']) {
            return Err(Error::InvalidInput(format!(
                "{} contains a line break: {:?}",
                label, path
            )));
        }
    }

    if old_path == new_path {
        return Err(Error::InvalidInput(format!(
            "new path is the same as the old path: '{}'",
            old_path
        )));
    }

    Ok(())
}

/// Validates the name and location of a playlist being imported.
pub fn validate_playlist(name: &str, path: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("playlist name is empty".to_string()));
    }
    if path.trim().is_empty() {
        return Err(Error::InvalidInput(format!("playlist '{}' has no path", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_fix() {
        assert!(validate_fix_paths("/old/a.mp3", "/new/a.mp3").is_ok());
    }

    #[test]
    fn test_rejects_same_path() {
        let err = validate_fix_paths("/a.mp3", "/a.mp3").unwrap_err();
        assert!(err.to_string().contains("same as the old path"));
    }

    #[test]
    fn test_rejects_empty_and_multiline() {
        assert!(matches!(validate_fix_paths("", "/a.mp3"), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_fix_paths("/a.mp3", "  "), Err(Error::InvalidInput(_))));
        assert!(matches!(
            validate_fix_paths("/a.mp3", "/b.mp3\n/c.mp3"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_playlist_checks() {
        assert!(validate_playlist("Mix", "/p/mix.m3u").is_ok());
        assert!(validate_playlist("", "/p/mix.m3u").is_err());
        assert!(validate_playlist("Mix", "").is_err());
    }
}
