//! Engine configuration.
//!
//! Defaults live here; the CLI overrides them from flags / environment.

use crate::scoring::{FuzzyWeights, DEFAULT_FUZZY_THRESHOLD};

/// Rows per insert transaction when writing index rows and suggestions.
pub const WRITE_BATCH_SIZE: usize = 10_000;

/// Suggestions kept per track.
pub const MAX_SUGGESTIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Minimum fuzzy-tier score (0-100)
    pub fuzzy_threshold: u8,
    pub fuzzy_weights: FuzzyWeights,
    pub max_suggestions: usize,
    pub write_batch_size: usize,
    /// Worker threads for tokenization and sweeps; 0 = rayon default
    pub workers: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            fuzzy_weights: FuzzyWeights::default(),
            max_suggestions: MAX_SUGGESTIONS,
            write_batch_size: WRITE_BATCH_SIZE,
            workers: 0,
        }
    }
}

impl ResolverConfig {
    /// Clamp out-of-range values instead of failing.
    pub fn sanitized(mut self) -> Self {
        self.fuzzy_threshold = self.fuzzy_threshold.min(100);
        self.max_suggestions = self.max_suggestions.max(1);
        self.write_batch_size = self.write_batch_size.max(1);
        self
    }
}
