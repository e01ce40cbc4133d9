//! Tiered candidate matching for missing tracks.
//!
//! Tiers are evaluated in order and the first tier that yields anything is
//! authoritative; lower tiers are not consulted. Statistics mode evaluates
//! every tier so the diagnostics can show what each would have produced.

use std::time::{Duration, Instant};

use crate::config::ResolverConfig;
use crate::models::{FixSuggestion, MatchTier, Track};
use crate::normalize::{directory_key, extension, file_name_only, normalize, split_path};
use crate::scoring::{fuzzy_score, rank_order, FuzzyWeights};
use crate::snapshot::LibrarySnapshot;

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub fuzzy_threshold: u8,
    pub fuzzy_weights: FuzzyWeights,
    pub max_suggestions: usize,
}

impl From<&ResolverConfig> for MatchOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            fuzzy_threshold: config.fuzzy_threshold,
            fuzzy_weights: config.fuzzy_weights,
            max_suggestions: config.max_suggestions.max(1),
        }
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::from(&ResolverConfig::default())
    }
}

/// Comparison keys derived from a track's stored path.
struct Probe {
    path: String,
    dir_key: String,
    stem: String,
    extension: String,
    canonical: String,
    tokens: Vec<String>,
}

impl Probe {
    fn from_track(track: &Track) -> Self {
        let (dir, file_name) = split_path(&track.path);
        let normalized = normalize(file_name);
        Self {
            path: track.path.clone(),
            dir_key: directory_key(dir),
            stem: file_name_only(file_name).to_lowercase(),
            extension: extension(file_name),
            canonical: normalized.canonical,
            tokens: normalized.tokens,
        }
    }
}

/// Candidates produced by one tier for one track, ranked.
#[derive(Debug, Clone)]
pub struct TierOutcome {
    pub tier: MatchTier,
    pub candidates: Vec<FixSuggestion>,
    pub elapsed: Duration,
}

/// Every tier's outcome for one track, plus the authoritative answer.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub track_id: i64,
    pub tiers: Vec<TierOutcome>,
    pub authoritative: Vec<FixSuggestion>,
}

impl Evaluation {
    pub fn authoritative_tier(&self) -> Option<MatchTier> {
        self.authoritative.first().map(|s| s.tier)
    }

    pub fn is_unmatched(&self) -> bool {
        self.tiers.iter().all(|t| t.candidates.is_empty())
    }
}

pub struct SimilarityMatcher<'a> {
    snapshot: &'a LibrarySnapshot,
    options: MatchOptions,
}

impl<'a> SimilarityMatcher<'a> {
    pub fn new(snapshot: &'a LibrarySnapshot, options: MatchOptions) -> Self {
        Self { snapshot, options }
    }

    /// Ranked suggestions from the first non-empty tier, capped at
    /// `max_suggestions`. Empty when no tier produces a candidate.
    pub fn suggest(&self, track: &Track) -> Vec<FixSuggestion> {
        let probe = Probe::from_track(track);
        for tier in MatchTier::ALL {
            let mut found = self.tier_candidates(tier, track.id(), &probe);
            if !found.is_empty() {
                found.truncate(self.options.max_suggestions);
                return found;
            }
        }
        Vec::new()
    }

    /// Statistics mode: run all five tiers, timing each.
    pub fn evaluate_all(&self, track: &Track) -> Evaluation {
        let probe = Probe::from_track(track);
        let tiers: Vec<TierOutcome> = MatchTier::ALL
            .into_iter()
            .map(|tier| {
                let start = Instant::now();
                let candidates = self.tier_candidates(tier, track.id(), &probe);
                TierOutcome {
                    tier,
                    candidates,
                    elapsed: start.elapsed(),
                }
            })
            .collect();

        let mut authoritative = tiers
            .iter()
            .find(|t| !t.candidates.is_empty())
            .map(|t| t.candidates.clone())
            .unwrap_or_default();
        authoritative.truncate(self.options.max_suggestions);

        Evaluation {
            track_id: track.id(),
            tiers,
            authoritative,
        }
    }

    /// All qualifying candidates of one tier, ranked but not truncated.
    fn tier_candidates(&self, tier: MatchTier, track_id: i64, probe: &Probe) -> Vec<FixSuggestion> {
        let snap = self.snapshot;
        let scored: Vec<(usize, u8)> = match tier {
            MatchTier::ExactPath => with_score(snap.by_path(&probe.path), tier),
            MatchTier::SameFolderDifferentExtension => {
                let slots: Vec<usize> = snap
                    .by_folder_stem(&probe.dir_key, &probe.stem)
                    .iter()
                    .copied()
                    .filter(|&slot| snap.file(slot).file.extension != probe.extension)
                    .collect();
                with_score(&slots, tier)
            }
            // Names that normalize to nothing carry no signal past tier 2
            _ if probe.canonical.is_empty() => Vec::new(),
            MatchTier::SameNameSameExtension | MatchTier::SameNameDifferentExtension => {
                let want_same_ext = tier == MatchTier::SameNameSameExtension;
                let slots: Vec<usize> = snap
                    .by_normalized(&probe.canonical)
                    .iter()
                    .copied()
                    .filter(|&slot| {
                        let f = snap.file(slot);
                        f.dir_key != probe.dir_key
                            && (f.file.extension == probe.extension) == want_same_ext
                    })
                    .collect();
                with_score(&slots, tier)
            }
            MatchTier::Fuzzy => snap
                .sharing_words(&probe.tokens)
                .into_iter()
                .filter_map(|slot| {
                    let f = snap.file(slot);
                    let score = fuzzy_score(
                        &probe.tokens,
                        &probe.canonical,
                        &f.tokens,
                        &f.file.normalized_file_name,
                        self.options.fuzzy_weights,
                    );
                    (score >= self.options.fuzzy_threshold).then_some((slot, score))
                })
                .collect(),
        };

        let mut suggestions: Vec<FixSuggestion> = scored
            .into_iter()
            .map(|(slot, score)| {
                let file = &snap.file(slot).file;
                FixSuggestion {
                    id: None,
                    track_id,
                    music_file_id: file.meta.id,
                    candidate_path: file.path.clone(),
                    tier,
                    similarity_score: score,
                    index_version: snap.version(),
                    created_at: None,
                    applied: false,
                }
            })
            .collect();
        suggestions.sort_by(rank_order);
        suggestions
    }
}

fn with_score(slots: &[usize], tier: MatchTier) -> Vec<(usize, u8)> {
    let score = tier.base_score().unwrap_or(0);
    slots.iter().map(|&slot| (slot, score)).collect()
}
