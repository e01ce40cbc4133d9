use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use track_resolver::cancel::CancelFlag;
use track_resolver::config::{ResolverConfig, MAX_SUGGESTIONS, WRITE_BATCH_SIZE};
use track_resolver::models::{MatchTier, SuggestionFilter, TrackStatus};
use track_resolver::progress::{format_duration, set_log_only};
use track_resolver::resolver::Resolver;
use track_resolver::scoring::{FuzzyWeights, DEFAULT_FUZZY_THRESHOLD};
use track_resolver::store::Store;

#[derive(Parser)]
#[command(name = "track-resolver")]
#[command(about = "Find replacements for broken playlist tracks and repair playlists")]
struct Args {
    /// Library database (created if missing)
    #[arg(long, env = "TRACK_RESOLVER_DB", default_value = "library.sqlite3")]
    db: PathBuf,

    #[arg(long, env = "TRACK_RESOLVER_WORKERS", default_value = "0")]
    workers: usize,

    /// Minimum fuzzy-tier score (0-100)
    #[arg(long, env = "TRACK_RESOLVER_THRESHOLD", default_value_t = DEFAULT_FUZZY_THRESHOLD)]
    threshold: u8,

    #[arg(long, env = "TRACK_RESOLVER_MAX_SUGGESTIONS", default_value_t = MAX_SUGGESTIONS)]
    max_suggestions: usize,

    /// Weight of token overlap in the fuzzy score
    #[arg(long, env = "TRACK_RESOLVER_JACCARD_WEIGHT", default_value = "0.5")]
    jaccard_weight: f64,

    /// Weight of edit-distance similarity in the fuzzy score
    #[arg(long, env = "TRACK_RESOLVER_EDIT_WEIGHT", default_value = "0.5")]
    edit_weight: f64,

    #[arg(long, env = "TRACK_RESOLVER_BATCH_SIZE", default_value_t = WRITE_BATCH_SIZE)]
    batch_size: usize,

    /// Log progress lines instead of drawing progress bars
    #[arg(long, env = "TRACK_RESOLVER_LOG_ONLY")]
    log_only: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a directory and import every playable media file
    Scan { root: PathBuf },

    /// Import a playlist; tracks are read one path per line from the playlist
    /// file unless --tracks names another list
    ImportPlaylist {
        name: String,
        path: PathBuf,
        #[arg(long)]
        tracks: Option<PathBuf>,
    },

    /// Re-check whether every track's file exists
    CheckTracks,

    /// Rebuild the word index as a new version
    RebuildIndex,

    /// List persisted suggestions for missing tracks
    #[command(name = "similarity:suggestions")]
    Suggestions {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Tier name or number (1-5)
        #[arg(long = "type")]
        tier: Option<MatchTier>,
        #[arg(long)]
        min_score: Option<u8>,
    },

    /// Suggestions for one track
    #[command(name = "similarity:track")]
    Track { id: i64 },

    /// Per-tier diagnostics over all missing tracks
    #[command(name = "similarity:stats")]
    Stats,

    /// Missing tracks with no candidate in any tier
    #[command(name = "similarity:unmatched")]
    Unmatched {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Replace a path in every playlist that references it
    ApplyFix { old_path: String, new_path: String },

    /// Drop cached and persisted suggestions
    RefreshCache,
}

/// Lines of a plain playlist: blank lines and `#` directives are skipped.
fn read_track_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read track list {}", path.display()))?;
    Ok(content
        .lines()
        .map(|l| l.trim_start_matches('\u{feff}').trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn run(args: Args, resolver: &Resolver) -> Result<()> {
    let json = args.json;
    let cancel = CancelFlag::new();

    match args.command {
        Command::Scan { root } => {
            let summary = resolver
                .scan_library(&root)
                .with_context(|| format!("Failed to scan {}", root.display()))?;
            emit(json, &summary, |s| {
                println!("Scanned {}: {} media files imported, {} errors", s.root, s.imported, s.errors);
            })?;
        }
        Command::ImportPlaylist { name, path, tracks } => {
            let list = read_track_list(tracks.as_deref().unwrap_or(&path))?;
            let path_str = path.to_string_lossy();
            let imported = resolver
                .import_playlist(&name, &path_str, &list)
                .with_context(|| format!("Failed to import playlist {}", name))?;
            emit(json, &imported, |tracks| {
                let missing = tracks
                    .iter()
                    .filter(|t| t.status == TrackStatus::Missing)
                    .count();
                println!("Imported '{}': {} tracks, {} missing", name, tracks.len(), missing);
            })?;
        }
        Command::CheckTracks => {
            let summary = resolver.check_track_status()?;
            emit(json, &summary, |s| {
                println!(
                    "Checked {} tracks: {} found, {} missing, {} changed",
                    s.checked, s.found, s.missing, s.changed
                );
            })?;
        }
        Command::RebuildIndex => {
            let version = resolver
                .rebuild_index(&cancel)
                .context("Failed to rebuild word index")?;
            emit(json, &serde_json::json!({ "index_version": version }), |_| {
                println!("Word index rebuilt, version {}", version);
            })?;
        }
        Command::Suggestions {
            limit,
            offset,
            tier,
            min_score,
        } => {
            let filter = SuggestionFilter {
                tier,
                min_score,
                limit,
                offset,
            };
            let listed = resolver.get_suggestions(&filter)?;
            emit(json, &listed, |rows| {
                for row in rows {
                    let s = &row.suggestion;
                    println!(
                        "[{}] {:>3} {:<32} {} -> {}{}",
                        s.track_id,
                        s.similarity_score,
                        s.tier.as_str(),
                        row.track_path,
                        s.candidate_path,
                        if s.applied { " (applied)" } else { "" }
                    );
                }
                if rows.is_empty() {
                    println!("No suggestions.");
                }
            })?;
        }
        Command::Track { id } => {
            let suggestions = resolver
                .suggestions_for_track(id)
                .with_context(|| format!("Failed to get suggestions for track {}", id))?;
            emit(json, suggestions.as_ref(), |list| {
                for s in list {
                    println!("{:>3} {:<32} {}", s.similarity_score, s.tier.as_str(), s.candidate_path);
                }
                if list.is_empty() {
                    println!("No candidates for track {}.", id);
                }
            })?;
        }
        Command::Stats => {
            let stats = resolver.get_statistics()?;
            emit(json, &stats, |s| {
                println!("\n{:=<72}", "");
                println!("Index version {}", s.index_version);
                println!(
                    "Missing tracks: {}  matched: {}  unmatched: {}  ({:.1}%)",
                    s.missing_tracks,
                    s.matched_tracks,
                    s.unmatched_tracks,
                    s.match_rate()
                );
                println!("{:-<72}", "");
                for t in &s.tiers {
                    let name = t.tier.map(|t| t.as_str()).unwrap_or("-");
                    println!(
                        "{:<32} candidates {:>6}  tracks {:>6}  won {:>6}  avg {:>5.1}  {:>8.1}ms",
                        name,
                        t.candidate_count,
                        t.tracks_with_candidates,
                        t.authoritative_count,
                        t.average_score,
                        t.elapsed_ms
                    );
                }
                println!("{:=<72}", "");
            })?;
        }
        Command::Unmatched { limit } => {
            let tracks = resolver.get_unmatched_tracks(limit)?;
            emit(json, &tracks, |list| {
                for t in list {
                    println!("[{}] {}", t.id(), t.path);
                }
                println!("{} unmatched tracks", list.len());
            })?;
        }
        Command::ApplyFix { old_path, new_path } => {
            let result = resolver
                .apply_fix(&old_path, &new_path, &cancel)
                .with_context(|| format!("Failed to replace {}", old_path))?;
            emit(json, &result, |r| {
                println!(
                    "{} playlists: {} updated, {} failed; {} tracks moved",
                    r.affected_playlists, r.files_updated, r.files_failed, r.tracks_updated
                );
                for d in &r.details {
                    println!("  {:?}  {}", d.status, d.playlist_path);
                }
            })?;
        }
        Command::RefreshCache => {
            resolver.refresh_cache()?;
            emit(json, &serde_json::json!({ "refreshed": true }), |_| {
                println!("Suggestion cache cleared");
            })?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let config = ResolverConfig {
        fuzzy_threshold: args.threshold,
        fuzzy_weights: FuzzyWeights {
            jaccard: args.jaccard_weight,
            edit: args.edit_weight,
        },
        max_suggestions: args.max_suggestions,
        write_batch_size: args.batch_size,
        workers: args.workers,
    };

    let start = Instant::now();
    let store = Store::open(&args.db)
        .with_context(|| format!("Failed to open library database {}", args.db.display()))?;
    let resolver = Resolver::new(Arc::new(store), config);

    run(args, &resolver)?;

    tracing::debug!(elapsed = %format_duration(start.elapsed()), "done");
    Ok(())
}
