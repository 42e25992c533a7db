//! End-to-end playlist building against a [`Catalog`].
//!
//! Phases:
//! 1. Look up every lineup artist (popularity + catalog id)
//! 2. Derive quotas from the popularity snapshot
//! 3. Fetch every artist's top tracks (optionally on a worker pool)
//! 4. Allocate tracks sequentially in lineup order
//! 5. Create the playlist and upload the tracks in chunks
//!
//! All network work happens before allocation, so a lookup failure aborts the
//! run instead of silently shrinking an artist's share.

use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::allocate::{allocate_tracks, Allocation};
use crate::catalog::{Catalog, ADD_TRACKS_CHUNK};
use crate::models::{
    popularity_label, AddTracksOutcome, AllocationReport, ArtistReport, CandidateTrack,
    CatalogArtist, RejectedEntry,
};
use crate::normalize::{normalize, ArtistRoster};
use crate::progress::{create_spinner, Phase, PhaseProgress};
use crate::scoring::{compute_quotas, Quotas};

// ============================================================================
// Type Aliases
// ============================================================================

/// Search result per roster artist (`None` = not in the catalog).
pub type ArtistDirectory = FxHashMap<String, Option<CatalogArtist>>;

/// Ranked candidates per roster artist.
pub type CandidateMap = FxHashMap<String, Vec<CandidateTrack>>;

// ============================================================================
// Configuration
// ============================================================================

/// Pause between catalog requests, per worker.
pub const DEFAULT_PACE: Duration = Duration::from_millis(200);

pub const DEFAULT_MARKET: &str = "US";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pace: Duration,
    /// Worker threads for fetching top tracks; 0 fetches sequentially.
    pub workers: usize,
    pub chunk_size: usize,
    /// Country code for top-track lookups.
    pub market: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pace: DEFAULT_PACE,
            workers: 0,
            chunk_size: ADD_TRACKS_CHUNK,
            market: DEFAULT_MARKET.to_string(),
        }
    }
}

impl RunConfig {
    fn rest(&self) {
        if !self.pace.is_zero() {
            thread::sleep(self.pace);
        }
    }
}

// ============================================================================
// Catalog lookups
// ============================================================================

/// Search every roster artist once.
pub fn lookup_artists<C: Catalog + ?Sized>(
    catalog: &C,
    roster: &ArtistRoster,
    config: &RunConfig,
) -> Result<ArtistDirectory> {
    let progress = PhaseProgress::start(Phase::Popularity, roster.len() as u64);
    let mut directory = ArtistDirectory::default();

    for name in roster.names() {
        let found = catalog
            .find_artist(name)
            .with_context(|| format!("searching for artist '{}'", name))?;
        debug!(
            artist = %name,
            popularity = %popularity_label(found.as_ref().map(|a| a.popularity)),
            "artist popularity"
        );
        directory.insert(name.clone(), found);
        progress.advance();
        config.rest();
    }

    progress.finish(format!("Looked up {} artists", roster.len()));
    Ok(directory)
}

/// Top tracks of one artist. A search hit whose name does not normalize to
/// the requested one is treated as a different artist and contributes nothing.
fn candidates_for<C: Catalog + ?Sized>(
    catalog: &C,
    name: &str,
    found: Option<&CatalogArtist>,
) -> Result<Vec<CandidateTrack>> {
    let Some(artist) = found else {
        debug!(artist = %name, "artist not found in catalog");
        return Ok(Vec::new());
    };

    let wanted = normalize(name);
    let got = normalize(&artist.name);
    if wanted != got {
        debug!(
            artist = %name,
            found = %artist.name,
            similarity = %format!("{:.2}", strsim::jaro_winkler(&wanted, &got)),
            "artist not matched strictly"
        );
        return Ok(Vec::new());
    }

    let tracks = catalog
        .top_tracks(&artist.id)
        .with_context(|| format!("fetching top tracks for '{}'", name))?;
    debug!(artist = %name, count = tracks.len(), "top tracks");
    Ok(tracks)
}

/// Candidate lists for the whole roster. With `workers > 0` the requests run
/// on a dedicated pool; the result is keyed by name, so fetch order does not
/// leak into allocation.
pub fn fetch_candidates<C: Catalog + ?Sized>(
    catalog: &C,
    roster: &ArtistRoster,
    directory: &ArtistDirectory,
    config: &RunConfig,
) -> Result<CandidateMap> {
    let progress = PhaseProgress::start(Phase::Tracks, roster.len() as u64);
    let fetch = |name: &String| -> Result<(String, Vec<CandidateTrack>)> {
        let found = directory.get(name).and_then(Option::as_ref);
        let tracks = candidates_for(catalog, name, found)?;
        progress.advance();
        config.rest();
        Ok((name.clone(), tracks))
    };

    let fetched: Vec<(String, Vec<CandidateTrack>)> = if config.workers > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .context("Failed to build fetch thread pool")?;
        pool.install(|| roster.names().par_iter().map(fetch).collect::<Result<_>>())?
    } else {
        roster.names().iter().map(fetch).collect::<Result<_>>()?
    };

    progress.finish(format!("Fetched tracks for {} artists", fetched.len()));
    Ok(fetched.into_iter().collect())
}

// ============================================================================
// Plan
// ============================================================================

/// Everything decided before touching the user's account.
#[derive(Debug, Clone)]
pub struct PlaylistPlan {
    pub roster: ArtistRoster,
    pub quotas: Quotas,
    pub allocation: Allocation,
}

impl PlaylistPlan {
    pub fn tracks(&self) -> &[String] {
        self.allocation.tracks()
    }

    /// Per-artist diagnostics in lineup order.
    pub fn report(&self, playlist_name: Option<&str>, festival: Option<&str>) -> AllocationReport {
        let artists: Vec<ArtistReport> = self
            .allocation
            .artists()
            .iter()
            .zip(self.quotas.entries())
            .map(|(alloc, quota)| ArtistReport {
                name: alloc.name.clone(),
                popularity: popularity_label(quota.popularity),
                quota: quota.tier.get(),
                assigned: alloc.assigned(),
                tracks: alloc.tracks.clone(),
                rejected: alloc
                    .rejected()
                    .map(|o| RejectedEntry {
                        track_id: o.track_id.clone(),
                        reason: o.reject_reason().map(ToString::to_string).unwrap_or_default(),
                        credited: o.credited.clone(),
                    })
                    .collect(),
            })
            .collect();

        AllocationReport {
            playlist_name: playlist_name.map(str::to_string),
            festival: festival.map(str::to_string),
            total_artists: self.roster.len(),
            total_tracks: self.tracks().len(),
            artists_without_tracks: self.allocation.artists_without_tracks().count(),
            thresholds: self.quotas.thresholds().map(|t| t.as_array()),
            artists,
        }
    }
}

/// Phases 1-4: decide the playlist content.
pub fn build_playlist_plan<C: Catalog + ?Sized>(
    catalog: &C,
    artists: Vec<String>,
    config: &RunConfig,
) -> Result<PlaylistPlan> {
    let roster = ArtistRoster::new(artists)?;

    let directory = lookup_artists(catalog, &roster, config)?;
    let quotas = compute_quotas(&roster, |name| {
        directory.get(name).and_then(|a| a.as_ref()).map(|a| a.popularity)
    });
    if let Some(t) = quotas.thresholds() {
        info!(p20 = t.p20, p40 = t.p40, p60 = t.p60, p80 = t.p80, "popularity thresholds");
    }

    let candidates = fetch_candidates(catalog, &roster, &directory, config)?;

    let spinner = create_spinner("Allocating tracks");
    let allocation = allocate_tracks(&roster, &quotas, &candidates);
    spinner.finish_with_message(format!("Selected {} tracks", allocation.tracks().len()));

    for (artist, quota) in allocation.artists().iter().zip(quotas.entries()) {
        debug!(
            artist = %artist.name,
            popularity = %popularity_label(quota.popularity),
            taken = artist.assigned(),
            "tracks taken"
        );
    }

    Ok(PlaylistPlan {
        roster,
        quotas,
        allocation,
    })
}

// ============================================================================
// Publishing
// ============================================================================

/// Append tracks in service-sized chunks. A refused chunk is logged and
/// reported; later chunks are still sent.
pub fn upload_tracks<C: Catalog + ?Sized>(
    catalog: &C,
    playlist_id: &str,
    track_ids: &[String],
    config: &RunConfig,
) -> AddTracksOutcome {
    let chunk_size = config.chunk_size.clamp(1, ADD_TRACKS_CHUNK);
    let progress = PhaseProgress::start(Phase::Upload, track_ids.len().div_ceil(chunk_size) as u64);

    let mut added = 0;
    let mut failed = Vec::new();
    for (i, chunk) in track_ids.chunks(chunk_size).enumerate() {
        match catalog.add_tracks(playlist_id, chunk) {
            Ok(()) => added += chunk.len(),
            Err(e) => {
                warn!(chunk = i, error = %format!("{:#}", e), "failed to add tracks");
                failed.extend_from_slice(chunk);
            }
        }
        progress.advance();
    }
    progress.finish(format!("Uploaded {} tracks", added));

    if failed.is_empty() {
        AddTracksOutcome::Complete { added }
    } else {
        AddTracksOutcome::Partial { added, failed }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub playlist_id: String,
    pub outcome: AddTracksOutcome,
}

/// Phase 5: create the playlist on the current account and fill it.
pub fn publish<C: Catalog + ?Sized>(
    catalog: &C,
    playlist_name: &str,
    track_ids: &[String],
    config: &RunConfig,
) -> Result<Published> {
    let user_id = catalog.current_user_id().context("fetching current user")?;
    let playlist_id = catalog
        .create_playlist(&user_id, playlist_name)
        .with_context(|| format!("creating playlist '{}'", playlist_name))?;
    info!(playlist = %playlist_id, user = %user_id, "playlist created");

    let outcome = upload_tracks(catalog, &playlist_id, track_ids, config);
    Ok(Published {
        playlist_id,
        outcome,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::LineupError;
    use crate::models::CandidateTrack as T;

    fn quiet() -> RunConfig {
        RunConfig {
            pace: Duration::ZERO,
            ..RunConfig::default()
        }
    }

    fn two_act_catalog() -> InMemoryCatalog {
        let mut b_tracks = vec![T::new("t1", ["A", "B"])];
        b_tracks.extend((2..=6).map(|i| T::new(format!("t{i}"), ["B"])));
        InMemoryCatalog::new()
            .with_artist("A", 10, vec![T::new("t1", ["A"])])
            .with_artist("B", 90, b_tracks)
    }

    #[test]
    fn test_plan_end_to_end() {
        let catalog = two_act_catalog();
        let plan = build_playlist_plan(&catalog, vec!["A".into(), "B".into()], &quiet()).unwrap();

        assert_eq!(plan.tracks(), ["t1", "t2", "t3", "t4", "t5", "t6"]);
        assert_eq!(plan.allocation.owner_of("t1"), Some("A"));

        let report = plan.report(Some("Fest"), Some("sonar"));
        assert_eq!(report.total_tracks, 6);
        assert_eq!(report.artists[0].quota, 1);
        assert_eq!(report.artists[1].quota, 5);
        assert_eq!(report.artists[1].rejected[0].reason, "already assigned to previous artist");
    }

    #[test]
    fn test_parallel_fetch_matches_sequential() {
        let catalog = two_act_catalog();
        let lineup = vec!["B".to_string(), "A".to_string(), "Nobody".to_string()];
        let sequential = build_playlist_plan(&catalog, lineup.clone(), &quiet()).unwrap();
        let parallel = build_playlist_plan(
            &catalog,
            lineup,
            &RunConfig {
                workers: 3,
                ..quiet()
            },
        )
        .unwrap();

        assert_eq!(sequential.tracks(), parallel.tracks());
        assert_eq!(sequential.allocation.counts(), parallel.allocation.counts());
    }

    #[test]
    fn test_unknown_artist_reported_as_unknown() {
        let catalog = two_act_catalog();
        let plan =
            build_playlist_plan(&catalog, vec!["A".into(), "Nobody".into()], &quiet()).unwrap();
        let report = plan.report(None, None);
        assert_eq!(report.artists[1].popularity, "unknown");
        assert_eq!(report.artists[1].assigned, 0);
        assert_eq!(report.artists_without_tracks, 1);
    }

    #[test]
    fn test_strict_name_check_drops_lookalike() {
        struct Fuzzy(InMemoryCatalog);
        impl Catalog for Fuzzy {
            fn find_artist(&self, _name: &str) -> Result<Option<CatalogArtist>> {
                self.0.find_artist("A")
            }
            fn top_tracks(&self, id: &str) -> Result<Vec<CandidateTrack>> {
                self.0.top_tracks(id)
            }
            fn current_user_id(&self) -> Result<String> {
                self.0.current_user_id()
            }
            fn create_playlist(&self, user: &str, name: &str) -> Result<String> {
                self.0.create_playlist(user, name)
            }
            fn add_tracks(&self, id: &str, tracks: &[String]) -> Result<()> {
                self.0.add_tracks(id, tracks)
            }
        }

        let catalog = Fuzzy(two_act_catalog());
        let roster = ArtistRoster::new(["A Tribe"]).unwrap();
        let directory = lookup_artists(&catalog, &roster, &quiet()).unwrap();
        // Popularity is kept even though the hit is a different artist
        assert_eq!(directory["A Tribe"].as_ref().map(|a| a.popularity), Some(10));

        let candidates = fetch_candidates(&catalog, &roster, &directory, &quiet()).unwrap();
        assert!(candidates["A Tribe"].is_empty());
    }

    #[test]
    fn test_duplicate_lineup_entry_rejected() {
        let catalog = two_act_catalog();
        let err = build_playlist_plan(&catalog, vec!["Björk".into(), "bjork".into()], &quiet())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LineupError>(),
            Some(LineupError::DuplicateArtist { .. })
        ));
    }

    #[test]
    fn test_empty_lineup_builds_empty_plan() {
        let catalog = two_act_catalog();
        let plan = build_playlist_plan(&catalog, Vec::new(), &quiet()).unwrap();
        assert!(plan.tracks().is_empty());
        assert!(plan.report(None, None).thresholds.is_none());
    }

    #[test]
    fn test_publish_creates_and_fills_playlist() {
        let catalog = two_act_catalog();
        let ids: Vec<String> = (0..250).map(|i| format!("x{i}")).collect();
        let published = publish(&catalog, "Fest 2026", &ids, &quiet()).unwrap();

        assert_eq!(published.outcome, AddTracksOutcome::Complete { added: 250 });
        let stored = &catalog.playlists()[0];
        assert_eq!(stored.id, published.playlist_id);
        assert_eq!(stored.name, "Fest 2026");
        assert_eq!(stored.tracks, ids);
    }

    #[test]
    fn test_upload_continues_after_refused_chunk() {
        let catalog = two_act_catalog().refusing("x3");
        let playlist = catalog.create_playlist("me", "Fest").unwrap();
        let ids: Vec<String> = (0..5).map(|i| format!("x{i}")).collect();
        let config = RunConfig {
            chunk_size: 2,
            ..quiet()
        };

        let outcome = upload_tracks(&catalog, &playlist, &ids, &config);
        assert_eq!(
            outcome,
            AddTracksOutcome::Partial {
                added: 3,
                failed: vec!["x2".into(), "x3".into()],
            }
        );
        assert_eq!(catalog.playlists()[0].tracks, ["x0", "x1", "x4"]);
    }
}
