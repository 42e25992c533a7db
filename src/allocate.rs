//! Track allocation: first-claim ownership resolution under per-artist quotas.
//!
//! Artists are visited in roster order and each artist's candidates in the
//! catalog's ranking order. Both orders decide the outcome, so this pass is
//! strictly sequential even when the candidate lists were fetched in parallel.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::{CandidateOutcome, CandidateTrack, RejectReason, Verdict};
use crate::normalize::{normalize, ArtistRoster};
use crate::scoring::Quotas;

// ============================================================================
// Claim Ledger
// ============================================================================

/// Tracks placed in the playlist so far, in placement order.
#[derive(Debug, Default)]
pub struct ClaimLedger {
    claimed: FxHashSet<String>,
    order: Vec<String>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, track_id: &str) -> bool {
        self.claimed.contains(track_id)
    }

    /// Claim `track_id`; returns false (and changes nothing) if it was taken.
    pub fn claim(&mut self, track_id: &str) -> bool {
        if !self.claimed.insert(track_id.to_string()) {
            return false;
        }
        self.order.push(track_id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_tracks(self) -> Vec<String> {
        self.order
    }
}

// ============================================================================
// Candidate Source
// ============================================================================

/// Ranked candidate tracks per artist, most popular first.
pub trait CandidateSource {
    /// Candidates for `artist` (as spelled in the roster). Unknown artists
    /// have none.
    fn candidates(&self, artist: &str) -> &[CandidateTrack];
}

impl CandidateSource for FxHashMap<String, Vec<CandidateTrack>> {
    fn candidates(&self, artist: &str) -> &[CandidateTrack] {
        self.get(artist).map_or(&[], Vec::as_slice)
    }
}

// ============================================================================
// Allocation
// ============================================================================

/// Outcome for one roster artist.
#[derive(Debug, Clone)]
pub struct ArtistAllocation {
    pub name: String,
    pub quota: usize,
    pub tracks: Vec<String>,
    /// Every candidate that was visited, in visiting order.
    pub trail: Vec<CandidateOutcome>,
}

impl ArtistAllocation {
    pub fn assigned(&self) -> usize {
        self.tracks.len()
    }

    pub fn rejected(&self) -> impl Iterator<Item = &CandidateOutcome> {
        self.trail.iter().filter(|o| !o.is_accepted())
    }
}

/// Final playlist content plus per-artist diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    tracks: Vec<String>,
    artists: Vec<ArtistAllocation>,
}

impl Allocation {
    /// Unique track ids in placement order.
    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    /// Per-artist results in roster order.
    pub fn artists(&self) -> &[ArtistAllocation] {
        &self.artists
    }

    pub fn counts(&self) -> FxHashMap<&str, usize> {
        self.artists
            .iter()
            .map(|a| (a.name.as_str(), a.assigned()))
            .collect()
    }

    pub fn rejection_trail(&self) -> FxHashMap<&str, &[CandidateOutcome]> {
        self.artists
            .iter()
            .map(|a| (a.name.as_str(), a.trail.as_slice()))
            .collect()
    }

    /// Artist that claimed `track_id`.
    pub fn owner_of(&self, track_id: &str) -> Option<&str> {
        self.artists
            .iter()
            .find(|a| a.tracks.iter().any(|t| t == track_id))
            .map(|a| a.name.as_str())
    }

    pub fn artists_without_tracks(&self) -> impl Iterator<Item = &ArtistAllocation> {
        self.artists.iter().filter(|a| a.tracks.is_empty())
    }
}

/// Build the playlist track set.
///
/// For each artist in roster order, candidates are visited in ranking order:
/// a track already claimed is skipped; a track whose first credited lineup
/// member is somebody else (or nobody) is skipped for this artist; otherwise
/// it is claimed while the artist is under quota. Scanning stops once the
/// quota is met.
///
/// Quotas are matched to roster artists by canonical name, so they may come
/// from a differently ordered roster. An artist without a quota takes nothing.
pub fn allocate_tracks<S>(roster: &ArtistRoster, quotas: &Quotas, source: &S) -> Allocation
where
    S: CandidateSource + ?Sized,
{
    let limits: FxHashMap<String, usize> = quotas
        .entries()
        .iter()
        .map(|e| (normalize(&e.name), e.tier.limit()))
        .collect();
    let mut ledger = ClaimLedger::new();
    let mut artists = Vec::with_capacity(roster.len());

    for (idx, name) in roster.names().iter().enumerate() {
        let quota = limits.get(&normalize(name)).copied().unwrap_or(0);
        let mut alloc = ArtistAllocation {
            name: name.clone(),
            quota,
            tracks: Vec::new(),
            trail: Vec::new(),
        };

        for candidate in source.candidates(name) {
            let outcome = evaluate(roster, idx, candidate, &mut ledger, &mut alloc);
            let skipped = matches!(
                outcome.verdict,
                Verdict::Rejected(RejectReason::AlreadyAssigned | RejectReason::OwnedBy(_))
            );
            alloc.trail.push(outcome);
            if !skipped && alloc.tracks.len() >= quota {
                break;
            }
        }

        tracing::debug!(
            artist = %name,
            quota,
            taken = alloc.assigned(),
            "allocated artist"
        );
        artists.push(alloc);
    }

    Allocation {
        tracks: ledger.into_tracks(),
        artists,
    }
}

fn evaluate(
    roster: &ArtistRoster,
    idx: usize,
    candidate: &CandidateTrack,
    ledger: &mut ClaimLedger,
    alloc: &mut ArtistAllocation,
) -> CandidateOutcome {
    let rejected = |reason, credited| CandidateOutcome {
        track_id: candidate.id.clone(),
        credited,
        verdict: Verdict::Rejected(reason),
    };

    if ledger.is_claimed(&candidate.id) {
        return rejected(RejectReason::AlreadyAssigned, None);
    }

    let owner = roster.owner_of(&candidate.credited);
    if owner != Some(idx) {
        let owner_name = owner.and_then(|o| roster.get(o)).map(str::to_string);
        return rejected(
            RejectReason::OwnedBy(owner_name),
            Some(candidate.credited.clone()),
        );
    }

    if alloc.tracks.len() >= alloc.quota {
        return rejected(RejectReason::LimitReached, Some(candidate.credited.clone()));
    }

    let fresh = ledger.claim(&candidate.id);
    debug_assert!(fresh, "claimed track reached the claim step");
    alloc.tracks.push(candidate.id.clone());
    CandidateOutcome {
        track_id: candidate.id.clone(),
        credited: Some(candidate.credited.clone()),
        verdict: Verdict::Accepted,
    }
}

// ============================================================================
// TESTS
// ============================================================================
