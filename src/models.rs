//! Core data models for playlist building.
//!
//! This module contains the catalog-facing records, the per-candidate
//! diagnostics produced by allocation and the serializable run report.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Catalog Models
// ============================================================================

/// Artist as found by a catalog search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
    pub popularity: u32, // 0-100
}

/// One entry of an artist's top-tracks list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub id: String,
    /// All credited artists in the catalog's credited order.
    #[serde(rename = "artists")]
    pub credited: Vec<String>,
}

impl CandidateTrack {
    pub fn new<I, S>(id: impl Into<String>, credited: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            credited: credited.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of submitting tracks to a playlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddTracksOutcome {
    Complete { added: usize },
    /// Some chunks were refused; `failed` holds the ids that were not added.
    Partial { added: usize, failed: Vec<String> },
}

impl AddTracksOutcome {
    pub fn added(&self) -> usize {
        match self {
            AddTracksOutcome::Complete { added } | AddTracksOutcome::Partial { added, .. } => {
                *added
            }
        }
    }
}

// ============================================================================
// Allocation Diagnostics
// ============================================================================

/// Why a candidate was not taken for the artist being processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// An earlier artist (or an earlier entry of the same list) already placed it.
    AlreadyAssigned,
    /// First lineup member in the credits is someone else, or nobody.
    OwnedBy(Option<String>),
    /// The artist already holds its full quota.
    LimitReached,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AlreadyAssigned => f.write_str("already assigned to previous artist"),
            RejectReason::OwnedBy(Some(owner)) => write!(f, "owner is {owner}"),
            RejectReason::OwnedBy(None) => f.write_str("owner is None"),
            RejectReason::LimitReached => f.write_str("limit reached for artist"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

/// What happened to one visited candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateOutcome {
    pub track_id: String,
    /// Credits as examined; `None` when the track was skipped before the
    /// ownership check.
    pub credited: Option<Vec<String>>,
    pub verdict: Verdict,
}

impl CandidateOutcome {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.verdict {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

// ============================================================================
// Report (Instrumentation)
// ============================================================================

/// Serializable summary of one run, written with `--report`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllocationReport {
    pub playlist_name: Option<String>,
    pub festival: Option<String>,
    pub total_artists: usize,
    pub total_tracks: usize,
    pub artists_without_tracks: usize,
    pub thresholds: Option<[f64; 4]>,
    pub artists: Vec<ArtistReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistReport {
    pub name: String,
    /// "unknown" when the catalog did not know the artist.
    pub popularity: String,
    pub quota: u8,
    pub assigned: usize,
    pub tracks: Vec<String>,
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedEntry {
    pub track_id: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credited: Option<Vec<String>>,
}

impl AllocationReport {
    /// Write the report as pretty JSON
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Popularity as shown in diagnostics.
pub fn popularity_label(popularity: Option<u32>) -> String {
    popularity.map_or_else(|| "unknown".to_string(), |p| p.to_string())
}
