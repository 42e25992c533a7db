//! Popularity scoring: percentile thresholds and quota tiers.
//!
//! Thresholds are computed once per run from the full lineup's popularity
//! snapshot, then every artist is classified independently against them.

use rustc_hash::FxHashMap;

use crate::normalize::ArtistRoster;

// ============================================================================
// Tier Bounds
// ============================================================================

/// Fewest tracks an artist can be allotted.
pub const MIN_TIER: u8 = 1;

/// Most tracks an artist can be allotted.
pub const MAX_TIER: u8 = 5;

/// Percentile cut points between tiers.
pub const CUT_PERCENTILES: [f64; 4] = [20.0, 40.0, 60.0, 80.0];

// ============================================================================
// Percentiles
// ============================================================================

/// Percentile of sorted data with linear interpolation between closest ranks
/// (the usual "linear" method of numeric libraries).
///
/// `sorted` must be non-empty and ascending; `p` is in [0, 100].
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let h = (sorted.len() - 1) as f64 * p / 100.0;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// The 20th/40th/60th/80th percentile of a popularity snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub p20: f64,
    pub p40: f64,
    pub p60: f64,
    pub p80: f64,
}

impl Thresholds {
    /// `None` for an empty snapshot. Absent scores must already be 0.
    pub fn from_scores(scores: &[u32]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = scores.iter().map(|&s| f64::from(s)).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let [p20, p40, p60, p80] = CUT_PERCENTILES.map(|p| percentile(&sorted, p));
        Some(Self { p20, p40, p60, p80 })
    }

    /// Quota tier for a score. Buckets are half-open `[lo, hi)`; the top one
    /// has no upper bound, so a score equal to a cut point lands in the
    /// higher tier.
    pub fn tier(&self, score: Option<u32>) -> QuotaTier {
        let p = f64::from(score.unwrap_or(0));
        let tier = if p < self.p20 {
            1
        } else if p < self.p40 {
            2
        } else if p < self.p60 {
            3
        } else if p < self.p80 {
            4
        } else {
            5
        };
        QuotaTier(tier)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.p20, self.p40, self.p60, self.p80]
    }
}

// ============================================================================
// Quotas
// ============================================================================

/// Number of tracks an artist may contribute, in [`MIN_TIER`, `MAX_TIER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuotaTier(u8);

impl QuotaTier {
    pub fn new(tier: u8) -> Option<Self> {
        (MIN_TIER..=MAX_TIER).contains(&tier).then_some(Self(tier))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn limit(self) -> usize {
        usize::from(self.0)
    }
}

/// Popularity snapshot and derived tier of one artist.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistQuota {
    pub name: String,
    /// `None` when the catalog did not know the artist.
    pub popularity: Option<u32>,
    pub tier: QuotaTier,
}

/// Quotas for a whole roster, in roster order.
#[derive(Debug, Clone, Default)]
pub struct Quotas {
    entries: Vec<ArtistQuota>,
    thresholds: Option<Thresholds>,
}

impl Quotas {
    pub fn entries(&self) -> &[ArtistQuota] {
        &self.entries
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    /// Tier of the artist at roster position `idx`.
    pub fn tier_at(&self, idx: usize) -> Option<QuotaTier> {
        self.entries.get(idx).map(|e| e.tier)
    }

    /// `artist name -> tier` view.
    pub fn by_name(&self) -> FxHashMap<&str, QuotaTier> {
        self.entries.iter().map(|e| (e.name.as_str(), e.tier)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classify every roster artist. `popularity` returns `None` for artists the
/// catalog does not know; they count as 0 but stay `None` in the result.
pub fn compute_quotas<F>(roster: &ArtistRoster, popularity: F) -> Quotas
where
    F: Fn(&str) -> Option<u32>,
{
    let snapshot: Vec<Option<u32>> = roster.names().iter().map(|n| popularity(n)).collect();
    let scores: Vec<u32> = snapshot.iter().map(|p| p.unwrap_or(0)).collect();

    let Some(thresholds) = Thresholds::from_scores(&scores) else {
        return Quotas::default();
    };

    let entries = roster
        .names()
        .iter()
        .zip(snapshot)
        .map(|(name, popularity)| ArtistQuota {
            name: name.clone(),
            popularity,
            tier: thresholds.tier(popularity),
        })
        .collect();

    Quotas {
        entries,
        thresholds: Some(thresholds),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&data, 0.0), 1.0));
        assert!(close(percentile(&data, 50.0), 2.5));
        assert!(close(percentile(&data, 100.0), 4.0));
        assert!(close(percentile(&[7.0], 80.0), 7.0));
    }

    #[test]
    fn test_thresholds_for_even_spread() {
        let scores = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        let t = Thresholds::from_scores(&scores).unwrap();
        assert!(close(t.p20, 28.0));
        assert!(close(t.p40, 46.0));
        assert!(close(t.p60, 64.0));
        assert!(close(t.p80, 82.0));

        let tiers: Vec<u8> = scores.iter().map(|&s| t.tier(Some(s)).get()).collect();
        assert_eq!(tiers, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_thresholds_ignore_input_order() {
        let a = Thresholds::from_scores(&[90, 10, 50, 30, 70]).unwrap();
        let b = Thresholds::from_scores(&[10, 30, 50, 70, 90]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_score_on_cut_point_goes_up() {
        // p20 = 10 exactly for six evenly spaced scores starting at 0
        let t = Thresholds::from_scores(&[0, 10, 20, 30, 40, 50]).unwrap();
        assert!(close(t.p20, 10.0));
        assert_eq!(t.tier(Some(10)).get(), 2);
        assert_eq!(t.tier(Some(9)).get(), 1);
    }

    #[test]
    fn test_equal_scores_all_top_tier() {
        let t = Thresholds::from_scores(&[50, 50, 50]).unwrap();
        assert_eq!(t.tier(Some(50)).get(), 5);
    }

    #[test]
    fn test_absent_score_counts_as_zero() {
        let t = Thresholds::from_scores(&[0, 40, 80]).unwrap();
        assert_eq!(t.tier(None), t.tier(Some(0)));
    }

    #[test]
    fn test_empty_snapshot_has_no_thresholds() {
        assert!(Thresholds::from_scores(&[]).is_none());
    }

    #[test]
    fn test_quota_tier_bounds() {
        assert!(QuotaTier::new(0).is_none());
        assert_eq!(QuotaTier::new(3).map(QuotaTier::limit), Some(3));
        assert!(QuotaTier::new(6).is_none());
    }

    #[test]
    fn test_compute_quotas_keeps_unknown_popularity() {
        let roster = ArtistRoster::new(["A", "B", "C"]).unwrap();
        let quotas = compute_quotas(&roster, |name| match name {
            "A" => Some(10),
            "B" => Some(90),
            _ => None,
        });

        assert_eq!(quotas.len(), 3);
        let c = &quotas.entries()[2];
        assert_eq!(c.popularity, None);
        assert_eq!(c.tier.get(), 1);
        assert_eq!(quotas.by_name()["B"].get(), 5);
        // sorted snapshot [0, 10, 90]: p40 = 8, p60 = 26
        assert_eq!(quotas.tier_at(0).map(QuotaTier::get), Some(3));
    }

    #[test]
    fn test_compute_quotas_empty_roster() {
        let roster = ArtistRoster::new(Vec::<String>::new()).unwrap();
        let quotas = compute_quotas(&roster, |_| Some(50));
        assert!(quotas.is_empty());
        assert!(quotas.thresholds().is_none());
    }
}
