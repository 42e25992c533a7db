//! Artist name normalization and the canonical lineup lookup.
//!
//! Every "is this the same artist?" decision in the crate goes through
//! [`normalize`], including ownership resolution during allocation.

use rustc_hash::FxHashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::LineupError;

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Canonical form of an artist name: NFD decomposition, combining marks
/// dropped, then lowercased.
/// e.g., "Beyoncé" → "beyonce", "Ärtïst Näme" → "artist name"
pub fn normalize(name: &str) -> String {
    let stripped: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped.to_lowercase()
}

// ============================================================================
// ARTIST ROSTER
// ============================================================================

/// The caller's artist list in input order, indexed by canonical name.
///
/// Order matters: roster position is claim priority during allocation.
#[derive(Clone, Debug, Default)]
pub struct ArtistRoster {
    names: Vec<String>,
    by_canonical: FxHashMap<String, usize>,
}

impl ArtistRoster {
    /// Build the lookup. Two entries folding to the same canonical name are
    /// an error.
    pub fn new<I, S>(names: I) -> Result<Self, LineupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roster = Self::default();
        for name in names {
            let name = name.into();
            let canonical = normalize(&name);
            if let Some(&existing) = roster.by_canonical.get(&canonical) {
                return Err(LineupError::DuplicateArtist {
                    first: roster.names[existing].clone(),
                    second: name,
                });
            }
            roster.by_canonical.insert(canonical, roster.names.len());
            roster.names.push(name);
        }
        Ok(roster)
    }

    /// Roster index of the artist `name` refers to, if any.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_canonical.get(&normalize(name)).copied()
    }

    /// Owner of a track: the first credited artist (in credit order) that is
    /// part of the lineup.
    pub fn owner_of<S: AsRef<str>>(&self, credited: &[S]) -> Option<usize> {
        credited.iter().find_map(|name| self.position(name.as_ref()))
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents_and_case() {
        assert_eq!(normalize("Ärtïst Näme"), normalize("artist name"));
        assert_eq!(normalize("Beyoncé"), "beyonce");
        assert_eq!(normalize("MØ"), "mø"); // stroke is not a combining mark
        assert_eq!(normalize("Sigur Rós"), "sigur ros");
    }

    #[test]
    fn test_normalize_precomposed_and_decomposed_agree() {
        // U+00E9 vs "e" + U+0301
        assert_eq!(normalize("Caf\u{e9}"), normalize("Cafe\u{301}"));
    }

    #[test]
    fn test_normalize_keeps_non_latin_scripts() {
        assert_eq!(normalize("кино"), "кино");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_roster_position_is_accent_insensitive() {
        let roster = ArtistRoster::new(["Björk", "Rosalía", "Kraftwerk"]).unwrap();
        assert_eq!(roster.position("BJORK"), Some(0));
        assert_eq!(roster.position("rosalia"), Some(1));
        assert_eq!(roster.position("Daft Punk"), None);
        assert_eq!(roster.get(1), Some("Rosalía"));
    }

    #[test]
    fn test_roster_owner_is_first_listed_member() {
        let roster = ArtistRoster::new(["A", "B"]).unwrap();
        assert_eq!(roster.owner_of(&["X", "b", "a"]), Some(1));
        assert_eq!(roster.owner_of(&["a", "b"]), Some(0));
        assert_eq!(roster.owner_of(&["X", "Y"]), None);
        assert_eq!(roster.owner_of::<&str>(&[]), None);
    }

    #[test]
    fn test_roster_rejects_canonical_duplicates() {
        let err = ArtistRoster::new(["Motörhead", "Slayer", "MOTORHEAD"]).unwrap_err();
        match err {
            LineupError::DuplicateArtist { first, second } => {
                assert_eq!(first, "Motörhead");
                assert_eq!(second, "MOTORHEAD");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_roster() {
        let roster = ArtistRoster::new(Vec::<String>::new()).unwrap();
        assert!(roster.is_empty());
        assert_eq!(roster.len(), 0);
    }
}
