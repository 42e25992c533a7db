//! Streaming catalog interface.
//!
//! The allocation core never talks to the network; everything it needs comes
//! through [`Catalog`]. [`SpotifyClient`](crate::spotify::SpotifyClient) is the
//! live implementation, [`InMemoryCatalog`] serves dry runs and tests.

use anyhow::{bail, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::path::Path;
use std::sync::Mutex;

use crate::models::{CandidateTrack, CatalogArtist};
use crate::normalize::normalize;

/// Most track ids a single `add_tracks` call may carry.
pub const ADD_TRACKS_CHUNK: usize = 100;

/// Operations the playlist builder needs from a streaming service.
///
/// `Sync` so candidate lists can be fetched from a worker pool.
pub trait Catalog: Sync {
    /// Best search hit for `name`, or `None` when nothing matches.
    fn find_artist(&self, name: &str) -> Result<Option<CatalogArtist>>;

    /// The artist's top tracks, most popular first.
    fn top_tracks(&self, artist_id: &str) -> Result<Vec<CandidateTrack>>;

    /// Id of the account playlists are created for.
    fn current_user_id(&self) -> Result<String>;

    /// Create an empty playlist and return its id.
    fn create_playlist(&self, user_id: &str, name: &str) -> Result<String>;

    /// Append at most [`ADD_TRACKS_CHUNK`] tracks to a playlist.
    fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}

// ============================================================================
// In-memory catalog
// ============================================================================

/// Offline lineup fixture:
///
/// ```json
/// {
///   "artists": ["A", "B"],
///   "popularity": {"A": 10, "B": null},
///   "top_tracks": {"A": [{"id": "t1", "artists": ["A"]}]}
/// }
/// ```
///
/// Artists with a `null` or missing popularity are unknown to the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFixture {
    pub artists: Vec<String>,
    #[serde(default)]
    pub popularity: FxHashMap<String, Option<u32>>,
    #[serde(default)]
    pub top_tracks: FxHashMap<String, Vec<CandidateTrack>>,
}

impl CatalogFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// A playlist created on an [`InMemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPlaylist {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub tracks: Vec<String>,
}

/// Catalog backed by plain maps. Search is exact on the canonical name.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    artists: FxHashMap<String, CatalogArtist>,
    top_tracks: FxHashMap<String, Vec<CandidateTrack>>,
    refused: FxHashSet<String>,
    playlists: Mutex<Vec<StoredPlaylist>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artist; its catalog id is its display name.
    pub fn with_artist(mut self, name: &str, popularity: u32, tracks: Vec<CandidateTrack>) -> Self {
        let artist = CatalogArtist {
            id: name.to_string(),
            name: name.to_string(),
            popularity,
        };
        self.top_tracks.insert(artist.id.clone(), tracks);
        self.artists.insert(normalize(name), artist);
        self
    }

    /// Make `add_tracks` fail for any chunk containing `track_id`.
    pub fn refusing(mut self, track_id: &str) -> Self {
        self.refused.insert(track_id.to_string());
        self
    }

    pub fn from_fixture(fixture: &CatalogFixture) -> Self {
        let mut catalog = Self::new();
        for name in &fixture.artists {
            if let Some(Some(popularity)) = fixture.popularity.get(name) {
                let tracks = fixture.top_tracks.get(name).cloned().unwrap_or_default();
                catalog = catalog.with_artist(name, *popularity, tracks);
            }
        }
        catalog
    }

    pub fn playlists(&self) -> Vec<StoredPlaylist> {
        self.playlists.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Catalog for InMemoryCatalog {
    fn find_artist(&self, name: &str) -> Result<Option<CatalogArtist>> {
        Ok(self.artists.get(&normalize(name)).cloned())
    }

    fn top_tracks(&self, artist_id: &str) -> Result<Vec<CandidateTrack>> {
        Ok(self.top_tracks.get(artist_id).cloned().unwrap_or_default())
    }

    fn current_user_id(&self) -> Result<String> {
        Ok("offline".to_string())
    }

    fn create_playlist(&self, user_id: &str, name: &str) -> Result<String> {
        let mut playlists = self
            .playlists
            .lock()
            .map_err(|_| anyhow::anyhow!("playlist store poisoned"))?;
        let id = format!("playlist-{}", playlists.len() + 1);
        playlists.push(StoredPlaylist {
            id: id.clone(),
            owner: user_id.to_string(),
            name: name.to_string(),
            tracks: Vec::new(),
        });
        Ok(id)
    }

    fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        if track_ids.len() > ADD_TRACKS_CHUNK {
            bail!("at most {} tracks per request", ADD_TRACKS_CHUNK);
        }
        if let Some(bad) = track_ids.iter().find(|id| self.refused.contains(*id)) {
            bail!("track {} refused", bad);
        }
        let mut playlists = self
            .playlists
            .lock()
            .map_err(|_| anyhow::anyhow!("playlist store poisoned"))?;
        let Some(playlist) = playlists.iter_mut().find(|p| p.id == playlist_id) else {
            bail!("unknown playlist {}", playlist_id);
        };
        playlist.tracks.extend_from_slice(track_ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_search_is_canonical() {
        let catalog = InMemoryCatalog::new().with_artist("Sigur Rós", 70, vec![]);
        let found = catalog.find_artist("sigur ros").unwrap().unwrap();
        assert_eq!(found.name, "Sigur Rós");
        assert_eq!(found.popularity, 70);
        assert!(catalog.find_artist("Sigur").unwrap().is_none());
    }

    #[test]
    fn test_in_memory_playlist_lifecycle() {
        let catalog = InMemoryCatalog::new().refusing("bad");
        let id = catalog.create_playlist("me", "Fest").unwrap();
        catalog.add_tracks(&id, &["a".into(), "b".into()]).unwrap();
        assert!(catalog.add_tracks(&id, &["bad".into()]).is_err());
        assert!(catalog.add_tracks("nope", &["c".into()]).is_err());

        let playlists = catalog.playlists();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].name, "Fest");
        assert_eq!(playlists[0].tracks, ["a", "b"]);
    }

    #[test]
    fn test_fixture_skips_unknown_artists() {
        let fixture: CatalogFixture = serde_json::from_str(
            r#"{
                "artists": ["A", "B", "C"],
                "popularity": {"A": 10, "B": null},
                "top_tracks": {"A": [{"id": "t1", "artists": ["A"]}]}
            }"#,
        )
        .unwrap();
        let catalog = InMemoryCatalog::from_fixture(&fixture);
        assert!(catalog.find_artist("A").unwrap().is_some());
        assert!(catalog.find_artist("B").unwrap().is_none());
        assert!(catalog.find_artist("C").unwrap().is_none());
        assert_eq!(catalog.top_tracks("A").unwrap().len(), 1);
    }
}
