//! Spotify catalog on top of `rspotify`'s blocking (ureq) client.
//!
//! [`SpotifyAuth`] runs the authorization-code flow; once a token is in hand
//! it turns into a [`SpotifyClient`], the live [`Catalog`].

use anyhow::{bail, Context, Result};
use rspotify::http::HttpError;
use rspotify::model::{
    ArtistId, Country, Market, PlayableId, PlaylistId, SearchResult, SearchType, TrackId, UserId,
};
use rspotify::prelude::*;
use rspotify::{scopes, AuthCodeSpotify, ClientError, ClientResult, Credentials, OAuth};
use std::thread;
use std::time::Duration;
use tracing::warn;

use crate::catalog::Catalog;
use crate::error::AuthError;
use crate::models::{CandidateTrack, CatalogArtist};

/// Retries of a single request answered with HTTP 429.
const RATE_LIMIT_RETRIES: u32 = 3;

/// Wait used when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

// ============================================================================
// Authorization
// ============================================================================

/// Authorization-code flow for one session.
///
/// The authorize URL embeds a random `state`; a pasted redirect URL is only
/// accepted when it carries the same value.
pub struct SpotifyAuth {
    spotify: AuthCodeSpotify,
}

impl SpotifyAuth {
    /// All three values are required.
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_uri: Option<String>,
    ) -> Result<Self, AuthError> {
        let present = |v: Option<String>, name| {
            v.filter(|s| !s.trim().is_empty())
                .ok_or(AuthError::MissingCredential(name))
        };
        let client_id = present(client_id, "SPOTIPY_CLIENT_ID")?;
        let client_secret = present(client_secret, "SPOTIPY_CLIENT_SECRET")?;
        let redirect_uri = present(redirect_uri, "SPOTIPY_REDIRECT_URI")?;

        let oauth = OAuth {
            redirect_uri,
            scopes: scopes!("playlist-modify-public", "playlist-modify-private"),
            ..Default::default()
        };
        let creds = Credentials::new(&client_id, &client_secret);
        Ok(Self {
            spotify: AuthCodeSpotify::new(creds, oauth),
        })
    }

    /// URL the user opens to grant access.
    pub fn authorize_url(&self) -> Result<String, AuthError> {
        self.spotify
            .get_authorize_url(false)
            .map_err(AuthError::AuthorizeUrl)
    }

    /// Accepts the redirect URL of this session, `code=<code>`, or the bare code.
    pub fn extract_code(&self, input: &str) -> Result<String, AuthError> {
        let input = input.trim();
        if input.contains("://") {
            return self
                .spotify
                .parse_response_code(input)
                .ok_or_else(|| AuthError::NoCode(input.to_string()));
        }

        let code = input.strip_prefix("code=").unwrap_or(input);
        let code = code.split('&').next().unwrap_or_default();
        if code.is_empty() || code.contains(char::is_whitespace) || code.contains('=') {
            return Err(AuthError::NoCode(input.to_string()));
        }
        Ok(code.to_string())
    }

    /// Trade the code for a token and hand back an authenticated client.
    pub fn connect(self, code: &str, market: Market) -> Result<SpotifyClient, AuthError> {
        self.spotify
            .request_token(code)
            .map_err(AuthError::TokenExchange)?;
        Ok(SpotifyClient {
            spotify: self.spotify,
            market,
        })
    }
}

/// Market from an ISO country code (`US`, `es`) or `from_token`.
pub fn parse_market(code: &str) -> Result<Market> {
    if code.eq_ignore_ascii_case("from_token") {
        return Ok(Market::FromToken);
    }
    let country: Country =
        serde_json::from_value(serde_json::Value::String(code.to_ascii_uppercase()))
            .with_context(|| format!("unknown market '{}'", code))?;
    Ok(Market::Country(country))
}

/// Wait requested by a rate-limited (429) response.
fn retry_after(err: &ClientError) -> Option<Duration> {
    let ClientError::Http(http) = err else {
        return None;
    };
    let HttpError::StatusCode(response) = http.as_ref() else {
        return None;
    };
    if response.status() != 429 {
        return None;
    }
    Some(
        response
            .header("Retry-After")
            .and_then(|v| v.trim().parse().ok())
            .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs),
    )
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated Spotify catalog.
pub struct SpotifyClient {
    spotify: AuthCodeSpotify,
    market: Market,
}

impl SpotifyClient {
    /// Run `call`, sleeping through up to [`RATE_LIMIT_RETRIES`] rate limits.
    fn send<T>(&self, what: &str, call: impl Fn() -> ClientResult<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) => match retry_after(&err) {
                    Some(wait) if attempt < RATE_LIMIT_RETRIES => {
                        attempt += 1;
                        warn!(request = what, wait_secs = wait.as_secs(), attempt, "rate limited");
                        thread::sleep(wait);
                    }
                    _ => return Err(err).with_context(|| what.to_string()),
                },
            }
        }
    }
}

impl Catalog for SpotifyClient {
    fn find_artist(&self, name: &str) -> Result<Option<CatalogArtist>> {
        let query = format!("artist:{name}");
        let result = self.send("artist search", || {
            self.spotify
                .search(&query, SearchType::Artist, None, None, Some(1), None)
        })?;
        let SearchResult::Artists(page) = result else {
            bail!("artist search for '{}' returned no artist page", name);
        };
        Ok(page.items.into_iter().next().map(|a| CatalogArtist {
            id: a.id.id().to_string(),
            name: a.name,
            popularity: a.popularity,
        }))
    }

    fn top_tracks(&self, artist_id: &str) -> Result<Vec<CandidateTrack>> {
        let id = ArtistId::from_id(artist_id)
            .with_context(|| format!("invalid artist id '{}'", artist_id))?;
        let tracks = self.send("top tracks", || {
            self.spotify
                .artist_top_tracks(id.clone(), Some(self.market.clone()))
        })?;
        // Local files have no id
        Ok(tracks
            .into_iter()
            .filter_map(|t| {
                let id = t.id?.id().to_string();
                Some(CandidateTrack::new(id, t.artists.into_iter().map(|a| a.name)))
            })
            .collect())
    }

    fn current_user_id(&self) -> Result<String> {
        let me = self.send("current user", || self.spotify.current_user())?;
        Ok(me.id.id().to_string())
    }

    fn create_playlist(&self, user_id: &str, name: &str) -> Result<String> {
        let user = UserId::from_id(user_id)
            .with_context(|| format!("invalid user id '{}'", user_id))?;
        let playlist = self.send("create playlist", || {
            self.spotify
                .user_playlist_create(user.clone(), name, Some(true), None, None)
        })?;
        Ok(playlist.id.id().to_string())
    }

    fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let playlist = PlaylistId::from_id(playlist_id)
            .with_context(|| format!("invalid playlist id '{}'", playlist_id))?;
        let items = track_ids
            .iter()
            .map(|id| TrackId::from_id(id.as_str()).map(PlayableId::Track))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid track id")?;
        self.send("add tracks", || {
            self.spotify
                .playlist_add_items(playlist.clone(), items.iter().cloned(), None)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> SpotifyAuth {
        SpotifyAuth::new(
            Some("abc123".into()),
            Some("secret".into()),
            Some("http://localhost:8888/callback".into()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_reports_missing_value() {
        let err = SpotifyAuth::new(Some("id".into()), Some("  ".into()), None).err().unwrap();
        assert!(matches!(err, AuthError::MissingCredential("SPOTIPY_CLIENT_SECRET")));
    }

    #[test]
    fn test_authorize_url_carries_client_and_scopes() {
        let url = auth().authorize_url().unwrap();
        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=abc123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("playlist-modify-public"));
        assert!(url.contains("playlist-modify-private"));
    }

    #[test]
    fn test_extract_code_from_session_redirect() {
        let auth = auth();
        let state = auth.spotify.get_oauth().state.clone();
        let url = format!("http://localhost:8888/callback?code=AQB-x_9&state={state}");
        assert_eq!(auth.extract_code(&url).unwrap(), "AQB-x_9");
    }

    #[test]
    fn test_extract_code_rejects_foreign_state() {
        let url = "http://localhost:8888/callback?code=AQB&state=someone-else";
        assert!(matches!(auth().extract_code(url), Err(AuthError::NoCode(_))));
    }

    #[test]
    fn test_extract_code_query_fragment() {
        let auth = auth();
        assert_eq!(auth.extract_code("code=abc").unwrap(), "abc");
        assert_eq!(auth.extract_code("code=abc&state=1").unwrap(), "abc");
        assert_eq!(auth.extract_code("AQBxyz\n").unwrap(), "AQBxyz");
    }

    #[test]
    fn test_extract_code_rejects_url_without_code() {
        let auth = auth();
        assert!(matches!(
            auth.extract_code("http://localhost/cb?error=access_denied"),
            Err(AuthError::NoCode(_))
        ));
        assert!(matches!(auth.extract_code(""), Err(AuthError::NoCode(_))));
        assert!(matches!(auth.extract_code("error=access_denied"), Err(AuthError::NoCode(_))));
    }

    #[test]
    fn test_parse_market() {
        assert!(matches!(
            parse_market("us").unwrap(),
            Market::Country(Country::UnitedStates)
        ));
        assert!(matches!(parse_market("ES").unwrap(), Market::Country(Country::Spain)));
        assert!(matches!(parse_market("from_token").unwrap(), Market::FromToken));
        assert!(parse_market("Atlantis").is_err());
    }
}
