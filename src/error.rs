//! Error types for the playlist builder.
//!
//! Library modules return these typed errors; the binaries wrap everything in
//! `anyhow` and attach context as they go.

use std::path::PathBuf;

/// Problems with the festival lineup handed to the builder.
#[derive(Debug, thiserror::Error)]
pub enum LineupError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON root is not an object")]
    NotAnObject,

    #[error("\"artists\" key not found")]
    MissingArtists,

    #[error("\"artists\" is not a list")]
    ArtistsNotAList,

    #[error("All artists must be strings")]
    NonStringArtist,

    /// Two lineup entries fold to the same canonical name.
    #[error("duplicate artist: '{second}' is the same artist as '{first}'")]
    DuplicateArtist { first: String, second: String },
}

/// Failures of the Spotify authorization-code flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Spotify credentials are not set (missing {0})")]
    MissingCredential(&'static str),

    #[error("cannot build the authorization URL: {0}")]
    AuthorizeUrl(#[source] rspotify::ClientError),

    #[error("no authorization code found in '{0}'")]
    NoCode(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(#[source] rspotify::ClientError),
}
