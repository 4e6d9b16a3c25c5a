// Spotify playlist creation for a detected mood

use crate::catalog::SongCatalog;
use crate::error::{EmotifyError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Most tracks added to a generated playlist
pub const MAX_PLAYLIST_TRACKS: usize = 15;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

pub fn playlist_name(mood: &str) -> String {
    format!("{mood} Songs")
}

pub fn playlist_description(mood: &str) -> String {
    format!("{mood} mood playlist")
}

/// Reads the mood written by the detection step
pub fn read_mood(path: &Path) -> Result<String> {
    let mood = std::fs::read_to_string(path)?.trim().to_string();
    if mood.is_empty() {
        return Err(EmotifyError::Catalog(format!(
            "Mood file {} is empty",
            path.display()
        )));
    }
    Ok(mood)
}

/// Replaces the mood file contents with the created playlist id
pub fn write_playlist_id(path: &Path, playlist_id: &str) -> Result<()> {
    std::fs::write(path, playlist_id)?;
    Ok(())
}

/// Picks up to `limit` random track URIs whose mood matches exactly
pub fn select_tracks<R: Rng + ?Sized>(
    catalog: &SongCatalog,
    mood: &str,
    limit: usize,
    rng: &mut R,
) -> Result<Vec<String>> {
    let uris: Vec<String> = catalog
        .with_exact_mood(mood)
        .filter_map(|song| song.track_id())
        .map(|id| format!("spotify:track:{id}"))
        .collect();

    if uris.is_empty() {
        return Err(EmotifyError::Catalog(format!(
            "No songs found for mood: {mood}"
        )));
    }

    Ok(uris.choose_multiple(rng, limit).cloned().collect())
}

/// How the tool obtains a Spotify access token
#[derive(Clone, Debug)]
pub enum Credentials {
    AccessToken(String),
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CurrentUser {
    id: String,
}

#[derive(Serialize)]
struct NewPlaylist<'a> {
    name: &'a str,
    public: bool,
    description: &'a str,
}

#[derive(Deserialize)]
struct Playlist {
    id: String,
}

#[derive(Serialize)]
struct AddTracks<'a> {
    uris: &'a [String],
}

/// Minimal Spotify Web API client
pub struct SpotifyClient {
    http: Client,
    api_base: String,
    access_token: String,
}

impl SpotifyClient {
    pub fn new(http: Client, api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            access_token: access_token.into(),
        }
    }

    /// Builds a client, exchanging a refresh token if needed
    pub async fn connect(
        http: Client,
        credentials: Credentials,
        accounts_base: &str,
        api_base: &str,
    ) -> Result<Self> {
        let access_token = match credentials {
            Credentials::AccessToken(token) => token,
            Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => {
                debug!("Refreshing Spotify access token");
                let response = http
                    .post(format!("{accounts_base}/api/token"))
                    .basic_auth(client_id, Some(client_secret))
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                    ])
                    .send()
                    .await?;
                let token: TokenResponse = check(response).await?.json().await?;
                token.access_token
            }
        };
        Ok(Self::new(http, api_base, access_token))
    }

    pub async fn current_user_id(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/me", self.api_base))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let user: CurrentUser = check(response).await?.json().await?;
        Ok(user.id)
    }

    /// Creates a public playlist and returns its id
    pub async fn create_playlist(&self, user_id: &str, name: &str, description: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/users/{}/playlists", self.api_base, user_id))
            .bearer_auth(&self.access_token)
            .json(&NewPlaylist {
                name,
                public: true,
                description,
            })
            .send()
            .await?;
        let playlist: Playlist = check(response).await?.json().await?;
        Ok(playlist.id)
    }

    pub async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/playlists/{}/tracks", self.api_base, playlist_id))
            .bearer_auth(&self.access_token)
            .json(&AddTracks { uris })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Creates `"<mood> Songs"` for the current user and fills it
    pub async fn create_mood_playlist(&self, mood: &str, uris: &[String]) -> Result<String> {
        let user_id = self.current_user_id().await?;
        let playlist_id = self
            .create_playlist(&user_id, &playlist_name(mood), &playlist_description(mood))
            .await?;
        self.add_tracks(&playlist_id, uris).await?;
        info!("Created {} playlist: {}", mood, playlist_id);
        Ok(playlist_id)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EmotifyError::Spotify(format!("{status}: {body}")))
}
