// Creates a Spotify playlist for the mood stored in a text file and writes the playlist id back

use anyhow::{bail, Context, Result};
use clap::Parser;
use emotify::catalog::SongCatalog;
use emotify::playlist::{
    read_mood, select_tracks, write_playlist_id, Credentials, SpotifyClient, MAX_PLAYLIST_TRACKS,
    SPOTIFY_ACCOUNTS_BASE, SPOTIFY_API_BASE,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "emotify-playlist")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Create a Spotify playlist for the detected mood")]
struct Cli {
    /// File holding the mood; receives the playlist id afterwards
    #[arg(long, default_value = "new.txt")]
    mood_file: PathBuf,

    /// CSV file with name, artist, mood and id columns
    #[arg(long, env = "EMOTIFY_SONGS_CSV", default_value = "data/data_moods.csv")]
    songs_csv: PathBuf,

    /// Maximum number of tracks to add
    #[arg(long, default_value_t = MAX_PLAYLIST_TRACKS)]
    tracks: usize,

    /// Ready-to-use access token with playlist-modify-public scope
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,
}

impl Cli {
    fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = &self.access_token {
            return Ok(Credentials::AccessToken(token.clone()));
        }
        match (&self.client_id, &self.client_secret, &self.refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Ok(Credentials::RefreshToken {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                })
            }
            _ => bail!(
                "set SPOTIFY_ACCESS_TOKEN, or SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REFRESH_TOKEN"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let credentials = cli.credentials()?;

    let catalog = SongCatalog::load(&cli.songs_csv)
        .with_context(|| format!("reading {}", cli.songs_csv.display()))?;
    if catalog.is_empty() {
        bail!("{} has no songs", cli.songs_csv.display());
    }

    let mood = read_mood(&cli.mood_file)
        .with_context(|| format!("reading mood from {}", cli.mood_file.display()))?;
    let uris = select_tracks(&catalog, &mood, cli.tracks, &mut rand::thread_rng())?;
    info!("Selected {} tracks for {}", uris.len(), mood);

    let client = SpotifyClient::connect(
        reqwest::Client::new(),
        credentials,
        SPOTIFY_ACCOUNTS_BASE,
        SPOTIFY_API_BASE,
    )
    .await?;
    let playlist_id = client.create_mood_playlist(&mood, &uris).await?;

    write_playlist_id(&cli.mood_file, &playlist_id)?;
    println!("Created {mood} playlist: {playlist_id}");
    Ok(())
}
