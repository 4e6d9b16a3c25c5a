// Song catalog loaded from the mood CSV

use crate::error::{EmotifyError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Most songs returned by one lookup
pub const MAX_RECOMMENDATIONS: usize = 10;

const REQUIRED_COLUMNS: [&str; 3] = ["name", "artist", "mood"];

/// One row of the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub name: String,
    pub artist: String,
    pub mood: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub spotify_id: Option<String>,
    #[serde(default)]
    pub album_cover: Option<String>,
    /// Spotify track id column used by the playlist tool
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}

impl Song {
    /// Spotify track id, preferring the `id` column
    pub fn track_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.spotify_id.as_deref())
    }
}

/// All songs in the CSV plus its header
#[derive(Clone, Debug, Default)]
pub struct SongCatalog {
    columns: Vec<String>,
    songs: Vec<Song>,
}

impl SongCatalog {
    /// Reads the catalog from a CSV file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EmotifyError::Catalog(format!(
                "CSV file not found at {}",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        let catalog = Self::from_reader(file)?;
        debug!("Loaded {} songs from {}", catalog.songs.len(), path.display());
        Ok(catalog)
    }

    /// Reads the catalog from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        // Short rows leave their trailing optional columns empty
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|required| !columns.iter().any(|c| c == required))
            .collect();
        if !missing.is_empty() {
            return Err(EmotifyError::Catalog(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }

        let songs = reader
            .deserialize()
            .collect::<std::result::Result<Vec<Song>, _>>()?;
        Ok(Self { columns, songs })
    }

    /// Header names in file order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Random selection of up to `MAX_RECOMMENDATIONS` songs whose mood
    /// matches, ignoring case
    pub fn lookup<R: Rng + ?Sized>(&self, mood: &str, rng: &mut R) -> Vec<Song> {
        let wanted = mood.to_lowercase();
        let matching: Vec<&Song> = self
            .songs
            .iter()
            .filter(|song| song.mood.to_lowercase() == wanted)
            .collect();

        if matching.is_empty() {
            warn!("No songs found for mood: {}", mood);
            return Vec::new();
        }

        matching
            .choose_multiple(rng, MAX_RECOMMENDATIONS)
            .map(|&song| song.clone())
            .collect()
    }

    /// Songs whose mood equals `mood` exactly
    pub fn with_exact_mood<'a>(&'a self, mood: &'a str) -> impl Iterator<Item = &'a Song> + 'a {
        self.songs.iter().filter(move |song| song.mood == mood)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;
    use std::io::Write;

    const SMALL: &str = "\
name,artist,mood,link,spotify_id,album_cover
Walking on Sunshine,Katrina,Happy,https://example.com/1,id1,
Good as Hell,Lizzo,Happy,,id2,cover2
Someone Like You,Adele,Sad,,,
";

    fn names(songs: &[Song]) -> BTreeSet<String> {
        songs.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn lookup_ignores_case() {
        let catalog = SongCatalog::from_reader(SMALL.as_bytes()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let lower = catalog.lookup("happy", &mut rng);
        let upper = catalog.lookup("HAPPY", &mut rng);

        assert_eq!(lower.len(), 2);
        assert_eq!(names(&lower), names(&upper));
        assert!(lower.iter().all(|s| s.mood == "Happy"));
    }

    #[test]
    fn unknown_mood_gives_empty_list() {
        let catalog = SongCatalog::from_reader(SMALL.as_bytes()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(catalog.lookup("Energetic", &mut rng).is_empty());
    }

    #[test]
    fn lookup_is_capped_and_distinct() {
        let mut csv = String::from("name,artist,mood\n");
        for i in 0..25 {
            csv.push_str(&format!("song{i},artist{i},Calm\n"));
        }
        let catalog = SongCatalog::from_reader(csv.as_bytes()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let picked = catalog.lookup("calm", &mut rng);
        assert_eq!(picked.len(), MAX_RECOMMENDATIONS);
        assert_eq!(names(&picked).len(), MAX_RECOMMENDATIONS);
    }

    #[test]
    fn seeded_lookup_is_reproducible() {
        let mut csv = String::from("name,artist,mood\n");
        for i in 0..30 {
            csv.push_str(&format!("song{i},artist{i},Sad\n"));
        }
        let catalog = SongCatalog::from_reader(csv.as_bytes()).unwrap();

        let first = catalog.lookup("Sad", &mut StdRng::seed_from_u64(42));
        let second = catalog.lookup("Sad", &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn optional_columns_default_to_none() {
        let catalog = SongCatalog::from_reader("name,artist,mood\nA,B,Happy\n".as_bytes()).unwrap();
        let song = &catalog.lookup("Happy", &mut StdRng::seed_from_u64(0))[0];
        assert_eq!(song.link, None);
        assert_eq!(song.spotify_id, None);
        assert_eq!(song.album_cover, None);

        let json = serde_json::to_value(song).unwrap();
        assert!(json["link"].is_null());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn empty_optional_cells_are_none() {
        let catalog = SongCatalog::from_reader(SMALL.as_bytes()).unwrap();
        let adele = catalog.with_exact_mood("Sad").next().unwrap();
        assert_eq!(adele.spotify_id, None);
        assert_eq!(adele.link, None);
    }

    #[test]
    fn short_rows_leave_trailing_columns_empty() {
        let csv = "name,artist,mood,link,spotify_id\nA,B,Happy,http://x,sp1\nC,D,Happy\n";
        let catalog = SongCatalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);

        let short = catalog.with_exact_mood("Happy").find(|s| s.name == "C").unwrap();
        assert_eq!(short.artist, "D");
        assert_eq!(short.link, None);
        assert_eq!(short.spotify_id, None);
    }

    #[test]
    fn missing_required_columns_are_reported() {
        let err = SongCatalog::from_reader("title,mood\nA,Happy\n".as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Song catalog error: Missing required columns: name, artist"
        );
    }

    #[test]
    fn exact_mood_filter_is_case_sensitive() {
        let catalog = SongCatalog::from_reader(SMALL.as_bytes()).unwrap();
        assert_eq!(catalog.with_exact_mood("Happy").count(), 2);
        assert_eq!(catalog.with_exact_mood("happy").count(), 0);
    }

    #[test]
    fn track_id_prefers_id_column() {
        let csv = "name,artist,mood,id,spotify_id\nA,B,Happy,abc,def\nC,D,Happy,,ghi\n";
        let catalog = SongCatalog::from_reader(csv.as_bytes()).unwrap();
        let ids: Vec<_> = catalog.with_exact_mood("Happy").map(|s| s.track_id()).collect();
        assert_eq!(ids, vec![Some("abc"), Some("ghi")]);
    }

    #[test]
    fn load_reads_file_and_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();

        let catalog = SongCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.columns(),
            ["name", "artist", "mood", "link", "spotify_id", "album_cover"]
        );
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = SongCatalog::load("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, EmotifyError::Catalog(_)));
    }
}
