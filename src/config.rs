// Command line and environment configuration for the server

use crate::routes::DEFAULT_UPLOAD_LIMIT;
use crate::session::DEFAULT_CAMERA_FRAMES;
use clap::Parser;
use std::path::PathBuf;

/// Emotify - recommend songs for the mood on your face
#[derive(Debug, Clone, Parser)]
#[command(name = "emotify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Detects a mood from a webcam or photo and recommends matching songs")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "EMOTIFY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "EMOTIFY_PORT", default_value_t = 5000)]
    pub port: u16,

    /// CSV file with name, artist and mood columns
    #[arg(long, env = "EMOTIFY_SONGS_CSV", default_value = "data/data_moods.csv")]
    pub songs_csv: PathBuf,

    /// Haar cascade used to find faces
    #[arg(
        long,
        env = "EMOTIFY_CASCADE",
        default_value = "assets/models/haarcascade_frontalface_default.xml"
    )]
    pub cascade: String,

    /// ONNX emotion classifier (48x48 grayscale input, 7 outputs)
    #[arg(long, env = "EMOTIFY_MODEL", default_value = "assets/models/emotion.onnx")]
    pub model: String,

    /// Webcam index used for GET /recommendations
    #[arg(long, env = "EMOTIFY_CAMERA_INDEX", default_value_t = 0)]
    pub camera_index: u32,

    /// Frames captured per webcam request
    #[arg(long, env = "EMOTIFY_CAMERA_FRAMES", default_value_t = DEFAULT_CAMERA_FRAMES)]
    pub camera_frames: usize,

    /// Maximum upload size in bytes
    #[arg(long, env = "EMOTIFY_UPLOAD_LIMIT", default_value_t = DEFAULT_UPLOAD_LIMIT)]
    pub upload_limit: usize,

    /// Seed for song sampling; random when unset
    #[arg(long, env = "EMOTIFY_SEED")]
    pub seed: Option<u64>,

    /// Also write logs to this file
    #[arg(long, env = "EMOTIFY_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_port_5000() {
        let config = ServerConfig::try_parse_from(["emotify"]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.camera_frames, 50);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "emotify",
            "--port",
            "8080",
            "--songs-csv",
            "/tmp/songs.csv",
            "--camera-frames",
            "10",
            "--seed",
            "9",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.songs_csv, PathBuf::from("/tmp/songs.csv"));
        assert_eq!(config.camera_frames, 10);
        assert_eq!(config.seed, Some(9));
    }
}
