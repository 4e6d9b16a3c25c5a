// Error types for Emotify

use thiserror::Error;

/// Main error type for Emotify
#[derive(Debug, Error)]
pub enum EmotifyError {
    #[error("Camera initialization failed: {0}")]
    CameraInit(String),

    #[error("Frame processing failed: {0}")]
    FrameProcessing(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Face detection failed: {0}")]
    FaceDetection(String),

    #[error("Emotion classification failed: {0}")]
    Classification(String),

    #[error("Song catalog error: {0}")]
    Catalog(String),

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Spotify API error: {0}")]
    Spotify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Emotify operations
pub type Result<T> = std::result::Result<T, EmotifyError>;

// Conversion from nokhwa errors
#[cfg(feature = "camera")]
impl From<nokhwa::NokhwaError> for EmotifyError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        match err {
            nokhwa::NokhwaError::OpenDeviceError(device, error) => {
                EmotifyError::CameraInit(format!("Device {device}: {error}"))
            }
            nokhwa::NokhwaError::ReadFrameError(error) => EmotifyError::FrameProcessing(error),
            _ => EmotifyError::CameraInit(err.to_string()),
        }
    }
}

// Conversion from OpenCV errors
#[cfg(feature = "opencv")]
impl From<opencv::Error> for EmotifyError {
    fn from(err: opencv::Error) -> Self {
        EmotifyError::FaceDetection(err.to_string())
    }
}

// Conversion from ONNX Runtime errors
#[cfg(feature = "onnx")]
impl From<ort::Error> for EmotifyError {
    fn from(err: ort::Error) -> Self {
        EmotifyError::Classification(err.to_string())
    }
}
