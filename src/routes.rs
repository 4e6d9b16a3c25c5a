// HTTP routes for mood detection and song recommendations

use crate::aggregator::Tally;
use crate::camera::CameraProvider;
use crate::catalog::{Song, SongCatalog};
use crate::emotion::InferenceContext;
use crate::error::EmotifyError;
use crate::models::Mood;
use crate::session::{DetectionSession, SessionReport, DEFAULT_CAMERA_FRAMES};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rand::rngs::StdRng;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Extensions accepted for uploaded photos
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Default request body limit for uploads
pub const DEFAULT_UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

/// Shared state injected into every handler
#[derive(Clone)]
pub struct AppState {
    inference: Arc<Mutex<InferenceContext>>,
    camera: Arc<dyn CameraProvider>,
    songs_csv: Arc<PathBuf>,
    rng: Arc<Mutex<StdRng>>,
    camera_frames: usize,
    upload_limit: usize,
}

impl AppState {
    pub fn new(
        inference: InferenceContext,
        camera: Arc<dyn CameraProvider>,
        songs_csv: PathBuf,
        rng: StdRng,
    ) -> Self {
        Self {
            inference: Arc::new(Mutex::new(inference)),
            camera,
            songs_csv: Arc::new(songs_csv),
            rng: Arc::new(Mutex::new(rng)),
            camera_frames: DEFAULT_CAMERA_FRAMES,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn with_camera_frames(mut self, frames: usize) -> Self {
        self.camera_frames = frames;
        self
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }
}

/// Errors returned to HTTP clients as `{"status": "error", "message": ...}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Emotify(#[from] EmotifyError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::BadRequest(_) | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Emotify(EmotifyError::InvalidUpload(_)) => StatusCode::BAD_REQUEST,
            ApiError::Emotify(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status_code.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status_code, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub status: &'static str,
    pub mood: Mood,
    pub recommended_songs: Vec<Song>,
    /// Per-label face counts behind the mood
    pub emotions: Tally,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub sample_recommendations: Vec<Song>,
    pub csv_columns: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.upload_limit;
    Router::new()
        .route(
            "/recommendations",
            get(camera_recommendations).post(upload_recommendations),
        )
        .route("/test", get(diagnostics))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /recommendations: analyse a burst of webcam frames
async fn camera_recommendations(
    State(state): State<AppState>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    info!("Detecting mood from webcam");
    let session_state = state.clone();
    let report = run_blocking(move || {
        let report = DetectionSession::new(&session_state.inference)
            .run_camera(session_state.camera.as_ref(), session_state.camera_frames);
        Ok(report)
    })
    .await?;
    recommend(&state, report).await
}

/// POST /recommendations: analyse an uploaded photo
async fn upload_recommendations(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let multipart =
        multipart.map_err(|_| ApiError::BadRequest("No file provided".to_string()))?;
    let (filename, bytes) = read_upload(multipart).await?;
    info!("Processing uploaded image: {} ({} bytes)", filename, bytes.len());

    let session_state = state.clone();
    let report = run_blocking(move || {
        let report = DetectionSession::new(&session_state.inference).run_image(&bytes);
        Ok(report)
    })
    .await?;
    recommend(&state, report).await
}

/// GET /test: sample Happy recommendations and the CSV header
async fn diagnostics(State(state): State<AppState>) -> Result<Json<DiagnosticResponse>, ApiError> {
    let catalog = load_catalog(&state).await?;
    let sample_recommendations = {
        let mut rng = lock_rng(&state)?;
        catalog.lookup(Mood::Happy.as_str(), &mut *rng)
    };
    Ok(Json(DiagnosticResponse {
        status: "success",
        message: "API is working",
        sample_recommendations,
        csv_columns: catalog.columns().to_vec(),
    }))
}

async fn recommend(
    state: &AppState,
    report: SessionReport,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let mood = report.mood();
    info!("Detected mood: {}", mood);

    let catalog = load_catalog(state).await?;
    let recommended_songs = {
        let mut rng = lock_rng(state)?;
        catalog.lookup(mood.as_str(), &mut *rng)
    };
    info!("Found {} recommendations", recommended_songs.len());

    Ok(Json(RecommendationResponse {
        status: "success",
        mood,
        recommended_songs,
        emotions: report.tally,
    }))
}

/// Pulls the `file` field out of the form and validates its name
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        // Text fields named `file` carry no upload
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            return Err(EmotifyError::InvalidUpload("No selected file".to_string()).into());
        }
        if !allowed_file(&filename) {
            return Err(EmotifyError::InvalidUpload("Invalid file type".to_string()).into());
        }
        let bytes = field.bytes().await?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(EmotifyError::InvalidUpload("No file provided".to_string()).into())
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

async fn load_catalog(state: &AppState) -> Result<SongCatalog, ApiError> {
    let path = state.songs_csv.clone();
    run_blocking(move || Ok(SongCatalog::load(path.as_path())?)).await
}

async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::Internal(format!("Worker task failed: {e}")))?
}

fn lock_rng(state: &AppState) -> Result<std::sync::MutexGuard<'_, StdRng>, ApiError> {
    state
        .rng
        .lock()
        .map_err(|_| ApiError::Internal("Random source is unavailable".to_string()))
}
