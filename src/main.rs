use anyhow::Context;
use clap::Parser;
use emotify::camera::CameraProvider;
use emotify::config::ServerConfig;
use emotify::emotion::InferenceContext;
use emotify::routes::{router, AppState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes logging to stderr, plus a plain-text log file when configured
fn init_logging(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &config.log_file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(log_file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(feature = "camera")]
fn camera_provider(config: &ServerConfig) -> Arc<dyn CameraProvider> {
    Arc::new(emotify::camera::WebcamProvider::new(config.camera_index))
}

#[cfg(not(feature = "camera"))]
fn camera_provider(_config: &ServerConfig) -> Arc<dyn CameraProvider> {
    warn!("Built without the `camera` feature; GET /recommendations will report a Calm mood");
    Arc::new(emotify::camera::NoCamera)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config)?;

    let inference = InferenceContext::from_model_files(&config.cascade, &config.model)
        .context("loading face and emotion models")?;
    info!("Models loaded successfully");

    if !config.songs_csv.exists() {
        warn!("Song catalog {} does not exist yet", config.songs_csv.display());
    }

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let state = AppState::new(
        inference,
        camera_provider(&config),
        config.songs_csv.clone(),
        rng,
    )
    .with_camera_frames(config.camera_frames)
    .with_upload_limit(config.upload_limit);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Listening on {}", address);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
