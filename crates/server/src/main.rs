mod api_error;
mod routes;
mod settings;
mod state;

use std::future::Future;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use moodscan_core::camera::camera_manager::{CameraConfig, CameraManager};
use moodscan_core::camera::infrastructure::default_opener;
use moodscan_core::camera::overlay::OverlayRenderer;
use moodscan_core::camera::shared_camera::SharedCamera;
use moodscan_core::classification::emotion_classifier::EmotionClassifier;
use moodscan_core::detection::domain::face_detection_stage::FaceDetectionStage;
use moodscan_core::detection::domain::face_detector::FaceDetector;
use moodscan_core::detection::infrastructure::yunet_detector::YunetDetector;
use moodscan_core::inference::domain::inference_engine::InferenceEngine;
use moodscan_core::inference::infrastructure::model_resolver;
use moodscan_core::inference::infrastructure::onnx_model::OnnxModel;
use moodscan_core::media::infrastructure::image_file_writer::ImageFileWriter;
use moodscan_core::pipeline::emotion_analyzer::{AnalyzerConfig, EmotionAnalyzer};
use moodscan_core::pipeline::frame_analyzer::FrameAnalyzer;
use moodscan_core::shared::constants::{ModelSpec, EMOTION_MODEL, FACE_DETECTOR_MODEL};
use moodscan_core::shared::error::LoadError;
use moodscan_core::stats::analysis_store::InMemoryAnalysisStore;

use crate::settings::{Overrides, Settings};
use crate::state::AppState;

/// Face emotion analysis over HTTP, with a live camera stream.
#[derive(Parser)]
#[command(name = "moodscan", version)]
struct Cli {
    /// JSON settings file (defaults to the user config directory).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory holding the ONNX model files.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Root directory for uploads and stored face crops.
    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8000.
    #[arg(long)]
    bind: Option<String>,

    /// Camera device opened on first use.
    #[arg(long)]
    camera: Option<u32>,

    /// Minimum milliseconds between live detections.
    #[arg(long)]
    detection_interval_ms: Option<u64>,

    /// TrueType font for overlay labels.
    #[arg(long)]
    overlay_font: Option<PathBuf>,

    /// Download missing models into the user cache directory.
    #[arg(long)]
    download_models: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            models_dir: self.models_dir.clone(),
            media_root: self.media_root.clone(),
            bind: self.bind.clone(),
            camera: self.camera,
            detection_interval_ms: self.detection_interval_ms,
            overlay_font: self.overlay_font.clone(),
            download_models: self.download_models,
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::discover(cli.settings.as_deref())?.with_overrides(cli.overrides());
    validate(&settings)?;

    // Models load before the async runtime exists: the resolver downloads
    // with a blocking client.
    let analyzer = Arc::new(build_analyzer(&settings)?);
    let camera = Arc::new(build_camera(&settings, analyzer.clone())?);
    let state = AppState::new(
        analyzer,
        camera.clone(),
        Arc::new(InMemoryAnalysisStore::new()),
        settings.media_root.clone(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(state, &settings.bind, camera.clone()))?;

    camera.release_shared();
    Ok(())
}

async fn serve(
    state: AppState,
    bind: &str,
    camera: Arc<SharedCamera>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_after(ctrl_c(), camera))
        .await?;
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Releases the camera once `signal` fires. Open video streams end when the
/// camera is released, so graceful shutdown does not wait on them.
async fn shutdown_after(signal: impl Future<Output = ()>, camera: Arc<SharedCamera>) {
    signal.await;
    log::info!("Shutting down");
    if let Err(e) = tokio::task::spawn_blocking(move || camera.release_shared()).await {
        log::warn!("Camera release failed during shutdown: {e}");
    }
}

fn build_analyzer(settings: &Settings) -> Result<EmotionAnalyzer, LoadError> {
    let detector_model: Arc<dyn InferenceEngine> =
        Arc::new(OnnxModel::load(&resolve_model(&FACE_DETECTOR_MODEL, settings)?)?);
    let emotion_model: Arc<dyn InferenceEngine> =
        Arc::new(OnnxModel::load(&resolve_model(&EMOTION_MODEL, settings)?)?);

    let detector: Arc<dyn FaceDetector> = Arc::new(YunetDetector::new(detector_model));
    Ok(EmotionAnalyzer::new(
        FaceDetectionStage::new(detector),
        EmotionClassifier::new(emotion_model),
        Box::new(ImageFileWriter::new()),
        AnalyzerConfig::new(settings.media_root.clone()),
    ))
}

fn build_camera(
    settings: &Settings,
    analyzer: Arc<EmotionAnalyzer>,
) -> Result<SharedCamera, Box<dyn std::error::Error>> {
    let overlay = match &settings.overlay_font {
        Some(path) => OverlayRenderer::from_font_file(path)?,
        None => OverlayRenderer::new(),
    };
    let config = CameraConfig {
        detection_interval: Duration::from_millis(settings.detection_interval_ms),
        ..CameraConfig::default()
    };
    let opener = default_opener();
    let frame_analyzer: Arc<dyn FrameAnalyzer> = analyzer;
    Ok(SharedCamera::new(settings.camera, move || {
        CameraManager::new(
            opener.clone(),
            frame_analyzer.clone(),
            overlay.clone(),
            config.clone(),
        )
    }))
}

fn resolve_model(model: &ModelSpec, settings: &Settings) -> Result<PathBuf, LoadError> {
    log::info!("Resolving model: {}", model.file_name);
    let path = model_resolver::resolve(
        model,
        &settings.models_dir,
        settings.download_models,
        Some(Box::new(download_progress)),
    )?;
    log::info!("Using {}", path.display());
    Ok(path)
}

fn validate(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(font) = &settings.overlay_font {
        if !font.is_file() {
            return Err(format!("Overlay font not found: {}", font.display()).into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
