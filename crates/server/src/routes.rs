use std::convert::Infallible;
use std::fs;
use std::path::{Path as FsPath, PathBuf};
use std::time::Instant;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;

use moodscan_core::camera::device_id::parse_device_id;
use moodscan_core::camera::frame_stream::{FrameSink, FrameStream, STREAM_CONTENT_TYPE};
use moodscan_core::pipeline::frame_analyzer::FrameAnalyzer;
use moodscan_core::shared::analysis_result::FrameAnalysisResult;
use moodscan_core::shared::constants::{IMAGE_EXTENSIONS, UPLOADS_DIR};
use moodscan_core::stats::aggregated_statistics::AggregatedStatistics;
use moodscan_core::stats::analysis_store::{record_and_recompute, AnalysisStore};

use crate::api_error::ApiError;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const STREAM_BUFFER: usize = 2;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/video-feed", get(video_feed))
        .route("/api/toggle-detection", post(toggle_detection))
        .route("/api/change-camera", post(change_camera))
        .route("/api/current-results", get(current_results))
        .route("/api/release-camera", post(release_camera))
        .route("/api/analyze", post(analyze_upload))
        .route("/api/analyze-base64", post(analyze_base64))
        .route("/api/analyze-live", post(analyze_live))
        .route("/api/statistics/{user}", get(statistics))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Feeds stream parts into the response body channel from a blocking thread.
struct ChannelSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl FrameSink for ChannelSink {
    fn send(&mut self, part: Vec<u8>) -> bool {
        self.tx.blocking_send(part).is_ok()
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

async fn video_feed(State(state): State<AppState>) -> Response {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(STREAM_BUFFER);
    let camera = state.camera.clone();
    spawn_blocking(move || {
        let manager = camera.get();
        FrameStream::new(manager).run(&mut ChannelSink { tx });
    });

    let parts = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|part| (Ok::<_, Infallible>(part), rx))
    });
    (
        [(CONTENT_TYPE, STREAM_CONTENT_TYPE), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(parts),
    )
        .into_response()
}

#[derive(Deserialize)]
struct ToggleRequest {
    #[serde(default)]
    enable: bool,
}

async fn toggle_detection(
    State(state): State<AppState>,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let enable = json_body(body)?.enable;
    let camera = state.camera.clone();
    spawn_blocking(move || camera.get().toggle_detection(enable)).await?;
    Ok(Json(json!({ "success": true, "detection_enabled": enable })))
}

#[derive(Deserialize)]
struct ChangeCameraRequest {
    #[serde(default)]
    camera_id: Value,
}

async fn change_camera(
    State(state): State<AppState>,
    body: Result<Json<ChangeCameraRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let device_id = parse_device_id(&json_body(body)?.camera_id);
    let camera = state.camera.clone();
    let outcome = spawn_blocking(move || camera.get().change_device(device_id)).await?;

    Ok(match outcome {
        Ok(id) => Json(json!({ "success": true, "camera_id": id })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string(), "camera_id": device_id })),
        )
            .into_response(),
    })
}

async fn current_results(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let camera = state.camera.clone();
    let snapshot = spawn_blocking(move || camera.get().current_results()).await?;
    Ok(Json(json!({
        "success": true,
        "results": snapshot.results,
        "detection_enabled": snapshot.detection_enabled,
    })))
}

async fn release_camera(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let camera = state.camera.clone();
    spawn_blocking(move || camera.release_shared()).await?;
    Ok(Json(json!({ "success": true })))
}

/// Stores a successful analysis for `user`. Store failures never fail the
/// request that produced the analysis.
fn record(store: &dyn AnalysisStore, user: Option<&str>, result: &FrameAnalysisResult) {
    let Some(user) = user.map(str::trim).filter(|u| !u.is_empty()) else {
        return;
    };
    if !result.is_ok() {
        return;
    }
    if let Err(e) = record_and_recompute(store, user, result) {
        log::warn!("Could not record analysis for {user}: {e}");
    }
}

fn upload_extension(file_name: &str) -> Result<String, ApiError> {
    FsPath::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported image type: {file_name}")))
}

fn upload_path(media_root: &FsPath, extension: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%6f");
    media_root
        .join(UPLOADS_DIR)
        .join(format!("upload_{stamp}.{extension}"))
}

async fn analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut user: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name().map(str::to_string).as_deref() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or("upload.jpg").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                upload = Some((file_name, bytes.to_vec()));
            }
            Some("user") => {
                user = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?,
                );
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing `image` file field".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("uploaded image is empty".into()));
    }
    let path = upload_path(&state.media_root, &upload_extension(&file_name)?);

    let result = spawn_blocking(move || {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &bytes)?;
        log::info!("Saved upload {file_name} to {}", path.display());
        let result = state.analyzer.analyze_image(&path);
        record(state.store.as_ref(), user.as_deref(), &result);
        Ok::<_, ApiError>(result)
    })
    .await??;

    Ok(Json(json!({ "success": result.is_ok(), "analysis": result })))
}

#[derive(Deserialize)]
struct Base64Request {
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

async fn analyze_base64(
    State(state): State<AppState>,
    body: Result<Json<Base64Request>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(body)?;
    let Some(image_data) = request.image_data.filter(|d| !d.trim().is_empty()) else {
        return Ok(Json(json!({ "success": false, "error": "no image data provided" })));
    };
    let user = request.user;

    let (result, seconds) = spawn_blocking(move || {
        let started = Instant::now();
        let result = state.analyzer.analyze_base64(&image_data)?;
        let seconds = started.elapsed().as_secs_f64();
        record(state.store.as_ref(), user.as_deref(), &result);
        Ok::<_, ApiError>((result, seconds))
    })
    .await??;

    Ok(Json(json!({
        "success": true,
        "analysis": result,
        "processing_time": seconds,
    })))
}

async fn analyze_live(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let result = spawn_blocking(move || {
        let frame = state.camera.get().latest_frame().ok_or(ApiError::NoFrame)?;
        Ok::<_, ApiError>(state.analyzer.analyze_frame(&frame))
    })
    .await??;
    Ok(Json(json!({ "success": true, "analysis": result })))
}

async fn statistics(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let stats = spawn_blocking(move || {
        store
            .records_for(&user)
            .map(|records| AggregatedStatistics::recompute(&records))
    })
    .await??;
    Ok(Json(json!({ "success": true, "statistics": stats })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
