use std::path::PathBuf;
use std::sync::Arc;

use moodscan_core::camera::shared_camera::SharedCamera;
use moodscan_core::pipeline::emotion_analyzer::EmotionAnalyzer;
use moodscan_core::stats::analysis_store::AnalysisStore;

/// Handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<EmotionAnalyzer>,
    pub camera: Arc<SharedCamera>,
    pub store: Arc<dyn AnalysisStore>,
    /// Uploads land in `<media_root>/uploads`.
    pub media_root: PathBuf,
}

impl AppState {
    pub fn new(
        analyzer: Arc<EmotionAnalyzer>,
        camera: Arc<SharedCamera>,
        store: Arc<dyn AnalysisStore>,
        media_root: PathBuf,
    ) -> Self {
        Self {
            analyzer,
            camera,
            store,
            media_root,
        }
    }
}
