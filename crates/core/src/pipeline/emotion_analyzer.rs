use std::path::{Path, PathBuf};

use crate::classification::emotion_classifier::EmotionClassifier;
use crate::detection::domain::face_detection_stage::{DetectionMode, FaceDetectionStage};
use crate::media::domain::image_writer::ImageWriter;
use crate::media::infrastructure::data_uri::decode_data_uri;
use crate::media::infrastructure::image_codec::{decode_image, read_image};
use crate::pipeline::frame_analyzer::FrameAnalyzer;
use crate::shared::analysis_result::{FaceResult, FrameAnalysisResult};
use crate::shared::constants::FACES_DIR;
use crate::shared::error::{InputError, PipelineError};
use crate::shared::frame::Frame;

/// Live frames classify at most this many faces.
pub const LIVE_MAX_FACES: usize = 3;

/// Pixels added around a live face box before classification.
pub const LIVE_CROP_MARGIN: u32 = 5;

/// Live crops smaller than this on either side are skipped.
pub const LIVE_MIN_CROP_SIDE: u32 = 20;

#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    /// Root under which `faces/<run>/face_<n>.jpg` crops are stored.
    pub media_root: PathBuf,
    pub live_max_faces: usize,
    pub live_crop_margin: u32,
    pub live_min_crop_side: u32,
}

impl AnalyzerConfig {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            live_max_faces: LIVE_MAX_FACES,
            live_crop_margin: LIVE_CROP_MARGIN,
            live_min_crop_side: LIVE_MIN_CROP_SIDE,
        }
    }
}

/// Orchestrates detection, cropping and classification for the three
/// input kinds: stored image files, base64 snapshots and live frames.
pub struct EmotionAnalyzer {
    detection: FaceDetectionStage,
    classifier: EmotionClassifier,
    crop_writer: Box<dyn ImageWriter>,
    config: AnalyzerConfig,
}

impl EmotionAnalyzer {
    pub fn new(
        detection: FaceDetectionStage,
        classifier: EmotionClassifier,
        crop_writer: Box<dyn ImageWriter>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            detection,
            classifier,
            crop_writer,
            config,
        }
    }

    /// Full-resolution analysis of an image on disk. Every detected face is
    /// classified and its crop stored under the media root. Failures land
    /// in the result's `error` field.
    pub fn analyze_image(&self, path: &Path) -> FrameAnalysisResult {
        match self.try_analyze_image(path) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Image analysis failed: {e}");
                FrameAnalysisResult::failed(e.to_string())
            }
        }
    }

    fn try_analyze_image(&self, path: &Path) -> Result<FrameAnalysisResult, PipelineError> {
        let image = read_image(path).map_err(|source| PipelineError::UnreadableImage {
            path: path.to_path_buf(),
            source,
        })?;
        let boxes = self.detection.detect(&image, DetectionMode::Precise);
        if boxes.is_empty() {
            return Ok(FrameAnalysisResult::new(Vec::new(), 0));
        }

        let run_dir = run_directory_name();
        let mut faces = Vec::with_capacity(boxes.len());
        for (i, bbox) in boxes.iter().enumerate() {
            let id = i + 1;
            let crop = image.crop(bbox);
            let file_name = format!("face_{id}.jpg");
            let disk_path = self
                .config
                .media_root
                .join(FACES_DIR)
                .join(&run_dir)
                .join(&file_name);
            self.crop_writer
                .write(&disk_path, &crop)
                .map_err(|source| PipelineError::CropWrite {
                    path: disk_path.clone(),
                    source,
                })?;

            let classification = self.classifier.classify(&crop);
            faces.push(
                FaceResult::new(id, *bbox, classification.distribution)
                    .with_face_image(format!("{FACES_DIR}/{run_dir}/{file_name}")),
            );
        }
        log::info!("Analysed {} face(s) in {}", faces.len(), path.display());
        Ok(FrameAnalysisResult::new(faces, boxes.len()))
    }

    /// Analysis of a `data:image/...;base64,` snapshot. Malformed payloads
    /// are rejected; detection and classification problems are not errors.
    pub fn analyze_base64(&self, data_uri: &str) -> Result<FrameAnalysisResult, InputError> {
        let bytes = decode_data_uri(data_uri)?;
        let image = decode_image(&bytes)?;
        Ok(self.analyze_snapshot(&image))
    }

    /// Full-resolution analysis of an in-memory image without storing crops.
    pub fn analyze_snapshot(&self, image: &Frame) -> FrameAnalysisResult {
        let boxes = self.detection.detect(image, DetectionMode::Precise);
        let mut faces = Vec::with_capacity(boxes.len());
        for (i, bbox) in boxes.iter().enumerate() {
            let crop = image.crop(bbox);
            if crop.is_empty() {
                log::debug!("Skipping empty crop at {bbox:?}");
                continue;
            }
            let classification = self.classifier.classify(&crop);
            faces.push(FaceResult::new(i + 1, *bbox, classification.distribution));
        }
        FrameAnalysisResult::new(faces, boxes.len())
    }

    /// Bounded-cost analysis of a live camera frame: realtime detection,
    /// at most `live_max_faces` classified, each with a small margin.
    pub fn analyze_live(&self, frame: &Frame) -> FrameAnalysisResult {
        if frame.is_empty() {
            return FrameAnalysisResult::empty();
        }
        let (width, height) = (frame.width(), frame.height());
        let boxes = self.detection.detect(frame, DetectionMode::Realtime);

        let mut faces = Vec::new();
        for (i, bbox) in boxes.iter().enumerate().take(self.config.live_max_faces) {
            if !bbox.fits_within(width, height) {
                continue;
            }
            let padded = bbox.with_margin(self.config.live_crop_margin, width, height);
            if padded.width < self.config.live_min_crop_side
                || padded.height < self.config.live_min_crop_side
            {
                log::debug!("Skipping small live face {}x{}", padded.width, padded.height);
                continue;
            }
            let classification = self.classifier.classify(&frame.crop(&padded));
            faces.push(FaceResult::new(i + 1, *bbox, classification.distribution));
        }
        FrameAnalysisResult::new(faces, boxes.len())
    }
}

impl FrameAnalyzer for EmotionAnalyzer {
    fn analyze_frame(&self, frame: &Frame) -> FrameAnalysisResult {
        self.analyze_live(frame)
    }
}

/// Unique per-call directory name: local time down to milliseconds.
fn run_directory_name() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}
