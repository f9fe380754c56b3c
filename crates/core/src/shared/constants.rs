/// A downloadable ONNX model: file name on disk plus its upstream URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub file_name: &'static str,
    pub url: &'static str,
}

pub const FACE_DETECTOR_MODEL: ModelSpec = ModelSpec {
    file_name: "face_detection_yunet_2023mar_int8.onnx",
    url: "https://github.com/opencv/opencv_zoo/raw/main/models/face_detection_yunet/face_detection_yunet_2023mar_int8.onnx",
};

pub const EMOTION_MODEL: ModelSpec = ModelSpec {
    file_name: "emotion-ferplus-8.onnx",
    url: "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx",
};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp"];

/// Directory under the media root that holds stored face crops.
pub const FACES_DIR: &str = "faces";

/// Directory under the media root that holds uploaded images.
pub const UPLOADS_DIR: &str = "uploads";

/// JPEG quality for streamed frames.
pub const STREAM_JPEG_QUALITY: u8 = 80;
