use std::path::PathBuf;

use thiserror::Error;

use crate::inference::infrastructure::model_resolver::ModelResolveError;

/// A model file could not be located or turned into a runnable session.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("model file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to load model {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error(transparent)]
    Resolve(#[from] ModelResolveError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("inference failed: {0}")]
    Runtime(String),
    #[error("unexpected model output: {0}")]
    Output(String),
    #[error("model session lock poisoned")]
    Poisoned,
}

/// Caller-supplied image payload was not usable.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("image data must be a data:image/... URI")]
    NotDataUri,
    #[error("image data URI has no ',' separator")]
    MissingSeparator,
    #[error("image data is empty")]
    Empty,
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("camera {device} unavailable: {reason}")]
    Unavailable { device: u32, reason: String },
    #[error("camera has been released")]
    Released,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("frame capture failed: {0}")]
    Failed(String),
    #[error("capture device disconnected")]
    Disconnected,
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("frame has an unsupported pixel layout ({channels} channels)")]
    UnsupportedLayout { channels: u8 },
}

/// Stage failures that end a still-image analysis early. They surface to
/// callers only as the `error` text of an analysis result.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not read image {path}: {source}")]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: MediaError,
    },
    #[error("failed to save face crop {path}: {source}")]
    CropWrite {
        path: PathBuf,
        #[source]
        source: MediaError,
    },
}

/// The analysis store collaborator rejected a read or write.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("analysis store unavailable: {0}")]
    Unavailable(String),
    #[error("could not encode analysis record: {0}")]
    Encode(#[from] serde_json::Error),
}
