use std::path::Path;

use crate::shared::error::MediaError;
use crate::shared::frame::Frame;

/// Persists a face crop as an image file.
pub trait ImageWriter: Send + Sync {
    /// Writes a frame to the given path, creating parent directories.
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), MediaError>;
}
