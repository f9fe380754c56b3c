use std::fs;
use std::path::Path;

use image::ExtendedColorType;

use crate::media::domain::image_writer::ImageWriter;
use crate::shared::error::MediaError;
use crate::shared::frame::Frame;

/// Saves face crops through the `image` crate. The encoder is picked from
/// the file extension and grayscale crops stay single-channel.
#[derive(Debug, Default)]
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), MediaError> {
        let color = match frame.channels() {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            channels => return Err(MediaError::UnsupportedLayout { channels }),
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        image::save_buffer(path, frame.data(), frame.width(), frame.height(), color)?;
        Ok(())
    }
}
