use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageReader};

use crate::shared::error::MediaError;
use crate::shared::frame::Frame;

/// Reads an image file into an RGB frame, sniffing the format from content.
pub fn read_image(path: &Path) -> Result<Frame, MediaError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(Frame::from_dynamic(image))
}

/// Decodes in-memory image bytes into an RGB frame.
pub fn decode_image(bytes: &[u8]) -> Result<Frame, image::ImageError> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;
    Ok(Frame::from_dynamic(image))
}

/// Baseline JPEG at the given quality (1-100). The `image` encoder has no
/// Huffman-table optimization pass, so quality is the only size control.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, MediaError> {
    let color = match frame.channels() {
        3 => ExtendedColorType::Rgb8,
        1 => ExtendedColorType::L8,
        channels => return Err(MediaError::UnsupportedLayout { channels }),
    };
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode(
        frame.data(),
        frame.width(),
        frame.height(),
        color,
    )?;
    Ok(buf)
}
