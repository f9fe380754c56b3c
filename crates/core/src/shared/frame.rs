use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};

use crate::shared::bounding_box::BoundingBox;

/// Owned 8-bit pixels of an uploaded image or a captured camera frame.
/// Rows are packed with no stride padding; `channels` is 3 for RGB and 1
/// for grayscale.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * channels as usize,
            "pixel buffer does not match {width}x{height}x{channels}"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3)
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::from_rgb_image(image.into_rgb8())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Channel values of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// Copy of the frame as an RGB image; grayscale frames are expanded.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        match self.channels {
            3 => RgbImage::from_raw(self.width, self.height, self.data.clone()),
            1 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(|gray| DynamicImage::ImageLuma8(gray).into_rgb8()),
            _ => None,
        }
    }

    /// Copy of the pixels inside `bbox`, clipped to the frame.
    pub fn crop(&self, bbox: &BoundingBox) -> Frame {
        let x1 = bbox.x.min(self.width);
        let y1 = bbox.y.min(self.height);
        let x2 = bbox.right().min(self.width);
        let y2 = bbox.bottom().min(self.height);
        let c = self.channels as usize;
        let row_len = (x2 - x1) as usize * c;

        let mut data = Vec::with_capacity(row_len * (y2 - y1) as usize);
        for row in y1..y2 {
            let start = (row as usize * self.width as usize + x1 as usize) * c;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Frame::new(data, x2 - x1, y2 - y1, self.channels)
    }

    /// Bilinear resize to `width` x `height`. Returns an unchanged copy when
    /// the pixel layout cannot be converted.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        match self.to_rgb_image() {
            Some(rgb) if width > 0 && height > 0 => Frame::from_rgb_image(
                image::imageops::resize(&rgb, width, height, FilterType::Triangle),
            ),
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        Frame::new(data, width, height, 3)
    }

    #[test]
    fn test_dimensions_are_kept() {
        let frame = Frame::new(vec![9u8; 2 * 3 * 3], 2, 3, 3);
        assert_eq!((frame.width(), frame.height(), frame.channels()), (2, 3, 3));
        assert_eq!(frame.data().len(), 18);
        assert!(!frame.is_empty());
        assert!(Frame::new(Vec::new(), 0, 4, 1).is_empty());
    }

    #[test]
    #[should_panic(expected = "pixel buffer does not match 2x2x3")]
    #[cfg(debug_assertions)]
    fn test_short_buffer_is_caught_in_debug_builds() {
        Frame::new(vec![0u8; 10], 2, 2, 3);
    }

    #[test]
    fn test_pixel_access() {
        let frame = gradient(4, 3);
        assert_eq!(frame.pixel(2, 1), &[2, 1, 7]);
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient(10, 8);
        let crop = frame.crop(&BoundingBox::new(2, 3, 4, 2));
        assert_eq!((crop.width(), crop.height()), (4, 2));
        assert_eq!(crop.pixel(0, 0), &[2, 3, 7]);
        assert_eq!(crop.pixel(3, 1), &[5, 4, 7]);
    }

    #[test]
    fn test_crop_clips_to_frame() {
        let frame = gradient(10, 8);
        let crop = frame.crop(&BoundingBox::new(8, 6, 10, 10));
        assert_eq!((crop.width(), crop.height()), (2, 2));
        assert_eq!(crop.pixel(1, 1), &[9, 7, 7]);
    }

    #[test]
    fn test_crop_outside_frame_is_empty() {
        let frame = gradient(10, 8);
        let crop = frame.crop(&BoundingBox::new(20, 20, 5, 5));
        assert!(crop.is_empty());
    }

    #[test]
    fn test_resized_dimensions() {
        let frame = gradient(40, 20);
        let small = frame.resized(20, 10);
        assert_eq!((small.width(), small.height()), (20, 10));
        assert_eq!(small.channels(), 3);
    }

    #[test]
    fn test_grayscale_expands_to_rgb() {
        let frame = Frame::new(vec![10, 20, 30, 40], 2, 2, 1);
        let rgb = frame.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(1, 0).0, [20, 20, 20]);
    }

    #[test]
    fn test_rgb_image_roundtrip() {
        let frame = gradient(5, 4);
        let back = Frame::from_rgb_image(frame.to_rgb_image().unwrap());
        assert_eq!(back, frame);
    }
}
