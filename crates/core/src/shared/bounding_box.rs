use serde::Serialize;

/// Axis-aligned face box in integer pixel coordinates of the analysed image.
///
/// Boxes produced by detection are always clipped to the image they came
/// from, so `right() <= width` and `bottom() <= height` hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clips a floating-point detector box to a `image_width` x `image_height`
    /// image, truncating to whole pixels. `None` when nothing visible remains.
    pub fn clipped(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return None;
        }
        let max_x = image_width as f64;
        let max_y = image_height as f64;
        let x1 = x.clamp(0.0, max_x).floor();
        let y1 = y.clamp(0.0, max_y).floor();
        let x2 = (x + width).clamp(0.0, max_x).floor();
        let y2 = (y + height).clamp(0.0, max_y).floor();
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self::new(
            x1 as u32,
            y1 as u32,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
        ))
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.right() <= image_width && self.bottom() <= image_height
    }

    /// Grows the box by `margin` on every side, staying inside the image.
    pub fn with_margin(&self, margin: u32, image_width: u32, image_height: u32) -> Self {
        let x1 = self.x.saturating_sub(margin);
        let y1 = self.y.saturating_sub(margin);
        let x2 = self.right().saturating_add(margin).min(image_width).max(x1);
        let y2 = self.bottom().saturating_add(margin).min(image_height).max(y1);
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::inside((10.0, 20.0, 30.0, 40.0), Some(BoundingBox::new(10, 20, 30, 40)))]
    #[case::fractional((10.7, 20.2, 30.0, 40.0), Some(BoundingBox::new(10, 20, 30, 40)))]
    #[case::negative_origin((-5.0, -10.0, 30.0, 40.0), Some(BoundingBox::new(0, 0, 25, 30)))]
    #[case::overflows_right((90.0, 10.0, 30.0, 20.0), Some(BoundingBox::new(90, 10, 10, 20)))]
    #[case::overflows_bottom((10.0, 70.0, 20.0, 30.0), Some(BoundingBox::new(10, 70, 20, 10)))]
    #[case::fully_outside((150.0, 10.0, 20.0, 20.0), None)]
    #[case::zero_width((10.0, 10.0, 0.0, 20.0), None)]
    #[case::not_finite((f64::NAN, 10.0, 20.0, 20.0), None)]
    fn test_clipped(#[case] raw: (f64, f64, f64, f64), #[case] expected: Option<BoundingBox>) {
        let (x, y, w, h) = raw;
        assert_eq!(BoundingBox::clipped(x, y, w, h, 100, 80), expected);
    }

    #[test]
    fn test_clipped_boxes_fit_within_image() {
        let bbox = BoundingBox::clipped(-20.0, 60.0, 500.0, 500.0, 100, 80).unwrap();
        assert!(bbox.fits_within(100, 80));
    }

    #[test]
    fn test_edges() {
        let bbox = BoundingBox::new(5, 6, 10, 20);
        assert_eq!(bbox.right(), 15);
        assert_eq!(bbox.bottom(), 26);
        assert!(!bbox.is_empty());
    }

    #[rstest]
    #[case::interior(BoundingBox::new(20, 20, 10, 10), BoundingBox::new(15, 15, 20, 20))]
    #[case::top_left_corner(BoundingBox::new(2, 3, 10, 10), BoundingBox::new(0, 0, 17, 18))]
    #[case::bottom_right_corner(BoundingBox::new(92, 72, 8, 8), BoundingBox::new(87, 67, 13, 13))]
    fn test_with_margin(#[case] bbox: BoundingBox, #[case] expected: BoundingBox) {
        assert_eq!(bbox.with_margin(5, 100, 80), expected);
    }
}
