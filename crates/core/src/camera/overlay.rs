use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::shared::analysis_result::{FaceResult, FrameAnalysisResult};
use crate::shared::emotion::EmotionDistribution;
use crate::shared::frame::Frame;

const BOX_THICKNESS: u32 = 2;
const BANNER_HEIGHT: u32 = 20;
const TEXT_SCALE: f32 = 16.0;
const TEXT_PADDING: i32 = 3;

const PANEL_MARGIN: u32 = 10;
const BAR_MAX_WIDTH: u32 = 120;
const BAR_HEIGHT: u32 = 12;
const BAR_GAP: u32 = 6;
const TOP_EMOTIONS: usize = 3;

const TALLY_SIZE: u32 = 8;
const TALLY_MAX: usize = 10;

const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const PANEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BAR_TRACK_COLOR: Rgb<u8> = Rgb([48, 48, 48]);
const TALLY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("could not read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a usable TrueType/OpenType font")]
    InvalidFont(PathBuf),
}

/// Draws detection results onto a copy of a frame: a box and label banner
/// per face, the top emotions of the first face as bars, and a face count.
///
/// Text is only rendered when a font is configured; without one the bars
/// and a tally of squares carry the same information.
#[derive(Clone, Default)]
pub struct OverlayRenderer {
    font: Option<Arc<FontVec>>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(font: FontVec) -> Self {
        Self {
            font: Some(Arc::new(font)),
        }
    }

    pub fn from_font_file(path: &Path) -> Result<Self, OverlayError> {
        let bytes = std::fs::read(path).map_err(|source| OverlayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font =
            FontVec::try_from_vec(bytes).map_err(|_| OverlayError::InvalidFont(path.to_path_buf()))?;
        Ok(Self::with_font(font))
    }

    /// Returns an annotated copy; `frame` itself is left untouched.
    pub fn render(&self, frame: &Frame, result: &FrameAnalysisResult) -> Frame {
        let Some(mut canvas) = frame.to_rgb_image() else {
            return frame.clone();
        };
        for face in result.faces() {
            self.draw_face(&mut canvas, face);
        }
        if let Some(first) = result.faces().first() {
            self.draw_top_emotions(&mut canvas, &first.distribution);
        }
        self.draw_face_count(&mut canvas, result.faces_detected());
        Frame::from_rgb_image(canvas)
    }

    fn draw_face(&self, canvas: &mut RgbImage, face: &FaceResult) {
        let color = Rgb(face.dominant.color());
        let b = face.bbox;
        for t in 0..BOX_THICKNESS {
            if let Some(r) = rect(
                (b.x + t) as i32,
                (b.y + t) as i32,
                b.width.saturating_sub(2 * t),
                b.height.saturating_sub(2 * t),
            ) {
                draw_hollow_rect_mut(canvas, r, color);
            }
        }

        // Banner above the box, or below it when the box touches the top.
        let banner_y = if b.y >= BANNER_HEIGHT {
            (b.y - BANNER_HEIGHT) as i32
        } else {
            b.bottom() as i32
        };
        let label = format!("{}: {:.0}%", face.dominant.title(), face.confidence * 100.0);
        let banner_width = self
            .text_width(&label)
            .map_or(b.width, |w| w.max(b.width));
        if let Some(r) = rect(b.x as i32, banner_y, banner_width, BANNER_HEIGHT) {
            draw_filled_rect_mut(canvas, r, color);
        }
        self.draw_text(canvas, TEXT_COLOR, b.x as i32, banner_y, &label);
    }

    fn draw_top_emotions(&self, canvas: &mut RgbImage, distribution: &EmotionDistribution) {
        for (i, (emotion, p)) in distribution.ranked().into_iter().take(TOP_EMOTIONS).enumerate() {
            let y = (PANEL_MARGIN + i as u32 * (BAR_HEIGHT + BAR_GAP)) as i32;
            let x = PANEL_MARGIN as i32;
            if let Some(r) = rect(x, y, BAR_MAX_WIDTH, BAR_HEIGHT) {
                draw_filled_rect_mut(canvas, r, BAR_TRACK_COLOR);
            }
            let filled = ((p.clamp(0.0, 1.0) * BAR_MAX_WIDTH as f64).round() as u32).max(1);
            if let Some(r) = rect(x, y, filled, BAR_HEIGHT) {
                draw_filled_rect_mut(canvas, r, Rgb(emotion.color()));
            }
            let label = format!("{} {:.0}%", emotion.title(), p * 100.0);
            self.draw_text(
                canvas,
                PANEL_TEXT_COLOR,
                x + BAR_MAX_WIDTH as i32 + 4,
                y - TEXT_PADDING,
                &label,
            );
        }
    }

    fn draw_face_count(&self, canvas: &mut RgbImage, count: usize) {
        let y = canvas.height() as i32 - (PANEL_MARGIN + TALLY_SIZE) as i32;
        if self.font.is_some() {
            let label = format!("Faces: {count}");
            self.draw_text(canvas, TALLY_COLOR, PANEL_MARGIN as i32, y - 8, &label);
            return;
        }
        for i in 0..count.min(TALLY_MAX) {
            let x = (PANEL_MARGIN + i as u32 * (TALLY_SIZE + 4)) as i32;
            if let Some(r) = rect(x, y, TALLY_SIZE, TALLY_SIZE) {
                draw_filled_rect_mut(canvas, r, TALLY_COLOR);
            }
        }
    }

    fn draw_text(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(
                canvas,
                color,
                x + TEXT_PADDING,
                y + TEXT_PADDING,
                PxScale::from(TEXT_SCALE),
                font.as_ref(),
                text,
            );
        }
    }

    fn text_width(&self, text: &str) -> Option<u32> {
        self.font.as_ref().map(|font| {
            let (w, _) = imageproc::drawing::text_size(PxScale::from(TEXT_SCALE), font.as_ref(), text);
            w + 2 * TEXT_PADDING as u32
        })
    }
}

fn rect(x: i32, y: i32, width: u32, height: u32) -> Option<Rect> {
    (width > 0 && height > 0).then(|| Rect::at(x, y).of_size(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::emotion::Emotion;

    fn frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![200u8; (width * height * 3) as usize], width, height, 3)
    }

    fn happy_face(bbox: BoundingBox) -> FaceResult {
        FaceResult::new(
            1,
            bbox,
            EmotionDistribution::new([0.05, 0.9, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0]),
        )
    }

    #[test]
    fn test_render_draws_box_in_emotion_color() {
        let source = frame(200, 150);
        let result = FrameAnalysisResult::new(vec![happy_face(BoundingBox::new(60, 60, 50, 50))], 1);
        let out = OverlayRenderer::new().render(&source, &result);

        assert_eq!(out.pixel(60, 85), &Emotion::Happiness.color());
        assert_eq!(out.pixel(61, 85), &Emotion::Happiness.color());
        // Interior untouched.
        assert_eq!(out.pixel(85, 85), &[200, 200, 200]);
        // Banner sits above the box.
        assert_eq!(out.pixel(70, 45), &Emotion::Happiness.color());
    }

    #[test]
    fn test_render_does_not_mutate_source() {
        let source = frame(100, 100);
        let before = source.clone();
        let result = FrameAnalysisResult::new(vec![happy_face(BoundingBox::new(10, 30, 40, 40))], 1);
        let out = OverlayRenderer::new().render(&source, &result);
        assert_eq!(source, before);
        assert_ne!(out, before);
    }

    #[test]
    fn test_render_without_faces_is_identical() {
        let source = frame(80, 60);
        let out = OverlayRenderer::new().render(&source, &FrameAnalysisResult::empty());
        assert_eq!(out, source);
    }

    #[test]
    fn test_render_top_emotion_bars() {
        let source = frame(200, 150);
        let result = FrameAnalysisResult::new(vec![happy_face(BoundingBox::new(100, 80, 50, 50))], 1);
        let out = OverlayRenderer::new().render(&source, &result);
        // First bar is happiness at 90% of the track width.
        let y = PANEL_MARGIN + BAR_HEIGHT / 2;
        assert_eq!(out.pixel(PANEL_MARGIN + 5, y), &Emotion::Happiness.color());
        assert_eq!(
            out.pixel(PANEL_MARGIN + BAR_MAX_WIDTH - 2, y),
            &BAR_TRACK_COLOR.0
        );
    }

    #[test]
    fn test_render_face_tally_without_font() {
        let source = frame(200, 150);
        let result = FrameAnalysisResult::new(Vec::new(), 2);
        let out = OverlayRenderer::new().render(&source, &result);
        let y = 150 - PANEL_MARGIN - TALLY_SIZE / 2;
        assert_eq!(out.pixel(PANEL_MARGIN + 1, y), &TALLY_COLOR.0);
        assert_eq!(out.pixel(PANEL_MARGIN + TALLY_SIZE + 5, y), &TALLY_COLOR.0);
        assert_eq!(out.pixel(PANEL_MARGIN + 2 * (TALLY_SIZE + 4) + 1, y), &[200, 200, 200]);
    }

    #[test]
    fn test_render_clips_boxes_at_frame_edges() {
        let source = frame(64, 48);
        let result = FrameAnalysisResult::new(vec![happy_face(BoundingBox::new(0, 0, 64, 48))], 1);
        let out = OverlayRenderer::new().render(&source, &result);
        assert_eq!((out.width(), out.height()), (64, 48));
    }

    #[test]
    fn test_invalid_font_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("font.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(
            OverlayRenderer::from_font_file(&path),
            Err(OverlayError::InvalidFont(_))
        ));
        assert!(matches!(
            OverlayRenderer::from_font_file(&dir.path().join("missing.ttf")),
            Err(OverlayError::Read { .. })
        ));
    }
}
