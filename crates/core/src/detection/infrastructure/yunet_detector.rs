/// YuNet face detector (OpenCV zoo, 2023mar export) on a shared inference engine.
///
/// Handles BGR tensor preparation, anchor-free decoding of the three
/// stride heads, and NMS.
use std::sync::Arc;

use ndarray::Array4;

use crate::detection::domain::face_detector::{Detection, FaceDetector};
use crate::detection::infrastructure::math;
use crate::inference::domain::inference_engine::{InferenceEngine, ModelOutputs, NamedTensor};
use crate::shared::error::InferenceError;
use crate::shared::frame::Frame;

/// Feature map strides of the detection heads.
const STRIDES: [u32; 3] = [8, 16, 32];

/// Dynamic-shape inputs are zero-padded to a multiple of this.
const PAD_ALIGNMENT: u32 = 32;

/// Candidate score threshold applied while decoding.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.6;

/// NMS IoU threshold.
pub const DEFAULT_NMS_THRESHOLD: f64 = 0.3;

/// Maximum candidates considered by NMS.
pub const DEFAULT_TOP_K: usize = 5000;

pub struct YunetDetector {
    engine: Arc<dyn InferenceEngine>,
    score_threshold: f64,
    nms_threshold: f64,
    top_k: usize,
}

impl YunetDetector {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl FaceDetector for YunetDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let layout = InputLayout::new(frame.width(), frame.height(), self.engine.input_size());
        let tensor = to_bgr_tensor(frame, &layout);
        let outputs = self.engine.infer(tensor)?;

        let mut candidates = decode(
            &outputs,
            layout.input_width,
            layout.input_height,
            self.score_threshold,
        )?;
        for candidate in candidates.iter_mut() {
            candidate.x /= layout.scale;
            candidate.y /= layout.scale;
            candidate.width /= layout.scale;
            candidate.height /= layout.scale;
        }
        Ok(math::nms(&mut candidates, self.nms_threshold, self.top_k))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Where the frame lands inside the network input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct InputLayout {
    input_width: u32,
    input_height: u32,
    content_width: u32,
    content_height: u32,
    scale: f64,
}

impl InputLayout {
    /// Fixed-shape models get an aspect-preserving resize anchored top-left;
    /// dynamic ones see the frame unscaled, padded right and bottom.
    fn new(frame_width: u32, frame_height: u32, fixed: Option<(u32, u32)>) -> Self {
        match fixed {
            Some((input_height, input_width)) => {
                let scale = (input_width as f64 / frame_width as f64)
                    .min(input_height as f64 / frame_height as f64);
                Self {
                    input_width,
                    input_height,
                    content_width: ((frame_width as f64 * scale).round() as u32)
                        .clamp(1, input_width),
                    content_height: ((frame_height as f64 * scale).round() as u32)
                        .clamp(1, input_height),
                    scale,
                }
            }
            None => Self {
                input_width: align(frame_width),
                input_height: align(frame_height),
                content_width: frame_width,
                content_height: frame_height,
                scale: 1.0,
            },
        }
    }
}

fn align(value: u32) -> u32 {
    value.div_ceil(PAD_ALIGNMENT).max(1) * PAD_ALIGNMENT
}

/// BGR float tensor in [0, 255], NCHW, zero outside the frame content.
fn to_bgr_tensor(frame: &Frame, layout: &InputLayout) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((
        1,
        3,
        layout.input_height as usize,
        layout.input_width as usize,
    ));
    let src_w = frame.width();
    let src_h = frame.height();
    let gray = frame.channels() == 1;

    // Nearest-neighbor sampling; identity when scale is 1.
    for y in 0..layout.content_height {
        let src_y = ((y as f64 / layout.scale) as u32).min(src_h - 1);
        for x in 0..layout.content_width {
            let src_x = ((x as f64 / layout.scale) as u32).min(src_w - 1);
            let px = frame.pixel(src_x, src_y);
            let (r, g, b) = if gray {
                (px[0], px[0], px[0])
            } else {
                (px[0], px[1], px[2])
            };
            let (ty, tx) = (y as usize, x as usize);
            tensor[[0, 0, ty, tx]] = b as f32;
            tensor[[0, 1, ty, tx]] = g as f32;
            tensor[[0, 2, ty, tx]] = r as f32;
        }
    }
    tensor
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode the per-stride score and box heads into candidates, in network
/// input pixels.
///
/// For each grid cell `(row, col)`: `score = sqrt(cls * obj)`, center
/// `((col + dx) * s, (row + dy) * s)`, size `(exp(dw) * s, exp(dh) * s)`.
fn decode(
    outputs: &ModelOutputs,
    input_width: u32,
    input_height: u32,
    score_threshold: f64,
) -> Result<Vec<Detection>, InferenceError> {
    let mut candidates = Vec::new();

    for stride in STRIDES {
        let cols = (input_width / stride) as usize;
        let rows = (input_height / stride) as usize;
        let cells = rows * cols;

        let cls = head(outputs, "cls", stride, cells)?;
        let obj = head(outputs, "obj", stride, cells)?;
        let bbox = head(outputs, "bbox", stride, cells * 4)?;
        let s = stride as f64;

        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                let cls_score = (cls[idx] as f64).clamp(0.0, 1.0);
                let obj_score = (obj[idx] as f64).clamp(0.0, 1.0);
                let score = (cls_score * obj_score).sqrt();
                if score < score_threshold {
                    continue;
                }

                let offsets = &bbox[idx * 4..idx * 4 + 4];
                let cx = (c as f64 + offsets[0] as f64) * s;
                let cy = (r as f64 + offsets[1] as f64) * s;
                let w = (offsets[2] as f64).exp() * s;
                let h = (offsets[3] as f64).exp() * s;
                candidates.push(Detection {
                    x: cx - w / 2.0,
                    y: cy - h / 2.0,
                    width: w,
                    height: h,
                    score,
                });
            }
        }
    }
    Ok(candidates)
}

fn head<'a>(
    outputs: &'a ModelOutputs,
    kind: &str,
    stride: u32,
    expected_len: usize,
) -> Result<&'a [f32], InferenceError> {
    let name = format!("{kind}_{stride}");
    let tensor: &NamedTensor = outputs
        .by_name(&name)
        .ok_or_else(|| InferenceError::Output(format!("detector output {name} missing")))?;
    if tensor.data.len() < expected_len {
        return Err(InferenceError::Output(format!(
            "detector output {name} has {} values, expected {expected_len}",
            tensor.data.len()
        )));
    }
    Ok(&tensor.data[..expected_len])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
