//! Face crop preparation for the FER+ classifier: BT.601 luma, area
//! resampling to 64x64, raw [0, 255] values in a `[1, 1, 64, 64]` tensor.

use ndarray::Array4;

use crate::shared::frame::Frame;

/// Side length of the square classifier input.
pub const INPUT_SIZE: usize = 64;

/// Per-pixel luma, rounded to whole intensity levels.
pub fn grayscale(frame: &Frame) -> Vec<f32> {
    match frame.channels() {
        1 => frame.data().iter().map(|&v| v as f32).collect(),
        c => frame
            .data()
            .chunks_exact(c as usize)
            .map(|px| {
                (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32).round()
            })
            .collect(),
    }
}

/// Box-filter resize: every destination pixel is the coverage-weighted mean
/// of the source pixels under it. Upsampling degenerates to a blend of the
/// nearest source pixels.
pub fn area_resize(
    src: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    let x_weights = axis_weights(src_width, dst_width);
    let y_weights = axis_weights(src_height, dst_height);

    // Horizontal pass: src_height x dst_width.
    let mut horizontal = vec![0.0f32; src_height * dst_width];
    for row in 0..src_height {
        let src_row = &src[row * src_width..(row + 1) * src_width];
        for (dx, taps) in x_weights.iter().enumerate() {
            horizontal[row * dst_width + dx] = taps.iter().map(|&(i, w)| src_row[i] * w).sum();
        }
    }

    // Vertical pass: dst_height x dst_width.
    let mut out = vec![0.0f32; dst_height * dst_width];
    for (dy, taps) in y_weights.iter().enumerate() {
        for dx in 0..dst_width {
            out[dy * dst_width + dx] = taps
                .iter()
                .map(|&(i, w)| horizontal[i * dst_width + dx] * w)
                .sum();
        }
    }
    out
}

/// For each destination index, the source indices it covers and their
/// normalized overlap weights.
fn axis_weights(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            let mut taps: Vec<(usize, f32)> = (first..last)
                .map(|i| {
                    let overlap = end.min(i as f64 + 1.0) - start.max(i as f64);
                    (i, (overlap / scale) as f32)
                })
                .filter(|&(_, w)| w > 0.0)
                .collect();
            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            if total > 0.0 {
                for tap in taps.iter_mut() {
                    tap.1 /= total;
                }
            }
            taps
        })
        .collect()
}

/// Crop to classifier input tensor. The crop must be non-empty.
pub fn to_input_tensor(crop: &Frame) -> Array4<f32> {
    let gray = grayscale(crop);
    let resized = area_resize(
        &gray,
        crop.width() as usize,
        crop.height() as usize,
        INPUT_SIZE,
        INPUT_SIZE,
    );
    let mut tensor = Array4::<f32>::zeros((1, 1, INPUT_SIZE, INPUT_SIZE));
    for (slot, value) in tensor.iter_mut().zip(resized) {
        *slot = value.clamp(0.0, 255.0);
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::red([255, 0, 0], 76.0)]
    #[case::green([0, 255, 0], 150.0)]
    #[case::blue([0, 0, 255], 29.0)]
    #[case::white([255, 255, 255], 255.0)]
    fn test_grayscale_weights(#[case] rgb: [u8; 3], #[case] expected: f32) {
        let frame = Frame::new(rgb.to_vec(), 1, 1, 3);
        assert_eq!(grayscale(&frame), vec![expected]);
    }

    #[test]
    fn test_grayscale_passthrough_for_single_channel() {
        let frame = Frame::new(vec![3, 200], 2, 1, 1);
        assert_eq!(grayscale(&frame), vec![3.0, 200.0]);
    }

    #[test]
    fn test_area_resize_halving_averages_blocks() {
        // 4x2 -> 2x1
        let src = [0.0, 10.0, 100.0, 200.0, 20.0, 30.0, 0.0, 100.0];
        let out = area_resize(&src, 4, 2, 2, 1);
        assert_relative_eq!(out[0], 15.0, epsilon = 1e-4);
        assert_relative_eq!(out[1], 100.0, epsilon = 1e-4);
    }

    #[test]
    fn test_area_resize_fractional_coverage() {
        // 3 -> 2: each output covers 1.5 source pixels.
        let src = [0.0, 30.0, 60.0];
        let out = area_resize(&src, 3, 1, 2, 1);
        assert_relative_eq!(out[0], 10.0, epsilon = 1e-4);
        assert_relative_eq!(out[1], 50.0, epsilon = 1e-4);
    }

    #[test]
    fn test_area_resize_identity() {
        let src: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let out = area_resize(&src, 4, 3, 4, 3);
        for (a, b) in out.iter().zip(&src) {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_area_resize_upsample_uniform() {
        let src = vec![42.0f32; 30 * 40];
        let out = area_resize(&src, 30, 40, 64, 64);
        assert_eq!(out.len(), 64 * 64);
        assert!(out.iter().all(|v| (v - 42.0).abs() < 1e-3));
    }

    #[test]
    fn test_input_tensor_shape_and_range() {
        let data: Vec<u8> = (0..(120 * 90 * 3)).map(|i| (i % 256) as u8).collect();
        let crop = Frame::new(data, 120, 90, 3);
        let tensor = to_input_tensor(&crop);
        assert_eq!(tensor.shape(), &[1, 1, 64, 64]);
        assert!(tensor.iter().all(|v| (0.0..=255.0).contains(v)));
    }

    #[test]
    fn test_input_tensor_is_not_normalized() {
        let crop = Frame::new(vec![255u8; 40 * 40 * 3], 40, 40, 3);
        let tensor = to_input_tensor(&crop);
        assert!(tensor.iter().all(|v| (*v - 255.0).abs() < 1e-3));
    }
}
