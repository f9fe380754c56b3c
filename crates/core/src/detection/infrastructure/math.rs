//! Overlap and suppression for raw detector hits.

use crate::detection::domain::face_detector::Detection;

/// Intersection over union of two detections.
pub fn overlap(a: &Detection, b: &Detection) -> f64 {
    let [ax1, ay1, ax2, ay2] = a.corners();
    let [bx1, by1, bx2, by2] = b.corners();

    let iw = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let ih = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let shared = iw * ih;
    if shared <= 0.0 {
        return 0.0;
    }
    let union = a.width * a.height + b.width * b.height - shared;
    if union <= 0.0 {
        0.0
    } else {
        shared / union
    }
}

/// Greedy suppression in descending score order. Only the `top_k` best
/// candidates are considered; a candidate survives when it overlaps no
/// survivor by more than `max_overlap`.
pub fn nms(candidates: &mut Vec<Detection>, max_overlap: f64, top_k: usize) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(top_k);

    let mut survivors: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter() {
        if survivors
            .iter()
            .all(|s| overlap(s, candidate) <= max_overlap)
        {
            survivors.push(*candidate);
        }
    }
    survivors
}
