use crate::shared::analysis_result::FrameAnalysisResult;
use crate::shared::frame::Frame;

/// Analyses one live camera frame. Must never fail outward: problems are
/// reported through the result's `error` field.
pub trait FrameAnalyzer: Send + Sync {
    fn analyze_frame(&self, frame: &Frame) -> FrameAnalysisResult;
}
