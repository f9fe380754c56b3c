use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::json;

use crate::shared::analysis_result::FrameAnalysisResult;
use crate::shared::error::StoreError;
use crate::stats::aggregated_statistics::AggregatedStatistics;
use crate::stats::analysis_summary::AnalysisSummary;
use crate::stats::historical_record::StoredAnalysis;

/// Persistence for per-user analysis history.
pub trait AnalysisStore: Send + Sync {
    fn store(&self, user: &str, record: StoredAnalysis) -> Result<(), StoreError>;
    fn records_for(&self, user: &str) -> Result<Vec<StoredAnalysis>, StoreError>;
}

impl StoredAnalysis {
    /// The record written for a fresh analysis, in the current schema.
    pub fn from_result(result: &FrameAnalysisResult) -> Result<Self, StoreError> {
        let summary = AnalysisSummary::from_result(result);
        Ok(Self {
            analysis_results: json!({ "faces_analysis": serde_json::to_value(result.faces())? }),
            faces_detected: u32::try_from(result.faces_detected()).unwrap_or(u32::MAX),
            dominant_emotion: summary.dominant_emotion.map(|e| e.label().to_string()),
            average_confidence: summary.average_confidence,
        })
    }
}

/// Stores the analysis for `user` and returns their refreshed statistics.
pub fn record_and_recompute(
    store: &dyn AnalysisStore,
    user: &str,
    result: &FrameAnalysisResult,
) -> Result<AggregatedStatistics, StoreError> {
    store.store(user, StoredAnalysis::from_result(result)?)?;
    let records = store.records_for(user)?;
    let stats = AggregatedStatistics::recompute(&records);
    log::info!(
        "Stored analysis for {user}: {} analyses, {} faces in total",
        stats.total_analyses,
        stats.total_faces_detected
    );
    Ok(stats)
}

/// Process-local store; history is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryAnalysisStore {
    records: RwLock<HashMap<String, Vec<StoredAnalysis>>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisStore for InMemoryAnalysisStore {
    fn store(&self, user: &str, record: StoredAnalysis) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    fn records_for(&self, user: &str) -> Result<Vec<StoredAnalysis>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
            .unwrap_or_default())
    }
}
