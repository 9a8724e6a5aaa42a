use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::AnalysisStatus;

/// Persisted cross-sweep retry budget. Distinct from the in-call backoff
/// attempts in `assessment::requester`.
pub const MAX_ANALYSIS_RETRIES: i32 = 3;

/// Per-project analysis row (1:1 with a project).
///
/// `score` is present iff `status == COMPLETE`; `retry_count` stays below
/// `MAX_ANALYSIS_RETRIES` while PENDING/ANALYZING and equals it when FAILED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub id: Uuid,
    pub project_id: Uuid,
    pub candidate_id: Uuid,
    pub status: AnalysisStatus,
    pub score: Option<i32>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub technologies: Vec<String>,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated per-project result, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalysisResult {
    /// Clamped to 0–100.
    pub score: i32,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub technologies: Vec<String>,
}

/// Outcome of a failed attempt as it should be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTransition {
    pub status: AnalysisStatus,
    pub retry_count: i32,
}

impl FailureTransition {
    /// Increments the persisted retry budget; exhausting it is terminal.
    pub fn after_failure(previous_retry_count: i32) -> Self {
        let retry_count = (previous_retry_count + 1).min(MAX_ANALYSIS_RETRIES);
        let status = if retry_count >= MAX_ANALYSIS_RETRIES {
            AnalysisStatus::Failed
        } else {
            AnalysisStatus::Pending
        };
        Self {
            status,
            retry_count,
        }
    }
}
