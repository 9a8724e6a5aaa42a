use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::AssessmentStatus;

/// Aggregate root of the assessment. Created at registration; its status is
/// mutated only by the pipeline or by explicit compensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub display_name: String,
    /// Self-reported, fed into the aggregate report request.
    pub years_experience: Option<i32>,
    pub experience_summary: Option<String>,
    pub assessment_status: AssessmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
