use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::PipelineStage;

/// One recruiting organization's tracking row for a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub candidate_id: Uuid,
    pub stage: PipelineStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
