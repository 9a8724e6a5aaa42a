//! Mirrors the candidate's assessment status onto recruiter pipeline entries.
//!
//! Recruiter-set terminal stages (UNLOCKED, HIRED, REJECTED) are never
//! overwritten. The guard lives in the UPDATE itself, so a recruiter decision
//! that lands between our status change and this call still wins.

use anyhow::Result;
use tracing::debug;
use uuid::Uuid;

use crate::models::status::{AssessmentStatus, PipelineStage};
use crate::store::AssessmentStore;

/// Sets every non-terminal pipeline entry of the candidate to the stage named
/// like `status`. Returns entries changed. Safe to re-run.
pub async fn synchronize_pipeline(
    store: &dyn AssessmentStore,
    candidate_id: Uuid,
    status: AssessmentStatus,
) -> Result<u64> {
    let stage = PipelineStage::from(status);
    let changed = store.sync_pipeline_stage(candidate_id, stage).await?;
    if changed > 0 {
        debug!(
            "Pipeline: {} entr{} for candidate {} moved to {}",
            changed,
            if changed == 1 { "y" } else { "ies" },
            candidate_id,
            stage.as_str()
        );
    }
    Ok(changed)
}
