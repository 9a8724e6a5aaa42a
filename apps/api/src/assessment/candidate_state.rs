//! Candidate-level assessment status transitions.
//!
//! Every write here is followed by a pipeline sync. Forward moves are
//! conditional on the current status; compensation resets are not.

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::assessment::sync::synchronize_pipeline;
use crate::models::status::AssessmentStatus;
use crate::store::AssessmentStore;

/// Moves the candidate to `to` if its current status is one of `from`, then
/// syncs the pipeline. Returns whether the status changed.
pub async fn advance(
    store: &dyn AssessmentStore,
    candidate_id: Uuid,
    to: AssessmentStatus,
    from: &[AssessmentStatus],
) -> Result<bool> {
    let moved = store.advance_candidate_status(candidate_id, to, from).await?;
    if moved {
        info!("Candidate {} → {}", candidate_id, to);
        synchronize_pipeline(store, candidate_id, to).await?;
    }
    Ok(moved)
}

/// Unconditional write used by compensation paths.
pub async fn reset(
    store: &dyn AssessmentStore,
    candidate_id: Uuid,
    to: AssessmentStatus,
) -> Result<()> {
    store.set_candidate_status(candidate_id, to).await?;
    info!("Candidate {} reset to {}", candidate_id, to);
    synchronize_pipeline(store, candidate_id, to).await?;
    Ok(())
}

/// First item claimed for a candidate that has not started analysis yet.
pub async fn enter_analyzing(store: &dyn AssessmentStore, candidate_id: Uuid) -> Result<bool> {
    advance(
        store,
        candidate_id,
        AssessmentStatus::Analyzing,
        &AssessmentStatus::BEFORE_ANALYZING,
    )
    .await
}

/// Report written. Moves to ASSESSED only while every project is COMPLETE;
/// a candidate already ASSESSED is left untouched.
pub async fn mark_assessed(store: &dyn AssessmentStore, candidate_id: Uuid) -> Result<bool> {
    let moved = store
        .mark_assessed_if_complete(candidate_id, &AssessmentStatus::REPORT_ELIGIBLE)
        .await?;
    if moved {
        info!("Candidate {} → {}", candidate_id, AssessmentStatus::Assessed);
        synchronize_pipeline(store, candidate_id, AssessmentStatus::Assessed).await?;
    }
    Ok(moved)
}
