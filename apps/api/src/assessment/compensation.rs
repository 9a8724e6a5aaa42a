//! Compensation on project removal and the manual regenerate action.
//!
//! Removing a project never re-queues work on its own. The candidate drops to
//! PENDING_ANALYSIS (or REGISTERING when nothing is left) and stays there until
//! someone explicitly calls `regenerate`.

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::assessment::candidate_state;
use crate::assessment::AssessmentPipeline;
use crate::errors::AppError;
use crate::models::status::AssessmentStatus;

#[derive(Debug, Serialize)]
pub struct RemovalOutcome {
    pub candidate_id: Uuid,
    pub remaining_projects: usize,
    pub assessment_status: AssessmentStatus,
}

#[derive(Debug, Serialize)]
pub struct RegenerateOutcome {
    pub candidate_id: Uuid,
    pub rearmed_analyses: u64,
    pub assessment_status: AssessmentStatus,
}

/// Deletes a project and resets the candidate so the old report cannot be
/// mistaken for an assessment of the new project set.
pub async fn remove_project(
    pipeline: &AssessmentPipeline,
    project_id: Uuid,
) -> Result<RemovalOutcome, AppError> {
    let store = pipeline.store.as_ref();

    let project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?;

    if project.is_deletion_locked(Utc::now()) {
        let until = project
            .locked_until
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        return Err(AppError::Conflict(format!(
            "Project {project_id} was analyzed recently and cannot be removed until {until}"
        )));
    }

    if !store.delete_project(project_id).await? {
        return Err(AppError::NotFound(format!("Project {project_id} not found")));
    }

    let candidate_id = project.candidate_id;
    let remaining = store.list_projects(candidate_id).await?.len();
    let status = if remaining == 0 {
        AssessmentStatus::Registering
    } else {
        AssessmentStatus::PendingAnalysis
    };

    // A report may only coexist with ASSESSED; the remaining projects can all
    // be COMPLETE, so the report goes in both branches.
    store.delete_report(candidate_id).await?;
    candidate_state::reset(store, candidate_id, status).await?;

    info!(
        "Removed {} from candidate {}; {} project(s) remain",
        project.source_ref(),
        candidate_id,
        remaining
    );

    Ok(RemovalOutcome {
        candidate_id,
        remaining_projects: remaining,
        assessment_status: status,
    })
}

/// Re-arms FAILED and missing analyses and hands the candidate back to the
/// sweeps. COMPLETE analyses are kept as they are.
///
/// The candidate is set to ANALYZING rather than PENDING_ANALYSIS: the report
/// sweep only picks up ANALYZING and PROJECTS_SUBMITTED candidates, so a
/// regenerate whose analyses are already COMPLETE still gets a new report.
pub async fn regenerate(
    pipeline: &AssessmentPipeline,
    candidate_id: Uuid,
) -> Result<RegenerateOutcome, AppError> {
    let store = pipeline.store.as_ref();

    store
        .get_candidate(candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id} not found")))?;

    if store.list_projects(candidate_id).await?.is_empty() {
        return Err(AppError::Validation(
            "Candidate has no projects to analyze".to_string(),
        ));
    }

    let rearmed = store.rearm_analyses(candidate_id).await?;
    // The report is rebuilt from the current project set once analyses settle.
    store.delete_report(candidate_id).await?;
    // ANALYZING keeps the candidate visible to the report sweep even when
    // nothing needed re-arming.
    candidate_state::reset(store, candidate_id, AssessmentStatus::Analyzing).await?;

    info!(
        "Regenerate for candidate {}: {} analysis row(s) re-armed",
        candidate_id, rearmed
    );

    Ok(RegenerateOutcome {
        candidate_id,
        rearmed_analyses: rearmed,
        assessment_status: AssessmentStatus::Analyzing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::project_state::process_analysis;
    use crate::assessment::report::{generate_report, ReportOutcome};
    use crate::assessment::testing::Harness;
    use crate::models::status::{AnalysisStatus, PipelineStage};
    use crate::store::AssessmentStore;

    #[tokio::test(start_paused = true)]
    async fn test_removing_unlocked_project_with_others_left() {
        let harness = Harness::answering();
        let candidate = harness.store.add_candidate("Ken", None);
        harness
            .store
            .add_pipeline_entry(candidate, PipelineStage::Assessed);
        let keep = harness.submit(candidate, "api").await;
        let removed = harness.submit(candidate, "cli").await;
        harness
            .store
            .set_candidate_status(candidate, AssessmentStatus::Assessed)
            .await
            .unwrap();

        let outcome = remove_project(&harness.pipeline, removed.id).await.unwrap();

        assert_eq!(outcome.remaining_projects, 1);
        assert_eq!(outcome.assessment_status, AssessmentStatus::PendingAnalysis);
        assert!(harness.store.get_project(keep.id).await.unwrap().is_some());
        let entries = harness.store.list_pipeline_entries(candidate).await.unwrap();
        assert_eq!(entries[0].stage, PipelineStage::PendingAnalysis);
        // No automatic re-queue.
        assert_eq!(harness.generator.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_never_leaves_a_report_beside_pending_analysis() {
        let harness = Harness::answering();
        let candidate = harness.store.add_candidate("Ken", None);
        harness.submit(candidate, "api").await;
        let removed = harness.submit(candidate, "cli").await;
        for a in harness.store.list_analyses(candidate).await.unwrap() {
            harness.store.force_analysis(a.id, AnalysisStatus::Complete, 0);
        }
        harness
            .store
            .force_candidate_status(candidate, AssessmentStatus::Analyzing);
        let generated = generate_report(&harness.pipeline, candidate).await.unwrap();
        assert!(matches!(generated, ReportOutcome::Generated(_)));

        remove_project(&harness.pipeline, removed.id).await.unwrap();

        let current = harness.store.get_candidate(candidate).await.unwrap().unwrap();
        assert_eq!(current.assessment_status, AssessmentStatus::PendingAnalysis);
        let remaining = harness.store.list_analyses(candidate).await.unwrap();
        assert!(remaining.iter().all(|a| a.status == AnalysisStatus::Complete));
        // All remaining work is COMPLETE, so a surviving report would claim an
        // assessment the candidate no longer has.
        assert!(harness.store.get_report(candidate).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removing_last_project_returns_to_registering() {
        let harness = Harness::answering();
        let candidate = harness.store.add_candidate("Ken", None);
        let only = harness.submit(candidate, "api").await;

        let outcome = remove_project(&harness.pipeline, only.id).await.unwrap();

        assert_eq!(outcome.remaining_projects, 0);
        assert_eq!(outcome.assessment_status, AssessmentStatus::Registering);
        assert!(harness.store.get_report(candidate).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recently_analyzed_project_cannot_be_removed() {
        let harness = Harness::answering();
        let candidate = harness.store.add_candidate("Ken", None);
        let project = harness.submit(candidate, "api").await;
        let analysis = harness.store.list_analyses(candidate).await.unwrap().remove(0);
        process_analysis(&harness.pipeline, &analysis).await.unwrap();

        let err = remove_project(&harness.pipeline, project.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(harness.store.get_project(project.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_regenerate_unknown_candidate_is_not_found() {
        let harness = Harness::answering();
        let err = regenerate(&harness.pipeline, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_regenerate_without_projects_is_rejected() {
        let harness = Harness::answering();
        let candidate = harness.store.add_candidate("Ken", None);
        let err = regenerate(&harness.pipeline, candidate).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_regenerate_rearms_failed_and_missing_only() {
        let harness = Harness::answering();
        let candidate = harness.store.add_candidate("Ken", None);
        harness.submit(candidate, "done").await;
        harness.submit(candidate, "broken").await;
        harness.store.add_project_without_analysis(candidate, "orphan");

        let analyses = harness.store.list_analyses(candidate).await.unwrap();
        for a in &analyses {
            let project = harness.store.get_project(a.project_id).await.unwrap().unwrap();
            if project.repo_name == "done" {
                harness.store.force_analysis(a.id, AnalysisStatus::Complete, 0);
            } else {
                harness.store.force_analysis(a.id, AnalysisStatus::Failed, 3);
            }
        }

        let outcome = regenerate(&harness.pipeline, candidate).await.unwrap();

        assert_eq!(outcome.rearmed_analyses, 2);
        let analyses = harness.store.list_analyses(candidate).await.unwrap();
        assert_eq!(analyses.len(), 3);
        let complete = analyses
            .iter()
            .filter(|a| a.status == AnalysisStatus::Complete)
            .count();
        let pending: Vec<_> = analyses
            .iter()
            .filter(|a| a.status == AnalysisStatus::Pending)
            .collect();
        assert_eq!(complete, 1);
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|a| a.retry_count == 0));
        let current = harness.store.get_candidate(candidate).await.unwrap().unwrap();
        assert_eq!(current.assessment_status, AssessmentStatus::Analyzing);
    }
}
