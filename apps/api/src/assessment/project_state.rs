//! Per-project analysis lifecycle: claim, analyze, then complete or charge the
//! retry budget.
//!
//! Each step is its own conditional store write. A sweep that finds an item
//! already claimed simply skips it.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::assessment::candidate_state;
use crate::assessment::prompts::{
    fill_template, PROJECT_ANALYSIS_PROMPT_TEMPLATE, PROJECT_ANALYSIS_SYSTEM,
    PROJECT_RESPONSE_BUDGET, PROJECT_TEMPERATURE,
};
use crate::assessment::report::{generate_report, ReportOutcome};
use crate::assessment::requester::AnalysisError;
use crate::assessment::response::parse_project_result;
use crate::assessment::AssessmentPipeline;
use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;
use crate::llm_client::GenerationRequest;
use crate::models::analysis::{FailureTransition, ProjectAnalysis, ProjectAnalysisResult};
use crate::models::project::Project;
use crate::models::status::AnalysisStatus;
use crate::repo_content::{ContentError, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed { score: i32 },
    /// Hard failure with budget left; back to PENDING.
    Retrying { retry_count: i32 },
    /// Budget exhausted; waits for manual regeneration.
    Failed,
    /// Claimed elsewhere, or the project vanished mid-flight.
    Skipped,
}

/// Runs one PENDING analysis to its next resting state.
///
/// `Err` means a store write failed; model and repository failures are
/// charged to the item and reported as `Retrying` or `Failed`.
pub async fn process_analysis(
    pipeline: &AssessmentPipeline,
    analysis: &ProjectAnalysis,
) -> Result<ItemOutcome> {
    let store = pipeline.store.as_ref();

    if !store.claim_analysis(analysis.id, Utc::now()).await? {
        debug!("Analysis {} already claimed, skipping", analysis.id);
        return Ok(ItemOutcome::Skipped);
    }

    match process_claimed(pipeline, analysis).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            // Hand the row back so the next sweep sees it without a restart.
            match store.release_analysis(analysis.id).await {
                Ok(true) => warn!("Analysis {} released to PENDING", analysis.id),
                Ok(false) => {}
                Err(release_err) => error!(
                    "Analysis {} stays ANALYZING until restart: {release_err:#}",
                    analysis.id
                ),
            }
            Err(e)
        }
    }
}

async fn process_claimed(
    pipeline: &AssessmentPipeline,
    analysis: &ProjectAnalysis,
) -> Result<ItemOutcome> {
    let store = pipeline.store.as_ref();

    if let Err(e) = candidate_state::enter_analyzing(store, analysis.candidate_id).await {
        warn!(
            "Could not move candidate {} to ANALYZING: {e:#}",
            analysis.candidate_id
        );
    }

    let Some(project) = store.get_project(analysis.project_id).await? else {
        warn!(
            "Project {} disappeared while analysis {} was claimed",
            analysis.project_id, analysis.id
        );
        return Ok(ItemOutcome::Skipped);
    };

    info!("Analyzing {} (analysis {})", project.source_ref(), analysis.id);

    match analyze_project(pipeline, &project).await {
        Ok(result) => record_success(pipeline, analysis, &project, result).await,
        Err(e) => record_failure(pipeline, analysis, &project, &e).await,
    }
}

async fn analyze_project(
    pipeline: &AssessmentPipeline,
    project: &Project,
) -> Result<ProjectAnalysisResult, AnalysisError> {
    let files = pipeline.content.fetch_files(project).await?;
    if files.is_empty() {
        return Err(ContentError::NoAnalyzableFiles(project.source_ref()).into());
    }

    let request = GenerationRequest {
        system: PROJECT_ANALYSIS_SYSTEM,
        instructions: build_project_prompt(project, &files),
        response_budget: PROJECT_RESPONSE_BUDGET,
        temperature: PROJECT_TEMPERATURE,
    };
    let text = pipeline.requester.request(&request).await?;
    parse_project_result(&text)
}

pub fn build_project_prompt(project: &Project, files: &[SourceFile]) -> String {
    let files_block: String = files
        .iter()
        .map(|f| format!("=== {} ===\n{}\n\n", f.path, f.content))
        .collect();

    fill_template(
        PROJECT_ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("project_name", project.display_name.as_str()),
            ("source_ref", project.source_ref().as_str()),
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            ("files", files_block.trim_end()),
        ],
    )
}

async fn record_success(
    pipeline: &AssessmentPipeline,
    analysis: &ProjectAnalysis,
    project: &Project,
    result: ProjectAnalysisResult,
) -> Result<ItemOutcome> {
    let store = pipeline.store.as_ref();
    let completed_at = Utc::now();
    let score = result.score;

    if !store
        .complete_analysis(analysis.id, &result, completed_at)
        .await?
    {
        warn!(
            "Analysis {} left ANALYZING before its result arrived; discarding",
            analysis.id
        );
        return Ok(ItemOutcome::Skipped);
    }

    let locked_until = completed_at + pipeline.settings.lock_period;
    store.set_project_lock(project.id, locked_until).await?;
    info!(
        "Analysis {} complete for {} (score {}), locked until {}",
        analysis.id,
        project.source_ref(),
        score,
        locked_until
    );

    // Last analysis of the candidate? Report now instead of waiting for the sweep.
    match generate_report(pipeline, analysis.candidate_id).await {
        Ok(ReportOutcome::Generated(_)) => {}
        Ok(ReportOutcome::NotReady(reason)) => {
            debug!(
                "Report for candidate {} not ready: {}",
                analysis.candidate_id, reason
            );
        }
        Err(e) => warn!(
            "Inline report for candidate {} failed, report sweep will retry: {e:#}",
            analysis.candidate_id
        ),
    }

    Ok(ItemOutcome::Completed { score })
}

async fn record_failure(
    pipeline: &AssessmentPipeline,
    analysis: &ProjectAnalysis,
    project: &Project,
    err: &AnalysisError,
) -> Result<ItemOutcome> {
    let transition = FailureTransition::after_failure(analysis.retry_count);
    let message = err.to_string();

    if !pipeline
        .store
        .fail_analysis(analysis.id, transition, &message)
        .await?
    {
        warn!(
            "Analysis {} left ANALYZING before its failure was recorded",
            analysis.id
        );
        return Ok(ItemOutcome::Skipped);
    }

    if transition.status == AnalysisStatus::Failed {
        error!(
            "Analysis {} for {} failed permanently after {} attempts: {}",
            analysis.id,
            project.source_ref(),
            transition.retry_count,
            message
        );
        Ok(ItemOutcome::Failed)
    } else {
        warn!(
            "Analysis {} for {} failed (retry {}): {}",
            analysis.id,
            project.source_ref(),
            transition.retry_count,
            message
        );
        Ok(ItemOutcome::Retrying {
            retry_count: transition.retry_count,
        })
    }
}
