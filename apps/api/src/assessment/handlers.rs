//! Axum route handlers for the Assessment API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::assessment::compensation::{self, RegenerateOutcome, RemovalOutcome};
use crate::assessment::submission::{self, RenameProjectRequest, SubmitProjectRequest};
use crate::errors::AppError;
use crate::models::analysis::ProjectAnalysis;
use crate::models::project::Project;
use crate::models::report::AggregateReport;
use crate::models::status::{AnalysisStatus, AssessmentStatus};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AnalysisView {
    pub status: AnalysisStatus,
    pub status_description: &'static str,
    pub score: Option<i32>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub technologies: Vec<String>,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ProjectAnalysis> for AnalysisView {
    fn from(a: ProjectAnalysis) -> Self {
        Self {
            status: a.status,
            status_description: a.status.description(),
            score: a.score,
            summary: a.summary,
            strengths: a.strengths,
            improvements: a.improvements,
            technologies: a.technologies,
            retry_count: a.retry_count,
            error_message: a.error_message,
            completed_at: a.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub analysis: Option<AnalysisView>,
}

#[derive(Debug, Serialize)]
pub struct AssessmentResponse {
    pub candidate_id: Uuid,
    pub display_name: String,
    pub assessment_status: AssessmentStatus,
    pub status_description: &'static str,
    pub projects: Vec<ProjectView>,
    pub report: Option<AggregateReport>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/candidates/:id/assessment
///
/// Candidate status, per-project analysis state and the report if one exists.
pub async fn handle_get_assessment(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<AssessmentResponse>, AppError> {
    let store = state.pipeline.store.as_ref();

    let candidate = store
        .get_candidate(candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id} not found")))?;
    let projects = store.list_projects(candidate_id).await?;
    let mut analyses = store.list_analyses(candidate_id).await?;
    let report = store.get_report(candidate_id).await?;

    let projects = projects
        .into_iter()
        .map(|project| {
            let analysis = analyses
                .iter()
                .position(|a| a.project_id == project.id)
                .map(|i| AnalysisView::from(analyses.swap_remove(i)));
            ProjectView { project, analysis }
        })
        .collect();

    Ok(Json(AssessmentResponse {
        candidate_id: candidate.id,
        display_name: candidate.display_name,
        assessment_status: candidate.assessment_status,
        status_description: candidate.assessment_status.description(),
        projects,
        report,
    }))
}

/// POST /api/v1/candidates/:id/projects
pub async fn handle_submit_project(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    Json(request): Json<SubmitProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = submission::submit_project(&state.pipeline, candidate_id, request).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// PATCH /api/v1/projects/:id
///
/// Only the display name is editable; the repository reference is fixed.
pub async fn handle_rename_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<RenameProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let project = submission::rename_project(&state.pipeline, project_id, request).await?;
    Ok(Json(project))
}

/// DELETE /api/v1/projects/:id
pub async fn handle_remove_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<RemovalOutcome>, AppError> {
    let outcome = compensation::remove_project(&state.pipeline, project_id).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/candidates/:id/regenerate
///
/// Re-arms FAILED and missing analyses. Work happens on the next sweeps;
/// this returns immediately. The candidate comes back as ANALYZING, not
/// PENDING_ANALYSIS, so the report sweep rebuilds the report once every
/// analysis is COMPLETE.
pub async fn handle_regenerate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<(StatusCode, Json<RegenerateOutcome>), AppError> {
    let outcome = compensation::regenerate(&state.pipeline, candidate_id).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}
