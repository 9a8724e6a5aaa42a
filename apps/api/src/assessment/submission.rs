//! Project submission and renaming.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::assessment::candidate_state;
use crate::assessment::AssessmentPipeline;
use crate::errors::AppError;
use crate::models::project::{NewProject, Project, MAX_PROJECTS_PER_CANDIDATE};
use crate::models::status::AssessmentStatus;

const DEFAULT_BRANCH: &str = "main";
const MAX_DISPLAY_NAME_CHARS: usize = 100;

/// Statuses in which a new project resets the candidate to PROJECTS_SUBMITTED.
/// A candidate mid-analysis keeps ANALYZING; the new PENDING row joins the queue.
const RESUBMIT_FROM: [AssessmentStatus; 3] = [
    AssessmentStatus::Registering,
    AssessmentStatus::PendingAnalysis,
    AssessmentStatus::Assessed,
];

#[derive(Debug, Deserialize)]
pub struct SubmitProjectRequest {
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameProjectRequest {
    pub display_name: String,
}

/// Owner and name: no whitespace, no path separators.
fn validate_segment(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    if value.contains('/') || value.chars().any(char::is_whitespace) || value == ".." {
        return Err(AppError::Validation(format!(
            "{field} contains invalid characters: '{value}'"
        )));
    }
    Ok(value.to_string())
}

/// Branch names may be hierarchical (`feature/x`) but not contain empty
/// segments or `..`.
fn validate_branch(value: &str) -> Result<String, AppError> {
    let value = value.trim();
    let invalid = value.chars().any(char::is_whitespace)
        || value.split('/').any(|seg| seg.is_empty() || seg == "..");
    if invalid {
        return Err(AppError::Validation(format!(
            "branch contains invalid characters: '{value}'"
        )));
    }
    Ok(value.to_string())
}

fn validate_display_name(value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation("display_name cannot be empty".to_string()));
    }
    if value.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "display_name must be at most {MAX_DISPLAY_NAME_CHARS} characters"
        )));
    }
    Ok(value.to_string())
}

pub async fn submit_project(
    pipeline: &AssessmentPipeline,
    candidate_id: Uuid,
    request: SubmitProjectRequest,
) -> Result<Project, AppError> {
    let store = pipeline.store.as_ref();

    let repo_owner = validate_segment("repo_owner", &request.repo_owner)?;
    let repo_name = validate_segment("repo_name", &request.repo_name)?;
    let branch = match request.branch.as_deref() {
        Some(b) if !b.trim().is_empty() => validate_branch(b)?,
        _ => DEFAULT_BRANCH.to_string(),
    };
    let display_name = match request.display_name.as_deref() {
        Some(name) => validate_display_name(name)?,
        None => repo_name.clone(),
    };

    let candidate = store
        .get_candidate(candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id} not found")))?;

    let existing = store.list_projects(candidate_id).await?;
    if existing.iter().any(|p| {
        p.repo_owner.eq_ignore_ascii_case(&repo_owner)
            && p.repo_name.eq_ignore_ascii_case(&repo_name)
    }) {
        return Err(AppError::Validation(format!(
            "{repo_owner}/{repo_name} is already submitted"
        )));
    }

    let new = NewProject {
        candidate_id,
        repo_owner,
        repo_name,
        branch,
        display_name,
    };
    let project = store
        .insert_project(&new, MAX_PROJECTS_PER_CANDIDATE)
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "A candidate may submit at most {MAX_PROJECTS_PER_CANDIDATE} projects"
            ))
        })?;

    if RESUBMIT_FROM.contains(&candidate.assessment_status) {
        // The project set changed; an existing report no longer describes it.
        store.delete_report(candidate_id).await?;
        candidate_state::advance(
            store,
            candidate_id,
            AssessmentStatus::ProjectsSubmitted,
            &RESUBMIT_FROM,
        )
        .await?;
    }

    info!(
        "Candidate {} submitted {} ({} of {})",
        candidate_id,
        project.source_ref(),
        existing.len() + 1,
        MAX_PROJECTS_PER_CANDIDATE
    );
    Ok(project)
}

pub async fn rename_project(
    pipeline: &AssessmentPipeline,
    project_id: Uuid,
    request: RenameProjectRequest,
) -> Result<Project, AppError> {
    let display_name = validate_display_name(&request.display_name)?;
    pipeline
        .store
        .rename_project(project_id, &display_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
}
