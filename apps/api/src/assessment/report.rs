//! Aggregate report generation.
//!
//! Called inline after an analysis completes and from the report sweep. Both
//! paths share the same readiness gate and the same upsert, so running it
//! twice for a candidate leaves one report row.

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assessment::candidate_state;
use crate::assessment::prompts::{
    fill_template, AGGREGATE_REPORT_PROMPT_TEMPLATE, AGGREGATE_REPORT_SYSTEM,
    REPORT_RESPONSE_BUDGET, REPORT_TEMPERATURE,
};
use crate::assessment::response::parse_report_content;
use crate::assessment::AssessmentPipeline;
use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;
use crate::llm_client::GenerationRequest;
use crate::models::analysis::ProjectAnalysis;
use crate::models::candidate::Candidate;
use crate::models::project::Project;
use crate::models::report::{AggregateReport, ClosedSet};
use crate::models::status::{AnalysisStatus, AssessmentStatus};

/// Statuses in which a report may be (re)written. ASSESSED is included so a
/// late inline trigger after a regenerate still refreshes the row.
const GENERATABLE: [AssessmentStatus; 3] = [
    AssessmentStatus::ProjectsSubmitted,
    AssessmentStatus::Analyzing,
    AssessmentStatus::Assessed,
];

#[derive(Debug)]
pub enum ReportOutcome {
    Generated(AggregateReport),
    NotReady(&'static str),
}

/// One analysis as presented to the model.
#[derive(Debug, Serialize)]
struct AnalysisDigest<'a> {
    project: &'a str,
    source: String,
    score: Option<i32>,
    summary: Option<&'a str>,
    strengths: &'a [String],
    improvements: &'a [String],
    technologies: &'a [String],
}

pub async fn generate_report(
    pipeline: &AssessmentPipeline,
    candidate_id: Uuid,
) -> Result<ReportOutcome> {
    let store = pipeline.store.as_ref();

    let candidate = store
        .get_candidate(candidate_id)
        .await?
        .ok_or_else(|| anyhow!("Candidate {candidate_id} not found"))?;
    if !GENERATABLE.contains(&candidate.assessment_status) {
        return Ok(ReportOutcome::NotReady("candidate status does not allow a report"));
    }

    let projects = store.list_projects(candidate_id).await?;
    if projects.is_empty() {
        return Ok(ReportOutcome::NotReady("candidate has no projects"));
    }

    let analyses = store.list_analyses(candidate_id).await?;
    let Some(completed) = pair_completed(&projects, &analyses) else {
        return Ok(ReportOutcome::NotReady("analyses still outstanding"));
    };

    let request = GenerationRequest {
        system: AGGREGATE_REPORT_SYSTEM,
        instructions: build_report_prompt(&candidate, &completed)?,
        response_budget: REPORT_RESPONSE_BUDGET,
        temperature: REPORT_TEMPERATURE,
    };
    let text = pipeline.requester.request(&request).await?;
    let content = parse_report_content(&text)?;

    let report = store
        .upsert_report(candidate_id, &content, projects.len() as i32)
        .await?;

    if !candidate_state::mark_assessed(store, candidate_id).await? {
        let current = store
            .get_candidate(candidate_id)
            .await?
            .map(|c| c.assessment_status);
        if current != Some(AssessmentStatus::Assessed) {
            // Compensated, or a project arrived, while the model was answering.
            store.delete_report(candidate_id).await?;
            warn!(
                "Candidate {} changed to {:?} during report generation; report discarded",
                candidate_id, current
            );
            return Ok(ReportOutcome::NotReady("candidate changed during generation"));
        }
    }

    info!(
        "Report for candidate {} written: score {}, {}",
        candidate_id,
        report.content.overall_score,
        report.content.recommendation.as_str()
    );
    Ok(ReportOutcome::Generated(report))
}

/// Every project paired with its COMPLETE analysis, or `None` if any project
/// lacks one.
fn pair_completed<'a>(
    projects: &'a [Project],
    analyses: &'a [ProjectAnalysis],
) -> Option<Vec<(&'a Project, &'a ProjectAnalysis)>> {
    projects
        .iter()
        .map(|p| {
            analyses
                .iter()
                .find(|a| a.project_id == p.id && a.status == AnalysisStatus::Complete)
                .map(|a| (p, a))
        })
        .collect()
}

fn describe_experience(candidate: &Candidate) -> String {
    let years = candidate
        .years_experience
        .map(|y| format!("{y} years of professional experience"));
    match (years, candidate.experience_summary.as_deref()) {
        (Some(y), Some(s)) => format!("{y}. {s}"),
        (Some(y), None) => y,
        (None, Some(s)) => s.to_string(),
        (None, None) => "Not provided.".to_string(),
    }
}

fn build_report_prompt(
    candidate: &Candidate,
    completed: &[(&Project, &ProjectAnalysis)],
) -> Result<String> {
    let digests: Vec<AnalysisDigest> = completed
        .iter()
        .map(|(p, a)| AnalysisDigest {
            project: &p.display_name,
            source: p.source_ref(),
            score: a.score,
            summary: a.summary.as_deref(),
            strengths: &a.strengths,
            improvements: &a.improvements,
            technologies: &a.technologies,
        })
        .collect();
    let analyses_json = serde_json::to_string_pretty(&digests)?;

    Ok(fill_template(
        AGGREGATE_REPORT_PROMPT_TEMPLATE,
        &[
            ("candidate_name", candidate.display_name.as_str()),
            ("experience", describe_experience(candidate).as_str()),
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            ("analyses_json", analyses_json.as_str()),
        ],
    ))
}
