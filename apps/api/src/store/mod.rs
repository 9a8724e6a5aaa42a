//! Persistence seam for the assessment pipeline.
//!
//! The relational store is the only coordination point between the sweeps and
//! the HTTP handlers. Every transition here is one conditional statement (or
//! one short transaction); callers never read-then-write a status.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::analysis::{FailureTransition, ProjectAnalysis, ProjectAnalysisResult};
use crate::models::candidate::Candidate;
use crate::models::pipeline::PipelineEntry;
use crate::models::project::{NewProject, Project};
use crate::models::report::{AggregateReport, ReportContent};
use crate::models::status::{AssessmentStatus, PipelineStage};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgAssessmentStore;

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    // ── candidates ──────────────────────────────────────────────────────────

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>>;

    /// Unconditional status write. Used by compensation and report success.
    async fn set_candidate_status(&self, id: Uuid, status: AssessmentStatus) -> Result<()>;

    /// Moves the candidate to `to` only if its current status is in `from`.
    /// Returns whether a row changed.
    async fn advance_candidate_status(
        &self,
        id: Uuid,
        to: AssessmentStatus,
        from: &[AssessmentStatus],
    ) -> Result<bool>;

    /// Moves the candidate to ASSESSED only if its status is in `from` and it
    /// has at least one project, every one with a COMPLETE analysis.
    async fn mark_assessed_if_complete(
        &self,
        id: Uuid,
        from: &[AssessmentStatus],
    ) -> Result<bool>;

    /// Candidates in a report-eligible status with ≥1 project, all COMPLETE.
    async fn candidates_ready_for_report(&self) -> Result<Vec<Uuid>>;

    // ── projects ────────────────────────────────────────────────────────────

    async fn list_projects(&self, candidate_id: Uuid) -> Result<Vec<Project>>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>>;

    /// Inserts the project together with its PENDING analysis.
    /// Returns `None` when the candidate already has `max_projects`.
    async fn insert_project(&self, new: &NewProject, max_projects: usize)
        -> Result<Option<Project>>;

    async fn rename_project(&self, id: Uuid, display_name: &str) -> Result<Option<Project>>;

    /// Deletes the project and, by cascade, its analysis.
    async fn delete_project(&self, id: Uuid) -> Result<bool>;

    async fn set_project_lock(&self, id: Uuid, locked_until: DateTime<Utc>) -> Result<()>;

    // ── analyses ────────────────────────────────────────────────────────────

    async fn list_analyses(&self, candidate_id: Uuid) -> Result<Vec<ProjectAnalysis>>;

    async fn get_analysis(&self, id: Uuid) -> Result<Option<ProjectAnalysis>>;

    /// Up to `limit` PENDING analyses, oldest first.
    async fn pending_analyses(&self, limit: usize) -> Result<Vec<ProjectAnalysis>>;

    /// PENDING → ANALYZING. `false` means another path already moved it.
    async fn claim_analysis(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<bool>;

    /// ANALYZING → COMPLETE with the validated result; resets the retry budget.
    async fn complete_analysis(
        &self,
        id: Uuid,
        result: &ProjectAnalysisResult,
        completed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// ANALYZING → PENDING or FAILED, recording the error.
    async fn fail_analysis(
        &self,
        id: Uuid,
        transition: FailureTransition,
        error_message: &str,
    ) -> Result<bool>;

    /// ANALYZING → PENDING for one row, budget untouched. Used when a store
    /// write fails after the claim.
    async fn release_analysis(&self, id: Uuid) -> Result<bool>;

    /// ANALYZING → PENDING for rows left behind by a process that stopped
    /// mid-item. Only safe at startup, before any sweep runs.
    async fn release_interrupted_analyses(&self) -> Result<u64>;

    /// FAILED → PENDING with a fresh budget, and creates analyses for projects
    /// that have none. COMPLETE rows are left alone. Returns rows re-armed.
    async fn rearm_analyses(&self, candidate_id: Uuid) -> Result<u64>;

    // ── reports ─────────────────────────────────────────────────────────────

    async fn get_report(&self, candidate_id: Uuid) -> Result<Option<AggregateReport>>;

    /// Insert-or-overwrite of the single report row for the candidate.
    async fn upsert_report(
        &self,
        candidate_id: Uuid,
        content: &ReportContent,
        project_count: i32,
    ) -> Result<AggregateReport>;

    async fn delete_report(&self, candidate_id: Uuid) -> Result<bool>;

    // ── recruiter pipeline ──────────────────────────────────────────────────

    async fn list_pipeline_entries(&self, candidate_id: Uuid) -> Result<Vec<PipelineEntry>>;

    /// Sets `stage` on every entry for the candidate whose stage is not terminal.
    /// Returns rows changed.
    async fn sync_pipeline_stage(&self, candidate_id: Uuid, stage: PipelineStage) -> Result<u64>;
}
