use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::analysis::{FailureTransition, ProjectAnalysis, ProjectAnalysisResult};
use crate::models::candidate::Candidate;
use crate::models::pipeline::PipelineEntry;
use crate::models::project::{NewProject, Project};
use crate::models::report::{
    AggregateReport, Authenticity, ClosedSet, Recommendation, ReportContent, ScoreBand,
    SeniorityLevel,
};
use crate::models::status::{AnalysisStatus, AssessmentStatus, PipelineStage};
use crate::store::AssessmentStore;

// ────────────────────────────────────────────────────────────────────────────
// Row types (status columns are TEXT)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    display_name: String,
    years_experience: Option<i32>,
    experience_summary: Option<String>,
    assessment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = anyhow::Error;

    fn try_from(row: CandidateRow) -> Result<Self> {
        Ok(Candidate {
            id: row.id,
            display_name: row.display_name,
            years_experience: row.years_experience,
            experience_summary: row.experience_summary,
            assessment_status: row.assessment_status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    candidate_id: Uuid,
    repo_owner: String,
    repo_name: String,
    branch: String,
    display_name: String,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            candidate_id: row.candidate_id,
            repo_owner: row.repo_owner,
            repo_name: row.repo_name,
            branch: row.branch,
            display_name: row.display_name,
            locked_until: row.locked_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AnalysisRow {
    id: Uuid,
    project_id: Uuid,
    candidate_id: Uuid,
    status: String,
    score: Option<i32>,
    summary: Option<String>,
    strengths: Vec<String>,
    improvements: Vec<String>,
    technologies: Vec<String>,
    retry_count: i32,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AnalysisRow> for ProjectAnalysis {
    type Error = anyhow::Error;

    fn try_from(row: AnalysisRow) -> Result<Self> {
        Ok(ProjectAnalysis {
            id: row.id,
            project_id: row.project_id,
            candidate_id: row.candidate_id,
            status: row.status.parse()?,
            score: row.score,
            summary: row.summary,
            strengths: row.strengths,
            improvements: row.improvements,
            technologies: row.technologies,
            retry_count: row.retry_count,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    candidate_id: Uuid,
    overall_score: i32,
    recommendation: String,
    level: String,
    score_band: String,
    authenticity: String,
    summary: Option<String>,
    strengths: Vec<String>,
    concerns: Vec<String>,
    interview_focus: Vec<String>,
    project_count: i32,
    generated_at: DateTime<Utc>,
}

fn closed<T: ClosedSet>(raw: &str) -> T {
    T::parse(raw).unwrap_or(T::FALLBACK)
}

impl From<ReportRow> for AggregateReport {
    fn from(row: ReportRow) -> Self {
        AggregateReport {
            id: row.id,
            candidate_id: row.candidate_id,
            content: ReportContent {
                overall_score: row.overall_score,
                recommendation: closed::<Recommendation>(&row.recommendation),
                level: closed::<SeniorityLevel>(&row.level),
                score_band: closed::<ScoreBand>(&row.score_band),
                authenticity: closed::<Authenticity>(&row.authenticity),
                summary: row.summary,
                strengths: row.strengths,
                concerns: row.concerns,
                interview_focus: row.interview_focus,
            },
            project_count: row.project_count,
            generated_at: row.generated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PipelineRow {
    id: Uuid,
    organization_id: Uuid,
    candidate_id: Uuid,
    stage: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PipelineRow> for PipelineEntry {
    type Error = anyhow::Error;

    fn try_from(row: PipelineRow) -> Result<Self> {
        Ok(PipelineEntry {
            id: row.id,
            organization_id: row.organization_id,
            candidate_id: row.candidate_id,
            stage: row.stage.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ANALYSIS_SELECT: &str = r#"
    SELECT a.id, a.project_id, p.candidate_id, a.status, a.score, a.summary,
           a.strengths, a.improvements, a.technologies, a.retry_count,
           a.error_message, a.started_at, a.completed_at, a.created_at, a.updated_at
    FROM project_analyses a
    JOIN projects p ON p.id = a.project_id
"#;

fn status_texts(statuses: &[AssessmentStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgAssessmentStore {
    pool: PgPool,
}

impl PgAssessmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssessmentStore for PgAssessmentStore {
    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        let row: Option<CandidateRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, years_experience, experience_summary,
                   assessment_status, created_at, updated_at
            FROM candidates
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Candidate::try_from).transpose()
    }

    async fn set_candidate_status(&self, id: Uuid, status: AssessmentStatus) -> Result<()> {
        sqlx::query(
            "UPDATE candidates SET assessment_status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn advance_candidate_status(
        &self,
        id: Uuid,
        to: AssessmentStatus,
        from: &[AssessmentStatus],
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE candidates
            SET assessment_status = $2, updated_at = now()
            WHERE id = $1 AND assessment_status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(status_texts(from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_assessed_if_complete(
        &self,
        id: Uuid,
        from: &[AssessmentStatus],
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE candidates c
            SET assessment_status = $2, updated_at = now()
            WHERE c.id = $1
              AND c.assessment_status = ANY($3)
              AND EXISTS (SELECT 1 FROM projects p WHERE p.candidate_id = c.id)
              AND NOT EXISTS (
                  SELECT 1
                  FROM projects p
                  LEFT JOIN project_analyses a ON a.project_id = p.id
                  WHERE p.candidate_id = c.id
                    AND (a.id IS NULL OR a.status <> 'COMPLETE')
              )
            "#,
        )
        .bind(id)
        .bind(AssessmentStatus::Assessed.as_str())
        .bind(status_texts(from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn candidates_ready_for_report(&self) -> Result<Vec<Uuid>> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT c.id
            FROM candidates c
            WHERE c.assessment_status = ANY($1)
              AND EXISTS (SELECT 1 FROM projects p WHERE p.candidate_id = c.id)
              AND NOT EXISTS (
                  SELECT 1
                  FROM projects p
                  LEFT JOIN project_analyses a ON a.project_id = p.id
                  WHERE p.candidate_id = c.id
                    AND (a.id IS NULL OR a.status <> 'COMPLETE')
              )
            ORDER BY c.updated_at ASC
            "#,
        )
        .bind(status_texts(&AssessmentStatus::REPORT_ELIGIBLE))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_projects(&self, candidate_id: Uuid) -> Result<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            "SELECT * FROM projects WHERE candidate_id = $1 ORDER BY created_at ASC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Project::from))
    }

    async fn insert_project(
        &self,
        new: &NewProject,
        max_projects: usize,
    ) -> Result<Option<Project>> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent submissions for the same candidate.
        sqlx::query("SELECT id FROM candidates WHERE id = $1 FOR UPDATE")
            .bind(new.candidate_id)
            .fetch_optional(&mut *tx)
            .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE candidate_id = $1")
            .bind(new.candidate_id)
            .fetch_one(&mut *tx)
            .await?;
        if count as usize >= max_projects {
            tx.rollback().await?;
            return Ok(None);
        }

        let row: ProjectRow = sqlx::query_as(
            r#"
            INSERT INTO projects (id, candidate_id, repo_owner, repo_name, branch, display_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.candidate_id)
        .bind(&new.repo_owner)
        .bind(&new.repo_name)
        .bind(&new.branch)
        .bind(&new.display_name)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert project")?;

        sqlx::query("INSERT INTO project_analyses (id, project_id) VALUES ($1, $2)")
            .bind(Uuid::new_v4())
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn rename_project(&self, id: Uuid, display_name: &str) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            UPDATE projects SET display_name = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Project::from))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_project_lock(&self, id: Uuid, locked_until: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE projects SET locked_until = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(locked_until)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_analyses(&self, candidate_id: Uuid) -> Result<Vec<ProjectAnalysis>> {
        let rows: Vec<AnalysisRow> = sqlx::query_as(&format!(
            "{ANALYSIS_SELECT} WHERE p.candidate_id = $1 ORDER BY a.created_at ASC"
        ))
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProjectAnalysis::try_from).collect()
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<ProjectAnalysis>> {
        let row: Option<AnalysisRow> = sqlx::query_as(&format!("{ANALYSIS_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ProjectAnalysis::try_from).transpose()
    }

    async fn pending_analyses(&self, limit: usize) -> Result<Vec<ProjectAnalysis>> {
        let rows: Vec<AnalysisRow> = sqlx::query_as(&format!(
            r#"{ANALYSIS_SELECT}
            WHERE a.status = 'PENDING' AND a.retry_count < $2
            ORDER BY a.created_at ASC
            LIMIT $1"#
        ))
        .bind(limit as i64)
        .bind(crate::models::analysis::MAX_ANALYSIS_RETRIES)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProjectAnalysis::try_from).collect()
    }

    async fn claim_analysis(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE project_analyses
            SET status = 'ANALYZING', started_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_analysis(
        &self,
        id: Uuid,
        result: &ProjectAnalysisResult,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE project_analyses
            SET status = 'COMPLETE', score = $2, summary = $3, strengths = $4,
                improvements = $5, technologies = $6, retry_count = 0,
                error_message = NULL, completed_at = $7, updated_at = $7
            WHERE id = $1 AND status = 'ANALYZING'
            "#,
        )
        .bind(id)
        .bind(result.score)
        .bind(&result.summary)
        .bind(&result.strengths)
        .bind(&result.improvements)
        .bind(&result.technologies)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    async fn fail_analysis(
        &self,
        id: Uuid,
        transition: FailureTransition,
        error_message: &str,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE project_analyses
            SET status = $2, retry_count = $3, error_message = $4, updated_at = now()
            WHERE id = $1 AND status = 'ANALYZING'
            "#,
        )
        .bind(id)
        .bind(transition.status.as_str())
        .bind(transition.retry_count)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    async fn release_analysis(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE project_analyses
            SET status = 'PENDING', started_at = NULL, updated_at = now()
            WHERE id = $1 AND status = 'ANALYZING'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_interrupted_analyses(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE project_analyses
            SET status = 'PENDING', started_at = NULL, updated_at = now()
            WHERE status = 'ANALYZING'
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn rearm_analyses(&self, candidate_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let reset = sqlx::query(
            r#"
            UPDATE project_analyses a
            SET status = 'PENDING', retry_count = 0, error_message = NULL,
                score = NULL, started_at = NULL, completed_at = NULL, updated_at = now()
            FROM projects p
            WHERE a.project_id = p.id AND p.candidate_id = $1 AND a.status = $2
            "#,
        )
        .bind(candidate_id)
        .bind(AnalysisStatus::Failed.as_str())
        .execute(&mut *tx)
        .await?;

        let created = sqlx::query(
            r#"
            INSERT INTO project_analyses (id, project_id)
            SELECT gen_random_uuid(), p.id
            FROM projects p
            LEFT JOIN project_analyses a ON a.project_id = p.id
            WHERE p.candidate_id = $1 AND a.id IS NULL
            "#,
        )
        .bind(candidate_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reset.rows_affected() + created.rows_affected())
    }

    async fn get_report(&self, candidate_id: Uuid) -> Result<Option<AggregateReport>> {
        let row: Option<ReportRow> = sqlx::query_as(
            r#"
            SELECT id, candidate_id, overall_score, recommendation, level, score_band,
                   authenticity, summary, strengths, concerns, interview_focus,
                   project_count, generated_at
            FROM aggregate_reports
            WHERE candidate_id = $1
            "#,
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AggregateReport::from))
    }

    async fn upsert_report(
        &self,
        candidate_id: Uuid,
        content: &ReportContent,
        project_count: i32,
    ) -> Result<AggregateReport> {
        let row: ReportRow = sqlx::query_as(
            r#"
            INSERT INTO aggregate_reports
                (id, candidate_id, overall_score, recommendation, level, score_band,
                 authenticity, summary, strengths, concerns, interview_focus,
                 project_count, generated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            ON CONFLICT (candidate_id) DO UPDATE SET
                overall_score = EXCLUDED.overall_score,
                recommendation = EXCLUDED.recommendation,
                level = EXCLUDED.level,
                score_band = EXCLUDED.score_band,
                authenticity = EXCLUDED.authenticity,
                summary = EXCLUDED.summary,
                strengths = EXCLUDED.strengths,
                concerns = EXCLUDED.concerns,
                interview_focus = EXCLUDED.interview_focus,
                project_count = EXCLUDED.project_count,
                generated_at = EXCLUDED.generated_at
            RETURNING id, candidate_id, overall_score, recommendation, level, score_band,
                      authenticity, summary, strengths, concerns, interview_focus,
                      project_count, generated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(candidate_id)
        .bind(content.overall_score)
        .bind(content.recommendation.as_str())
        .bind(content.level.as_str())
        .bind(content.score_band.as_str())
        .bind(content.authenticity.as_str())
        .bind(&content.summary)
        .bind(&content.strengths)
        .bind(&content.concerns)
        .bind(&content.interview_focus)
        .bind(project_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn delete_report(&self, candidate_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM aggregate_reports WHERE candidate_id = $1")
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pipeline_entries(&self, candidate_id: Uuid) -> Result<Vec<PipelineEntry>> {
        let rows: Vec<PipelineRow> = sqlx::query_as(
            "SELECT * FROM pipeline_entries WHERE candidate_id = $1 ORDER BY created_at ASC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PipelineEntry::try_from).collect()
    }

    async fn sync_pipeline_stage(&self, candidate_id: Uuid, stage: PipelineStage) -> Result<u64> {
        let terminal: Vec<String> = PipelineStage::TERMINAL
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        // Terminal stages are excluded in the statement itself so a concurrent
        // recruiter write (e.g. HIRED) can never be overwritten.
        let result = sqlx::query(
            r#"
            UPDATE pipeline_entries
            SET stage = $2, updated_at = now()
            WHERE candidate_id = $1
              AND stage <> ALL($3)
              AND stage <> $2
            "#,
        )
        .bind(candidate_id)
        .bind(stage.as_str())
        .bind(terminal)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
