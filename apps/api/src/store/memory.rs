//! In-memory `AssessmentStore` for tests. Mirrors the conditional semantics of
//! the SQL statements in `postgres.rs`.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::analysis::{
    FailureTransition, ProjectAnalysis, ProjectAnalysisResult, MAX_ANALYSIS_RETRIES,
};
use crate::models::candidate::Candidate;
use crate::models::pipeline::PipelineEntry;
use crate::models::project::{NewProject, Project};
use crate::models::report::{AggregateReport, ReportContent};
use crate::models::status::{AnalysisStatus, AssessmentStatus, PipelineStage};
use crate::store::AssessmentStore;

#[derive(Default)]
struct State {
    candidates: HashMap<Uuid, Candidate>,
    projects: HashMap<Uuid, Project>,
    analyses: HashMap<Uuid, ProjectAnalysis>,
    reports: HashMap<Uuid, AggregateReport>,
    pipeline: HashMap<Uuid, PipelineEntry>,
    /// Every status the candidate has held, in order.
    status_history: HashMap<Uuid, Vec<AssessmentStatus>>,
    /// Every status each analysis has held, with its retry count.
    analysis_history: HashMap<Uuid, Vec<(AnalysisStatus, i32)>>,
    /// Analysis ids in creation order; stands in for `created_at` ordering.
    analysis_order: Vec<Uuid>,
    /// When set, `complete_analysis` errors as if the database were gone.
    reject_completions: bool,
}

impl State {
    fn set_status(&mut self, id: Uuid, status: AssessmentStatus) -> Result<()> {
        let candidate = self
            .candidates
            .get_mut(&id)
            .ok_or_else(|| anyhow!("candidate {id} not found"))?;
        candidate.assessment_status = status;
        candidate.updated_at = Utc::now();
        self.status_history.entry(id).or_default().push(status);
        Ok(())
    }

    /// At least one project, and every project has a COMPLETE analysis.
    fn all_complete(&self, candidate_id: Uuid) -> bool {
        let mut projects = self
            .projects
            .values()
            .filter(|p| p.candidate_id == candidate_id)
            .peekable();
        projects.peek().is_some()
            && projects.all(|p| {
                self.analyses
                    .values()
                    .any(|a| a.project_id == p.id && a.status == AnalysisStatus::Complete)
            })
    }

    fn insert_project(&mut self, new: &NewProject, max_projects: usize) -> Option<Project> {
        let count = self
            .projects
            .values()
            .filter(|p| p.candidate_id == new.candidate_id)
            .count();
        if count >= max_projects {
            return None;
        }
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            candidate_id: new.candidate_id,
            repo_owner: new.repo_owner.clone(),
            repo_name: new.repo_name.clone(),
            branch: new.branch.clone(),
            display_name: new.display_name.clone(),
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        let analysis = Self::new_analysis(&project);
        let analysis_id = analysis.id;
        self.analysis_order.push(analysis_id);
        self.analyses.insert(analysis.id, analysis);
        self.projects.insert(project.id, project.clone());
        self.record_analysis(analysis_id);
        Some(project)
    }

    fn record_analysis(&mut self, id: Uuid) {
        if let Some(a) = self.analyses.get(&id) {
            let entry = (a.status, a.retry_count);
            self.analysis_history.entry(id).or_default().push(entry);
        }
    }

    fn new_analysis(project: &Project) -> ProjectAnalysis {
        let now = Utc::now();
        ProjectAnalysis {
            id: Uuid::new_v4(),
            project_id: project.id,
            candidate_id: project.candidate_id,
            status: AnalysisStatus::Pending,
            score: None,
            summary: None,
            strengths: Vec::new(),
            improvements: Vec::new(),
            technologies: Vec::new(),
            retry_count: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_candidate(&self, display_name: &str, years_experience: Option<i32>) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut state = self.state.lock().unwrap();
        state.candidates.insert(
            id,
            Candidate {
                id,
                display_name: display_name.to_string(),
                years_experience,
                experience_summary: None,
                assessment_status: AssessmentStatus::Registering,
                created_at: now,
                updated_at: now,
            },
        );
        state
            .status_history
            .insert(id, vec![AssessmentStatus::Registering]);
        id
    }

    pub fn add_pipeline_entry(&self, candidate_id: Uuid, stage: PipelineStage) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.state.lock().unwrap().pipeline.insert(
            id,
            PipelineEntry {
                id,
                organization_id: Uuid::new_v4(),
                candidate_id,
                stage,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Inserts a project whose analysis row is missing, as left by older data.
    pub fn add_project_without_analysis(&self, candidate_id: Uuid, repo_name: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.state.lock().unwrap().projects.insert(
            id,
            Project {
                id,
                candidate_id,
                repo_owner: "octo".to_string(),
                repo_name: repo_name.to_string(),
                branch: "main".to_string(),
                display_name: repo_name.to_string(),
                locked_until: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn status_history(&self, candidate_id: Uuid) -> Vec<AssessmentStatus> {
        self.state
            .lock()
            .unwrap()
            .status_history
            .get(&candidate_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn analysis_history(&self, analysis_id: Uuid) -> Vec<(AnalysisStatus, i32)> {
        self.state
            .lock()
            .unwrap()
            .analysis_history
            .get(&analysis_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn report_count(&self) -> usize {
        self.state.lock().unwrap().reports.len()
    }

    /// Synchronous project insert with its PENDING analysis, for use inside
    /// scripted generator hooks.
    pub fn add_project(&self, candidate_id: Uuid, repo_name: &str) -> Option<Project> {
        let new = NewProject {
            candidate_id,
            repo_owner: "octo".to_string(),
            repo_name: repo_name.to_string(),
            branch: "main".to_string(),
            display_name: repo_name.to_string(),
        };
        self.state
            .lock()
            .unwrap()
            .insert_project(&new, crate::models::project::MAX_PROJECTS_PER_CANDIDATE)
    }

    pub fn reject_completions(&self, reject: bool) {
        self.state.lock().unwrap().reject_completions = reject;
    }

    /// Writes a candidate status directly; recorded in the history.
    pub fn force_candidate_status(&self, candidate_id: Uuid, status: AssessmentStatus) {
        let _ = self.state.lock().unwrap().set_status(candidate_id, status);
    }

    /// Overwrites an analysis row directly, bypassing transitions.
    pub fn force_analysis(&self, id: Uuid, status: AnalysisStatus, retry_count: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(a) = state.analyses.get_mut(&id) {
            a.status = status;
            a.retry_count = retry_count;
            if status == AnalysisStatus::Complete {
                a.score = Some(a.score.unwrap_or(75));
            } else {
                a.score = None;
            }
            if status == AnalysisStatus::Failed {
                a.error_message = Some("provider error".to_string());
            }
        }
    }
}

#[async_trait]
impl AssessmentStore for InMemoryStore {
    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        Ok(self.state.lock().unwrap().candidates.get(&id).cloned())
    }

    async fn set_candidate_status(&self, id: Uuid, status: AssessmentStatus) -> Result<()> {
        self.state.lock().unwrap().set_status(id, status)
    }

    async fn advance_candidate_status(
        &self,
        id: Uuid,
        to: AssessmentStatus,
        from: &[AssessmentStatus],
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let current = match state.candidates.get(&id) {
            Some(c) => c.assessment_status,
            None => return Ok(false),
        };
        if !from.contains(&current) {
            return Ok(false);
        }
        state.set_status(id, to)?;
        Ok(true)
    }

    async fn mark_assessed_if_complete(
        &self,
        id: Uuid,
        from: &[AssessmentStatus],
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let current = match state.candidates.get(&id) {
            Some(c) => c.assessment_status,
            None => return Ok(false),
        };
        if !from.contains(&current) || !state.all_complete(id) {
            return Ok(false);
        }
        state.set_status(id, AssessmentStatus::Assessed)?;
        Ok(true)
    }

    async fn candidates_ready_for_report(&self) -> Result<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        let mut ready: Vec<&Candidate> = state
            .candidates
            .values()
            .filter(|c| AssessmentStatus::REPORT_ELIGIBLE.contains(&c.assessment_status))
            .filter(|c| state.all_complete(c.id))
            .collect();
        ready.sort_by_key(|c| c.updated_at);
        Ok(ready.into_iter().map(|c| c.id).collect())
    }

    async fn list_projects(&self, candidate_id: Uuid) -> Result<Vec<Project>> {
        let state = self.state.lock().unwrap();
        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|p| p.candidate_id == candidate_id)
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.state.lock().unwrap().projects.get(&id).cloned())
    }

    async fn insert_project(
        &self,
        new: &NewProject,
        max_projects: usize,
    ) -> Result<Option<Project>> {
        Ok(self.state.lock().unwrap().insert_project(new, max_projects))
    }

    async fn rename_project(&self, id: Uuid, display_name: &str) -> Result<Option<Project>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.projects.get_mut(&id).map(|p| {
            p.display_name = display_name.to_string();
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let removed = state.projects.remove(&id).is_some();
        state.analyses.retain(|_, a| a.project_id != id);
        Ok(removed)
    }

    async fn set_project_lock(&self, id: Uuid, locked_until: DateTime<Utc>) -> Result<()> {
        if let Some(p) = self.state.lock().unwrap().projects.get_mut(&id) {
            p.locked_until = Some(locked_until);
        }
        Ok(())
    }

    async fn list_analyses(&self, candidate_id: Uuid) -> Result<Vec<ProjectAnalysis>> {
        let state = self.state.lock().unwrap();
        let mut analyses: Vec<ProjectAnalysis> = state
            .analyses
            .values()
            .filter(|a| a.candidate_id == candidate_id)
            .cloned()
            .collect();
        analyses.sort_by_key(|a| a.created_at);
        Ok(analyses)
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<ProjectAnalysis>> {
        Ok(self.state.lock().unwrap().analyses.get(&id).cloned())
    }

    async fn pending_analyses(&self, limit: usize) -> Result<Vec<ProjectAnalysis>> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<ProjectAnalysis> = state
            .analyses
            .values()
            .filter(|a| a.status == AnalysisStatus::Pending && a.retry_count < MAX_ANALYSIS_RETRIES)
            .cloned()
            .collect();
        pending.sort_by_key(|a| state.analysis_order.iter().position(|id| *id == a.id));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn claim_analysis(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let claimed = match state.analyses.get_mut(&id) {
            Some(a) if a.status == AnalysisStatus::Pending => {
                a.status = AnalysisStatus::Analyzing;
                a.started_at = Some(started_at);
                true
            }
            _ => false,
        };
        if claimed {
            state.record_analysis(id);
        }
        Ok(claimed)
    }

    async fn complete_analysis(
        &self,
        id: Uuid,
        result: &ProjectAnalysisResult,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.reject_completions {
            return Err(anyhow!("connection reset while completing analysis {id}"));
        }
        let done = match state.analyses.get_mut(&id) {
            Some(a) if a.status == AnalysisStatus::Analyzing => {
                a.status = AnalysisStatus::Complete;
                a.score = Some(result.score);
                a.summary = result.summary.clone();
                a.strengths = result.strengths.clone();
                a.improvements = result.improvements.clone();
                a.technologies = result.technologies.clone();
                a.retry_count = 0;
                a.error_message = None;
                a.completed_at = Some(completed_at);
                true
            }
            _ => false,
        };
        if done {
            state.record_analysis(id);
        }
        Ok(done)
    }

    async fn fail_analysis(
        &self,
        id: Uuid,
        transition: FailureTransition,
        error_message: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let done = match state.analyses.get_mut(&id) {
            Some(a) if a.status == AnalysisStatus::Analyzing => {
                a.status = transition.status;
                a.retry_count = transition.retry_count;
                a.error_message = Some(error_message.to_string());
                true
            }
            _ => false,
        };
        if done {
            state.record_analysis(id);
        }
        Ok(done)
    }

    async fn release_analysis(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let released = match state.analyses.get_mut(&id) {
            Some(a) if a.status == AnalysisStatus::Analyzing => {
                a.status = AnalysisStatus::Pending;
                a.started_at = None;
                true
            }
            _ => false,
        };
        if released {
            state.record_analysis(id);
        }
        Ok(released)
    }

    async fn release_interrupted_analyses(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut released = Vec::new();
        for a in state.analyses.values_mut() {
            if a.status == AnalysisStatus::Analyzing {
                a.status = AnalysisStatus::Pending;
                a.started_at = None;
                released.push(a.id);
            }
        }
        for id in &released {
            state.record_analysis(*id);
        }
        Ok(released.len() as u64)
    }

    async fn rearm_analyses(&self, candidate_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut rearmed = Vec::new();

        for a in state.analyses.values_mut() {
            if a.candidate_id == candidate_id && a.status == AnalysisStatus::Failed {
                a.status = AnalysisStatus::Pending;
                a.retry_count = 0;
                a.error_message = None;
                a.score = None;
                a.started_at = None;
                a.completed_at = None;
                rearmed.push(a.id);
            }
        }

        let missing: Vec<Project> = state
            .projects
            .values()
            .filter(|p| p.candidate_id == candidate_id)
            .filter(|p| !state.analyses.values().any(|a| a.project_id == p.id))
            .cloned()
            .collect();
        for project in &missing {
            let analysis = State::new_analysis(project);
            rearmed.push(analysis.id);
            state.analysis_order.push(analysis.id);
            state.analyses.insert(analysis.id, analysis);
        }

        for id in &rearmed {
            state.record_analysis(*id);
        }
        Ok(rearmed.len() as u64)
    }

    async fn get_report(&self, candidate_id: Uuid) -> Result<Option<AggregateReport>> {
        Ok(self.state.lock().unwrap().reports.get(&candidate_id).cloned())
    }

    async fn upsert_report(
        &self,
        candidate_id: Uuid,
        content: &ReportContent,
        project_count: i32,
    ) -> Result<AggregateReport> {
        let mut state = self.state.lock().unwrap();
        let id = state
            .reports
            .get(&candidate_id)
            .map(|r| r.id)
            .unwrap_or_else(Uuid::new_v4);
        let report = AggregateReport {
            id,
            candidate_id,
            content: content.clone(),
            project_count,
            generated_at: Utc::now(),
        };
        state.reports.insert(candidate_id, report.clone());
        Ok(report)
    }

    async fn delete_report(&self, candidate_id: Uuid) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .reports
            .remove(&candidate_id)
            .is_some())
    }

    async fn list_pipeline_entries(&self, candidate_id: Uuid) -> Result<Vec<PipelineEntry>> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<PipelineEntry> = state
            .pipeline
            .values()
            .filter(|e| e.candidate_id == candidate_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn sync_pipeline_stage(&self, candidate_id: Uuid, stage: PipelineStage) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut changed = 0;
        for entry in state.pipeline.values_mut() {
            if entry.candidate_id == candidate_id && !entry.stage.is_terminal() && entry.stage != stage
            {
                entry.stage = stage;
                entry.updated_at = Utc::now();
                changed += 1;
            }
        }
        Ok(changed)
    }
}
