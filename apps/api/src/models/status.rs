//! Lifecycle enums shared by the store, the pipeline and the HTTP layer.
//!
//! Persisted as SCREAMING_SNAKE_CASE text so rows stay readable from psql.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Per-project analysis lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// PENDING → ANALYZING → {COMPLETE | PENDING (retry) | FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Pending,
    Analyzing,
    Complete,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "PENDING",
            AnalysisStatus::Analyzing => "ANALYZING",
            AnalysisStatus::Complete => "COMPLETE",
            AnalysisStatus::Failed => "FAILED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "Queued for analysis",
            AnalysisStatus::Analyzing => "Analysis in progress",
            AnalysisStatus::Complete => "Analysis complete",
            AnalysisStatus::Failed => "Analysis failed; manual regeneration required",
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AnalysisStatus::Pending),
            "ANALYZING" => Ok(AnalysisStatus::Analyzing),
            "COMPLETE" => Ok(AnalysisStatus::Complete),
            "FAILED" => Ok(AnalysisStatus::Failed),
            other => Err(UnknownStatus {
                kind: "analysis status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate-level lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// Aggregate status of a candidate, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    Registering,
    ProjectsSubmitted,
    Analyzing,
    PendingAnalysis,
    Assessed,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentStatus::Registering => "REGISTERING",
            AssessmentStatus::ProjectsSubmitted => "PROJECTS_SUBMITTED",
            AssessmentStatus::Analyzing => "ANALYZING",
            AssessmentStatus::PendingAnalysis => "PENDING_ANALYSIS",
            AssessmentStatus::Assessed => "ASSESSED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AssessmentStatus::Registering => "Waiting for developer to submit projects",
            AssessmentStatus::ProjectsSubmitted => "Projects submitted; queued for analysis",
            AssessmentStatus::Analyzing => "Analysis in progress",
            AssessmentStatus::PendingAnalysis => "Waiting for developer to regenerate report",
            AssessmentStatus::Assessed => "Assessment complete",
        }
    }

    /// Statuses from which entering analysis may advance the candidate to `ANALYZING`.
    pub const BEFORE_ANALYZING: [AssessmentStatus; 2] = [
        AssessmentStatus::Registering,
        AssessmentStatus::ProjectsSubmitted,
    ];

    /// Statuses the report sweep considers.
    pub const REPORT_ELIGIBLE: [AssessmentStatus; 2] = [
        AssessmentStatus::ProjectsSubmitted,
        AssessmentStatus::Analyzing,
    ];
}

impl FromStr for AssessmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTERING" => Ok(AssessmentStatus::Registering),
            "PROJECTS_SUBMITTED" => Ok(AssessmentStatus::ProjectsSubmitted),
            "ANALYZING" => Ok(AssessmentStatus::Analyzing),
            "PENDING_ANALYSIS" => Ok(AssessmentStatus::PendingAnalysis),
            "ASSESSED" => Ok(AssessmentStatus::Assessed),
            other => Err(UnknownStatus {
                kind: "assessment status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recruiter pipeline stage
// ────────────────────────────────────────────────────────────────────────────

/// Stage of a recruiter-owned pipeline entry. Mirrors `AssessmentStatus`
/// plus three recruiter-set terminal stages the synchronizer never overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Registering,
    ProjectsSubmitted,
    Analyzing,
    PendingAnalysis,
    Assessed,
    Unlocked,
    Hired,
    Rejected,
}

impl PipelineStage {
    pub const TERMINAL: [PipelineStage; 3] = [
        PipelineStage::Unlocked,
        PipelineStage::Hired,
        PipelineStage::Rejected,
    ];

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Registering => "REGISTERING",
            PipelineStage::ProjectsSubmitted => "PROJECTS_SUBMITTED",
            PipelineStage::Analyzing => "ANALYZING",
            PipelineStage::PendingAnalysis => "PENDING_ANALYSIS",
            PipelineStage::Assessed => "ASSESSED",
            PipelineStage::Unlocked => "UNLOCKED",
            PipelineStage::Hired => "HIRED",
            PipelineStage::Rejected => "REJECTED",
        }
    }
}

impl From<AssessmentStatus> for PipelineStage {
    fn from(status: AssessmentStatus) -> Self {
        match status {
            AssessmentStatus::Registering => PipelineStage::Registering,
            AssessmentStatus::ProjectsSubmitted => PipelineStage::ProjectsSubmitted,
            AssessmentStatus::Analyzing => PipelineStage::Analyzing,
            AssessmentStatus::PendingAnalysis => PipelineStage::PendingAnalysis,
            AssessmentStatus::Assessed => PipelineStage::Assessed,
        }
    }
}

impl FromStr for PipelineStage {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTERING" => Ok(PipelineStage::Registering),
            "PROJECTS_SUBMITTED" => Ok(PipelineStage::ProjectsSubmitted),
            "ANALYZING" => Ok(PipelineStage::Analyzing),
            "PENDING_ANALYSIS" => Ok(PipelineStage::PendingAnalysis),
            "ASSESSED" => Ok(PipelineStage::Assessed),
            "UNLOCKED" => Ok(PipelineStage::Unlocked),
            "HIRED" => Ok(PipelineStage::Hired),
            "REJECTED" => Ok(PipelineStage::Rejected),
            other => Err(UnknownStatus {
                kind: "pipeline stage",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
