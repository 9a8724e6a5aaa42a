use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on submitted projects per candidate.
pub const MAX_PROJECTS_PER_CANDIDATE: usize = 3;

/// A submitted repository. `repo_owner`, `repo_name` and `branch` identify the
/// source and never change after creation; only `display_name` is editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    pub display_name: String,
    /// Deletion is refused until this instant. Set when analysis completes.
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_deletion_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// `owner/name@branch`, used in prompts and logs.
    pub fn source_ref(&self) -> String {
        format!("{}/{}@{}", self.repo_owner, self.repo_name, self.branch)
    }
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub candidate_id: Uuid,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    pub display_name: String,
}
