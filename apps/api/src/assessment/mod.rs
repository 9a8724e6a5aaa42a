//! Asynchronous candidate assessment.
//!
//! Flow: project submission → per-project analysis (analysis sweep) →
//! aggregate report (inline trigger or report sweep) → recruiter pipeline sync.
//! All coordination happens through status columns in the store; there is no
//! in-process queue and no lock shared between the sweeps and the handlers.

pub mod candidate_state;
pub mod compensation;
pub mod handlers;
pub mod poller;
pub mod project_state;
pub mod prompts;
pub mod report;
pub mod requester;
pub mod response;
pub mod submission;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::repo_content::RepoContentSource;
use crate::store::AssessmentStore;

use requester::AnalysisRequester;

/// Tunables for the sweeps and the lock horizon.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub pacing: Duration,
    pub lock_period: chrono::Duration,
    pub analysis_interval: Duration,
    pub report_interval: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.analysis_batch_size,
            pacing: config.analysis_pacing,
            lock_period: chrono::Duration::days(config.project_lock_days),
            analysis_interval: config.analysis_sweep_interval,
            report_interval: config.report_sweep_interval,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pacing: Duration::from_secs(10),
            lock_period: chrono::Duration::days(7),
            analysis_interval: Duration::from_secs(300),
            report_interval: Duration::from_secs(600),
        }
    }
}

/// Everything a pipeline step needs. Cheap to clone; shared by the sweeps and
/// the HTTP state.
#[derive(Clone)]
pub struct AssessmentPipeline {
    pub store: Arc<dyn AssessmentStore>,
    pub requester: AnalysisRequester,
    pub content: Arc<dyn RepoContentSource>,
    pub settings: PipelineSettings,
}

impl AssessmentPipeline {
    pub fn new(
        store: Arc<dyn AssessmentStore>,
        requester: AnalysisRequester,
        content: Arc<dyn RepoContentSource>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            requester,
            content,
            settings,
        }
    }
}
