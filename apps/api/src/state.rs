use crate::assessment::AssessmentPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Store, requester and repository content source, shared with the sweeps.
    pub pipeline: AssessmentPipeline,
}
