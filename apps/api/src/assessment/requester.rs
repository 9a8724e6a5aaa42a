//! One structured text-generation call with in-call backoff.
//!
//! Two retry layers exist in the pipeline and they never share a counter:
//! - here: up to `BackoffPolicy::max_attempts` attempts, only for rate-limit or
//!   overload signals, invisible to persisted state when it recovers;
//! - `ProjectAnalysis::retry_count`: the persisted cross-sweep budget, charged
//!   once per hard failure returned from this module.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::llm_client::{GenerationRequest, LlmError, TextGenerator};
use crate::repo_content::ContentError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("provider still rate-limited after {attempts} attempts: {source}")]
    TransientExhausted {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    #[error("provider call failed: {0}")]
    Provider(#[source] LlmError),

    #[error("invalid model response: {0}")]
    Validation(String),

    #[error("repository content unavailable: {0}")]
    Content(#[from] ContentError),
}

/// Exponential in-call backoff: `base_delay`, then doubling per retry.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Stateless wrapper around the text-generation capability.
#[derive(Clone)]
pub struct AnalysisRequester {
    generator: Arc<dyn TextGenerator>,
    backoff: BackoffPolicy,
}

impl AnalysisRequester {
    pub fn new(generator: Arc<dyn TextGenerator>, backoff: BackoffPolicy) -> Self {
        Self { generator, backoff }
    }

    /// Issues the call, absorbing transient failures with backoff.
    /// Returns the raw model text; callers validate it via `assessment::response`.
    pub async fn request(&self, request: &GenerationRequest) -> Result<String, AnalysisError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.generator.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.backoff.max_attempts => {
                    let delay = self.backoff.delay_after(attempt);
                    warn!(
                        "Generation attempt {}/{} hit a transient error ({}), retrying after {}ms...",
                        attempt,
                        self.backoff.max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(AnalysisError::TransientExhausted {
                        attempts: attempt,
                        source: e,
                    })
                }
                Err(e) => return Err(AnalysisError::Provider(e)),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedGenerator};
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "sys",
            instructions: "review".to_string(),
            response_budget: 128,
            temperature: 0.2,
        }
    }

    #[test]
    fn test_backoff_doubles_from_five_seconds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert_eq!(policy.delay_after(3), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_absorbed_within_budget() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Scripted::RateLimited,
            Scripted::Overloaded,
            Scripted::Text("{}".to_string()),
        ]));
        let requester = AnalysisRequester::new(generator.clone(), BackoffPolicy::default());

        let started = tokio::time::Instant::now();
        let text = requester.request(&request()).await.unwrap();

        assert_eq!(text, "{}");
        assert_eq!(generator.call_count(), 3);
        // 5s + 10s of virtual time.
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_beyond_budget_surface_as_hard_failure() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Scripted::RateLimited,
            Scripted::RateLimited,
            Scripted::RateLimited,
            Scripted::Text("{}".to_string()),
        ]));
        let requester = AnalysisRequester::new(generator.clone(), BackoffPolicy::default());

        let err = requester.request(&request()).await.unwrap_err();

        assert!(matches!(err, AnalysisError::TransientExhausted { attempts: 3, .. }));
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_is_not_retried() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Scripted::BadRequest,
            Scripted::Text("{}".to_string()),
        ]));
        let requester = AnalysisRequester::new(generator.clone(), BackoffPolicy::default());

        let err = requester.request(&request()).await.unwrap_err();

        assert!(matches!(err, AnalysisError::Provider(_)));
        assert_eq!(generator.call_count(), 1);
    }
}
