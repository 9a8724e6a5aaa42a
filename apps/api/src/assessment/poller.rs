//! The two periodic sweeps that drive the pipeline.
//!
//! Analysis sweep: up to `batch_size` PENDING analyses, oldest first, processed
//! one at a time with `pacing` between items. Report sweep: every candidate
//! whose projects are all COMPLETE gets a report. A failure on one item is
//! logged and the sweep moves on.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::assessment::project_state::{process_analysis, ItemOutcome};
use crate::assessment::report::{generate_report, ReportOutcome};
use crate::assessment::AssessmentPipeline;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSweepSummary {
    pub examined: usize,
    pub completed: usize,
    pub retrying: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl AnalysisSweepSummary {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Completed { .. } => self.completed += 1,
            ItemOutcome::Retrying { .. } => self.retrying += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSweepSummary {
    pub ready: usize,
    pub generated: usize,
    pub not_ready: usize,
    pub errors: usize,
}

pub async fn run_analysis_sweep(pipeline: &AssessmentPipeline) -> Result<AnalysisSweepSummary> {
    let batch = pipeline
        .store
        .pending_analyses(pipeline.settings.batch_size)
        .await?;

    let mut summary = AnalysisSweepSummary {
        examined: batch.len(),
        ..Default::default()
    };
    if batch.is_empty() {
        debug!("Analysis sweep: nothing pending");
        return Ok(summary);
    }
    info!("Analysis sweep: {} pending item(s)", batch.len());

    for (i, analysis) in batch.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pipeline.settings.pacing).await;
        }
        match process_analysis(pipeline, analysis).await {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                summary.errors += 1;
                error!("Analysis {} aborted: {e:#}", analysis.id);
            }
        }
    }

    info!(
        "Analysis sweep done: {} complete, {} retrying, {} failed, {} skipped, {} errors",
        summary.completed, summary.retrying, summary.failed, summary.skipped, summary.errors
    );
    Ok(summary)
}

pub async fn run_report_sweep(pipeline: &AssessmentPipeline) -> Result<ReportSweepSummary> {
    let ready = pipeline.store.candidates_ready_for_report().await?;

    let mut summary = ReportSweepSummary {
        ready: ready.len(),
        ..Default::default()
    };
    if ready.is_empty() {
        debug!("Report sweep: no candidate ready");
        return Ok(summary);
    }
    info!("Report sweep: {} candidate(s) ready", ready.len());

    for candidate_id in ready {
        match generate_report(pipeline, candidate_id).await {
            Ok(ReportOutcome::Generated(_)) => summary.generated += 1,
            Ok(ReportOutcome::NotReady(reason)) => {
                summary.not_ready += 1;
                debug!("Candidate {} skipped: {}", candidate_id, reason);
            }
            Err(e) => {
                summary.errors += 1;
                error!("Report for candidate {} failed: {e:#}", candidate_id);
            }
        }
    }
    Ok(summary)
}

/// Running sweep tasks plus the signal that stops them.
pub struct Sweeps {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Sweeps {
    /// Signals both loops and waits up to `grace` for an in-flight tick to
    /// finish. Tasks still running after that are aborted.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.stop.send(true);
        let aborts: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();
        let joined = tokio::time::timeout(grace, async {
            for handle in self.handles {
                let _ = handle.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("Sweeps still busy after {:?}; aborting", grace);
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

/// Releases items a previous process left mid-flight, then starts both loops.
pub async fn start_sweeps(pipeline: AssessmentPipeline) -> Result<Sweeps> {
    let released = pipeline.store.release_interrupted_analyses().await?;
    if released > 0 {
        warn!("Returned {} interrupted analysis row(s) to PENDING", released);
    }

    let (stop, stop_rx) = watch::channel(false);
    let analysis = {
        let pipeline = pipeline.clone();
        spawn_periodic(
            "analysis",
            pipeline.settings.analysis_interval,
            stop_rx.clone(),
            move || {
                let pipeline = pipeline.clone();
                async move {
                    if let Err(e) = run_analysis_sweep(&pipeline).await {
                        error!("Analysis sweep failed: {e:#}");
                    }
                }
            },
        )
    };
    let report = spawn_periodic(
        "report",
        pipeline.settings.report_interval,
        stop_rx,
        move || {
            let pipeline = pipeline.clone();
            async move {
                if let Err(e) = run_report_sweep(&pipeline).await {
                    error!("Report sweep failed: {e:#}");
                }
            }
        },
    );

    Ok(Sweeps {
        stop,
        handles: vec![analysis, report],
    })
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut stop: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!("{} sweep started (every {}s)", name, period.as_secs());
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = interval.tick() => tick().await,
            }
            if *stop.borrow() {
                break;
            }
        }
        info!("{} sweep stopped", name);
    })
}
