//! The process-wide poll loop.
//!
//! Fetches pending jobs on a fixed cadence and feeds them, strictly
//! sequentially, to the [`JobProcessor`]. Built to run unattended
//! indefinitely: a fetch failure is logged and retried next cycle, a job
//! failure is contained in its report, and shutdown is only observed
//! between cycles so no in-flight automation is aborted mid-sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::automation::UiDriver;
use crate::processor::{JobProcessor, RenderReport};
use crate::queue::QueueClient;
use crate::ui::JobProgress;

pub struct Worker<D: UiDriver> {
    queue: Arc<QueueClient>,
    processor: JobProcessor<D>,
    poll_interval: Duration,
    verbose: bool,
}

impl<D: UiDriver> Worker<D> {
    pub fn new(
        queue: Arc<QueueClient>,
        processor: JobProcessor<D>,
        poll_interval: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            queue,
            processor,
            poll_interval,
            verbose,
        }
    }

    /// Poll until the shutdown signal flips. Jobs picked up in a cycle
    /// are finished before the signal is honored.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.poll_interval.as_secs(), "worker started");
        loop {
            self.run_once().await;

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("worker stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One poll cycle: fetch the pending list and process every job in
    /// it. Neither a fetch failure nor a job failure escapes this method.
    pub async fn run_once(&self) -> Vec<RenderReport> {
        let jobs = match self.queue.pending_renders().await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(%err, "failed to fetch pending renders");
                return Vec::new();
            }
        };

        if jobs.is_empty() {
            debug!("no pending renders");
            return Vec::new();
        }

        info!(count = jobs.len(), "found pending renders");
        let mut reports = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let progress = JobProgress::start(&job.title);
            let report = self.processor.process(job).await;
            progress.complete(&report);
            if self.verbose {
                progress.print_report(&report);
            }
            reports.push(report);
        }
        reports
    }
}
