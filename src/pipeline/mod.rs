//! Ingestion pipeline: discovery, filtering and concurrent per-file delivery.
//!
//! Retry is by reprocessing: a file that fails stays in the delta folder and
//! is picked up again by the next run. Nothing is retried within a run.

pub mod pool;
pub mod task;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{ActiveLists, IngestConfig};
use crate::delta::{discover, filter};
use crate::error::Result;
use crate::model::delta::DeltaFile;

pub use pool::{ShutdownOutcome, WorkerPool};
pub use task::{process, TaskContext, TaskOutcome};

/// Settings of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Number of worker threads.
    pub concurrency: usize,
    /// Files modified more recently than this are left for the next run.
    pub min_file_age: Duration,
    /// How long to wait for workers once everything is submitted.
    pub shutdown_timeout: Duration,
}

impl RunOptions {
    pub fn new(concurrency: usize, ingest: &IngestConfig) -> Self {
        Self {
            concurrency,
            min_file_age: ingest.min_file_age(),
            shutdown_timeout: ingest.shutdown_timeout(),
        }
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub submitted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Files processed by the submitting thread because the queue was full.
    pub ran_inline: usize,
    /// Workers were still busy at the shutdown deadline.
    pub timed_out: bool,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

/// Process `files` on a pool of `options.concurrency` workers.
///
/// # Errors
///
/// Only pool start-up fails (e.g. zero workers). Per-file failures are
/// counted in the report.
pub fn run(files: Vec<DeltaFile>, options: &RunOptions, ctx: Arc<TaskContext>) -> Result<RunReport> {
    let mut pool = WorkerPool::new(options.concurrency)?;
    let counters = Arc::new(Counters::default());
    let submitted = files.len();

    for file in files {
        let ctx = Arc::clone(&ctx);
        let counters = Arc::clone(&counters);
        pool.execute(move || {
            let counter = match process(&file, &ctx) {
                TaskOutcome::Delivered => &counters.delivered,
                TaskOutcome::Failed => &counters.failed,
            };
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    let outcome = pool.shutdown(options.shutdown_timeout);
    let report = RunReport {
        submitted,
        delivered: counters.delivered.load(Ordering::SeqCst),
        failed: counters.failed.load(Ordering::SeqCst),
        ran_inline: outcome.ran_inline,
        timed_out: outcome.timed_out,
    };
    info!(
        submitted = report.submitted,
        delivered = report.delivered,
        failed = report.failed,
        ran_inline = report.ran_inline,
        timed_out = report.timed_out,
        "Indexing run finished"
    );
    Ok(report)
}

/// Discover, filter and process the delta folder at `root`.
///
/// # Errors
///
/// Fails if the folder cannot be listed or the pool cannot start.
pub fn index_folder(
    root: &Path,
    active: &ActiveLists,
    options: &RunOptions,
    ctx: Arc<TaskContext>,
) -> Result<RunReport> {
    let files = discover(root, options.min_file_age)?;
    let files = filter(files, active);
    run(files, options, ctx)
}
