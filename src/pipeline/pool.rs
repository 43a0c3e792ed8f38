//! Fixed-size worker pool with a bounded queue and caller-runs overflow.
//!
//! The queue holds at most `size` jobs. When it is full, [`WorkerPool::execute`]
//! runs the job on the calling thread before returning, so at most
//! `size` queued + `size` running + 1 inline jobs exist at any instant.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, trace, warn};

use crate::error::{IndexerError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a pool shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOutcome {
    /// Jobs the submitting thread ran itself because the queue was full.
    pub ran_inline: usize,
    /// The workers did not finish before the deadline.
    pub timed_out: bool,
}

pub struct WorkerPool {
    sender: Sender<Job>,
    done: Receiver<()>,
    workers: Vec<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    ran_inline: usize,
}

impl WorkerPool {
    /// Start `size` named worker threads.
    ///
    /// # Errors
    ///
    /// [`IndexerError::InvalidConfig`] if `size` is zero or a thread cannot be spawned.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(IndexerError::InvalidConfig(
                "number of worker threads must be at least 1".into(),
            ));
        }

        let (sender, receiver) = crossbeam_channel::bounded::<Job>(size);
        let (done_tx, done) = crossbeam_channel::bounded::<()>(size);
        let cancelled = Arc::new(AtomicBool::new(false));

        let workers = (0..size)
            .map(|index| {
                let receiver = receiver.clone();
                let done_tx = done_tx.clone();
                let cancelled = Arc::clone(&cancelled);
                thread::Builder::new()
                    .name(format!("delta-worker-{index}"))
                    .spawn(move || {
                        for job in receiver.iter() {
                            if cancelled.load(Ordering::SeqCst) {
                                continue;
                            }
                            run_job(job);
                        }
                        let _ = done_tx.send(());
                    })
                    .map_err(|e| IndexerError::InvalidConfig(format!("cannot spawn worker: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(size, "Worker pool started");
        Ok(Self {
            sender,
            done,
            workers,
            cancelled,
            ran_inline: 0,
        })
    }

    /// Queue a job, or run it on this thread if the queue is full.
    pub fn execute<F>(&mut self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender.try_send(Box::new(job)) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                trace!("Worker queue full, running job on the submitting thread");
                self.ran_inline += 1;
                run_job(job);
            }
            Err(TrySendError::Disconnected(job)) => {
                warn!("No worker left, running job on the submitting thread");
                self.ran_inline += 1;
                run_job(job);
            }
        }
    }

    /// Stop accepting jobs and wait up to `timeout` for queued and running jobs.
    ///
    /// On timeout the workers are told to discard whatever is still queued and
    /// are left to finish their current job in the background.
    pub fn shutdown(self, timeout: Duration) -> ShutdownOutcome {
        let Self {
            sender,
            done,
            workers,
            cancelled,
            ran_inline,
        } = self;
        drop(sender);

        let deadline = Instant::now() + timeout;
        let all_done = (0..workers.len()).all(|_| done.recv_deadline(deadline).is_ok());

        if !all_done {
            cancelled.store(true, Ordering::SeqCst);
            warn!(
                timeout_secs = timeout.as_secs(),
                "Workers did not terminate in time, pending work cancelled"
            );
            return ShutdownOutcome {
                ran_inline,
                timed_out: true,
            };
        }

        for worker in workers {
            if worker.join().is_err() {
                error!("Worker thread panicked");
            }
        }
        ShutdownOutcome {
            ran_inline,
            timed_out: false,
        }
    }
}

/// Run a job, containing any panic to the job itself.
fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("Job panicked, continuing with the next one");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(IndexerError::InvalidConfig(_))));
    }

    #[test]
    fn test_runs_every_job_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pool = WorkerPool::new(3).unwrap();
        for i in 0..50 {
            let seen = Arc::clone(&seen);
            pool.execute(move || seen.lock().unwrap().push(i));
        }
        let outcome = pool.shutdown(Duration::from_secs(10));

        assert!(!outcome.timed_out);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_full_queue_runs_on_caller() {
        let caller = thread::current().id();
        let inline = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();

        let mut pool = WorkerPool::new(1).unwrap();
        // occupies the worker
        let rx = release_rx.clone();
        pool.execute(move || {
            let _ = rx.recv();
        });
        thread::sleep(Duration::from_millis(50));
        // fills the queue
        let rx = release_rx.clone();
        pool.execute(move || {
            let _ = rx.recv();
        });
        // overflows
        let counter = Arc::clone(&inline);
        pool.execute(move || {
            if thread::current().id() == caller {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        let outcome = pool.shutdown(Duration::from_secs(10));

        assert_eq!(inline.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.ran_inline, 1);
        assert!(!outcome.timed_out);
    }

    #[test]
    fn test_shutdown_timeout_cancels_queued_jobs() {
        let ran = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();

        let mut pool = WorkerPool::new(1).unwrap();
        pool.execute(move || {
            let _ = release_rx.recv();
        });
        thread::sleep(Duration::from_millis(50));
        let counter = Arc::clone(&ran);
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = pool.shutdown(Duration::from_millis(100));
        assert!(outcome.timed_out);

        release_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(1).unwrap();
        pool.execute(|| panic!("boom"));
        let counter = Arc::clone(&ran);
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!pool.shutdown(Duration::from_secs(10)).timed_out);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
