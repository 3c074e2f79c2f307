use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info};

use crate::classifier::KnnClassifier;
use crate::dataset::Dataset;
use crate::distance::Metric;
use crate::error::{KnnError, Result};
use crate::partition::partition;
use crate::protocol::{link, Assignment, WorkerLink};
use crate::worker::run_worker;

/// Validated settings for one classification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    k: NonZeroUsize,
    metric: Metric,
    num_workers: NonZeroUsize,
}

impl RunConfig {
    pub fn new(k: usize, metric: Metric, num_workers: usize) -> Result<Self> {
        let k = NonZeroUsize::new(k)
            .ok_or_else(|| KnnError::InvalidConfiguration("K must be at least 1".to_owned()))?;
        let num_workers = NonZeroUsize::new(num_workers).ok_or_else(|| {
            KnnError::InvalidConfiguration("the number of workers must be at least 1".to_owned())
        })?;
        Ok(RunConfig {
            k,
            metric,
            num_workers,
        })
    }

    pub fn k(&self) -> usize {
        self.k.get()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers.get()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            k: NonZeroUsize::MIN,
            metric: Metric::Euclidean,
            num_workers: NonZeroUsize::MIN,
        }
    }
}

#[derive(Debug)]
enum WorkerStatus {
    Completed,
    Failed(String),
}

// Sent by every worker as its very last action, whatever the outcome
#[derive(Debug)]
struct WorkerExit {
    worker: usize,
    status: WorkerStatus,
}

/// Splits the test set across a pool of workers and adds up their results.
#[derive(Debug, Clone, Copy)]
pub struct Coordinator<'a> {
    config: RunConfig,
    training: &'a Dataset,
    testing: &'a Dataset,
}

impl<'a> Coordinator<'a> {
    pub fn new(config: RunConfig, training: &'a Dataset, testing: &'a Dataset) -> Self {
        Coordinator {
            config,
            training,
            testing,
        }
    }

    /// Total number of correctly classified test images.
    ///
    /// Runs exactly `num_workers` workers, each on its own thread. The sum is
    /// returned only once every worker has reported and exited; any worker
    /// failure fails the whole run.
    pub fn run(&self) -> Result<usize> {
        let classifier = KnnClassifier::with_k(self.training, self.config.k, self.config.metric);
        info!(
            training = self.training.len(),
            testing = self.testing.len(),
            k = classifier.k(),
            metric = %classifier.metric(),
            workers = self.config.num_workers(),
            "starting run"
        );
        let total = self.run_with(|link| run_worker(link, &classifier, self.testing))?;
        info!(correct = total, "run finished");
        Ok(total)
    }

    // Runs `body` as every worker's whole lifetime and aggregates the reports
    fn run_with<F>(&self, body: F) -> Result<usize>
    where
        F: Fn(WorkerLink) -> Result<()> + Sync,
    {
        let num_workers = self.config.num_workers();
        let ranges = partition(self.testing.len(), num_workers)?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("knn-worker-{}", i))
            .build()?;
        let (exit_tx, exit_rx) = mpsc::channel::<WorkerExit>();

        debug!("creating workers");
        // The coordinator stays on this thread; only the workers run in the pool
        pool.in_place_scope(|scope| -> Result<usize> {
            let mut links = Vec::with_capacity(num_workers);
            for worker in 0..num_workers {
                let (coordinator_link, worker_link) = link(worker);
                let exit_tx = exit_tx.clone();
                let body = &body;
                scope.spawn(move |_| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(worker_link)));
                    let status = match outcome {
                        Ok(Ok(())) => WorkerStatus::Completed,
                        Ok(Err(e)) => {
                            error!(worker, "worker failed: {}", e);
                            WorkerStatus::Failed(e.to_string())
                        }
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            error!(worker, "worker panicked: {}", message);
                            WorkerStatus::Failed(format!("panicked: {}", message))
                        }
                    };
                    if exit_tx.send(WorkerExit { worker, status }).is_err() {
                        debug!(worker, "coordinator gone before exit status was sent");
                    }
                });
                links.push(coordinator_link);
            }
            drop(exit_tx);

            for (link, range) in links.iter().zip(&ranges) {
                link.send_assignment(Assignment::from(*range))?;
            }

            debug!("waiting for workers");
            let mut total = 0;
            for link in &links {
                total += link.recv_report()?.correct;
            }

            // Every worker sends exactly one exit status, so this waits for all of them
            for exit in exit_rx.iter().take(num_workers) {
                match exit.status {
                    WorkerStatus::Completed => debug!(worker = exit.worker, "worker exited"),
                    WorkerStatus::Failed(reason) => {
                        return Err(KnnError::WorkerAbnormalTermination {
                            worker: exit.worker,
                            reason,
                        })
                    }
                }
            }
            Ok(total)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
