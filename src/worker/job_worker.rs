use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::db::{FibJob, JobRepository, JobRequestRecord, JobStatus};
use crate::pipeline::{execute, Execution, TaskRegistry};

/// Background worker that claims job requests and runs their tasks
pub struct JobWorker {
    repo: Arc<dyn JobRepository>,
    registry: Arc<TaskRegistry>,
    poll_interval: Duration,
}

impl JobWorker {
    /// Create a new JobWorker instance
    pub fn new(
        repo: Arc<dyn JobRepository>,
        registry: Arc<TaskRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            repo,
            registry,
            poll_interval,
        }
    }

    /// Run worker with semaphore-based bounded concurrency
    ///
    /// # Architecture
    /// - Acquires a semaphore permit, then claims the next `new` job
    /// - Spawns the job onto a local `JoinSet`; the permit is held until it finishes
    /// - Sleeps for the poll interval when no jobs are available
    /// - On shutdown, stops claiming jobs and waits for in-flight ones
    ///
    /// # Concurrency Model
    /// - Permits are shared by all workers, so the semaphore bounds the total
    ///   number of tasks running at once
    /// - A job row is claimed by exactly one worker, and `fib_num` is unique,
    ///   so no two running tasks ever share a target
    pub async fn run(
        &self,
        worker_id: u32,
        semaphore: Arc<Semaphore>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Worker {} started with semaphore-based concurrency", worker_id);
        let mut in_flight = JoinSet::new();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!("Worker {} failed to acquire semaphore: {:?}", worker_id, e);
                        break;
                    }
                },
                _ = shutdown_rx.changed() => break,
            };

            match self.repo.acquire_next_job().await {
                Ok(Some(job)) => {
                    info!(
                        "Worker {} acquired job: id={}, fib_num={}",
                        worker_id,
                        job.id(),
                        job.fib_num
                    );

                    let repo = self.repo.clone();
                    let registry = self.registry.clone();
                    in_flight.spawn(async move {
                        let status = process_job(repo.as_ref(), &registry, job).await;
                        drop(permit);
                        status
                    });
                }
                Ok(None) => {
                    drop(permit);
                    debug!("Worker {} found no jobs available, sleeping...", worker_id);
                    idle(&mut shutdown_rx, self.poll_interval).await;
                }
                Err(e) => {
                    drop(permit);
                    error!("Worker {} encountered database error: {:?}", worker_id, e);
                    idle(&mut shutdown_rx, Duration::from_secs(1)).await;
                }
            }

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    error!("Worker {} job task failed to join: {:?}", worker_id, e);
                }
            }
        }

        if !in_flight.is_empty() {
            info!("Worker {} waiting for {} in-flight jobs", worker_id, in_flight.len());
        }
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                error!("Worker {} job task failed to join: {:?}", worker_id, e);
            }
        }

        info!("Worker {} stopped", worker_id);
    }
}

async fn idle(shutdown_rx: &mut watch::Receiver<bool>, duration: Duration) {
    tokio::select! {
        _ = sleep(duration) => {}
        _ = shutdown_rx.changed() => {}
    }
}

/// Build the job's task, run it if its target is missing, and record the outcome.
///
/// The task runs on the blocking pool. Returns the status written back to the
/// repository.
pub async fn process_job(
    repo: &dyn JobRepository,
    registry: &TaskRegistry,
    job: FibJob,
) -> JobStatus {
    let id = job.id();

    let status = match registry.build(&job.request.kind, &job.params()) {
        Ok(task) => match tokio::task::spawn_blocking(move || execute(task.as_ref())).await {
            Ok(Ok(Execution::Completed)) => {
                info!("Completed job {}", id);
                JobStatus::Success
            }
            Ok(Ok(Execution::AlreadyComplete)) => {
                info!("Job {} target already present, nothing to run", id);
                JobStatus::Success
            }
            Ok(Err(e)) if e.is_retryable() => {
                warn!("Job {} failed with retryable error: {}", id, e);
                JobStatus::Failed
            }
            Ok(Err(e)) => {
                error!("Job {} failed: {}", id, e);
                JobStatus::Failed
            }
            Err(e) => {
                error!("Job {} task panicked: {:?}", id, e);
                JobStatus::Failed
            }
        },
        Err(e) => {
            error!("Job {} cannot be scheduled: {}", id, e);
            JobStatus::Failed
        }
    };

    match repo.update_job_status(id, status).await {
        Ok(_) => info!("Job {}: status={}", id, status),
        Err(e) => error!("Failed to update job {}: {:?}", id, e),
    }

    status
}
