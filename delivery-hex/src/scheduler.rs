//! Named background jobs.
//!
//! Jobs are registered by name and can be run on demand (`run_now`) or on a
//! fixed period (`spawn_interval`). Both paths call the same `Job::run`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, instrument, warn};

use delivery_types::{AppError, JobOutcome, JobRunResponse};

/// A unit of background work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<JobOutcome, AppError>;
}

/// Registry of jobs keyed by name.
#[derive(Default)]
pub struct Scheduler {
    jobs: HashMap<String, Arc<dyn Job>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job, replacing any job with the same name.
    pub fn register(&mut self, job: Arc<dyn Job>) -> &mut Self {
        let name = job.name().to_string();
        if self.jobs.insert(name.clone(), job).is_some() {
            warn!(job = %name, "replaced previously registered job");
        }
        self
    }

    /// Registered job names, sorted.
    pub fn job_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.jobs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn job(&self, name: &str) -> Result<Arc<dyn Job>, AppError> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job {}", name)))
    }

    /// Runs a job to completion and reports its outcome.
    #[instrument(skip(self))]
    pub async fn run_now(&self, name: &str) -> Result<JobRunResponse, AppError> {
        let job = self.job(name)?;
        info!(job = %name, "running job on demand");
        let outcome = job.run().await?;
        Ok(JobRunResponse::new(name, outcome))
    }

    /// Starts a task that runs the job every `period`, first after one period.
    ///
    /// Failures are logged and the task waits for the next tick. Abort the
    /// returned handle to stop it.
    pub fn spawn_interval(&self, name: &str, period: Duration) -> Result<JoinHandle<()>, AppError> {
        if period.is_zero() {
            return Err(AppError::BadRequest("Job period must be positive".into()));
        }

        let job = self.job(name)?;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(job = %name, period_secs = period.as_secs(), "scheduled job");

        Ok(tokio::spawn(async move {
            loop {
                ticker.tick().await;
                run_scheduled(job.as_ref()).await;
            }
        }))
    }
}

#[instrument(skip(job), fields(job = %job.name()))]
async fn run_scheduled(job: &dyn Job) {
    match job.run().await {
        Ok(outcome) => info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "scheduled job finished"
        ),
        Err(e) => error!("scheduled job failed: {}", e),
    }
}
