use std::sync::Arc;
use std::time::Duration;

use rcp_types::ProvenanceState;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::orchestrator::{AnchorPlan, ProvenanceOrchestrator};
use crate::repository::RecipeRepository;

/// Default capacity of the anchor queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Attempts at storing a resolved record before the job is given up.
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

/// A pending ledger call for one recipe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorJob {
    pub recipe_id: Uuid,
    pub plan: AnchorPlan,
}

/// Sending half of the anchor queue.
#[derive(Clone)]
pub struct AnchorQueue {
    sender: mpsc::Sender<AnchorJob>,
}

impl AnchorQueue {
    /// A queue holding at most `capacity` jobs, plus its receiving end.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<AnchorJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Hand `job` to the worker without waiting for capacity.
    pub fn enqueue(&self, job: AnchorJob) -> ProvenanceResult<()> {
        let (recipe, hash) = (job.recipe_id, job.plan.hash());
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!(%recipe, %hash, "anchor job queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(ProvenanceError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(ProvenanceError::QueueClosed),
        }
    }
}

/// What became of one processed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The resolved record was stored.
    Applied(ProvenanceState),
    /// The content changed before the record could be stored.
    Stale,
    /// The record was already resolved; the ledger was not called.
    Settled,
    /// The recipe no longer exists.
    Missing,
}

/// Counters reported when a worker stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub applied: usize,
    pub stale: usize,
    pub settled: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Drains the anchor queue, resolving each job through the orchestrator
/// and writing the record back to the repository.
///
/// The stored record is checked before the ledger is called, so stale and
/// repeated jobs cost nothing. A job whose record cannot be stored stays
/// pending on the recipe and is picked up again by
/// [`crate::RecipeService::resume_pending`].
pub struct AnchorWorker {
    orchestrator: Arc<ProvenanceOrchestrator>,
    repository: Arc<dyn RecipeRepository>,
    receiver: mpsc::Receiver<AnchorJob>,
    write_attempts: u32,
    retry_delay: Duration,
}

impl AnchorWorker {
    pub fn new(
        orchestrator: Arc<ProvenanceOrchestrator>,
        repository: Arc<dyn RecipeRepository>,
        receiver: mpsc::Receiver<AnchorJob>,
    ) -> Self {
        Self {
            orchestrator,
            repository,
            receiver,
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
            retry_delay: Duration::from_millis(200),
        }
    }

    /// Retry a failed record write up to `attempts` times in total, waiting
    /// `delay` times the attempt number in between.
    pub fn with_write_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.write_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Run until every [`AnchorQueue`] handle is dropped.
    pub async fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        while let Some(job) = self.receiver.recv().await {
            stats.processed += 1;
            match self.process(&job).await {
                Ok(JobOutcome::Applied(_)) => stats.applied += 1,
                Ok(JobOutcome::Stale) => stats.stale += 1,
                Ok(JobOutcome::Settled) => stats.settled += 1,
                Ok(JobOutcome::Missing) => stats.missing += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(recipe = %job.recipe_id, error = %e, "anchor job left pending");
                }
            }
        }
        info!(
            processed = stats.processed,
            applied = stats.applied,
            stale = stats.stale,
            failed = stats.failed,
            "anchor worker stopped"
        );
        stats
    }

    pub async fn process(&self, job: &AnchorJob) -> ProvenanceResult<JobOutcome> {
        let Some(recipe) = self.repository.get(job.recipe_id).await? else {
            return Ok(JobOutcome::Missing);
        };
        if recipe.provenance.recipe_hash != job.plan.hash() {
            debug!(recipe = %job.recipe_id, hash = %job.plan.hash(), "skipping stale anchor job");
            return Ok(JobOutcome::Stale);
        }
        if recipe.provenance.state() != ProvenanceState::Pending {
            debug!(recipe = %job.recipe_id, state = %recipe.provenance.state(), "anchor already resolved");
            return Ok(JobOutcome::Settled);
        }

        let record = self.orchestrator.execute(&job.plan).await;
        let state = record.state();

        let mut attempt = 1;
        loop {
            match self.repository.set_provenance(job.recipe_id, record.clone()).await {
                Ok(true) => {
                    debug!(recipe = %job.recipe_id, %state, "provenance stored");
                    return Ok(JobOutcome::Applied(state));
                }
                Ok(false) => {
                    debug!(recipe = %job.recipe_id, hash = %job.plan.hash(), "dropping stale provenance");
                    return Ok(JobOutcome::Stale);
                }
                Err(ProvenanceError::RecipeNotFound(_)) => return Ok(JobOutcome::Missing),
                Err(e) if attempt < self.write_attempts => {
                    warn!(recipe = %job.recipe_id, attempt, error = %e, "storing provenance failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
