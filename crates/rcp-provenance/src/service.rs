use std::sync::Arc;

use rcp_types::{RecipeContent, VerificationReason, WalletAddress};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::orchestrator::{AnchorPlan, ProvenanceOrchestrator};
use crate::queue::{AnchorJob, AnchorQueue};
use crate::repository::{Recipe, RecipeRepository};

/// How a service hands anchoring off after the content write.
#[derive(Clone)]
pub enum AnchorMode {
    /// Await the ledger before returning.
    Inline,
    /// Store a pending record and leave the ledger call to an
    /// [`crate::AnchorWorker`].
    Queued(AnchorQueue),
}

/// Write path for recipes.
///
/// Content is persisted before any ledger work, and anchoring never fails
/// the call: its outcome only shows up on the returned provenance record.
/// In queued mode the call never waits on the worker either.
pub struct RecipeService {
    repository: Arc<dyn RecipeRepository>,
    orchestrator: Arc<ProvenanceOrchestrator>,
    mode: AnchorMode,
}

impl RecipeService {
    pub fn new(
        repository: Arc<dyn RecipeRepository>,
        orchestrator: Arc<ProvenanceOrchestrator>,
        mode: AnchorMode,
    ) -> Self {
        Self {
            repository,
            orchestrator,
            mode,
        }
    }

    pub fn repository(&self) -> &Arc<dyn RecipeRepository> {
        &self.repository
    }

    pub async fn create_recipe(
        &self,
        content: RecipeContent,
        author_wallet: Option<WalletAddress>,
    ) -> ProvenanceResult<Recipe> {
        let plan = ProvenanceOrchestrator::plan_create(&content, author_wallet);
        let recipe = Recipe::new(content, author_wallet, plan.clone());
        let id = recipe.id;
        self.repository.insert(recipe).await?;
        info!(recipe = %id, hash = %plan.hash(), "recipe created");

        self.anchor(id, plan).await;
        self.load(id).await
    }

    pub async fn update_recipe(
        &self,
        id: Uuid,
        content: RecipeContent,
        author_wallet: Option<WalletAddress>,
    ) -> ProvenanceResult<Recipe> {
        let prior = self.load(id).await?;

        let wallet = author_wallet.or(prior.author_wallet);
        let Some(plan) = ProvenanceOrchestrator::plan_update(&prior.provenance, &content, wallet) else {
            debug!(recipe = %id, "content hash unchanged, provenance kept");
            return self
                .repository
                .update_content(id, content, author_wallet, None)
                .await;
        };

        self.repository
            .update_content(id, content, author_wallet, Some(plan.clone()))
            .await?;
        info!(recipe = %id, hash = %plan.hash(), "recipe updated");

        self.anchor(id, plan).await;
        self.load(id).await
    }

    /// Hand every recipe that still owes a ledger call back to anchoring and
    /// return how many were handed off.
    ///
    /// Recipes end up here when the queue was full at write time or their
    /// resolved record could not be stored. In queued mode the sweep stops at
    /// a full queue and leaves the rest for the next run.
    pub async fn resume_pending(&self) -> ProvenanceResult<usize> {
        let mut resumed = 0;
        for recipe in self.repository.pending().await? {
            let Some(plan) = recipe.pending_anchor else {
                continue;
            };
            match &self.mode {
                AnchorMode::Inline => {
                    let record = self.orchestrator.execute(&plan).await;
                    self.repository.set_provenance(recipe.id, record).await?;
                }
                AnchorMode::Queued(queue) => match queue.enqueue(AnchorJob {
                    recipe_id: recipe.id,
                    plan,
                }) {
                    Ok(()) => {}
                    Err(ProvenanceError::QueueFull) => {
                        debug!(resumed, "anchor queue full, sweep paused");
                        break;
                    }
                    Err(e) => return Err(e),
                },
            }
            resumed += 1;
        }
        if resumed > 0 {
            info!(resumed, "pending anchors resumed");
        }
        Ok(resumed)
    }

    async fn load(&self, id: Uuid) -> ProvenanceResult<Recipe> {
        self.repository
            .get(id)
            .await?
            .ok_or(ProvenanceError::RecipeNotFound(id))
    }

    /// Anchor the stored content. Problems end up on the record, never in
    /// the caller's result.
    async fn anchor(&self, id: Uuid, plan: AnchorPlan) {
        if !plan.needs_ledger() {
            return;
        }
        let record = match &self.mode {
            AnchorMode::Inline => self.orchestrator.execute(&plan).await,
            AnchorMode::Queued(queue) => match queue.enqueue(AnchorJob {
                recipe_id: id,
                plan: plan.clone(),
            }) {
                Ok(()) => return,
                Err(ProvenanceError::QueueFull) => {
                    warn!(recipe = %id, "anchor queue full, recipe left pending");
                    return;
                }
                Err(e) => {
                    warn!(recipe = %id, error = %e, "anchor queue unavailable");
                    plan.failed_record(VerificationReason::BlockchainError)
                }
            },
        };
        if let Err(e) = self.repository.set_provenance(id, record).await {
            warn!(recipe = %id, error = %e, "storing provenance failed, recipe left pending");
        }
    }
}
