use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rcp_crypto::CanonicalHasher;
use rcp_types::{ProvenanceRecord, ProvenanceState, RecipeContent, WalletAddress};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::orchestrator::AnchorPlan;

/// Publication status of a recipe. Not part of the content hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// A stored recipe: hashed content plus the metadata around it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub content: RecipeContent,
    pub author_wallet: Option<WalletAddress>,
    pub status: RecipeStatus,
    pub provenance: ProvenanceRecord,
    /// The ledger call still owed for `provenance`, kept until a resolved
    /// record is stored so an interrupted anchor can be resumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_anchor: Option<AnchorPlan>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// A new recipe whose provenance is the interim record of `plan`.
    pub fn new(content: RecipeContent, author_wallet: Option<WalletAddress>, plan: AnchorPlan) -> Self {
        let now = Utc::now();
        let mut recipe = Self {
            id: Uuid::now_v7(),
            content,
            author_wallet,
            status: RecipeStatus::default(),
            provenance: plan.interim_record(),
            pending_anchor: None,
            created_at: now,
            updated_at: now,
        };
        recipe.apply_plan(plan);
        recipe
    }

    /// Whether the provenance record describes the stored content.
    pub fn provenance_is_current(&self) -> bool {
        CanonicalHasher::verify(&self.content, &self.provenance.recipe_hash)
    }

    /// Whether `resolved` may replace the stored record.
    ///
    /// The hashes must match. A pending record takes any resolution; a failed
    /// one only an anchor. An anchored or unwalleted record is final.
    pub fn accepts_resolution(&self, resolved: &ProvenanceRecord) -> bool {
        if self.provenance.recipe_hash != resolved.recipe_hash {
            return false;
        }
        match self.provenance.state() {
            ProvenanceState::Pending => true,
            ProvenanceState::Failed(_) => resolved.is_anchored(),
            ProvenanceState::Anchored | ProvenanceState::NoWallet => false,
        }
    }

    fn apply_plan(&mut self, plan: AnchorPlan) {
        self.provenance = plan.interim_record();
        self.pending_anchor = plan.needs_ledger().then_some(plan);
    }
}

/// Persistence seam for recipes.
///
/// The provenance record is owned by the recipe; anchoring code hands new
/// records to the repository and never stores them anywhere else.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn insert(&self, recipe: Recipe) -> ProvenanceResult<()>;

    async fn get(&self, id: Uuid) -> ProvenanceResult<Option<Recipe>>;

    /// Replace the content. With `Some(plan)` the provenance becomes the
    /// plan's interim record; `None` keeps the current record, for edits
    /// that leave the content hash unchanged.
    async fn update_content(
        &self,
        id: Uuid,
        content: RecipeContent,
        author_wallet: Option<WalletAddress>,
        plan: Option<AnchorPlan>,
    ) -> ProvenanceResult<Recipe>;

    /// Store a resolved record if [`Recipe::accepts_resolution`] allows it,
    /// clearing the owed ledger call. Returns `false` when the record was
    /// refused.
    async fn set_provenance(&self, id: Uuid, record: ProvenanceRecord) -> ProvenanceResult<bool>;

    /// Recipes that still owe a ledger call, oldest first.
    async fn pending(&self) -> ProvenanceResult<Vec<Recipe>>;
}

/// In-memory recipe store for tests and local demos.
#[derive(Default)]
pub struct InMemoryRecipeRepository {
    recipes: RwLock<HashMap<Uuid, Recipe>>,
}

impl InMemoryRecipeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.recipes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite stored content without touching provenance.
    pub fn tamper(&self, id: Uuid, content: RecipeContent) -> bool {
        let mut recipes = self.recipes.write().unwrap_or_else(PoisonError::into_inner);
        match recipes.get_mut(&id) {
            Some(recipe) => {
                recipe.content = content;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RecipeRepository for InMemoryRecipeRepository {
    async fn insert(&self, recipe: Recipe) -> ProvenanceResult<()> {
        let mut recipes = self.recipes.write().unwrap_or_else(PoisonError::into_inner);
        if recipes.contains_key(&recipe.id) {
            return Err(ProvenanceError::RecipeExists(recipe.id));
        }
        recipes.insert(recipe.id, recipe);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> ProvenanceResult<Option<Recipe>> {
        let recipes = self.recipes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(recipes.get(&id).cloned())
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: RecipeContent,
        author_wallet: Option<WalletAddress>,
        plan: Option<AnchorPlan>,
    ) -> ProvenanceResult<Recipe> {
        let mut recipes = self.recipes.write().unwrap_or_else(PoisonError::into_inner);
        let recipe = recipes
            .get_mut(&id)
            .ok_or(ProvenanceError::RecipeNotFound(id))?;
        recipe.content = content;
        if author_wallet.is_some() {
            recipe.author_wallet = author_wallet;
        }
        if let Some(plan) = plan {
            recipe.apply_plan(plan);
        }
        recipe.updated_at = Utc::now();
        Ok(recipe.clone())
    }

    async fn set_provenance(&self, id: Uuid, record: ProvenanceRecord) -> ProvenanceResult<bool> {
        let mut recipes = self.recipes.write().unwrap_or_else(PoisonError::into_inner);
        let recipe = recipes
            .get_mut(&id)
            .ok_or(ProvenanceError::RecipeNotFound(id))?;
        if !recipe.accepts_resolution(&record) {
            return Ok(false);
        }
        recipe.provenance = record;
        recipe.pending_anchor = None;
        Ok(true)
    }

    async fn pending(&self) -> ProvenanceResult<Vec<Recipe>> {
        let recipes = self.recipes.read().unwrap_or_else(PoisonError::into_inner);
        let mut pending: Vec<Recipe> = recipes
            .values()
            .filter(|r| r.pending_anchor.is_some())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.id);
        Ok(pending)
    }
}
