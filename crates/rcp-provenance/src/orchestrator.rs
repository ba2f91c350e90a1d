use std::sync::Arc;

use rcp_crypto::CanonicalHasher;
use rcp_ledger::{is_duplicate_text, AnchorReceipt, LedgerFailure, LedgerResult, RecipeLedger};
use rcp_types::{ProvenanceRecord, RecipeContent, RecipeHash, VerificationReason, WalletAddress};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What anchoring a content change requires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorPlan {
    /// No ledger call; the record is final.
    Settled(ProvenanceRecord),
    /// First registration of `hash`.
    Register {
        hash: RecipeHash,
        wallet: WalletAddress,
    },
    /// Move an anchored hash to its successor.
    Update {
        old_hash: RecipeHash,
        new_hash: RecipeHash,
        wallet: WalletAddress,
    },
}

impl AnchorPlan {
    /// Hash of the content this plan anchors.
    pub fn hash(&self) -> RecipeHash {
        match self {
            Self::Settled(record) => record.recipe_hash,
            Self::Register { hash, .. } => *hash,
            Self::Update { new_hash, .. } => *new_hash,
        }
    }

    pub fn needs_ledger(&self) -> bool {
        !matches!(self, Self::Settled(_))
    }

    /// The record to store when the ledger call will not be made.
    pub fn failed_record(&self, reason: VerificationReason) -> ProvenanceRecord {
        match self {
            Self::Settled(record) => record.clone(),
            Self::Register { hash, wallet } => ProvenanceRecord::failed(*hash, *wallet, reason),
            Self::Update {
                new_hash, wallet, ..
            } => ProvenanceRecord::failed(*new_hash, *wallet, reason),
        }
    }

    /// The record to store while the ledger call is outstanding.
    pub fn interim_record(&self) -> ProvenanceRecord {
        match self {
            Self::Settled(record) => record.clone(),
            Self::Register { hash, wallet } => ProvenanceRecord::pending(*hash, *wallet),
            Self::Update {
                new_hash, wallet, ..
            } => ProvenanceRecord::pending(*new_hash, *wallet),
        }
    }
}

/// Result of reconciling provenance with an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Content hash did not change; keep the existing record.
    Unchanged,
    /// The record to store in place of the prior one.
    Replaced(ProvenanceRecord),
}

/// Map a ledger failure onto the reason stored on a provenance record.
pub fn classify_failure(failure: &LedgerFailure) -> VerificationReason {
    let duplicate = match failure {
        LedgerFailure::Duplicate(_) => true,
        LedgerFailure::Reverted(text)
        | LedgerFailure::Rpc { message: text, .. }
        | LedgerFailure::Protocol(text) => is_duplicate_text(text),
        _ => false,
    };
    if duplicate {
        VerificationReason::HashAlreadyExists
    } else {
        VerificationReason::BlockchainError
    }
}

/// Provenance state machine.
///
/// Decides whether a create or update needs the ledger, calls it, and turns
/// the outcome into a [`ProvenanceRecord`]. It never fails: every ledger
/// failure becomes a failed record. Persisting the record is left to the
/// caller.
pub struct ProvenanceOrchestrator {
    ledger: Arc<dyn RecipeLedger>,
}

impl ProvenanceOrchestrator {
    pub fn new(ledger: Arc<dyn RecipeLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn RecipeLedger> {
        &self.ledger
    }

    pub fn plan_create(content: &RecipeContent, wallet: Option<WalletAddress>) -> AnchorPlan {
        let hash = CanonicalHasher::hash(content);
        match wallet {
            Some(wallet) => AnchorPlan::Register { hash, wallet },
            None => AnchorPlan::Settled(ProvenanceRecord::no_wallet(hash)),
        }
    }

    /// `None` when the content hash is unchanged. The wallet falls back to
    /// the one on the prior record.
    pub fn plan_update(
        prior: &ProvenanceRecord,
        content: &RecipeContent,
        wallet: Option<WalletAddress>,
    ) -> Option<AnchorPlan> {
        let new_hash = CanonicalHasher::hash(content);
        if new_hash == prior.recipe_hash {
            return None;
        }

        let plan = match wallet.or(prior.author_wallet_address) {
            None => AnchorPlan::Settled(ProvenanceRecord::no_wallet(new_hash)),
            Some(wallet) if prior.is_anchored() => AnchorPlan::Update {
                old_hash: prior.recipe_hash,
                new_hash,
                wallet,
            },
            Some(wallet) => AnchorPlan::Register {
                hash: new_hash,
                wallet,
            },
        };
        Some(plan)
    }

    /// Carry out `plan` against the ledger.
    pub async fn execute(&self, plan: &AnchorPlan) -> ProvenanceRecord {
        match plan {
            AnchorPlan::Settled(record) => {
                debug!(hash = %record.recipe_hash, state = %record.state(), "no ledger call needed");
                record.clone()
            }
            AnchorPlan::Register { hash, wallet } => {
                let result = self.ledger.register_recipe_hash(hash, wallet).await;
                resolve(*hash, *wallet, result)
            }
            AnchorPlan::Update {
                old_hash,
                new_hash,
                wallet,
            } => {
                let result = self
                    .ledger
                    .update_recipe_hash(old_hash, new_hash, wallet)
                    .await;
                resolve(*new_hash, *wallet, result)
            }
        }
    }

    pub async fn on_create(
        &self,
        content: &RecipeContent,
        wallet: Option<WalletAddress>,
    ) -> ProvenanceRecord {
        self.execute(&Self::plan_create(content, wallet)).await
    }

    pub async fn on_update(
        &self,
        prior: &ProvenanceRecord,
        content: &RecipeContent,
        wallet: Option<WalletAddress>,
    ) -> UpdateOutcome {
        match Self::plan_update(prior, content, wallet) {
            None => {
                debug!(hash = %prior.recipe_hash, "content hash unchanged");
                UpdateOutcome::Unchanged
            }
            Some(plan) => UpdateOutcome::Replaced(self.execute(&plan).await),
        }
    }
}

fn resolve(
    hash: RecipeHash,
    wallet: WalletAddress,
    result: LedgerResult<AnchorReceipt>,
) -> ProvenanceRecord {
    match result {
        Ok(receipt) => {
            info!(hash = %hash, tx_hash = %receipt.transaction_hash, "recipe anchored");
            ProvenanceRecord::anchored(hash, wallet, receipt.anchor_info())
        }
        Err(failure) => {
            let reason = classify_failure(&failure);
            warn!(hash = %hash, kind = failure.kind(), %reason, error = %failure, "recipe not anchored");
            ProvenanceRecord::failed(hash, wallet, reason)
        }
    }
}
