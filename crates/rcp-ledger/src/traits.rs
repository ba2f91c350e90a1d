use async_trait::async_trait;
use rcp_types::{RecipeHash, WalletAddress};

use crate::error::LedgerResult;
use crate::records::{AnchorReceipt, ConnectionStatus, RecipeInfo};

/// Anchoring boundary for recipe hashes.
///
/// Implementations never panic and never surface a fault outside
/// [`LedgerResult`]: every network, configuration, and contract failure is
/// returned as a [`crate::LedgerFailure`].
#[async_trait]
pub trait RecipeLedger: Send + Sync {
    /// Liveness probe against the node; independent of the contract.
    async fn check_connection(&self) -> LedgerResult<ConnectionStatus>;

    /// Register a new hash for `author`.
    async fn register_recipe_hash(
        &self,
        hash: &RecipeHash,
        author: &WalletAddress,
    ) -> LedgerResult<AnchorReceipt>;

    /// Move a registered hash to its successor.
    async fn update_recipe_hash(
        &self,
        old_hash: &RecipeHash,
        new_hash: &RecipeHash,
        author: &WalletAddress,
    ) -> LedgerResult<AnchorReceipt>;

    /// Read-only existence check.
    async fn verify_recipe_hash(&self, hash: &RecipeHash) -> LedgerResult<RecipeInfo>;

    /// Read-only detail query.
    async fn get_recipe_info(&self, hash: &RecipeHash) -> LedgerResult<RecipeInfo>;

    /// Stop accepting work and cancel in-flight waits.
    async fn close(&self);
}
