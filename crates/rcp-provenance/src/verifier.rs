use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rcp_crypto::CanonicalHasher;
use rcp_ledger::{LedgerFailure, LedgerResult, RecipeInfo, RecipeLedger};
use rcp_types::{RecipeHash, WalletAddress};
use serde::Serialize;
use tracing::debug;

use crate::repository::Recipe;

/// Interpretation of a registry lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorStatus {
    /// No registry contract is configured or deployed.
    NotConfigured,
    NotFound,
    Found {
        author: Option<WalletAddress>,
        timestamp: Option<DateTime<Utc>>,
    },
    /// The lookup itself failed.
    Unavailable { reason: String },
}

impl AnchorStatus {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    fn from_lookup(result: LedgerResult<RecipeInfo>) -> Self {
        match result {
            Ok(info) if info.exists => Self::Found {
                author: info.author,
                timestamp: info.timestamp,
            },
            Ok(_) => Self::NotFound,
            Err(LedgerFailure::ContractNotDeployed) => Self::NotConfigured,
            Err(failure) => Self::Unavailable {
                reason: failure.to_string(),
            },
        }
    }
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "registry not configured"),
            Self::NotFound => write!(f, "not registered"),
            Self::Found { author, timestamp } => {
                write!(f, "registered")?;
                if let Some(author) = author {
                    write!(f, " by {author}")?;
                }
                if let Some(timestamp) = timestamp {
                    write!(f, " at {}", timestamp.to_rfc3339())?;
                }
                Ok(())
            }
            Self::Unavailable { reason } => write!(f, "lookup failed: {reason}"),
        }
    }
}

/// Result of checking a stored recipe against its recorded hash and the
/// registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentIntegrity {
    /// Hash of the content as stored now.
    pub content_hash: RecipeHash,
    /// Hash recorded on the provenance record.
    pub stored_hash: RecipeHash,
    /// `false` when the content changed without its record.
    pub intact: bool,
    /// Registry status of `content_hash`.
    pub anchor: AnchorStatus,
}

/// Read-only view over the registry's lookup operations.
pub struct AnchorVerifier {
    ledger: Arc<dyn RecipeLedger>,
}

impl AnchorVerifier {
    pub fn new(ledger: Arc<dyn RecipeLedger>) -> Self {
        Self { ledger }
    }

    pub async fn verify(&self, hash: &RecipeHash) -> AnchorStatus {
        let status = AnchorStatus::from_lookup(self.ledger.verify_recipe_hash(hash).await);
        debug!(hash = %hash, %status, "verified recipe hash");
        status
    }

    pub async fn info(&self, hash: &RecipeHash) -> AnchorStatus {
        AnchorStatus::from_lookup(self.ledger.get_recipe_info(hash).await)
    }

    pub async fn check_recipe(&self, recipe: &Recipe) -> ContentIntegrity {
        let content_hash = CanonicalHasher::hash(&recipe.content);
        let stored_hash = recipe.provenance.recipe_hash;
        ContentIntegrity {
            content_hash,
            stored_hash,
            intact: content_hash == stored_hash,
            anchor: self.verify(&content_hash).await,
        }
    }
}
