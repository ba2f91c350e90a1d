//! Recipe provenance: hashing, anchoring, and verification workflow.
//!
//! Ties recipe content to the ledger:
//! - `ProvenanceOrchestrator` decides when a create or update touches the
//!   ledger and turns every outcome into a `ProvenanceRecord`
//! - `RecipeService` persists content first and anchors inline or through
//!   the `AnchorQueue` / `AnchorWorker` pair
//! - `AnchorVerifier` answers read-only registry and integrity questions

pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod repository;
pub mod service;
pub mod verifier;

pub use error::{ProvenanceError, ProvenanceResult};
pub use orchestrator::{classify_failure, AnchorPlan, ProvenanceOrchestrator, UpdateOutcome};
pub use queue::{
    AnchorJob, AnchorQueue, AnchorWorker, JobOutcome, WorkerStats, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_WRITE_ATTEMPTS,
};
pub use repository::{InMemoryRecipeRepository, Recipe, RecipeRepository, RecipeStatus};
pub use service::{AnchorMode, RecipeService};
pub use verifier::{AnchorStatus, AnchorVerifier, ContentIntegrity};

// Re-export key types
pub use rcp_crypto::CanonicalHasher;
pub use rcp_types::{ProvenanceRecord, ProvenanceState, RecipeContent, RecipeHash, VerificationReason, WalletAddress};
