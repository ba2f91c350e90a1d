//! Foundation types for recipe provenance.
//!
//! This crate provides the value types shared by the hasher, the ledger
//! client, and the provenance orchestrator. Every other `rcp` crate depends
//! on `rcp-types`.
//!
//! # Key Types
//!
//! - [`RecipeContent`]: The hash input, holding only fields that describe the dish
//! - [`RecipeHash`]: SHA-256 content fingerprint, rendered as lowercase hex
//! - [`WalletAddress`]: 20-byte ledger account address (`0x`-prefixed hex)
//! - [`ProvenanceRecord`]: Stored anchoring state of one recipe
//! - [`ProvenanceState`]: The lifecycle state a record represents

pub mod address;
pub mod error;
pub mod hash;
pub mod provenance;
pub mod recipe;

pub use address::WalletAddress;
pub use error::TypeError;
pub use hash::RecipeHash;
pub use provenance::{AnchorInfo, ProvenanceRecord, ProvenanceState, VerificationReason};
pub use recipe::{Ingredient, RecipeContent, RecipeStep};
