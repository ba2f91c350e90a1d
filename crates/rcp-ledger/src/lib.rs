//! Ledger boundary for recipe provenance.
//!
//! This crate anchors recipe content hashes in an EVM recipe registry
//! contract. It provides:
//! - The `RecipeLedger` trait boundary and its failure taxonomy
//! - `LedgerClient`, a JSON-RPC client with bounded waits and cancellation
//! - ABI and legacy transaction encoding for the registry calls
//! - `InMemoryRecipeLedger` and `ScriptedTransport` for tests and demos
//! - `LedgerConfig`, loaded from TOML and overlaid by the environment

pub mod abi;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod records;
pub mod rpc;
pub mod scripted;
pub mod traits;
pub mod tx;

pub use client::{LedgerClient, LedgerIdentity};
pub use config::LedgerConfig;
pub use error::{is_duplicate_text, ConfigError, LedgerFailure, LedgerResult};
pub use memory::{InMemoryRecipeLedger, LedgerCall};
pub use records::{
    AnchorReceipt, AnchorTransactionResult, ConnectionStatus, RecipeInfo, VerificationResult,
};
pub use rpc::{HttpTransport, RpcError, RpcTransport};
pub use scripted::{RecordedCall, ScriptedTransport};
pub use traits::RecipeLedger;
pub use tx::{LegacyTransaction, SignedTransaction};
