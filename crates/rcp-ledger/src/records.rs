use chrono::{DateTime, Utc};
use rcp_types::{AnchorInfo, WalletAddress};
use serde::Serialize;

use crate::error::{LedgerFailure, LedgerResult};

/// Confirmation details of a mined anchoring transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    /// Block time, when the node reported one.
    pub timestamp: Option<DateTime<Utc>>,
    pub gas_used: u64,
}

impl AnchorReceipt {
    /// The subset stored on a provenance record.
    pub fn anchor_info(&self) -> AnchorInfo {
        AnchorInfo {
            transaction_hash: self.transaction_hash.clone(),
            block_number: self.block_number,
            timestamp: self.timestamp,
        }
    }
}

/// Result of a liveness probe against the ledger node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub network_id: String,
}

/// What the registry contract knows about a hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInfo {
    pub exists: bool,
    pub author: Option<WalletAddress>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RecipeInfo {
    pub fn not_found() -> Self {
        Self {
            exists: false,
            author: None,
            timestamp: None,
        }
    }
}

/// Wire form of a register/update outcome: `{success, ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorTransactionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&LedgerResult<AnchorReceipt>> for AnchorTransactionResult {
    fn from(result: &LedgerResult<AnchorReceipt>) -> Self {
        match result {
            Ok(receipt) => Self {
                success: true,
                transaction_hash: Some(receipt.transaction_hash.clone()),
                block_number: Some(receipt.block_number),
                timestamp: receipt.timestamp,
                gas_used: Some(receipt.gas_used),
                error: None,
            },
            Err(failure) => Self::failure(failure),
        }
    }
}

impl AnchorTransactionResult {
    pub fn failure(failure: &LedgerFailure) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            block_number: None,
            timestamp: None,
            gas_used: None,
            error: Some(failure.to_string()),
        }
    }
}

/// Wire form of a verify/info lookup: `{success, exists, author, timestamp}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub exists: bool,
    pub author: Option<WalletAddress>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&LedgerResult<RecipeInfo>> for VerificationResult {
    fn from(result: &LedgerResult<RecipeInfo>) -> Self {
        match result {
            Ok(info) => Self {
                success: true,
                exists: info.exists,
                author: info.author,
                timestamp: info.timestamp,
                error: None,
            },
            Err(failure) => Self {
                success: false,
                exists: false,
                author: None,
                timestamp: None,
                error: Some(failure.to_string()),
            },
        }
    }
}
