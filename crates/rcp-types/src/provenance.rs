use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::WalletAddress;
use crate::hash::RecipeHash;

/// Why a provenance record is not verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    /// The ledger already holds this hash.
    HashAlreadyExists,
    /// Any other ledger failure: unreachable node, revert, timeout, config.
    BlockchainError,
    /// No author wallet was supplied, so anchoring was never attempted.
    NoWalletAddress,
}

impl VerificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HashAlreadyExists => "hash_already_exists",
            Self::BlockchainError => "blockchain_error",
            Self::NoWalletAddress => "no_wallet_address",
        }
    }
}

impl fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction details of a successful anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorInfo {
    pub transaction_hash: String,
    pub block_number: u64,
    /// Block time; `None` when the node could not report it.
    pub timestamp: Option<DateTime<Utc>>,
}

/// The anchoring state of one recipe, stored on the recipe itself.
///
/// A record is replaced wholesale whenever the recipe's content changes.
/// `recipe_hash` always describes the content currently stored next to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    pub recipe_hash: RecipeHash,
    pub author_wallet_address: Option<WalletAddress>,
    pub transaction_hash: Option<String>,
    pub block_number: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub verification_reason: Option<VerificationReason>,
}

impl ProvenanceRecord {
    /// Content hashed but never sent to the ledger: no wallet.
    pub fn no_wallet(recipe_hash: RecipeHash) -> Self {
        Self {
            recipe_hash,
            author_wallet_address: None,
            transaction_hash: None,
            block_number: None,
            timestamp: None,
            is_verified: false,
            verification_reason: Some(VerificationReason::NoWalletAddress),
        }
    }

    /// Anchoring has been scheduled but has not resolved yet.
    pub fn pending(recipe_hash: RecipeHash, wallet: WalletAddress) -> Self {
        Self {
            recipe_hash,
            author_wallet_address: Some(wallet),
            transaction_hash: None,
            block_number: None,
            timestamp: None,
            is_verified: false,
            verification_reason: None,
        }
    }

    pub fn anchored(recipe_hash: RecipeHash, wallet: WalletAddress, info: AnchorInfo) -> Self {
        Self {
            recipe_hash,
            author_wallet_address: Some(wallet),
            transaction_hash: Some(info.transaction_hash),
            block_number: Some(info.block_number),
            timestamp: info.timestamp,
            is_verified: true,
            verification_reason: None,
        }
    }

    /// A failed anchor. Transaction fields are cleared even if an earlier
    /// hash of this recipe is still registered on the ledger.
    pub fn failed(
        recipe_hash: RecipeHash,
        wallet: WalletAddress,
        reason: VerificationReason,
    ) -> Self {
        Self {
            recipe_hash,
            author_wallet_address: Some(wallet),
            transaction_hash: None,
            block_number: None,
            timestamp: None,
            is_verified: false,
            verification_reason: Some(reason),
        }
    }

    /// The lifecycle state this record represents.
    pub fn state(&self) -> ProvenanceState {
        match (self.is_verified, self.verification_reason) {
            (true, _) => ProvenanceState::Anchored,
            (false, Some(VerificationReason::NoWalletAddress)) => ProvenanceState::NoWallet,
            (false, Some(reason)) => ProvenanceState::Failed(reason),
            (false, None) => ProvenanceState::Pending,
        }
    }

    /// Returns `true` if this record's hash is registered on the ledger.
    pub fn is_anchored(&self) -> bool {
        self.state() == ProvenanceState::Anchored
    }
}

/// Lifecycle state of a recipe's provenance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProvenanceState {
    NoWallet,
    Pending,
    Anchored,
    Failed(VerificationReason),
}

impl fmt::Display for ProvenanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWallet => write!(f, "unanchored (no wallet)"),
            Self::Pending => write!(f, "anchor pending"),
            Self::Anchored => write!(f, "anchored"),
            Self::Failed(reason) => write!(f, "anchor failed ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> RecipeHash {
        RecipeHash::from_digest([7; 32])
    }

    fn wallet() -> WalletAddress {
        WalletAddress::from_bytes([0xaa; 20])
    }

    #[test]
    fn states_follow_constructors() {
        assert_eq!(ProvenanceRecord::no_wallet(hash()).state(), ProvenanceState::NoWallet);
        assert_eq!(
            ProvenanceRecord::pending(hash(), wallet()).state(),
            ProvenanceState::Pending
        );
        let info = AnchorInfo {
            transaction_hash: "0xbeef".into(),
            block_number: 12,
            timestamp: DateTime::from_timestamp(1_700_000_000, 0),
        };
        let anchored = ProvenanceRecord::anchored(hash(), wallet(), info);
        assert!(anchored.is_anchored());
        assert_eq!(anchored.block_number, Some(12));
        assert_eq!(
            ProvenanceRecord::failed(hash(), wallet(), VerificationReason::BlockchainError).state(),
            ProvenanceState::Failed(VerificationReason::BlockchainError)
        );
    }

    #[test]
    fn serializes_with_camel_case_and_null_reason() {
        let record = ProvenanceRecord::pending(hash(), wallet());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["recipeHash"], "07".repeat(32));
        assert_eq!(json["isVerified"], false);
        assert!(json["verificationReason"].is_null());
        assert!(json["transactionHash"].is_null());
    }

    #[test]
    fn reason_wire_names() {
        let record = ProvenanceRecord::no_wallet(hash());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["verificationReason"], "no_wallet_address");
        assert_eq!(
            serde_json::to_value(VerificationReason::HashAlreadyExists).unwrap(),
            "hash_already_exists"
        );
        assert_eq!(VerificationReason::BlockchainError.to_string(), "blockchain_error");
    }
}
