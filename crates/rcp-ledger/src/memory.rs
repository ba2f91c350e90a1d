use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rcp_types::{RecipeHash, WalletAddress};

use crate::error::{LedgerFailure, LedgerResult};
use crate::records::{AnchorReceipt, ConnectionStatus, RecipeInfo};
use crate::traits::RecipeLedger;

const DUPLICATE: &str = "Recipe hash already registered";
const NOT_AUTHOR: &str = "Not recipe author";
const UNKNOWN: &str = "Recipe hash not registered";

/// A ledger operation observed by [`InMemoryRecipeLedger`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerCall {
    CheckConnection,
    Register {
        hash: RecipeHash,
        author: WalletAddress,
    },
    Update {
        old_hash: RecipeHash,
        new_hash: RecipeHash,
        author: WalletAddress,
    },
    Verify(RecipeHash),
    Info(RecipeHash),
}

/// In-memory recipe registry for tests, local demos, and embedding.
///
/// Enforces the registry contract's rules: a hash registers once, and only
/// its author may move it to a new, unregistered hash. Failures can be
/// injected to exercise callers' error paths.
pub struct InMemoryRecipeLedger {
    network_id: String,
    inner: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<RecipeHash, Entry>,
    block: u64,
    calls: Vec<LedgerCall>,
    sticky_failure: Option<LedgerFailure>,
    queued_failures: VecDeque<LedgerFailure>,
    closed: bool,
}

#[derive(Clone, Copy)]
struct Entry {
    author: WalletAddress,
    timestamp: DateTime<Utc>,
}

impl Default for InMemoryRecipeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecipeLedger {
    pub fn new() -> Self {
        Self::with_network_id("1337")
    }

    pub fn with_network_id(network_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            inner: RwLock::new(RegistryState::default()),
        }
    }

    /// Fail every operation with `failure` until [`Self::recover`].
    pub fn fail_with(&self, failure: LedgerFailure) {
        self.write(|s| s.sticky_failure = Some(failure));
    }

    /// Fail only the next operation with `failure`.
    pub fn fail_next(&self, failure: LedgerFailure) {
        self.write(|s| s.queued_failures.push_back(failure));
    }

    pub fn recover(&self) {
        self.write(|s| {
            s.sticky_failure = None;
            s.queued_failures.clear();
        });
    }

    /// Register `hash` directly, bypassing the call log.
    pub fn seed(&self, hash: RecipeHash, author: WalletAddress) {
        self.write(|s| {
            s.entries.insert(
                hash,
                Entry {
                    author,
                    timestamp: Utc::now(),
                },
            );
        });
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.read(|s| s.calls.clone())
    }

    /// Number of register and update calls made.
    pub fn write_calls(&self) -> usize {
        self.read(|s| {
            s.calls
                .iter()
                .filter(|c| matches!(c, LedgerCall::Register { .. } | LedgerCall::Update { .. }))
                .count()
        })
    }

    pub fn total_calls(&self) -> usize {
        self.read(|s| s.calls.len())
    }

    pub fn contains(&self, hash: &RecipeHash) -> bool {
        self.read(|s| s.entries.contains_key(hash))
    }

    pub fn len(&self) -> usize {
        self.read(|s| s.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Record `call` and run `op` unless the ledger is closed or a failure
    /// is injected.
    fn dispatch<R>(
        &self,
        call: LedgerCall,
        op: impl FnOnce(&mut RegistryState) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        self.write(|s| {
            if s.closed {
                return Err(LedgerFailure::Closed);
            }
            s.calls.push(call);
            if let Some(failure) = s.queued_failures.pop_front() {
                return Err(failure);
            }
            if let Some(failure) = &s.sticky_failure {
                return Err(failure.clone());
            }
            op(s)
        })
    }
}

impl RegistryState {
    fn mine(&mut self, author: WalletAddress, hash: RecipeHash) -> AnchorReceipt {
        self.block += 1;
        let timestamp = Utc::now();
        self.entries.insert(hash, Entry { author, timestamp });
        AnchorReceipt {
            transaction_hash: format!("0x{:064x}", self.block),
            block_number: self.block,
            timestamp: Some(timestamp),
            gas_used: 48_000,
        }
    }

    fn info(&self, hash: &RecipeHash) -> RecipeInfo {
        match self.entries.get(hash) {
            Some(entry) => RecipeInfo {
                exists: true,
                author: Some(entry.author),
                timestamp: Some(entry.timestamp),
            },
            None => RecipeInfo::not_found(),
        }
    }
}

fn validate_author(author: &WalletAddress) -> LedgerResult<()> {
    if author.is_zero() {
        return Err(LedgerFailure::Validation(
            "author wallet is the zero address".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl RecipeLedger for InMemoryRecipeLedger {
    async fn check_connection(&self) -> LedgerResult<ConnectionStatus> {
        let network_id = self.network_id.clone();
        self.dispatch(LedgerCall::CheckConnection, |_| {
            Ok(ConnectionStatus {
                connected: true,
                network_id,
            })
        })
    }

    async fn register_recipe_hash(
        &self,
        hash: &RecipeHash,
        author: &WalletAddress,
    ) -> LedgerResult<AnchorReceipt> {
        let call = LedgerCall::Register {
            hash: *hash,
            author: *author,
        };
        self.dispatch(call, |s| {
            validate_author(author)?;
            if s.entries.contains_key(hash) {
                return Err(LedgerFailure::revert(DUPLICATE));
            }
            Ok(s.mine(*author, *hash))
        })
    }

    async fn update_recipe_hash(
        &self,
        old_hash: &RecipeHash,
        new_hash: &RecipeHash,
        author: &WalletAddress,
    ) -> LedgerResult<AnchorReceipt> {
        let call = LedgerCall::Update {
            old_hash: *old_hash,
            new_hash: *new_hash,
            author: *author,
        };
        self.dispatch(call, |s| {
            validate_author(author)?;
            if old_hash == new_hash {
                return Err(LedgerFailure::Validation(
                    "old and new recipe hash are identical".into(),
                ));
            }
            match s.entries.get(old_hash) {
                None => return Err(LedgerFailure::revert(UNKNOWN)),
                Some(entry) if entry.author != *author => {
                    return Err(LedgerFailure::revert(NOT_AUTHOR))
                }
                Some(_) => {}
            }
            if s.entries.contains_key(new_hash) {
                return Err(LedgerFailure::revert(DUPLICATE));
            }
            Ok(s.mine(*author, *new_hash))
        })
    }

    async fn verify_recipe_hash(&self, hash: &RecipeHash) -> LedgerResult<RecipeInfo> {
        self.dispatch(LedgerCall::Verify(*hash), |s| Ok(s.info(hash)))
    }

    async fn get_recipe_info(&self, hash: &RecipeHash) -> LedgerResult<RecipeInfo> {
        self.dispatch(LedgerCall::Info(*hash), |s| Ok(s.info(hash)))
    }

    async fn close(&self) {
        self.write(|s| s.closed = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(byte: u8) -> WalletAddress {
        WalletAddress::from_bytes([byte; 20])
    }

    fn hash(byte: u8) -> RecipeHash {
        RecipeHash::from_digest([byte; 32])
    }

    #[tokio::test]
    async fn register_then_verify() {
        let ledger = InMemoryRecipeLedger::new();
        let receipt = ledger.register_recipe_hash(&hash(1), &author(7)).await.unwrap();
        assert_eq!(receipt.block_number, 1);
        assert_eq!(receipt.transaction_hash.len(), 66);

        let info = ledger.verify_recipe_hash(&hash(1)).await.unwrap();
        assert!(info.exists);
        assert_eq!(info.author, Some(author(7)));
        assert_eq!(info.timestamp, receipt.timestamp);

        assert!(!ledger.get_recipe_info(&hash(2)).await.unwrap().exists);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let ledger = InMemoryRecipeLedger::new();
        ledger.register_recipe_hash(&hash(1), &author(7)).await.unwrap();
        let err = ledger
            .register_recipe_hash(&hash(1), &author(8))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(err.to_string(), DUPLICATE);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn update_rules() {
        let ledger = InMemoryRecipeLedger::new();
        ledger.register_recipe_hash(&hash(1), &author(7)).await.unwrap();
        ledger.register_recipe_hash(&hash(3), &author(7)).await.unwrap();

        let wrong_author = ledger.update_recipe_hash(&hash(1), &hash(2), &author(8)).await;
        assert_eq!(wrong_author, Err(LedgerFailure::Reverted(NOT_AUTHOR.into())));

        let unknown = ledger.update_recipe_hash(&hash(9), &hash(2), &author(7)).await;
        assert_eq!(unknown, Err(LedgerFailure::Reverted(UNKNOWN.into())));

        let taken = ledger.update_recipe_hash(&hash(1), &hash(3), &author(7)).await;
        assert!(taken.unwrap_err().is_duplicate());

        let same = ledger.update_recipe_hash(&hash(1), &hash(1), &author(7)).await;
        assert!(matches!(same, Err(LedgerFailure::Validation(_))));

        ledger.update_recipe_hash(&hash(1), &hash(2), &author(7)).await.unwrap();
        assert!(ledger.contains(&hash(2)));
        assert_eq!(ledger.write_calls(), 7);
    }

    #[tokio::test]
    async fn zero_author_is_rejected() {
        let ledger = InMemoryRecipeLedger::new();
        let result = ledger.register_recipe_hash(&hash(1), &author(0)).await;
        assert!(matches!(result, Err(LedgerFailure::Validation(_))));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn injected_failures() {
        let ledger = InMemoryRecipeLedger::new();
        ledger.fail_next(LedgerFailure::Connection("refused".into()));
        assert_eq!(
            ledger.check_connection().await,
            Err(LedgerFailure::Connection("refused".into()))
        );
        assert!(ledger.check_connection().await.unwrap().connected);

        ledger.fail_with(LedgerFailure::ContractNotDeployed);
        assert_eq!(
            ledger.register_recipe_hash(&hash(1), &author(7)).await,
            Err(LedgerFailure::ContractNotDeployed)
        );
        assert!(ledger.is_empty());
        ledger.recover();
        ledger.register_recipe_hash(&hash(1), &author(7)).await.unwrap();
        assert_eq!(ledger.total_calls(), 4);
    }

    #[tokio::test]
    async fn closed_ledger_refuses_work() {
        let ledger = InMemoryRecipeLedger::new();
        ledger.close().await;
        assert_eq!(
            ledger.verify_recipe_hash(&hash(1)).await,
            Err(LedgerFailure::Closed)
        );
        assert_eq!(ledger.total_calls(), 0);
    }

    #[tokio::test]
    async fn call_log_records_arguments() {
        let ledger = InMemoryRecipeLedger::new();
        ledger.seed(hash(1), author(7));
        ledger.update_recipe_hash(&hash(1), &hash(2), &author(7)).await.unwrap();
        assert_eq!(
            ledger.calls(),
            vec![LedgerCall::Update {
                old_hash: hash(1),
                new_hash: hash(2),
                author: author(7),
            }]
        );
    }
}
