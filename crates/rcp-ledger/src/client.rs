use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rcp_crypto::LedgerKey;
use rcp_types::{RecipeHash, WalletAddress};
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::abi;
use crate::config::LedgerConfig;
use crate::error::{LedgerFailure, LedgerResult};
use crate::records::{AnchorReceipt, ConnectionStatus, RecipeInfo};
use crate::rpc::{HttpTransport, RpcError, RpcTransport};
use crate::traits::RecipeLedger;
use crate::tx::LegacyTransaction;

/// The signing key, chain, and contract a client anchors with.
///
/// Built once per client on first use and reused for every operation.
#[derive(Debug)]
pub struct LedgerIdentity {
    key: LedgerKey,
    chain_id: u64,
    contract: Option<WalletAddress>,
}

impl LedgerIdentity {
    pub fn address(&self) -> WalletAddress {
        self.key.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// `None` when the client runs without a registry contract.
    pub fn contract(&self) -> Option<WalletAddress> {
        self.contract
    }
}

/// Ledger client for the recipe registry contract.
///
/// The client is constructed explicitly and injected into its users. All
/// waits on the node are bounded by the configured timeouts and abort as
/// soon as [`RecipeLedger::close`] is called. Transaction submission is
/// serialized so concurrent anchors from one identity never reuse a nonce.
pub struct LedgerClient<T: RpcTransport = HttpTransport> {
    config: LedgerConfig,
    transport: T,
    identity: OnceCell<LedgerIdentity>,
    /// Next nonce to use; `None` means "ask the node".
    next_nonce: Mutex<Option<u64>>,
    shutdown: watch::Sender<bool>,
}

impl LedgerClient<HttpTransport> {
    /// A client speaking JSON-RPC over HTTP to `config.node_url`.
    pub fn over_http(config: LedgerConfig) -> LedgerResult<Self> {
        let url = config.node_url.clone().unwrap_or_default();
        let transport = HttpTransport::new(url, config.rpc_timeout())
            .map_err(|e| LedgerFailure::Configuration(e.to_string()))?;
        Ok(Self::new(config, transport))
    }
}

impl<T: RpcTransport> LedgerClient<T> {
    pub fn new(config: LedgerConfig, transport: T) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            transport,
            identity: OnceCell::new(),
            next_nonce: Mutex::new(None),
            shutdown,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Load the signing identity and bind the contract. Idempotent: the
    /// identity is built on the first successful call and reused after.
    ///
    /// A missing contract address is not an error; such a client can still
    /// run connectivity checks.
    pub async fn initialize(&self) -> LedgerResult<&LedgerIdentity> {
        if self.is_closed() {
            return Err(LedgerFailure::Closed);
        }
        self.identity
            .get_or_try_init(|| self.load_identity())
            .await
    }

    async fn load_identity(&self) -> LedgerResult<LedgerIdentity> {
        self.config.require_node_url()?;
        let key = LedgerKey::from_hex(self.config.require_private_key()?)
            .map_err(|e| LedgerFailure::Configuration(e.to_string()))?;
        let contract = self.config.contract()?;

        let chain_id = match self.config.network_id {
            Some(id) => id,
            None => {
                let value = self
                    .rpc("eth_chainId", json!([]), self.config.call_timeout(), "chain id query")
                    .await?;
                quantity(&value)?
            }
        };

        if contract.is_none() {
            warn!("no registry contract configured; anchoring is unavailable");
        }
        info!(address = %key.address(), chain_id, contract = ?contract, "ledger identity initialized");

        Ok(LedgerIdentity {
            key,
            chain_id,
            contract,
        })
    }

    /// Run `work` bounded by `limit` and the shutdown signal.
    async fn bounded<F, V>(&self, operation: &'static str, limit: Duration, work: F) -> LedgerResult<V>
    where
        F: Future<Output = LedgerResult<V>>,
    {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(LedgerFailure::Closed);
        }

        tokio::select! {
            outcome = tokio::time::timeout(limit, work) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    warn!(operation, ?limit, "ledger operation timed out");
                    Err(LedgerFailure::Timeout { operation, after: limit })
                }
            },
            _ = shutdown.changed() => Err(LedgerFailure::Closed),
        }
    }

    async fn rpc(
        &self,
        method: &str,
        params: Value,
        limit: Duration,
        operation: &'static str,
    ) -> LedgerResult<Value> {
        self.bounded(operation, limit, self.call_node(method, params))
            .await
    }

    async fn call_node(&self, method: &str, params: Value) -> LedgerResult<Value> {
        self.transport
            .call(method, params)
            .await
            .map_err(rpc_failure)
    }

    /// Estimate, submit, and confirm a registry transaction.
    async fn transact(&self, operation: &'static str, calldata: Vec<u8>) -> LedgerResult<AnchorReceipt> {
        let identity = self.initialize().await?;
        let contract = identity.contract.ok_or(LedgerFailure::ContractNotDeployed)?;

        // Dry run first: a predicted revert is reported without submitting.
        let call = json!({
            "from": identity.address().to_string(),
            "to": contract.to_string(),
            "data": hex_data(&calldata),
        });
        let estimate = self
            .rpc("eth_estimateGas", json!([call]), self.config.call_timeout(), "gas estimation")
            .await
            .and_then(|v| quantity(&v))?;
        if estimate > self.config.gas_limit {
            return Err(LedgerFailure::Configuration(format!(
                "estimated gas {estimate} exceeds configured limit {}",
                self.config.gas_limit
            )));
        }
        let gas_limit = estimate.saturating_add(estimate / 5).min(self.config.gas_limit);
        debug!(operation, estimate, gas_limit, "gas estimated");

        let tx_hash = self.submit(identity, contract, gas_limit, calldata).await?;
        info!(operation, tx_hash = %tx_hash, "anchoring transaction submitted");

        self.confirm(&tx_hash).await
    }

    async fn submit(
        &self,
        identity: &LedgerIdentity,
        contract: WalletAddress,
        gas_limit: u64,
        data: Vec<u8>,
    ) -> LedgerResult<String> {
        let mut next_nonce = self.next_nonce.lock().await;

        let nonce = match *next_nonce {
            Some(nonce) => nonce,
            None => {
                let params = json!([identity.address().to_string(), "pending"]);
                let value = self
                    .rpc("eth_getTransactionCount", params, self.config.call_timeout(), "nonce query")
                    .await?;
                quantity(&value)?
            }
        };
        let gas_price = match self.config.gas_price_wei {
            Some(price) => u128::from(price),
            None => {
                let value = self
                    .rpc("eth_gasPrice", json!([]), self.config.call_timeout(), "gas price query")
                    .await?;
                quantity_u128(&value)?
            }
        };

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: contract,
            value: 0,
            data,
            chain_id: identity.chain_id,
        };
        let signed = tx
            .sign(&identity.key)
            .map_err(|e| LedgerFailure::Configuration(e.to_string()))?;

        let sent = self
            .rpc(
                "eth_sendRawTransaction",
                json!([signed.raw_hex()]),
                self.config.submit_timeout(),
                "transaction submission",
            )
            .await;

        match sent {
            Ok(value) => {
                *next_nonce = Some(nonce + 1);
                Ok(value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| signed.hash_hex()))
            }
            Err(failure) => {
                // The node's view of the nonce is unknown now; re-query next time.
                *next_nonce = None;
                Err(failure)
            }
        }
    }

    async fn confirm(&self, tx_hash: &str) -> LedgerResult<AnchorReceipt> {
        let receipt = self
            .bounded(
                "transaction confirmation",
                self.config.confirm_timeout(),
                self.poll_receipt(tx_hash),
            )
            .await?;

        // Pre-Byzantium receipts carry a state root instead of a status and
        // cannot tell a revert from success.
        if field_quantity(&receipt, "status")? == 0 {
            return Err(LedgerFailure::TransactionFailed {
                tx_hash: tx_hash.to_string(),
            });
        }
        let block_number = field_quantity(&receipt, "blockNumber")?;
        let gas_used = field_quantity(&receipt, "gasUsed")?;
        let timestamp = self.block_timestamp(block_number).await;

        Ok(AnchorReceipt {
            transaction_hash: tx_hash.to_string(),
            block_number,
            timestamp,
            gas_used,
        })
    }

    async fn poll_receipt(&self, tx_hash: &str) -> LedgerResult<Value> {
        loop {
            let receipt = self
                .call_node("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !receipt.is_null() {
                return Ok(receipt);
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Block time of `block_number`, or `None` when the node cannot say.
    /// Local time is never substituted.
    async fn block_timestamp(&self, block_number: u64) -> Option<DateTime<Utc>> {
        let block = self
            .rpc(
                "eth_getBlockByNumber",
                json!([format!("{block_number:#x}"), false]),
                self.config.call_timeout(),
                "block query",
            )
            .await;

        match block.and_then(|b| field_quantity(&b, "timestamp")) {
            Ok(secs) => unix_time(secs),
            Err(failure) => {
                warn!(block_number, error = %failure, "block timestamp unavailable");
                None
            }
        }
    }

    async fn lookup(&self, hash: &RecipeHash) -> LedgerResult<RecipeInfo> {
        self.config.require_node_url()?;
        let contract = self
            .config
            .contract()?
            .ok_or(LedgerFailure::ContractNotDeployed)?;

        let call = json!({
            "to": contract.to_string(),
            "data": hex_data(&abi::encode_verify(hash)),
        });
        let value = self
            .rpc("eth_call", json!([call, "latest"]), self.config.call_timeout(), "registry lookup")
            .await?;

        let data = decode_hex_value(&value)?;
        if data.is_empty() {
            warn!(contract = %contract, "no registry code at configured address");
            return Err(LedgerFailure::ContractNotDeployed);
        }
        let out = abi::decode_verify(&data).map_err(|e| LedgerFailure::Protocol(e.to_string()))?;
        if !out.exists {
            return Ok(RecipeInfo::not_found());
        }
        Ok(RecipeInfo {
            exists: true,
            author: Some(out.author),
            timestamp: unix_time(out.timestamp),
        })
    }
}

#[async_trait]
impl<T: RpcTransport> RecipeLedger for LedgerClient<T> {
    async fn check_connection(&self) -> LedgerResult<ConnectionStatus> {
        self.config.require_node_url()?;
        let version = self
            .rpc("net_version", json!([]), self.config.call_timeout(), "connection check")
            .await?;
        let network_id = match version {
            Value::String(s) => s,
            other => other.to_string(),
        };
        debug!(network_id = %network_id, "ledger node reachable");
        Ok(ConnectionStatus {
            connected: true,
            network_id,
        })
    }

    async fn register_recipe_hash(
        &self,
        hash: &RecipeHash,
        author: &WalletAddress,
    ) -> LedgerResult<AnchorReceipt> {
        validate_author(author)?;
        debug!(hash = %hash, author = %author, "registering recipe hash");
        let result = self
            .transact("register", abi::encode_register(hash, author))
            .await;
        log_outcome("register", hash, &result);
        result
    }

    async fn update_recipe_hash(
        &self,
        old_hash: &RecipeHash,
        new_hash: &RecipeHash,
        author: &WalletAddress,
    ) -> LedgerResult<AnchorReceipt> {
        validate_author(author)?;
        if old_hash == new_hash {
            return Err(LedgerFailure::Validation(
                "old and new recipe hash are identical".into(),
            ));
        }
        debug!(old = %old_hash, new = %new_hash, author = %author, "updating recipe hash");
        let result = self
            .transact("update", abi::encode_update(old_hash, new_hash, author))
            .await;
        log_outcome("update", new_hash, &result);
        result
    }

    async fn verify_recipe_hash(&self, hash: &RecipeHash) -> LedgerResult<RecipeInfo> {
        self.lookup(hash).await
    }

    async fn get_recipe_info(&self, hash: &RecipeHash) -> LedgerResult<RecipeInfo> {
        let info = self.lookup(hash).await?;
        debug!(hash = %hash, exists = info.exists, author = ?info.author, "recipe info");
        Ok(info)
    }

    async fn close(&self) {
        if !self.shutdown.send_replace(true) {
            info!("ledger client closed");
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

fn log_outcome(operation: &str, hash: &RecipeHash, result: &LedgerResult<AnchorReceipt>) {
    match result {
        Ok(receipt) => info!(
            operation,
            hash = %hash,
            tx_hash = %receipt.transaction_hash,
            block = receipt.block_number,
            "recipe hash anchored"
        ),
        Err(failure) => warn!(
            operation,
            hash = %hash,
            kind = failure.kind(),
            error = %failure,
            "recipe hash not anchored"
        ),
    }
}

/// Map a transport-level error onto the ledger taxonomy, pulling out the
/// most specific revert reason available.
fn rpc_failure(error: RpcError) -> LedgerFailure {
    match error {
        RpcError::Transport(message) => LedgerFailure::Connection(message),
        RpcError::Decode(message) => LedgerFailure::Protocol(message),
        RpcError::Node {
            code,
            message,
            data,
        } => {
            if let Some(reason) = data.as_ref().and_then(revert_reason) {
                return LedgerFailure::revert(reason);
            }
            match reason_from_message(&message) {
                Some(reason) => LedgerFailure::revert(reason),
                None => LedgerFailure::Rpc { code, message },
            }
        }
    }
}

/// Revert reason carried in an error's `data` member. Nodes differ: some
/// send the raw ABI payload, others nest it or a decoded `reason` in an
/// object.
fn revert_reason(data: &Value) -> Option<String> {
    match data {
        Value::String(s) => {
            let bytes = hex::decode(s.trim_start_matches("0x")).ok()?;
            abi::decode_revert_reason(&bytes)
        }
        Value::Object(map) => {
            if let Some(reason) = map.get("reason").and_then(Value::as_str) {
                return Some(reason.to_string());
            }
            map.values().find_map(revert_reason)
        }
        _ => None,
    }
}

fn reason_from_message(message: &str) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    if !lower.contains("revert") {
        return None;
    }
    const PREFIXES: [&str; 2] = ["execution reverted:", "revert "];
    for prefix in PREFIXES {
        if let Some(index) = lower.find(prefix) {
            let reason = message[index + prefix.len()..].trim();
            if !reason.is_empty() {
                return Some(reason.to_string());
            }
        }
    }
    Some(message.trim().to_string())
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex_value(value: &Value) -> LedgerResult<Vec<u8>> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerFailure::Protocol(format!("expected hex data, got {value}")))?;
    hex::decode(s.trim_start_matches("0x")).map_err(|e| LedgerFailure::Protocol(e.to_string()))
}

fn quantity_u128(value: &Value) -> LedgerResult<u128> {
    match value {
        Value::String(s) => {
            let digits = s
                .strip_prefix("0x")
                .ok_or_else(|| LedgerFailure::Protocol(format!("quantity without 0x prefix: {s}")))?;
            u128::from_str_radix(digits, 16)
                .map_err(|e| LedgerFailure::Protocol(format!("bad quantity {s}: {e}")))
        }
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| LedgerFailure::Protocol(format!("bad quantity {n}"))),
        other => Err(LedgerFailure::Protocol(format!("expected quantity, got {other}"))),
    }
}

fn quantity(value: &Value) -> LedgerResult<u64> {
    let wide = quantity_u128(value)?;
    u64::try_from(wide).map_err(|_| LedgerFailure::Protocol(format!("quantity {wide} exceeds u64")))
}

fn field_quantity(object: &Value, field: &str) -> LedgerResult<u64> {
    let value = object
        .get(field)
        .ok_or_else(|| LedgerFailure::Protocol(format!("response missing {field}")))?;
    quantity(value)
}

fn unix_time(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
