use std::fmt;
use std::path::Path;
use std::time::Duration;

use rcp_types::WalletAddress;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LedgerFailure, LedgerResult};

/// Environment variables that override file settings.
pub const ENV_NODE_URL: &str = "RCP_LEDGER_NODE_URL";
pub const ENV_NETWORK_ID: &str = "RCP_LEDGER_NETWORK_ID";
pub const ENV_PRIVATE_KEY: &str = "RCP_LEDGER_PRIVATE_KEY";
pub const ENV_CONTRACT_ADDRESS: &str = "RCP_LEDGER_CONTRACT_ADDRESS";
pub const ENV_GAS_LIMIT: &str = "RCP_LEDGER_GAS_LIMIT";
pub const ENV_GAS_PRICE: &str = "RCP_LEDGER_GAS_PRICE";

/// Connection, identity, and timing settings for the ledger client.
///
/// Every field has a default so a partial file (or none at all) still
/// loads. Missing values that an operation needs surface as
/// [`LedgerFailure::Configuration`] when that operation runs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the ledger node.
    pub node_url: Option<String>,
    /// EIP-155 chain id. Fetched from the node when absent.
    pub network_id: Option<u64>,
    /// Hex secp256k1 secret used to sign anchoring transactions.
    pub private_key: Option<String>,
    /// Address of the recipe registry contract.
    pub contract_address: Option<String>,
    /// Upper bound on gas for a single anchoring transaction.
    pub gas_limit: u64,
    /// Fixed gas price in wei. Queried from the node when absent.
    pub gas_price_wei: Option<u64>,
    /// Bound on gas estimation and read-only contract calls.
    pub call_timeout_secs: u64,
    /// Bound on transaction submission.
    pub submit_timeout_secs: u64,
    /// Bound on waiting for a transaction receipt.
    pub confirm_timeout_secs: u64,
    /// Interval between receipt polls.
    pub poll_interval_ms: u64,
    /// Per-request HTTP timeout.
    pub rpc_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            node_url: None,
            network_id: None,
            private_key: None,
            contract_address: None,
            gas_limit: 500_000,
            gas_price_wei: None,
            call_timeout_secs: 15,
            submit_timeout_secs: 15,
            confirm_timeout_secs: 120,
            poll_interval_ms: 1_000,
            rpc_timeout_secs: 30,
        }
    }
}

impl LedgerConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from a variable lookup (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_NODE_URL) {
            self.node_url = Some(url);
        }
        if let Some(id) = get(ENV_NETWORK_ID) {
            self.network_id = Some(parse_number(ENV_NETWORK_ID, &id)?);
        }
        if let Some(key) = get(ENV_PRIVATE_KEY) {
            self.private_key = Some(key);
        }
        if let Some(address) = get(ENV_CONTRACT_ADDRESS) {
            self.contract_address = Some(address);
        }
        if let Some(limit) = get(ENV_GAS_LIMIT) {
            self.gas_limit = parse_number(ENV_GAS_LIMIT, &limit)?;
        }
        if let Some(price) = get(ENV_GAS_PRICE) {
            self.gas_price_wei = Some(parse_number(ENV_GAS_PRICE, &price)?);
        }
        Ok(())
    }

    pub fn require_node_url(&self) -> LedgerResult<&str> {
        self.node_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| LedgerFailure::Configuration("ledger node URL is not set".into()))
    }

    pub fn require_private_key(&self) -> LedgerResult<&str> {
        self.private_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LedgerFailure::Configuration("ledger signing key is not set".into()))
    }

    /// The configured contract address. `Ok(None)` is a valid state used
    /// for connectivity diagnostics before the contract is deployed.
    pub fn contract(&self) -> LedgerResult<Option<WalletAddress>> {
        match self.contract_address.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(address) => WalletAddress::parse(address).map(Some).map_err(|e| {
                LedgerFailure::Configuration(format!("contract address: {e}"))
            }),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("node_url", &self.node_url)
            .field("network_id", &self.network_id)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("contract_address", &self.contract_address)
            .field("gas_limit", &self.gas_limit)
            .field("gas_price_wei", &self.gas_price_wei)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("submit_timeout_secs", &self.submit_timeout_secs)
            .field("confirm_timeout_secs", &self.confirm_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config() {
        let c = LedgerConfig::default();
        assert!(c.node_url.is_none());
        assert_eq!(c.gas_limit, 500_000);
        assert_eq!(c.call_timeout(), Duration::from_secs(15));
        assert_eq!(c.confirm_timeout(), Duration::from_secs(120));
        assert_eq!(c.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = LedgerConfig::from_toml_str(
            r#"
            node_url = "http://127.0.0.1:8545"
            network_id = 1337
            gas_price_wei = 1000000000
            "#,
        )
        .unwrap();
        assert_eq!(c.node_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(c.network_id, Some(1337));
        assert_eq!(c.gas_price_wei, Some(1_000_000_000));
        assert_eq!(c.gas_limit, 500_000);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "node_url = \"http://node:8545\"\ngas_limit = 250000").unwrap();
        let c = LedgerConfig::load(Some(file.path())).unwrap();
        assert!(c.node_url.is_some());
        assert_eq!(c.submit_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            LedgerConfig::from_toml_str("gas_limit = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_file() {
        let mut c = LedgerConfig::from_toml_str("node_url = \"http://file:8545\"").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_NODE_URL, "http://env:8545"),
            (ENV_NETWORK_ID, "31337"),
            (ENV_GAS_LIMIT, "300000"),
            (ENV_CONTRACT_ADDRESS, ""),
        ]);
        c.apply_env_from(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.node_url.as_deref(), Some("http://env:8545"));
        assert_eq!(c.network_id, Some(31337));
        assert_eq!(c.gas_limit, 300_000);
        assert!(c.contract_address.is_none());
    }

    #[test]
    fn env_rejects_non_numeric() {
        let mut c = LedgerConfig::default();
        let err = c
            .apply_env_from(|k| (k == ENV_GAS_PRICE).then(|| "cheap".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn required_values() {
        let c = LedgerConfig::default();
        assert!(matches!(
            c.require_node_url(),
            Err(LedgerFailure::Configuration(_))
        ));
        assert!(matches!(
            c.require_private_key(),
            Err(LedgerFailure::Configuration(_))
        ));
        assert_eq!(c.contract().unwrap(), None);
    }

    #[test]
    fn malformed_contract_is_configuration_error() {
        let c = LedgerConfig {
            contract_address: Some("0x1234".into()),
            ..Default::default()
        };
        assert!(matches!(c.contract(), Err(LedgerFailure::Configuration(_))));
    }

    #[test]
    fn debug_redacts_private_key() {
        let c = LedgerConfig {
            private_key: Some("0xdeadbeef".into()),
            ..Default::default()
        };
        let debug = format!("{c:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("deadbeef"));
    }
}
