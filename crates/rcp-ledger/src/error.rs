use std::time::Duration;

/// Every way a ledger operation can fail.
///
/// Variants are assigned as close to the raw failure as possible. Only
/// opaque revert text from the contract goes through [`is_duplicate_text`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerFailure {
    /// Missing node URL or signing key, or an unparsable setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Node unreachable or the HTTP exchange failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The node answered with a JSON-RPC error that is not a revert.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered with something that is not a valid response.
    #[error("unexpected node response: {0}")]
    Protocol(String),

    /// Malformed hash or address; no network call was made.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The dry run predicts a revert. Carries the contract's reason.
    #[error("{0}")]
    Reverted(String),

    /// The contract reports the hash as already registered.
    #[error("{0}")]
    Duplicate(String),

    /// The transaction was mined with a failed status.
    #[error("transaction {tx_hash} failed on-chain")]
    TransactionFailed { tx_hash: String },

    /// No contract address is configured (or no code lives there).
    #[error("recipe registry contract is not deployed")]
    ContractNotDeployed,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("ledger client is closed")]
    Closed,
}

impl LedgerFailure {
    /// Build a failure from revert text, assigning `Duplicate` when the text
    /// says the hash is already registered.
    pub fn revert(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "execution reverted".to_string()
        } else {
            reason
        };
        if is_duplicate_text(&reason) {
            Self::Duplicate(reason)
        } else {
            Self::Reverted(reason)
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Short machine-readable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Connection(_) => "connection",
            Self::Rpc { .. } => "rpc",
            Self::Protocol(_) => "protocol",
            Self::Validation(_) => "validation",
            Self::Reverted(_) => "reverted",
            Self::Duplicate(_) => "duplicate",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::ContractNotDeployed => "contract_not_deployed",
            Self::Timeout { .. } => "timeout",
            Self::Closed => "closed",
        }
    }
}

/// Fallback classifier for unstructured revert strings.
///
/// Many nodes and contracts expose no machine-readable error codes, so the
/// duplicate case can only be recognized from the message text.
pub fn is_duplicate_text(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("already registered")
        || text.contains("recipe hash already")
        || text.contains("hash already exists")
        || text.contains("duplicate")
        || (text.contains("exists")
            && text.contains("execution reverted")
            && text.contains("already"))
}

/// Convenience alias used throughout the ledger crate.
pub type LedgerResult<T> = std::result::Result<T, LedgerFailure>;

/// Errors produced while loading ledger configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_phrases() {
        assert!(is_duplicate_text("Recipe hash already registered"));
        assert!(is_duplicate_text("RECIPE HASH ALREADY taken"));
        assert!(is_duplicate_text("hash already exists"));
        assert!(is_duplicate_text("Duplicate entry"));
        assert!(is_duplicate_text(
            "execution reverted: record already exists"
        ));
    }

    #[test]
    fn non_duplicate_phrases() {
        assert!(!is_duplicate_text("Not recipe author"));
        assert!(!is_duplicate_text("connection refused"));
        // "exists" without the revert marker is not enough.
        assert!(!is_duplicate_text("recipe already exists somewhere"));
    }

    #[test]
    fn revert_assigns_variant() {
        assert_eq!(
            LedgerFailure::revert("Recipe hash already registered"),
            LedgerFailure::Duplicate("Recipe hash already registered".into())
        );
        assert_eq!(
            LedgerFailure::revert("Not recipe author"),
            LedgerFailure::Reverted("Not recipe author".into())
        );
        assert_eq!(
            LedgerFailure::revert("  "),
            LedgerFailure::Reverted("execution reverted".into())
        );
    }

    #[test]
    fn revert_displays_bare_reason() {
        let failure = LedgerFailure::revert("Recipe hash already registered");
        assert_eq!(failure.to_string(), "Recipe hash already registered");
        assert!(failure.is_duplicate());
        assert_eq!(failure.kind(), "duplicate");
    }

    #[test]
    fn timeout_display() {
        let failure = LedgerFailure::Timeout {
            operation: "gas estimation",
            after: Duration::from_secs(15),
        };
        assert_eq!(failure.to_string(), "gas estimation timed out after 15s");
    }
}
