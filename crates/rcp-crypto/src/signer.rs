use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rcp_types::WalletAddress;
use sha3::{Digest, Keccak256};

/// Keccak-256, the hash used for ledger addresses, transaction signing
/// hashes, and contract function selectors.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// secp256k1 key that signs anchoring transactions.
pub struct LedgerKey {
    key: SigningKey,
    address: WalletAddress,
}

/// A recoverable ECDSA signature over a 32-byte prehash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Parity of the ephemeral public key's y coordinate (0 or 1).
    pub recovery_id: u8,
}

impl LedgerKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Parse a 32-byte secret from hex, with or without a `0x` prefix.
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let trimmed = secret.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(body).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| SignerError::InvalidKey("not a valid secp256k1 scalar".into()))?;
        Ok(Self::from_signing_key(key))
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// The ledger address controlled by this key.
    pub fn address(&self) -> WalletAddress {
        self.address
    }

    /// Sign a prehashed message, producing a low-s recoverable signature.
    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<RecoverableSignature, SignerError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(prehash)
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let (signature, recovery_id) = match signature.normalize_s() {
            Some(normalized) => (
                normalized,
                RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
            ),
            None => (signature, recovery_id),
        };

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(RecoverableSignature {
            r,
            s,
            recovery_id: recovery_id.to_byte() & 1,
        })
    }
}

impl RecoverableSignature {
    /// Recover the signer's address from this signature.
    pub fn recover_address(&self, prehash: &[u8; 32]) -> Result<WalletAddress, SignerError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
        let recovery_id = RecoveryId::from_byte(self.recovery_id)
            .ok_or_else(|| SignerError::InvalidSignature("bad recovery id".into()))?;
        let key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)
            .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
        Ok(address_of(&key))
    }
}

fn address_of(key: &VerifyingKey) -> WalletAddress {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag.
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    WalletAddress::from_bytes(address)
}

impl std::fmt::Debug for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerKey(<redacted>, address={})", self.address)
    }
}

/// Errors from signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}
