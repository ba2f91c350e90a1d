//! Cryptographic primitives for recipe provenance.
//!
//! Provides the canonical SHA-256 recipe fingerprint, Keccak-256, and
//! secp256k1 signing for ledger transactions.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod canonical;
pub mod signer;

pub use canonical::CanonicalHasher;
pub use signer::{keccak256, LedgerKey, RecoverableSignature, SignerError};
