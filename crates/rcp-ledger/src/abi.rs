//! Solidity ABI encoding for the recipe registry contract.
//!
//! Only the argument shapes the registry uses are supported: `string` and
//! `address` inputs, and the `(bool, address, uint256)` tuple returned by
//! `verifyRecipe`.

use rcp_crypto::keccak256;
use rcp_types::{RecipeHash, WalletAddress};

pub const REGISTER_RECIPE: &str = "registerRecipe(string,address)";
pub const UPDATE_RECIPE: &str = "updateRecipe(string,string,address)";
pub const VERIFY_RECIPE: &str = "verifyRecipe(string)";

/// Selector of Solidity's `Error(string)` revert payload.
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Selector of Solidity's `Panic(uint256)` revert payload.
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

const WORD: usize = 32;

/// Errors from decoding contract return data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("return data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("value does not fit: {0}")]
    Overflow(&'static str),
}

enum Token<'a> {
    Str(&'a str),
    Address(&'a WalletAddress),
}

/// First four bytes of the Keccak-256 of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_register(hash: &RecipeHash, author: &WalletAddress) -> Vec<u8> {
    let hex = hash.to_hex();
    encode_call(REGISTER_RECIPE, &[Token::Str(&hex), Token::Address(author)])
}

pub fn encode_update(old: &RecipeHash, new: &RecipeHash, author: &WalletAddress) -> Vec<u8> {
    let (old, new) = (old.to_hex(), new.to_hex());
    encode_call(
        UPDATE_RECIPE,
        &[Token::Str(&old), Token::Str(&new), Token::Address(author)],
    )
}

pub fn encode_verify(hash: &RecipeHash) -> Vec<u8> {
    let hex = hash.to_hex();
    encode_call(VERIFY_RECIPE, &[Token::Str(&hex)])
}

fn encode_call(signature: &str, tokens: &[Token<'_>]) -> Vec<u8> {
    let head_len = WORD * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Address(address) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(address.as_bytes());
                head.extend_from_slice(&word);
            }
            Token::Str(s) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(s.len() as u64));
                tail.extend_from_slice(s.as_bytes());
                let padding = (WORD - s.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        }
    }

    let mut data = Vec::with_capacity(4 + head.len() + tail.len());
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&head);
    data.extend_from_slice(&tail);
    data
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Output of `verifyRecipe`: `(exists, author, timestamp)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyOutput {
    pub exists: bool,
    pub author: WalletAddress,
    pub timestamp: u64,
}

pub fn decode_verify(data: &[u8]) -> Result<VerifyOutput, AbiError> {
    if data.len() < 3 * WORD {
        return Err(AbiError::TooShort {
            expected: 3 * WORD,
            actual: data.len(),
        });
    }
    let exists = data[..WORD].iter().any(|b| *b != 0);
    let mut author = [0u8; 20];
    author.copy_from_slice(&data[WORD + 12..2 * WORD]);
    let timestamp = word_to_u64(&data[2 * WORD..3 * WORD])?;
    Ok(VerifyOutput {
        exists,
        author: WalletAddress::from_bytes(author),
        timestamp,
    })
}

fn word_to_u64(word: &[u8]) -> Result<u64, AbiError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow("uint256 exceeds u64"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    Ok(u64::from_be_bytes(bytes))
}

/// Extract a human-readable reason from revert data.
///
/// Understands `Error(string)` and `Panic(uint256)` payloads; anything else
/// (custom errors, empty data) yields `None`.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let (selector, body) = data.split_at(4);

    if selector == PANIC_SELECTOR {
        let code = word_to_u64(body.get(..WORD)?).ok()?;
        return Some(format!("panic code {code:#04x}"));
    }
    if selector != ERROR_SELECTOR {
        return None;
    }

    let offset = usize::try_from(word_to_u64(body.get(..WORD)?).ok()?).ok()?;
    let len_end = offset.checked_add(WORD)?;
    let len = usize::try_from(word_to_u64(body.get(offset..len_end)?).ok()?).ok()?;
    let bytes = body.get(len_end..len_end.checked_add(len)?)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// ABI-encode an `Error(reason)` revert payload, as a contract's
/// `require(cond, reason)` produces it.
pub fn encode_error_reason(reason: &str) -> Vec<u8> {
    let mut data = ERROR_SELECTOR.to_vec();
    data.extend_from_slice(&uint_word(WORD as u64));
    data.extend_from_slice(&uint_word(reason.len() as u64));
    data.extend_from_slice(reason.as_bytes());
    let padding = (WORD - reason.len() % WORD) % WORD;
    data.extend(std::iter::repeat(0u8).take(padding));
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_selectors() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("Error(string)"), ERROR_SELECTOR);
        assert_eq!(selector("Panic(uint256)"), PANIC_SELECTOR);
    }

    #[test]
    fn register_layout() {
        let hash = RecipeHash::from_digest([0xab; 32]);
        let author = WalletAddress::from_bytes([0x11; 20]);
        let data = encode_register(&hash, &author);

        assert_eq!(&data[..4], &selector(REGISTER_RECIPE));
        let args = &data[4..];
        // head: offset, address; tail: length + 64 bytes of text.
        assert_eq!(args.len(), 2 * WORD + WORD + 64);
        assert_eq!(args[WORD - 1], 0x40);
        assert_eq!(&args[WORD + 12..2 * WORD], &[0x11; 20]);
        assert_eq!(args[3 * WORD - 1], 64);
        assert_eq!(&args[3 * WORD..], hash.to_hex().as_bytes());
    }

    #[test]
    fn update_layout_has_two_offsets() {
        let old = RecipeHash::from_digest([1; 32]);
        let new = RecipeHash::from_digest([2; 32]);
        let author = WalletAddress::from_bytes([0x22; 20]);
        let args = &encode_update(&old, &new, &author)[4..];

        // First string starts right after the 3-word head; second after
        // the first string's length word and 64 data bytes.
        assert_eq!(args[WORD - 1], 0x60);
        assert_eq!(word_to_u64(&args[WORD..2 * WORD]).unwrap(), 0x60 + 32 + 64);
        assert_eq!(&args[2 * WORD + 12..3 * WORD], &[0x22; 20]);
        let second = 0x60 + 32 + 64 + 32;
        assert_eq!(&args[second..second + 64], new.to_hex().as_bytes());
    }

    #[test]
    fn decode_verify_tuple() {
        let mut data = vec![0u8; 96];
        data[31] = 1;
        data[44..64].copy_from_slice(&[0x33; 20]);
        data[88..96].copy_from_slice(&1_700_000_000u64.to_be_bytes());
        let out = decode_verify(&data).unwrap();
        assert!(out.exists);
        assert_eq!(out.author, WalletAddress::from_bytes([0x33; 20]));
        assert_eq!(out.timestamp, 1_700_000_000);
    }

    #[test]
    fn decode_verify_rejects_short_data() {
        assert!(matches!(
            decode_verify(&[0u8; 40]),
            Err(AbiError::TooShort { expected: 96, actual: 40 })
        ));
    }

    #[test]
    fn revert_reason_roundtrip() {
        let payload = encode_error_reason("Recipe hash already registered");
        assert_eq!(
            decode_revert_reason(&payload).as_deref(),
            Some("Recipe hash already registered")
        );
    }

    #[test]
    fn panic_and_unknown_payloads() {
        let mut panic = PANIC_SELECTOR.to_vec();
        panic.extend_from_slice(&uint_word(0x11));
        assert_eq!(decode_revert_reason(&panic).as_deref(), Some("panic code 0x11"));
        assert_eq!(decode_revert_reason(&[0xde, 0xad, 0xbe, 0xef]), None);
        assert_eq!(decode_revert_reason(&[]), None);
    }

    #[test]
    fn truncated_error_payload_is_ignored() {
        let payload = encode_error_reason("Recipe hash already registered");
        assert_eq!(decode_revert_reason(&payload[..40]), None);
    }
}
