//! Cryptographic primitives for the bridge
//!
//! - Keccak-256 hashing and EIP-55 checksum encoding
//! - Ethereum address derivation from secp256k1 public keys
//! - Recovery-id resolution for signatures that arrive without one

pub mod address;
pub mod recovery;

pub use address::{derive_address, Address, SignerPublicKey};
pub use recovery::{recover_public_key, resolve_recovery_id, FullSignature, RawSignature};

use serde::{Deserialize, Serialize};
use std::fmt;
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash (the Ethereum flavour, not NIST SHA3-256)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Convert raw address bytes to checksummed (EIP-55) hex
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() || nibble < 8 {
            result.push(ch);
        } else {
            result.push(ch.to_ascii_uppercase());
        }
    }

    result
}

/// 32-byte signing digest of a canonical unsigned transaction.
///
/// Only [`crate::tx::compute_digest`] produces these from transaction
/// contents; the raw constructor exists for values received over the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Strip an optional `0x`/`0X` prefix and hex-decode
pub(crate) fn decode_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(stripped)
}
