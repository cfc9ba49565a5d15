//! Recovery-id resolution
//!
//! The signing oracle returns a bare `(r, s)` pair. Ethereum needs the
//! y-parity as well, so both candidates are tried against the digest and
//! the one that reproduces the oracle's known public key wins. If neither
//! does, the oracle signed something other than this digest (or the
//! signature is corrupt) and the transaction must be abandoned.

use super::{decode_hex, Digest, SignerPublicKey};
use crate::error::{BridgeError, BridgeResult};
use crate::log_debug;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use secp256k1::{Message, Secp256k1};
use serde::{Deserialize, Serialize};

/// Signature as returned by the oracle: no recovery id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl RawSignature {
    /// Parse the 64-byte compact `r || s` form
    pub fn from_bytes(bytes: &[u8]) -> BridgeResult<Self> {
        if bytes.len() != 64 {
            return Err(BridgeError::oracle(format!(
                "signature must be 64 bytes (r || s), got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Self { r, s })
    }

    pub fn from_hex(text: &str) -> BridgeResult<Self> {
        let bytes = decode_hex(text).map_err(|e| BridgeError::oracle(format!("signature hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Return the low-S form. Ethereum rejects high-S signatures, and the
    /// flip only changes which recovery id is correct.
    pub fn normalized(&self) -> BridgeResult<Self> {
        let mut signature = Signature::from_compact(&self.to_bytes())
            .map_err(|e| BridgeError::oracle(format!("malformed signature: {}", e)))?;
        signature.normalize_s();
        Self::from_bytes(&signature.serialize_compact())
    }
}

/// `(r, s, recovery_id)` with `recovery_id` in {0, 1}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

impl FullSignature {
    /// 65-byte `r || s || v` with `v = 27 + recovery_id`
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut sig = [0u8; 65];
        sig[..32].copy_from_slice(&self.r);
        sig[32..64].copy_from_slice(&self.s);
        sig[64] = self.recovery_id + 27;
        sig
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Recover the public key that produced `signature` over `digest`
pub fn recover_public_key(digest: &Digest, signature: &FullSignature) -> BridgeResult<SignerPublicKey> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest.as_bytes());

    let recovery_id = RecoveryId::from_i32(signature.recovery_id as i32)
        .map_err(|e| BridgeError::Encoding(format!("recovery id: {}", e)))?;

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&signature.r);
    compact[32..].copy_from_slice(&signature.s);

    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| BridgeError::Encoding(format!("signature: {}", e)))?;

    let public_key = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| BridgeError::Encoding(format!("recovery: {}", e)))?;

    Ok(SignerPublicKey::from_secp(&public_key))
}

/// Find the recovery id under which `raw` over `digest` recovers to
/// `expected`. Fails with [`BridgeError::RecoveryMismatch`] if neither does.
pub fn resolve_recovery_id(
    digest: &Digest,
    raw: &RawSignature,
    expected: &SignerPublicKey,
) -> BridgeResult<FullSignature> {
    let normalized = raw.normalized()?;

    for recovery_id in 0..=1u8 {
        let candidate = FullSignature {
            r: normalized.r,
            s: normalized.s,
            recovery_id,
        };

        // A candidate that fails to recover at all is just a non-match.
        if let Ok(recovered) = recover_public_key(digest, &candidate) {
            if recovered == *expected {
                log_debug!("recovery", "Resolved recovery id", digest = digest, recovery_id = recovery_id);
                return Ok(candidate);
            }
        }
    }

    Err(BridgeError::RecoveryMismatch { digest: digest.to_hex() })
}
