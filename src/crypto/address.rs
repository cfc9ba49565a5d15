//! Ethereum address derivation
//!
//! `address = keccak256(uncompressed_point[1..])[12..]`
//!
//! The signing oracle hands out its key in whatever SEC1 form it likes
//! (compressed, uncompressed, or the bare 64-byte `x || y` with the `0x04`
//! marker dropped), so every input is normalized to the 65-byte
//! uncompressed form before hashing.

use super::{decode_hex, keccak256, to_checksum_address};
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// A validated secp256k1 public key, held in uncompressed form
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignerPublicKey([u8; 65]);

impl SignerPublicKey {
    /// Parse a 33-, 64- or 65-byte SEC1 key. Fails if the point is not on
    /// the curve.
    pub fn from_bytes(bytes: &[u8]) -> BridgeResult<Self> {
        let parsed = match bytes.len() {
            33 | 65 => secp256k1::PublicKey::from_slice(bytes),
            64 => {
                let mut full = [0u8; 65];
                full[0] = UNCOMPRESSED_TAG;
                full[1..].copy_from_slice(bytes);
                secp256k1::PublicKey::from_slice(&full)
            }
            len => {
                return Err(BridgeError::invalid_key(format!(
                    "expected 33, 64 or 65 bytes, got {}",
                    len
                )))
            }
        }
        .map_err(|e| BridgeError::invalid_key(e.to_string()))?;

        Ok(Self(parsed.serialize_uncompressed()))
    }

    /// Parse a hex key, with or without `0x`
    pub fn from_hex(text: &str) -> BridgeResult<Self> {
        let bytes = decode_hex(text).map_err(|e| BridgeError::invalid_key(format!("hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_secp(key: &secp256k1::PublicKey) -> Self {
        Self(key.serialize_uncompressed())
    }

    pub fn uncompressed(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn compressed(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = if self.0[64] & 1 == 0 { 0x02 } else { 0x03 };
        out[1..].copy_from_slice(&self.0[1..33]);
        out
    }

    pub fn address(&self) -> Address {
        let hash = keccak256(&self.0[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Address(address)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SignerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerPublicKey({})", self.to_hex())
    }
}

/// Derive the address controlled by a public key given in any SEC1 form
pub fn derive_address(public_key: &[u8]) -> BridgeResult<Address> {
    Ok(SignerPublicKey::from_bytes(public_key)?.address())
}

/// 20-byte Ethereum address. Displays in EIP-55 checksummed form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_slice(bytes: &[u8]) -> BridgeResult<Self> {
        let array: [u8; 20] = bytes.try_into().map_err(|_| {
            BridgeError::InvalidAddress(format!("expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_checksum(&self) -> String {
        to_checksum_address(&self.0)
    }

    /// Textual comparison used at the boundary, where either side may be
    /// lowercase or checksummed.
    pub fn matches_str(&self, other: &str) -> bool {
        self.to_checksum().eq_ignore_ascii_case(other.trim())
    }
}

impl FromStr for Address {
    type Err = BridgeError;

    /// Accepts all-lowercase, all-uppercase or correctly checksummed hex.
    /// Mixed case that fails the checksum is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if body.len() != 40 {
            return Err(BridgeError::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                body.len()
            )));
        }

        let bytes = hex::decode(body).map_err(|e| BridgeError::InvalidAddress(e.to_string()))?;
        let address = Self::from_slice(&bytes)?;

        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *body {
            return Err(BridgeError::InvalidAddress(format!("bad checksum: {}", trimmed)));
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
