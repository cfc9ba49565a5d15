//! Account identifiers and their bytes32 contract encoding
//!
//! Deposits are credited to an account on the destination side, named by
//! an opaque byte identifier (a principal). Its textual form is
//! `base32(crc32_be(bytes) || bytes)`, lowercase, grouped by five with
//! dashes. The deposit helper contract takes it as a `bytes32`:
//!
//! ```text
//! [len][account bytes ...][zero padding]   (always 32 bytes)
//! ```

use crate::error::{BridgeError, BridgeResult};
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Longest account id that fits behind the length byte
pub const MAX_ACCOUNT_ID_LEN: usize = 31;

const CRC_LEN: usize = 4;
const GROUP_LEN: usize = 5;

/// Opaque account identifier
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(Vec<u8>);

impl AccountId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Parse the grouped base32 text form, verifying checksum and grouping
    pub fn from_text(text: &str) -> BridgeResult<Self> {
        let lowered = text.trim().to_ascii_lowercase();
        let ungrouped: String = lowered.chars().filter(|c| *c != '-').collect();

        let decoded = BASE32_NOPAD
            .decode(ungrouped.to_ascii_uppercase().as_bytes())
            .map_err(|e| BridgeError::InvalidAccountId(format!("base32: {}", e)))?;

        if decoded.len() < CRC_LEN {
            return Err(BridgeError::InvalidAccountId("text too short".to_string()));
        }

        let (checksum, bytes) = decoded.split_at(CRC_LEN);
        if checksum != crc32fast::hash(bytes).to_be_bytes() {
            return Err(BridgeError::InvalidAccountId(format!("checksum mismatch: {}", text)));
        }

        let account = Self(bytes.to_vec());
        if account.to_text() != lowered {
            return Err(BridgeError::InvalidAccountId(format!("not in canonical form: {}", text)));
        }

        Ok(account)
    }

    pub fn to_text(&self) -> String {
        let mut data = crc32fast::hash(&self.0).to_be_bytes().to_vec();
        data.extend_from_slice(&self.0);

        let encoded = BASE32_NOPAD.encode(&data).to_ascii_lowercase();

        encoded
            .as_bytes()
            .chunks(GROUP_LEN)
            .map(|group| String::from_utf8_lossy(group).into_owned())
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for AccountId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_text())
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_text(&text).map_err(serde::de::Error::custom)
    }
}

/// Fixed 32-byte contract argument
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bytes32Arg(pub [u8; 32]);

impl Bytes32Arg {
    pub const ZERO: Bytes32Arg = Bytes32Arg([0u8; 32]);

    /// Raw 32-byte value, used as-is (e.g. an explicit sub-account)
    pub fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Read back the account id from a length-prefixed argument. Fails if
    /// the length byte is out of range or the tail is not zero.
    pub fn decode_account(&self) -> BridgeResult<AccountId> {
        let len = self.0[0] as usize;
        if len > MAX_ACCOUNT_ID_LEN {
            return Err(BridgeError::InvalidAccountId(format!("length byte {} out of range", len)));
        }
        if self.0[1 + len..].iter().any(|&b| b != 0) {
            return Err(BridgeError::InvalidAccountId("non-zero padding".to_string()));
        }
        Ok(AccountId::from_bytes(&self.0[1..1 + len]))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Bytes32Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32Arg({})", self.to_hex())
    }
}

/// `[len][account bytes][zero padding]`
pub fn encode_account_id(account: &AccountId) -> BridgeResult<Bytes32Arg> {
    let bytes = account.as_bytes();
    if bytes.len() > MAX_ACCOUNT_ID_LEN {
        return Err(BridgeError::AccountIdTooLong {
            len: bytes.len(),
            max: MAX_ACCOUNT_ID_LEN,
        });
    }

    let mut out = [0u8; 32];
    out[0] = bytes.len() as u8;
    out[1..1 + bytes.len()].copy_from_slice(bytes);
    Ok(Bytes32Arg(out))
}

/// Parse the text form and encode in one step
pub fn encode_account_text(text: &str) -> BridgeResult<Bytes32Arg> {
    encode_account_id(&AccountId::from_text(text)?)
}

/// A sub-account given either as raw `0x`-prefixed 32-byte hex or as an
/// account id text form
pub fn parse_bytes32_arg(text: &str) -> BridgeResult<Bytes32Arg> {
    let trimmed = text.trim();
    match trimmed.strip_prefix("0x") {
        Some(digits) => {
            let bytes = hex::decode(digits)
                .map_err(|e| BridgeError::InvalidAccountId(format!("bytes32 hex: {}", e)))?;
            let raw: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
                BridgeError::InvalidAccountId(format!("bytes32 argument is {} bytes", v.len()))
            })?;
            Ok(Bytes32Arg::from_raw(raw))
        }
        None => encode_account_text(trimmed),
    }
}
