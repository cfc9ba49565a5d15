//! Transaction records

use crate::crypto::{Address, Digest, FullSignature};
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};

/// Fee-market (EIP-1559) transaction type
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// Legacy transaction type. Recognized so it can be rejected explicitly.
pub const LEGACY_TX_TYPE: u8 = 0x00;

/// Access list entry (address + storage keys)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListEntry {
    pub address: Address,
    pub storage_keys: Vec<[u8; 32]>,
}

/// An unsigned transaction.
///
/// Fee fields are optional so that a record carrying the wrong fee model
/// can be represented and rejected by [`UnsignedTx::validate`]: type 2
/// needs both EIP-1559 fee caps and no `gas_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub tx_type: u8,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    /// Wei
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub max_priority_fee_per_gas: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub gas_price: Option<u128>,
    pub access_list: Vec<AccessListEntry>,
}

impl UnsignedTx {
    /// A type-2 transaction with an empty access list
    pub fn eip1559(
        chain_id: u64,
        nonce: u64,
        to: Address,
        value: u128,
        data: Vec<u8>,
        gas_limit: u64,
        fees: &FeeEstimate,
    ) -> Self {
        Self {
            tx_type: EIP1559_TX_TYPE,
            chain_id,
            nonce,
            to,
            value,
            data,
            gas_limit,
            max_priority_fee_per_gas: Some(fees.max_priority_fee_per_gas),
            max_fee_per_gas: Some(fees.max_fee_per_gas),
            gas_price: None,
            access_list: Vec::new(),
        }
    }

    /// Check the fee-model invariant and return `(max_priority_fee, max_fee)`
    pub fn validate(&self) -> BridgeResult<(u128, u128)> {
        if self.tx_type != EIP1559_TX_TYPE {
            return Err(BridgeError::InvalidTransaction(format!(
                "unsupported transaction type {}",
                self.tx_type
            )));
        }
        if self.gas_price.is_some() {
            return Err(BridgeError::InvalidTransaction(
                "gas_price is not allowed on a type 2 transaction".to_string(),
            ));
        }

        let (priority, max_fee) = match (self.max_priority_fee_per_gas, self.max_fee_per_gas) {
            (Some(priority), Some(max_fee)) => (priority, max_fee),
            _ => {
                return Err(BridgeError::InvalidTransaction(
                    "type 2 transaction needs both max_priority_fee_per_gas and max_fee_per_gas"
                        .to_string(),
                ))
            }
        };

        if priority > max_fee {
            return Err(BridgeError::InvalidTransaction(format!(
                "max_priority_fee_per_gas {} exceeds max_fee_per_gas {}",
                priority, max_fee
            )));
        }
        if self.gas_limit == 0 {
            return Err(BridgeError::InvalidTransaction("gas_limit is zero".to_string()));
        }

        Ok((priority, max_fee))
    }

    /// Worst-case wei the sender must hold: `value + gas_limit * max_fee`
    pub fn max_cost(&self) -> BridgeResult<u128> {
        let max_fee = self.max_fee_per_gas.or(self.gas_price).unwrap_or(0);
        (self.gas_limit as u128)
            .checked_mul(max_fee)
            .and_then(|gas_cost| gas_cost.checked_add(self.value))
            .ok_or_else(|| BridgeError::InvalidAmount("transaction cost overflows u128".to_string()))
    }
}

/// Fee caps for a type-2 transaction, in wei per gas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub base_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

impl FeeEstimate {
    /// 1.5 gwei tip
    pub const DEFAULT_PRIORITY_FEE: u128 = 1_500_000_000;

    /// `max_fee = 2 * base_fee + priority`, leaving room for the base fee
    /// to double before inclusion
    pub fn from_base_fee(base_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Self {
        Self {
            base_fee_per_gas,
            max_priority_fee_per_gas,
            max_fee_per_gas: base_fee_per_gas
                .saturating_mul(2)
                .saturating_add(max_priority_fee_per_gas),
        }
    }
}

/// Network parameters read fresh before building each transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub balance: u128,
    pub fees: FeeEstimate,
    pub nonce: u64,
    pub chain_id: u64,
}

/// An unsigned transaction frozen together with its canonical encoding
/// and digest. Fields are private: changing the transaction means
/// preparing a new one, which recomputes the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTx {
    tx: UnsignedTx,
    unsigned_bytes: Vec<u8>,
    digest: Digest,
}

impl PreparedTx {
    pub(crate) fn new(tx: UnsignedTx, unsigned_bytes: Vec<u8>, digest: Digest) -> Self {
        Self {
            tx,
            unsigned_bytes,
            digest,
        }
    }

    pub fn tx(&self) -> &UnsignedTx {
        &self.tx
    }

    pub fn unsigned_bytes(&self) -> &[u8] {
        &self.unsigned_bytes
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

/// A verified, broadcast-ready transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub tx: UnsignedTx,
    pub signature: FullSignature,
    pub sender: Address,
    #[serde(with = "hex_bytes")]
    pub raw: Vec<u8>,
    pub tx_hash: [u8; 32],
}

impl SignedTx {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn tx_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.tx_hash))
    }
}

/// `0x`-prefixed hex for byte vectors in JSON
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::crypto::decode_hex(&text).map_err(serde::de::Error::custom)
    }
}
