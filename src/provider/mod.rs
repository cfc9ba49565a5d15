//! Chain provider contract
//!
//! Everything the bridge needs from an Ethereum node. Reads are
//! side-effect free; `broadcast` is the only write. No retries happen at
//! this layer.

pub mod json_rpc;
pub mod memory;

pub use json_rpc::JsonRpcProvider;
pub use memory::InMemoryProvider;

use crate::crypto::Address;
use crate::error::{BridgeError, BridgeResult};
use crate::tx::{FeeEstimate, SignedTx};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Receipt summary for a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub block_number: u64,
    /// `status == 0x1`
    pub success: bool,
    /// Blocks since inclusion, counting the inclusion block itself
    pub confirmations: u64,
}

pub trait ChainProvider: Send + Sync {
    fn get_balance(&self, address: Address) -> impl Future<Output = BridgeResult<u128>> + Send;

    fn get_fee_estimate(&self) -> impl Future<Output = BridgeResult<FeeEstimate>> + Send;

    fn get_network_id(&self) -> impl Future<Output = BridgeResult<u64>> + Send;

    /// Next nonce for `address`
    fn get_transaction_count(&self, address: Address) -> impl Future<Output = BridgeResult<u64>> + Send;

    /// Submit a signed transaction, returning the hash the node reports
    fn broadcast(&self, signed: &SignedTx) -> impl Future<Output = BridgeResult<String>> + Send;

    /// `None` while the transaction is not yet mined
    fn get_receipt(&self, tx_hash: &str) -> impl Future<Output = BridgeResult<Option<TxReceipt>>> + Send;
}

/// Node replies meaning it already holds this exact transaction
const ALREADY_KNOWN_MARKERS: &[&str] = &["already known", "known transaction", "already imported"];

/// Node rejection messages that mean another transaction used the nonce
const STALE_NONCE_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce has already been used",
    "replacement transaction underpriced",
];

/// Map a node's broadcast error message to a [`BridgeError`].
///
/// "Already known" is not a rejection: the transaction is in the node's
/// pool, so it comes back as [`BridgeError::BroadcastUnconfirmed`] and the
/// caller keeps tracking its hash. Everything else is a definite rejection.
pub fn classify_broadcast_error(nonce: u64, message: &str) -> BridgeError {
    let lower = message.to_ascii_lowercase();
    if ALREADY_KNOWN_MARKERS.iter().any(|m| lower.contains(m)) {
        BridgeError::BroadcastUnconfirmed(message.to_string())
    } else if STALE_NONCE_MARKERS.iter().any(|m| lower.contains(m)) {
        BridgeError::StaleNonce {
            nonce,
            message: message.to_string(),
        }
    } else {
        BridgeError::provider(format!("broadcast rejected: {}", message))
    }
}

/// Parse a JSON-RPC hex quantity (`"0x1a"`)
pub fn parse_quantity(text: &str) -> BridgeResult<u128> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| BridgeError::provider(format!("quantity without 0x prefix: {}", text)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| BridgeError::provider(format!("bad quantity {}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_nonce_classification() {
        assert!(matches!(
            classify_broadcast_error(4, "Nonce too low: next nonce 5, tx nonce 4"),
            BridgeError::StaleNonce { nonce: 4, .. }
        ));
        assert!(matches!(
            classify_broadcast_error(0, "replacement transaction underpriced"),
            BridgeError::StaleNonce { .. }
        ));
        assert!(matches!(
            classify_broadcast_error(0, "insufficient funds for gas * price + value"),
            BridgeError::Provider(_)
        ));
    }

    #[test]
    fn test_already_known_is_not_a_rejection() {
        for message in ["already known", "Known transaction: 0xabc", "transaction already imported"] {
            assert!(
                matches!(classify_broadcast_error(0, message), BridgeError::BroadcastUnconfirmed(_)),
                "{}",
                message
            );
        }
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0xaa36a7").unwrap(), 11_155_111);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert!(parse_quantity("12").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }
}
