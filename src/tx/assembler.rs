//! Signed transaction assembly and sender verification
//!
//! After the recovery id is resolved, the signature is attached and the
//! final bytes are decoded again with an independent EIP-2718 decoder
//! (`ethers-core`). The sender recovered from those bytes must be the
//! expected signer, or the payload is discarded.

use super::encoder::{encode_signed, encode_unsigned, transaction_hash};
use super::types::{SignedTx, UnsignedTx};
use crate::crypto::{Address, FullSignature};
use crate::error::{BridgeError, BridgeResult};
use crate::{log_debug, log_error};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::utils::rlp::Rlp;

/// What an independent decoder sees in a signed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSigned {
    pub sender: Address,
    pub signing_hash: [u8; 32],
    pub nonce: u64,
    pub chain_id: Option<u64>,
}

/// Decode signed typed-transaction bytes and recover the sender
pub fn recover_sender(signed_bytes: &[u8]) -> BridgeResult<DecodedSigned> {
    let rlp = Rlp::new(signed_bytes);
    let (decoded, signature) = TypedTransaction::decode_signed(&rlp)
        .map_err(|e| BridgeError::Encoding(format!("signed transaction does not decode: {}", e)))?;

    let signing_hash = decoded.sighash();
    let sender = signature
        .recover(signing_hash)
        .map_err(|e| BridgeError::Encoding(format!("sender recovery: {}", e)))?;

    Ok(DecodedSigned {
        sender: Address(sender.0),
        signing_hash: signing_hash.0,
        nonce: decoded.nonce().map(|n| n.as_u64()).unwrap_or_default(),
        chain_id: decoded.chain_id().map(|c| c.as_u64()),
    })
}

/// Attach `signature` to `tx` and verify the result recovers to
/// `expected_sender`. Fails with [`BridgeError::SignerMismatch`] otherwise.
pub fn assemble_signed_tx(
    tx: &UnsignedTx,
    signature: &FullSignature,
    expected_sender: &Address,
) -> BridgeResult<SignedTx> {
    let raw = encode_signed(tx, signature)?;
    let decoded = recover_sender(&raw)?;

    let digest = super::encoder::compute_digest(&encode_unsigned(tx)?);
    if decoded.signing_hash != digest.0 {
        return Err(BridgeError::Encoding(format!(
            "decoder signing hash 0x{} differs from digest {}",
            hex::encode(decoded.signing_hash),
            digest
        )));
    }

    if decoded.sender != *expected_sender {
        log_error!(
            "tx",
            "Signed transaction recovers to the wrong sender",
            expected = expected_sender,
            recovered = decoded.sender
        );
        return Err(BridgeError::SignerMismatch {
            expected: expected_sender.to_checksum(),
            recovered: decoded.sender.to_checksum(),
        });
    }

    let tx_hash = transaction_hash(&raw);
    log_debug!("tx", "Assembled signed transaction", sender = decoded.sender, tx_hash = hex::encode(tx_hash));

    Ok(SignedTx {
        tx: tx.clone(),
        signature: *signature,
        sender: decoded.sender,
        raw,
        tx_hash,
    })
}
