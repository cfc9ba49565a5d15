//! Canonical EIP-1559 encoding and digest
//!
//! ```text
//! unsigned: 0x02 || rlp([chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas,
//!                        gas_limit, to, value, data, access_list])
//! signed:   0x02 || rlp([... same nine fields ..., y_parity, r, s])
//! digest:   keccak256(unsigned)
//! ```
//!
//! The access list is always present, as an empty list when there are no
//! entries. `r` and `s` are integers, so their leading zeros are dropped.

use super::rlp;
use super::types::{AccessListEntry, PreparedTx, UnsignedTx, EIP1559_TX_TYPE};
use crate::crypto::{keccak256, Digest, FullSignature};
use crate::error::BridgeResult;

fn encode_access_list(access_list: &[AccessListEntry]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = access_list
        .iter()
        .map(|entry| {
            let keys: Vec<Vec<u8>> = entry.storage_keys.iter().map(|k| rlp::encode_bytes(k)).collect();
            rlp::encode_list(&[rlp::encode_bytes(entry.address.as_bytes()), rlp::encode_list(&keys)])
        })
        .collect();
    rlp::encode_list(&entries)
}

/// The nine payload fields shared by the unsigned and signed forms
fn payload_fields(tx: &UnsignedTx) -> BridgeResult<Vec<Vec<u8>>> {
    let (max_priority_fee, max_fee) = tx.validate()?;

    Ok(vec![
        rlp::encode_u64(tx.chain_id),
        rlp::encode_u64(tx.nonce),
        rlp::encode_u128(max_priority_fee),
        rlp::encode_u128(max_fee),
        rlp::encode_u64(tx.gas_limit),
        rlp::encode_bytes(tx.to.as_bytes()),
        rlp::encode_u128(tx.value),
        rlp::encode_bytes(&tx.data),
        encode_access_list(&tx.access_list),
    ])
}

fn typed(fields: &[Vec<u8>]) -> Vec<u8> {
    let list = rlp::encode_list(fields);
    let mut out = Vec::with_capacity(1 + list.len());
    out.push(EIP1559_TX_TYPE);
    out.extend_from_slice(&list);
    out
}

/// Canonical unsigned encoding, the exact bytes that get digested
pub fn encode_unsigned(tx: &UnsignedTx) -> BridgeResult<Vec<u8>> {
    Ok(typed(&payload_fields(tx)?))
}

/// Canonical signed encoding, ready for `eth_sendRawTransaction`
pub fn encode_signed(tx: &UnsignedTx, signature: &FullSignature) -> BridgeResult<Vec<u8>> {
    let mut fields = payload_fields(tx)?;
    fields.push(rlp::encode_u64(signature.recovery_id as u64));
    fields.push(rlp::encode_trimmed(&signature.r));
    fields.push(rlp::encode_trimmed(&signature.s));
    Ok(typed(&fields))
}

/// Signing digest of canonical unsigned bytes. Hashed once.
pub fn compute_digest(unsigned_bytes: &[u8]) -> Digest {
    Digest(keccak256(unsigned_bytes))
}

/// Transaction hash as the network reports it
pub fn transaction_hash(signed_bytes: &[u8]) -> [u8; 32] {
    keccak256(signed_bytes)
}

/// Encode and digest in one step, freezing the transaction
pub fn prepare(tx: UnsignedTx) -> BridgeResult<PreparedTx> {
    let unsigned_bytes = encode_unsigned(&tx)?;
    let digest = compute_digest(&unsigned_bytes);
    Ok(PreparedTx::new(tx, unsigned_bytes, digest))
}
