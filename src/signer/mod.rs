//! Signing oracle contract
//!
//! The oracle holds the key; the bridge only ever sees its public key and
//! bare `(r, s)` signatures over digests it submits. Failures are surfaced
//! to the caller as [`BridgeError::Oracle`](crate::error::BridgeError)
//! and never retried here.

pub mod http;
pub mod local;

pub use http::HttpSigningOracle;
pub use local::LocalKeyOracle;

use crate::crypto::{Digest, RawSignature, SignerPublicKey};
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A remote ECDSA signer that returns signatures without a recovery id
pub trait SigningOracle: Send + Sync {
    /// The oracle's public key, in any SEC1 form
    fn public_key(&self) -> impl Future<Output = BridgeResult<SignerPublicKey>> + Send;

    /// Sign a 32-byte digest as-is (no further hashing)
    fn sign(&self, digest: Digest) -> impl Future<Output = BridgeResult<RawSignature>> + Send;
}

/// Oracle reply envelope: `{"Ok": {...}}` or `{"Err": "reason"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleReply<T> {
    Ok(T),
    Err(String),
}

impl<T> OracleReply<T> {
    pub fn into_result(self) -> BridgeResult<T> {
        match self {
            OracleReply::Ok(value) => Ok(value),
            OracleReply::Err(reason) => Err(BridgeError::oracle(reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyReply {
    pub public_key_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureReply {
    pub signature_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub message_hash_hex: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_envelope() {
        let ok: OracleReply<SignatureReply> =
            serde_json::from_str(r#"{"Ok":{"signature_hex":"abcd"}}"#).unwrap();
        assert_eq!(ok.into_result().unwrap().signature_hex, "abcd");

        let err: OracleReply<SignatureReply> = serde_json::from_str(r#"{"Err":"key not ready"}"#).unwrap();
        assert_eq!(err.into_result().unwrap_err(), BridgeError::Oracle("key not ready".into()));
    }
}
