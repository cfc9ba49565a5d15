//! In-process oracle backed by a local secp256k1 key
//!
//! Behaves like the remote oracle (returns `(r, s)` only) so the full flow
//! can run against a devnet or in tests.

use super::SigningOracle;
use crate::crypto::{decode_hex, Digest, RawSignature, SignerPublicKey};
use crate::error::{BridgeError, BridgeResult};
use secp256k1::{All, Message, Secp256k1, SecretKey};
use std::fmt;
use zeroize::Zeroizing;

pub struct LocalKeyOracle {
    secp: Secp256k1<All>,
    secret: SecretKey,
}

impl LocalKeyOracle {
    pub fn new(secret: SecretKey) -> Self {
        Self {
            secp: Secp256k1::new(),
            secret,
        }
    }

    pub fn random() -> Self {
        Self::new(SecretKey::new(&mut rand::thread_rng()))
    }

    pub fn from_hex(secret_hex: &str) -> BridgeResult<Self> {
        let bytes = Zeroizing::new(
            decode_hex(secret_hex).map_err(|e| BridgeError::invalid_key(format!("secret key hex: {}", e)))?,
        );
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| BridgeError::invalid_key(format!("secret key: {}", e)))?;
        Ok(Self::new(secret))
    }

    pub fn signer_public_key(&self) -> SignerPublicKey {
        SignerPublicKey::from_secp(&self.secret.public_key(&self.secp))
    }

    fn sign_digest(&self, digest: &Digest) -> RawSignature {
        let message = Message::from_digest(*digest.as_bytes());
        let signature = self.secp.sign_ecdsa(&message, &self.secret);
        let compact = signature.serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);
        RawSignature { r, s }
    }
}

impl fmt::Debug for LocalKeyOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeyOracle")
            .field("address", &self.signer_public_key().address())
            .finish_non_exhaustive()
    }
}

impl SigningOracle for LocalKeyOracle {
    async fn public_key(&self) -> BridgeResult<SignerPublicKey> {
        Ok(self.signer_public_key())
    }

    async fn sign(&self, digest: Digest) -> BridgeResult<RawSignature> {
        Ok(self.sign_digest(&digest))
    }
}
