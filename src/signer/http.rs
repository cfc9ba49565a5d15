//! HTTP client for a remote signing oracle
//!
//! ```text
//! POST {base}/public_key   {}                            -> {"Ok": {"public_key_hex": ...}}
//! POST {base}/sign         {"message_hash_hex": "..."}   -> {"Ok": {"signature_hex": ...}}
//! ```

use super::{OracleReply, PublicKeyReply, SignRequest, SignatureReply, SigningOracle};
use crate::crypto::{Digest, RawSignature, SignerPublicKey};
use crate::error::{BridgeError, BridgeResult};
use crate::log_debug;
use crate::utils::network_config::validate_endpoint;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpSigningOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSigningOracle {
    pub fn new(base_url: &str) -> BridgeResult<Self> {
        let validation = validate_endpoint(base_url);
        if !validation.is_valid {
            return Err(BridgeError::config(format!(
                "oracle url {}: {}",
                base_url,
                validation.errors.join("; ")
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::oracle(format!("failed to create client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, method: &str, body: &B) -> BridgeResult<R> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BridgeError::oracle(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::oracle(format!("{} returned {}: {}", method, status, text)));
        }

        let reply: OracleReply<R> = response
            .json()
            .await
            .map_err(|e| BridgeError::oracle(format!("malformed {} response: {}", method, e)))?;
        reply.into_result()
    }
}

impl SigningOracle for HttpSigningOracle {
    async fn public_key(&self) -> BridgeResult<SignerPublicKey> {
        let reply: PublicKeyReply = self.post("public_key", &serde_json::json!({})).await?;
        SignerPublicKey::from_hex(&reply.public_key_hex)
    }

    async fn sign(&self, digest: Digest) -> BridgeResult<RawSignature> {
        log_debug!("oracle", "Requesting signature", digest = digest);
        let request = SignRequest {
            message_hash_hex: hex::encode(digest.as_bytes()),
        };
        let reply: SignatureReply = self.post("sign", &request).await?;
        RawSignature::from_hex(&reply.signature_hex)
    }
}
