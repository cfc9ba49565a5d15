//! Ethereum JSON-RPC provider over HTTP

use super::{classify_broadcast_error, parse_quantity, ChainProvider, TxReceipt};
use crate::crypto::Address;
use crate::error::{BridgeError, BridgeResult};
use crate::tx::{FeeEstimate, SignedTx};
use crate::utils::network_config::validate_endpoint;
use crate::{log_debug, log_warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug)]
pub struct JsonRpcProvider {
    client: reqwest::Client,
    url: String,
    priority_fee: u128,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: &str) -> BridgeResult<Self> {
        let validation = validate_endpoint(url);
        if !validation.is_valid {
            return Err(BridgeError::config(format!("rpc url {}: {}", url, validation.errors.join("; "))));
        }
        for warning in &validation.warnings {
            log_warn!("provider", "Endpoint warning", detail = warning);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::provider(format!("failed to create client: {}", e)))?;

        Ok(Self {
            client,
            url: url.trim().to_string(),
            priority_fee: FeeEstimate::DEFAULT_PRIORITY_FEE,
            next_id: AtomicU64::new(1),
        })
    }

    /// Tip used in fee estimates, in wei per gas
    pub fn with_priority_fee(mut self, priority_fee: u128) -> Self {
        self.priority_fee = priority_fee;
        self
    }

    /// Outer error: transport or malformed response. Inner error: the
    /// node answered with a JSON-RPC error object.
    async fn request(&self, method: &str, params: Value) -> BridgeResult<Result<Value, RpcError>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BridgeError::provider(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(BridgeError::provider(format!("{} returned HTTP {}", method, response.status())));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::provider(format!("malformed {} response: {}", method, e)))?;

        Ok(match body.error {
            Some(error) => Err(error),
            None => Ok(body.result),
        })
    }

    async fn call(&self, method: &str, params: Value) -> BridgeResult<Value> {
        self.request(method, params)
            .await?
            .map_err(|e| BridgeError::provider(format!("{}: {} (code {})", method, e.message, e.code)))
    }

    async fn call_quantity(&self, method: &str, params: Value) -> BridgeResult<u128> {
        let value = self.call(method, params).await?;
        let text = value
            .as_str()
            .ok_or_else(|| BridgeError::provider(format!("{}: expected hex quantity, got {}", method, value)))?;
        parse_quantity(text)
    }

    async fn block_number(&self) -> BridgeResult<u64> {
        Ok(self.call_quantity("eth_blockNumber", json!([])).await? as u64)
    }
}

impl ChainProvider for JsonRpcProvider {
    async fn get_balance(&self, address: Address) -> BridgeResult<u128> {
        self.call_quantity("eth_getBalance", json!([address.to_checksum(), "latest"])).await
    }

    async fn get_fee_estimate(&self) -> BridgeResult<FeeEstimate> {
        let block = self.call("eth_getBlockByNumber", json!(["latest", false])).await?;
        let base_fee = block
            .get("baseFeePerGas")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::provider("latest block has no baseFeePerGas (pre-London chain?)"))?;
        Ok(FeeEstimate::from_base_fee(parse_quantity(base_fee)?, self.priority_fee))
    }

    async fn get_network_id(&self) -> BridgeResult<u64> {
        Ok(self.call_quantity("eth_chainId", json!([])).await? as u64)
    }

    async fn get_transaction_count(&self, address: Address) -> BridgeResult<u64> {
        Ok(self
            .call_quantity("eth_getTransactionCount", json!([address.to_checksum(), "pending"]))
            .await? as u64)
    }

    async fn broadcast(&self, signed: &SignedTx) -> BridgeResult<String> {
        log_debug!("provider", "Broadcasting", tx_hash = signed.tx_hash_hex(), nonce = signed.tx.nonce);

        // Without a JSON-RPC error object the node may have accepted the
        // transaction, so transport failures are not rejections.
        match self.request("eth_sendRawTransaction", json!([signed.raw_hex()])).await {
            Ok(Ok(Value::String(hash))) => Ok(hash),
            Ok(Ok(other)) => Err(BridgeError::BroadcastUnconfirmed(format!(
                "eth_sendRawTransaction returned {}",
                other
            ))),
            Ok(Err(error)) => Err(classify_broadcast_error(signed.tx.nonce, &error.message)),
            Err(error) => Err(BridgeError::BroadcastUnconfirmed(error.to_string())),
        }
    }

    async fn get_receipt(&self, tx_hash: &str) -> BridgeResult<Option<TxReceipt>> {
        let receipt = self.call("eth_getTransactionReceipt", json!([tx_hash])).await?;
        if receipt.is_null() {
            return Ok(None);
        }

        let Some(block_hex) = receipt.get("blockNumber").and_then(Value::as_str) else {
            // pending receipt from some nodes
            return Ok(None);
        };
        let block_number = parse_quantity(block_hex)? as u64;

        let success = receipt.get("status").and_then(Value::as_str).map(|s| s == "0x1").unwrap_or(true);

        let head = self.block_number().await?;
        let confirmations = head.saturating_sub(block_number) + 1;

        Ok(Some(TxReceipt {
            block_number,
            success,
            confirmations,
        }))
    }
}
