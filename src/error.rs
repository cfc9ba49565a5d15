//! Unified error types for the bridge
//!
//! Every fallible operation returns [`BridgeError`]. Cryptographic
//! verification failures are fatal; oracle and provider failures are
//! reported to the caller, who decides whether to try again.

use serde::{Deserialize, Serialize};

/// Main error type for all bridge operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid public key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Account id is {len} bytes, at most {max} fit in a bytes32 argument")]
    AccountIdTooLong { len: usize, max: usize },

    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("No recovery id reproduces the expected public key for digest {digest}")]
    RecoveryMismatch { digest: String },

    #[error("Signed transaction recovers to {recovered}, expected {expected}")]
    SignerMismatch { expected: String, recovered: String },

    #[error("Signing oracle error: {0}")]
    Oracle(String),

    #[error("Provider error: {0}")]
    Provider(String),

    /// The node may hold the transaction: it said so, or the reply was lost
    #[error("Broadcast outcome unknown: {0}")]
    BroadcastUnconfirmed(String),

    #[error("Stale nonce {nonce}: {message}")]
    StaleNonce { nonce: u64, message: String },

    #[error("Insufficient funds: balance {balance} wei, required {required} wei")]
    InsufficientFunds { balance: u128, required: u128 },

    #[error("Chain id mismatch: expected {expected}, provider reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },

    #[error("Transaction {tx_hash} reverted on-chain")]
    TransactionReverted { tx_hash: String },

    #[error("Deposit sequence cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl BridgeError {
    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKeyFormat(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Error category for serialization and reporting
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidKeyFormat(_) => ErrorCode::InvalidKeyFormat,
            Self::AccountIdTooLong { .. } => ErrorCode::AccountIdTooLong,
            Self::InvalidAccountId(_) => ErrorCode::InvalidAccountId,
            Self::InvalidAddress(_) => ErrorCode::InvalidAddress,
            Self::InvalidAmount(_) => ErrorCode::InvalidAmount,
            Self::InvalidTransaction(_) => ErrorCode::InvalidTransaction,
            Self::RecoveryMismatch { .. } => ErrorCode::RecoveryMismatch,
            Self::SignerMismatch { .. } => ErrorCode::SignerMismatch,
            Self::Oracle(_) => ErrorCode::OracleError,
            Self::Provider(_) => ErrorCode::ProviderError,
            Self::BroadcastUnconfirmed(_) => ErrorCode::BroadcastUnconfirmed,
            Self::StaleNonce { .. } => ErrorCode::StaleNonce,
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::ChainIdMismatch { .. } => ErrorCode::ChainIdMismatch,
            Self::TransactionReverted { .. } => ErrorCode::TransactionReverted,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Encoding(_) => ErrorCode::EncodingError,
        }
    }

    /// Verification failures: the payload must never be broadcast and the
    /// step must not be retried with relaxed checks.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RecoveryMismatch { .. } | Self::SignerMismatch { .. })
    }

    /// Transient collaborator failures the caller may choose to retry.
    pub fn is_retryable_by_caller(&self) -> bool {
        matches!(self, Self::Oracle(_) | Self::Provider(_))
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    InvalidKeyFormat,
    AccountIdTooLong,
    InvalidAccountId,
    InvalidAddress,
    InvalidAmount,
    InvalidTransaction,

    // Verification errors
    RecoveryMismatch,
    SignerMismatch,

    // Collaborator errors
    OracleError,
    ProviderError,
    BroadcastUnconfirmed,
    StaleNonce,
    InsufficientFunds,
    ChainIdMismatch,
    TransactionReverted,

    // Flow control
    Cancelled,

    // Internal
    ConfigError,
    EncodingError,
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Encoding(format!("JSON: {}", e))
    }
}

impl From<hex::FromHexError> for BridgeError {
    fn from(e: hex::FromHexError) -> Self {
        BridgeError::Encoding(format!("hex: {}", e))
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BridgeError::Provider("Request timed out".to_string())
        } else if e.is_connect() {
            BridgeError::Provider("Connection failed".to_string())
        } else {
            BridgeError::Provider(e.to_string())
        }
    }
}
