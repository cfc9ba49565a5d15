//! EVM Bridge Core Library
//!
//! Moves ETH and ERC-20 deposits from an address controlled by a remote
//! ECDSA signing oracle into a helper contract on an EVM chain.
//!
//! # Architecture
//!
//! This crate provides:
//! - **crypto**: Address derivation, keccak-256, recovery-id resolution
//! - **principal**: Account id text form and its `bytes32` encoding
//! - **abi**: Selectors and call data for the helper and token contracts
//! - **tx**: EIP-1559 building, canonical encoding, digests, assembly
//! - **signer**: Signing oracle contract (HTTP and in-process)
//! - **provider**: Chain provider contract (JSON-RPC and in-memory)
//! - **deposit**: The multi-step deposit orchestrator
//!
//! # Security
//!
//! The oracle only ever sees a 32-byte digest. Every signed payload is
//! decoded and its sender recovered before it is broadcast; a payload
//! that does not recover to the oracle's address is never sent.
//!
//! # Example
//!
//! ```rust,ignore
//! use evm_bridge::{deposit::*, provider::JsonRpcProvider, signer::HttpSigningOracle, BridgeConfig};
//!
//! let config = BridgeConfig::resolve(None)?;
//! let provider = JsonRpcProvider::new(&config.rpc_url)?;
//! let oracle = HttpSigningOracle::new(&config.oracle_url)?;
//! let orchestrator = DepositOrchestrator::new(provider, oracle, config.orchestrator_config());
//!
//! let plan = DepositPlan::eth(amount, principal, Bytes32Arg::ZERO);
//! let outcome = orchestrator.run(plan).await?;
//! ```

pub mod abi;
pub mod config;
pub mod crypto;
pub mod deposit;
pub mod error;
pub mod principal;
pub mod provider;
pub mod signer;
pub mod tx;
pub mod units;
pub mod utils;

// Re-export key types for convenience
pub use config::BridgeConfig;
pub use crypto::{derive_address, keccak256, resolve_recovery_id, to_checksum_address, Address, Digest};
pub use deposit::{DepositCheckpoint, DepositFailure, DepositOrchestrator, DepositOutcome, DepositPlan, DepositStep};
pub use error::{BridgeError, BridgeResult, ErrorCode};
pub use principal::{encode_account_id, encode_account_text, AccountId, Bytes32Arg};
pub use tx::{assemble_signed_tx, compute_digest, encode_unsigned, SignedTx, TransactionBuilder, UnsignedTx};
