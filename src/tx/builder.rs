//! Transaction builder
//!
//! Turns a caller's intent plus freshly fetched network parameters into an
//! [`UnsignedTx`]. The builder never reads the network itself and never
//! caches a nonce: every call takes its own [`NetworkSnapshot`].

use super::types::{NetworkSnapshot, UnsignedTx};
use crate::abi::ContractCall;
use crate::crypto::Address;
use crate::error::{BridgeError, BridgeResult};
use crate::log_debug;
use serde::{Deserialize, Serialize};

/// Fixed gas limits per transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPolicy {
    pub transfer_gas_limit: u64,
    pub contract_call_gas_limit: u64,
}

impl GasPolicy {
    pub const DEFAULT_TRANSFER_GAS_LIMIT: u64 = 53_600;
    pub const DEFAULT_CONTRACT_CALL_GAS_LIMIT: u64 = 107_200;
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            transfer_gas_limit: Self::DEFAULT_TRANSFER_GAS_LIMIT,
            contract_call_gas_limit: Self::DEFAULT_CONTRACT_CALL_GAS_LIMIT,
        }
    }
}

/// Where a transaction goes and what it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxDestination {
    Transfer { to: Address },
    Call { contract: Address, call: ContractCall },
}

impl TxDestination {
    pub fn target(&self) -> Address {
        match self {
            Self::Transfer { to } => *to,
            Self::Call { contract, .. } => *contract,
        }
    }
}

/// Caller intent for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub destination: TxDestination,
    /// Wei attached to the transaction
    pub value: u128,
}

impl TxRequest {
    pub fn transfer(to: Address, value: u128) -> Self {
        Self {
            destination: TxDestination::Transfer { to },
            value,
        }
    }

    pub fn call(contract: Address, call: ContractCall, value: u128) -> Self {
        Self {
            destination: TxDestination::Call { contract, call },
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    gas_policy: GasPolicy,
    expected_chain_id: Option<u64>,
    check_balance: bool,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new(GasPolicy::default())
    }
}

impl TransactionBuilder {
    pub fn new(gas_policy: GasPolicy) -> Self {
        Self {
            gas_policy,
            expected_chain_id: None,
            check_balance: true,
        }
    }

    /// Refuse to build if the provider reports another chain
    pub fn with_expected_chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.expected_chain_id = chain_id;
        self
    }

    pub fn with_balance_check(mut self, enabled: bool) -> Self {
        self.check_balance = enabled;
        self
    }

    pub fn gas_policy(&self) -> &GasPolicy {
        &self.gas_policy
    }

    pub fn build(&self, request: &TxRequest, network: &NetworkSnapshot) -> BridgeResult<UnsignedTx> {
        if let Some(expected) = self.expected_chain_id {
            if expected != network.chain_id {
                return Err(BridgeError::ChainIdMismatch {
                    expected,
                    actual: network.chain_id,
                });
            }
        }

        let (data, gas_limit) = match &request.destination {
            TxDestination::Transfer { .. } => (Vec::new(), self.gas_policy.transfer_gas_limit),
            TxDestination::Call { call, .. } => (call.encode(), self.gas_policy.contract_call_gas_limit),
        };

        let tx = UnsignedTx::eip1559(
            network.chain_id,
            network.nonce,
            request.destination.target(),
            request.value,
            data,
            gas_limit,
            &network.fees,
        );
        tx.validate()?;

        if self.check_balance {
            let required = tx.max_cost()?;
            if network.balance < required {
                return Err(BridgeError::InsufficientFunds {
                    balance: network.balance,
                    required,
                });
            }
        }

        log_debug!(
            "tx",
            "Built unsigned transaction",
            to = tx.to,
            nonce = tx.nonce,
            value = tx.value,
            gas_limit = tx.gas_limit
        );

        Ok(tx)
    }
}
