//! What a deposit sequence does

use super::types::DepositStep;
use crate::abi::{decode_transfer, ContractCall};
use crate::crypto::Address;
use crate::error::{BridgeError, BridgeResult};
use crate::principal::Bytes32Arg;
use crate::tx::TxRequest;
use serde::{Deserialize, Serialize};

/// A deposit to the helper contract, credited to `principal`/`subaccount`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "asset", rename_all = "snake_case")]
pub enum DepositPlan {
    /// `depositEth` with `amount` wei attached
    Eth {
        amount: u128,
        principal: Bytes32Arg,
        subaccount: Bytes32Arg,
    },
    /// `approve` the helper for `amount` base units, then `depositErc20`
    Token {
        token: Address,
        amount: u128,
        principal: Bytes32Arg,
        subaccount: Bytes32Arg,
    },
}

impl DepositPlan {
    pub fn eth(amount: u128, principal: Bytes32Arg, subaccount: Bytes32Arg) -> Self {
        Self::Eth {
            amount,
            principal,
            subaccount,
        }
    }

    pub fn token(token: Address, amount: u128, principal: Bytes32Arg, subaccount: Bytes32Arg) -> Self {
        Self::Token {
            token,
            amount,
            principal,
            subaccount,
        }
    }

    /// Derive a token deposit from the calldata of a `transfer` that funded
    /// the signer. The transfer must have gone to `signer`.
    pub fn token_from_transfer(
        token: Address,
        transfer_calldata: &[u8],
        signer: &Address,
        principal: Bytes32Arg,
        subaccount: Bytes32Arg,
    ) -> BridgeResult<Self> {
        let (recipient, amount) = decode_transfer(transfer_calldata)?;
        if recipient != *signer {
            return Err(BridgeError::InvalidTransaction(format!(
                "transfer went to {}, not the signer {}",
                recipient, signer
            )));
        }
        Ok(Self::token(token, amount, principal, subaccount))
    }

    pub fn amount(&self) -> u128 {
        match self {
            Self::Eth { amount, .. } | Self::Token { amount, .. } => *amount,
        }
    }

    /// Ordered steps. `ApproveToken` always precedes `DepositToken`.
    pub fn steps(&self) -> Vec<DepositStep> {
        match self {
            Self::Eth { .. } => vec![DepositStep::DepositEth],
            Self::Token { .. } => vec![DepositStep::ApproveToken, DepositStep::DepositToken],
        }
    }

    /// Transaction request for one of this plan's steps
    pub fn request_for(&self, step: DepositStep, helper: Address) -> BridgeResult<TxRequest> {
        match (self, step) {
            (
                Self::Eth {
                    amount,
                    principal,
                    subaccount,
                },
                DepositStep::DepositEth,
            ) => Ok(TxRequest::call(
                helper,
                ContractCall::DepositEth {
                    principal: *principal,
                    subaccount: *subaccount,
                },
                *amount,
            )),
            (Self::Token { token, amount, .. }, DepositStep::ApproveToken) => Ok(TxRequest::call(
                *token,
                ContractCall::Approve {
                    spender: helper,
                    amount: *amount,
                },
                0,
            )),
            (
                Self::Token {
                    token,
                    amount,
                    principal,
                    subaccount,
                },
                DepositStep::DepositToken,
            ) => Ok(TxRequest::call(
                helper,
                ContractCall::DepositErc20 {
                    token: *token,
                    amount: *amount,
                    principal: *principal,
                    subaccount: *subaccount,
                },
                0,
            )),
            (plan, step) => Err(BridgeError::InvalidTransaction(format!(
                "step {} is not part of plan {:?}",
                step,
                plan.steps()
            ))),
        }
    }
}
