//! Calldata for the bridge's contract calls

use super::selector::KnownSelectors;
use crate::crypto::Address;
use crate::error::{BridgeError, BridgeResult};
use crate::principal::Bytes32Arg;
use serde::{Deserialize, Serialize};

const WORD: usize = 32;

/// A contract call the bridge knows how to encode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ContractCall {
    DepositEth {
        principal: Bytes32Arg,
        subaccount: Bytes32Arg,
    },
    DepositErc20 {
        token: Address,
        amount: u128,
        principal: Bytes32Arg,
        subaccount: Bytes32Arg,
    },
    Approve {
        spender: Address,
        amount: u128,
    },
    Transfer {
        to: Address,
        amount: u128,
    },
}

impl ContractCall {
    pub fn selector(&self) -> [u8; 4] {
        match self {
            Self::DepositEth { .. } => KnownSelectors::DEPOSIT_ETH,
            Self::DepositErc20 { .. } => KnownSelectors::DEPOSIT_ERC20,
            Self::Approve { .. } => KnownSelectors::APPROVE,
            Self::Transfer { .. } => KnownSelectors::TRANSFER,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let words: Vec<[u8; 32]> = match self {
            Self::DepositEth { principal, subaccount } => vec![principal.0, subaccount.0],
            Self::DepositErc20 {
                token,
                amount,
                principal,
                subaccount,
            } => vec![address_word(token), uint256_word(*amount), principal.0, subaccount.0],
            Self::Approve { spender, amount } => vec![address_word(spender), uint256_word(*amount)],
            Self::Transfer { to, amount } => vec![address_word(to), uint256_word(*amount)],
        };

        let mut data = Vec::with_capacity(4 + words.len() * WORD);
        data.extend_from_slice(&self.selector());
        for word in words {
            data.extend_from_slice(&word);
        }
        data
    }
}

pub fn encode_deposit_eth(principal: &Bytes32Arg, subaccount: &Bytes32Arg) -> Vec<u8> {
    ContractCall::DepositEth {
        principal: *principal,
        subaccount: *subaccount,
    }
    .encode()
}

/// `amount` is in token base units
pub fn encode_deposit_erc20(
    token: &Address,
    amount: u128,
    principal: &Bytes32Arg,
    subaccount: &Bytes32Arg,
) -> Vec<u8> {
    ContractCall::DepositErc20 {
        token: *token,
        amount,
        principal: *principal,
        subaccount: *subaccount,
    }
    .encode()
}

pub fn encode_approve(spender: &Address, amount: u128) -> Vec<u8> {
    ContractCall::Approve { spender: *spender, amount }.encode()
}

pub fn encode_transfer(to: &Address, amount: u128) -> Vec<u8> {
    ContractCall::Transfer { to: *to, amount }.encode()
}

/// Decode `transfer(address,uint256)` calldata into `(to, amount)`
pub fn decode_transfer(data: &[u8]) -> BridgeResult<(Address, u128)> {
    if data.len() != 4 + 2 * WORD {
        return Err(BridgeError::Encoding(format!(
            "transfer calldata must be {} bytes, got {}",
            4 + 2 * WORD,
            data.len()
        )));
    }
    if data[..4] != KnownSelectors::TRANSFER {
        return Err(BridgeError::Encoding(format!(
            "not a transfer call: selector 0x{}",
            hex::encode(&data[..4])
        )));
    }

    let to = word_to_address(&data[4..4 + WORD])?;
    let amount = word_to_u128(&data[4 + WORD..])?;
    Ok((to, amount))
}

/// Left-pad an address to a 32-byte word
pub fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Big-endian uint256 word from a u128
pub fn uint256_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_to_address(word: &[u8]) -> BridgeResult<Address> {
    if word[..12].iter().any(|&b| b != 0) {
        return Err(BridgeError::Encoding("address word has dirty high bytes".to_string()));
    }
    Address::from_slice(&word[12..])
}

fn word_to_u128(word: &[u8]) -> BridgeResult<u128> {
    if word[..16].iter().any(|&b| b != 0) {
        return Err(BridgeError::InvalidAmount("uint256 amount exceeds 128 bits".to_string()));
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(bytes))
}
