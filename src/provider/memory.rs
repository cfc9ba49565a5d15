//! In-memory chain for dry runs and tests
//!
//! Keeps per-sender nonces, mines each broadcast after a configurable
//! number of receipt polls and advances one block per poll, so
//! confirmation counts grow the way they do on a live chain.

use super::{classify_broadcast_error, ChainProvider, TxReceipt};
use crate::crypto::Address;
use crate::error::{BridgeError, BridgeResult};
use crate::tx::{recover_sender, transaction_hash, FeeEstimate, SignedTx};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Observable provider activity, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    NonceRead { address: Address, nonce: u64 },
    Broadcast { tx_hash: String, nonce: u64, to: Address },
    Mined { tx_hash: String, block_number: u64 },
}

#[derive(Debug)]
struct PendingTx {
    polls_remaining: u32,
    mined_at: Option<u64>,
    success: bool,
}

#[derive(Debug)]
struct ChainState {
    head: u64,
    fees: FeeEstimate,
    balances: HashMap<Address, u128>,
    nonces: HashMap<Address, u64>,
    txs: HashMap<String, PendingTx>,
    blocks_until_mined: u32,
    reverted_nonces: HashSet<u64>,
    broadcast_failure: Option<String>,
    receipt_failure: Option<String>,
    broadcasts: Vec<SignedTx>,
    events: Vec<ProviderEvent>,
}

#[derive(Debug)]
pub struct InMemoryProvider {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl InMemoryProvider {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(ChainState {
                head: 1,
                fees: FeeEstimate::from_base_fee(1_000_000_000, FeeEstimate::DEFAULT_PRIORITY_FEE),
                balances: HashMap::new(),
                nonces: HashMap::new(),
                txs: HashMap::new(),
                blocks_until_mined: 1,
                reverted_nonces: HashSet::new(),
                broadcast_failure: None,
                receipt_failure: None,
                broadcasts: Vec::new(),
                events: Vec::new(),
            }),
        }
    }

    fn state(&self) -> BridgeResult<MutexGuard<'_, ChainState>> {
        self.state
            .lock()
            .map_err(|_| BridgeError::provider("in-memory chain state poisoned"))
    }

    fn update(&self, f: impl FnOnce(&mut ChainState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn read<T: Default>(&self, f: impl FnOnce(&ChainState) -> T) -> T {
        self.state.lock().map(|state| f(&state)).unwrap_or_default()
    }

    pub fn with_balance(self, address: Address, wei: u128) -> Self {
        self.update(|s| {
            s.balances.insert(address, wei);
        });
        self
    }

    pub fn with_nonce(self, address: Address, nonce: u64) -> Self {
        self.update(|s| {
            s.nonces.insert(address, nonce);
        });
        self
    }

    pub fn with_fees(self, fees: FeeEstimate) -> Self {
        self.update(|s| s.fees = fees);
        self
    }

    /// Receipt polls that return `None` before a transaction is mined
    pub fn with_blocks_until_mined(self, polls: u32) -> Self {
        self.update(|s| s.blocks_until_mined = polls);
        self
    }

    /// Transactions with this nonce are mined with a failed status
    pub fn revert_nonce(&self, nonce: u64) {
        self.update(|s| {
            s.reverted_nonces.insert(nonce);
        });
    }

    /// The next broadcast is rejected with this node message
    pub fn fail_next_broadcast(&self, message: &str) {
        self.update(|s| s.broadcast_failure = Some(message.to_string()));
    }

    /// Receipt queries fail with this message until cleared
    pub fn fail_receipts(&self, message: Option<&str>) {
        self.update(|s| s.receipt_failure = message.map(str::to_string));
    }

    pub fn events(&self) -> Vec<ProviderEvent> {
        self.read(|s| s.events.clone())
    }

    pub fn broadcasts(&self) -> Vec<SignedTx> {
        self.read(|s| s.broadcasts.clone())
    }
}

impl ChainProvider for InMemoryProvider {
    async fn get_balance(&self, address: Address) -> BridgeResult<u128> {
        Ok(self.state()?.balances.get(&address).copied().unwrap_or(0))
    }

    async fn get_fee_estimate(&self) -> BridgeResult<FeeEstimate> {
        Ok(self.state()?.fees)
    }

    async fn get_network_id(&self) -> BridgeResult<u64> {
        Ok(self.chain_id)
    }

    async fn get_transaction_count(&self, address: Address) -> BridgeResult<u64> {
        let mut state = self.state()?;
        let nonce = state.nonces.get(&address).copied().unwrap_or(0);
        state.events.push(ProviderEvent::NonceRead { address, nonce });
        Ok(nonce)
    }

    async fn broadcast(&self, signed: &SignedTx) -> BridgeResult<String> {
        let decoded = recover_sender(&signed.raw)?;

        let mut guard = self.state()?;
        let state = &mut *guard;

        if let Some(message) = state.broadcast_failure.take() {
            return Err(classify_broadcast_error(decoded.nonce, &message));
        }

        let tx_hash = format!("0x{}", hex::encode(transaction_hash(&signed.raw)));
        if state.txs.contains_key(&tx_hash) {
            return Err(classify_broadcast_error(decoded.nonce, "already known"));
        }

        let expected = state.nonces.get(&decoded.sender).copied().unwrap_or(0);
        if decoded.nonce < expected {
            return Err(classify_broadcast_error(
                decoded.nonce,
                &format!("nonce too low: next nonce {}, tx nonce {}", expected, decoded.nonce),
            ));
        }
        if decoded.nonce > expected {
            return Err(BridgeError::provider(format!(
                "nonce too high: next nonce {}, tx nonce {}",
                expected, decoded.nonce
            )));
        }
        state.nonces.insert(decoded.sender, expected + 1);

        state.txs.insert(
            tx_hash.clone(),
            PendingTx {
                polls_remaining: state.blocks_until_mined,
                mined_at: None,
                success: !state.reverted_nonces.contains(&decoded.nonce),
            },
        );
        state.events.push(ProviderEvent::Broadcast {
            tx_hash: tx_hash.clone(),
            nonce: decoded.nonce,
            to: signed.tx.to,
        });
        state.broadcasts.push(signed.clone());

        Ok(tx_hash)
    }

    async fn get_receipt(&self, tx_hash: &str) -> BridgeResult<Option<TxReceipt>> {
        let mut guard = self.state()?;
        let state = &mut *guard;

        if let Some(message) = &state.receipt_failure {
            return Err(BridgeError::provider(message.clone()));
        }

        state.head += 1;
        let head = state.head;

        let Some(tx) = state.txs.get_mut(tx_hash) else {
            return Ok(None);
        };
        if tx.polls_remaining > 0 {
            tx.polls_remaining -= 1;
            return Ok(None);
        }

        let mined_at = match tx.mined_at {
            Some(block) => block,
            None => {
                tx.mined_at = Some(head);
                state.events.push(ProviderEvent::Mined {
                    tx_hash: tx_hash.to_string(),
                    block_number: head,
                });
                head
            }
        };

        Ok(Some(TxReceipt {
            block_number: mined_at,
            success: tx.success,
            confirmations: head - mined_at + 1,
        }))
    }
}
