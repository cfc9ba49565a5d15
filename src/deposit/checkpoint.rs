//! Resumable progress of a deposit sequence
//!
//! A checkpoint records, per step, how far its transaction got and the
//! hash of anything already submitted. Handing it back to
//! [`DepositOrchestrator::resume`](super::DepositOrchestrator::resume)
//! continues from there without submitting any step twice.

use super::plan::DepositPlan;
use super::types::{DepositStep, TxLifecycleState};
use crate::crypto::Address;
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: DepositStep,
    /// `None` until the step's transaction is built
    pub state: Option<TxLifecycleState>,
    pub nonce: Option<u64>,
    pub digest: Option<String>,
    /// Set just before broadcast, cleared only if the node rejected it
    pub tx_hash: Option<String>,
    pub confirmations: u64,
    pub error: Option<String>,
}

impl StepRecord {
    pub fn new(step: DepositStep) -> Self {
        Self {
            step,
            state: None,
            nonce: None,
            digest: None,
            tx_hash: None,
            confirmations: 0,
            error: None,
        }
    }

    pub fn advance(&mut self, next: TxLifecycleState) -> BridgeResult<()> {
        self.state = Some(match self.state {
            None if matches!(next, TxLifecycleState::Built | TxLifecycleState::Failed) => next,
            None => {
                return Err(BridgeError::InvalidTransaction(format!(
                    "step {} must be built before {:?}",
                    self.step, next
                )))
            }
            Some(current) => current.advance(next)?,
        });
        Ok(())
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == Some(TxLifecycleState::Confirmed)
    }

    /// On-chain already: must be polled, never rebuilt
    pub fn is_submitted(&self) -> bool {
        self.tx_hash.is_some()
    }

    /// Failed before anything reached the chain
    pub fn is_retryable(&self) -> bool {
        self.state == Some(TxLifecycleState::Failed) && self.tx_hash.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositCheckpoint {
    pub plan: DepositPlan,
    /// `None` when the oracle key could not be fetched before the first step
    pub signer: Option<Address>,
    pub steps: Vec<StepRecord>,
}

impl DepositCheckpoint {
    pub fn new(plan: DepositPlan, signer: Address) -> Self {
        Self {
            signer: Some(signer),
            ..Self::unbound(plan)
        }
    }

    /// A checkpoint whose signer is not known yet
    pub fn unbound(plan: DepositPlan) -> Self {
        let steps = plan.steps().into_iter().map(StepRecord::new).collect();
        Self {
            plan,
            signer: None,
            steps,
        }
    }

    /// Check `signer` against the recorded one, or record it if none is.
    /// An unbound checkpoint only accepts a signer while no step has started.
    pub fn bind_signer(&mut self, signer: Address) -> BridgeResult<()> {
        match self.signer {
            Some(expected) if expected != signer => Err(BridgeError::SignerMismatch {
                expected: expected.to_checksum(),
                recovered: signer.to_checksum(),
            }),
            Some(_) => Ok(()),
            None if self.steps.iter().any(|r| r.state.is_some() || r.tx_hash.is_some()) => {
                Err(BridgeError::InvalidTransaction(
                    "checkpoint has step progress but no signer".to_string(),
                ))
            }
            None => {
                self.signer = Some(signer);
                Ok(())
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(StepRecord::is_confirmed)
    }

    /// Index of the first step that is not yet confirmed
    pub fn next_step_index(&self) -> Option<usize> {
        self.steps.iter().position(|r| !r.is_confirmed())
    }

    /// Hashes of every submitted transaction, in step order
    pub fn tx_hashes(&self) -> Vec<String> {
        self.steps.iter().filter_map(|r| r.tx_hash.clone()).collect()
    }
}

/// A sequence that reached `Done`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositOutcome {
    pub tx_hashes: Vec<String>,
    pub checkpoint: DepositCheckpoint,
}

/// A sequence halted in `Failed`. `submitted_tx_hash` is set when the
/// failing step's transaction is already on-chain; that step must be
/// resumed, not retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("deposit step {step_index} ({step}) failed: {error}")]
pub struct DepositFailure {
    pub step_index: usize,
    pub step: DepositStep,
    pub submitted_tx_hash: Option<String>,
    pub error: BridgeError,
    pub checkpoint: DepositCheckpoint,
}

impl DepositFailure {
    /// Whether `resume` can make progress from here
    pub fn is_resumable(&self) -> bool {
        !self.error.is_fatal() && !matches!(self.error, BridgeError::TransactionReverted { .. })
    }
}
