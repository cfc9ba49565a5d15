//! Deposit steps, lifecycle states and progress events

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One transaction in a deposit sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStep {
    DepositEth,
    ApproveToken,
    DepositToken,
}

impl fmt::Display for DepositStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DepositStep::DepositEth => "deposit_eth",
            DepositStep::ApproveToken => "approve_token",
            DepositStep::DepositToken => "deposit_token",
        })
    }
}

/// Lifecycle of a single transaction attempt.
///
/// ```text
/// Built -> Digested -> Signed -> Submitted -> Confirmed
///   \________\___________\__________\-------> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxLifecycleState {
    Built,
    Digested,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

impl TxLifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// The single state that follows this one on the success path
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Built => Some(Self::Digested),
            Self::Digested => Some(Self::Signed),
            Self::Signed => Some(Self::Submitted),
            Self::Submitted => Some(Self::Confirmed),
            Self::Confirmed | Self::Failed => None,
        }
    }

    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Failed || self.successor() == Some(next)
    }

    pub fn advance(self, next: Self) -> BridgeResult<Self> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(BridgeError::InvalidTransaction(format!(
                "illegal lifecycle transition {:?} -> {:?}",
                self, next
            )))
        }
    }
}

/// Where the orchestrator is within the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencePhase {
    /// Sequence started or resumed; reported for the first unconfirmed step
    Idle,
    BuildStep,
    Digest,
    RequestSignature,
    ResolveRecovery,
    Assemble,
    Submit,
    AwaitConfirmation,
    StepConfirmed,
    Done,
    Failed,
}

/// Published on the optional progress channel at every phase change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step_index: usize,
    pub step: DepositStep,
    pub phase: SequencePhase,
    pub tx_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use TxLifecycleState::*;

    #[test]
    fn test_forward_path() {
        let mut state = Built;
        for next in [Digested, Signed, Submitted, Confirmed] {
            state = state.advance(next).unwrap();
        }
        assert_eq!(state, Confirmed);
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(Built.advance(Signed).is_err());
        assert!(Digested.advance(Submitted).is_err());
        assert!(Submitted.advance(Signed).is_err());
        assert!(Signed.advance(Signed).is_err());
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        for state in [Built, Digested, Signed, Submitted] {
            assert_eq!(state.advance(Failed).unwrap(), Failed);
        }
        assert!(Confirmed.advance(Failed).is_err());
        assert!(Failed.advance(Failed).is_err());
        assert!(Failed.advance(Built).is_err());
    }

    #[test]
    fn test_step_display() {
        assert_eq!(DepositStep::ApproveToken.to_string(), "approve_token");
        assert_eq!(serde_json::to_string(&DepositStep::DepositEth).unwrap(), "\"deposit_eth\"");
    }
}
