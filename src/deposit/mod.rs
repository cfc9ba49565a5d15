//! Deposit sequencing
//!
//! Drives one or two transactions from plan to confirmation against a
//! [`ChainProvider`](crate::provider::ChainProvider) and a
//! [`SigningOracle`](crate::signer::SigningOracle).

pub mod cancel;
pub mod checkpoint;
pub mod orchestrator;
pub mod plan;
pub mod types;

#[cfg(test)]
mod tests;

pub use cancel::CancelToken;
pub use checkpoint::{DepositCheckpoint, DepositFailure, DepositOutcome, StepRecord};
pub use orchestrator::{DepositOrchestrator, OrchestratorConfig};
pub use plan::DepositPlan;
pub use types::{DepositStep, ProgressEvent, SequencePhase, TxLifecycleState};
