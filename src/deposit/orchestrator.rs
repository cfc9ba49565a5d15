//! Deposit orchestration
//!
//! Per step:
//!
//! ```text
//! Idle -> BuildStep -> Digest -> RequestSignature -> ResolveRecovery -> Assemble
//!           -> Submit -> AwaitConfirmation -> StepConfirmed
//! ```
//!
//! A step starts only after the previous one is `Confirmed`, and every
//! step reads its own nonce and fee data. Any error halts the sequence
//! with a [`DepositFailure`] carrying a checkpoint for [`resume`].
//!
//! [`resume`]: DepositOrchestrator::resume

use super::cancel::CancelToken;
use super::checkpoint::{DepositCheckpoint, DepositFailure, DepositOutcome, StepRecord};
use super::plan::DepositPlan;
use super::types::{DepositStep, ProgressEvent, SequencePhase, TxLifecycleState};
use crate::crypto::{resolve_recovery_id, Address, SignerPublicKey};
use crate::error::{BridgeError, BridgeResult};
use crate::provider::{ChainProvider, TxReceipt};
use crate::signer::SigningOracle;
use crate::tx::{assemble_signed_tx, prepare, GasPolicy, NetworkSnapshot, TransactionBuilder};
use crate::{log_debug, log_error, log_info, log_warn};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub helper_contract: Address,
    pub gas_policy: GasPolicy,
    pub expected_chain_id: Option<u64>,
    pub check_balance: bool,
    pub poll_interval: Duration,
    pub required_confirmations: u64,
}

impl OrchestratorConfig {
    pub fn new(helper_contract: Address) -> Self {
        Self {
            helper_contract,
            gas_policy: GasPolicy::default(),
            expected_chain_id: None,
            check_balance: true,
            poll_interval: Duration::from_millis(4_000),
            required_confirmations: 1,
        }
    }
}

pub struct DepositOrchestrator<P, O> {
    provider: P,
    oracle: O,
    config: OrchestratorConfig,
    builder: TransactionBuilder,
    cancel: CancelToken,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

/// Why a step stopped
struct StepError {
    index: usize,
    error: BridgeError,
}

impl<P: ChainProvider, O: SigningOracle> DepositOrchestrator<P, O> {
    pub fn new(provider: P, oracle: O, config: OrchestratorConfig) -> Self {
        let builder = TransactionBuilder::new(config.gas_policy)
            .with_expected_chain_id(config.expected_chain_id)
            .with_balance_check(config.check_balance);

        Self {
            provider,
            oracle,
            config,
            builder,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Run a fresh deposit sequence
    pub async fn run(&self, plan: DepositPlan) -> Result<DepositOutcome, DepositFailure> {
        let first_step = plan.steps()[0];
        let public_key = match self.oracle.public_key().await {
            Ok(key) => key,
            Err(error) => {
                // Nothing built yet; resume binds the signer once the key is known
                let checkpoint = DepositCheckpoint::unbound(plan);
                return Err(self.fail(checkpoint, StepError { index: 0, error }, first_step));
            }
        };

        let signer = public_key.address();
        let checkpoint = DepositCheckpoint::new(plan, signer);
        log_info!("deposit", "Starting deposit sequence", signer = signer, steps = checkpoint.steps.len());
        self.drive(checkpoint, public_key).await
    }

    /// Continue a sequence from a checkpoint. Confirmed steps are skipped,
    /// submitted steps are polled again, steps that never reached the
    /// chain are rebuilt with fresh network data.
    pub async fn resume(&self, mut checkpoint: DepositCheckpoint) -> Result<DepositOutcome, DepositFailure> {
        let index = checkpoint.next_step_index().unwrap_or(0);
        let step = checkpoint.steps.get(index).map(|r| r.step).unwrap_or(DepositStep::DepositEth);

        let public_key = match self.oracle.public_key().await {
            Ok(key) => key,
            Err(error) => return Err(self.fail(checkpoint, StepError { index, error }, step)),
        };

        let signer = public_key.address();
        if let Err(error) = checkpoint.bind_signer(signer) {
            return Err(self.fail(checkpoint, StepError { index, error }, step));
        }

        log_info!("deposit", "Resuming deposit sequence", signer = signer, from_step = index);
        self.drive(checkpoint, public_key).await
    }

    async fn drive(
        &self,
        mut checkpoint: DepositCheckpoint,
        public_key: SignerPublicKey,
    ) -> Result<DepositOutcome, DepositFailure> {
        let start = checkpoint.next_step_index().unwrap_or(0);
        if let Some(record) = checkpoint.steps.get(start) {
            self.emit(start, record.step, SequencePhase::Idle, record.tx_hash.clone());
        }

        for index in 0..checkpoint.steps.len() {
            let step = checkpoint.steps[index].step;
            if let Err(error) = self.run_step(&mut checkpoint, index, &public_key).await {
                return Err(self.fail(checkpoint, StepError { index, error }, step));
            }
        }

        let last = checkpoint.steps.len().saturating_sub(1);
        if let Some(record) = checkpoint.steps.last() {
            self.emit(last, record.step, SequencePhase::Done, record.tx_hash.clone());
        }
        log_info!("deposit", "Deposit sequence complete", steps = checkpoint.steps.len());

        Ok(DepositOutcome {
            tx_hashes: checkpoint.tx_hashes(),
            checkpoint,
        })
    }

    async fn run_step(
        &self,
        checkpoint: &mut DepositCheckpoint,
        index: usize,
        public_key: &SignerPublicKey,
    ) -> BridgeResult<()> {
        let record = &checkpoint.steps[index];
        if record.is_confirmed() {
            return Ok(());
        }

        if record.state == Some(TxLifecycleState::Failed) && !record.is_retryable() {
            let tx_hash = record.tx_hash.clone().unwrap_or_default();
            return Err(BridgeError::TransactionReverted { tx_hash });
        }

        if !record.is_submitted() {
            if self.cancel.is_cancelled() {
                return Err(BridgeError::Cancelled);
            }
            let step = record.step;
            let record = &mut checkpoint.steps[index];
            *record = StepRecord::new(step);
            self.submit_step(&checkpoint.plan, record, index, public_key.address(), public_key)
                .await?;
        }

        self.confirm_step(&mut checkpoint.steps[index], index).await
    }

    /// Build, sign, verify and broadcast one step's transaction
    async fn submit_step(
        &self,
        plan: &DepositPlan,
        record: &mut StepRecord,
        index: usize,
        signer: Address,
        public_key: &SignerPublicKey,
    ) -> BridgeResult<()> {
        let step = record.step;
        let result = self.submit_step_inner(plan, record, index, signer, public_key).await;
        if let Err(error) = &result {
            // Only definite rejections get here, so nothing is on-chain.
            if record.advance(TxLifecycleState::Failed).is_ok() {
                record.error = Some(error.to_string());
            }
            log_error!("deposit", "Step failed before submission", step = step, error = error);
        }
        result
    }

    async fn submit_step_inner(
        &self,
        plan: &DepositPlan,
        record: &mut StepRecord,
        index: usize,
        signer: Address,
        public_key: &SignerPublicKey,
    ) -> BridgeResult<()> {
        let step = record.step;

        self.emit(index, step, SequencePhase::BuildStep, None);
        let network = self.snapshot(signer).await?;
        let request = plan.request_for(step, self.config.helper_contract)?;
        let unsigned = self.builder.build(&request, &network)?;
        record.nonce = Some(unsigned.nonce);
        record.advance(TxLifecycleState::Built)?;

        self.emit(index, step, SequencePhase::Digest, None);
        let prepared = prepare(unsigned)?;
        record.digest = Some(prepared.digest().to_hex());
        record.advance(TxLifecycleState::Digested)?;

        self.emit(index, step, SequencePhase::RequestSignature, None);
        let raw = self.oracle.sign(*prepared.digest()).await?;

        self.emit(index, step, SequencePhase::ResolveRecovery, None);
        let full = resolve_recovery_id(prepared.digest(), &raw, public_key)?;

        self.emit(index, step, SequencePhase::Assemble, None);
        let signed = assemble_signed_tx(prepared.tx(), &full, &signer)?;
        record.advance(TxLifecycleState::Signed)?;

        if self.cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }

        // Recorded before the call: from here on the transaction may exist
        let local = signed.tx_hash_hex();
        record.tx_hash = Some(local.clone());

        self.emit(index, step, SequencePhase::Submit, Some(local.clone()));
        match self.provider.broadcast(&signed).await {
            Ok(reported) if !reported.eq_ignore_ascii_case(&local) => log_warn!(
                "deposit",
                "Node reported a different transaction hash, tracking the local one",
                reported_hash = reported,
                local_hash = local
            ),
            Ok(_) => {}
            Err(BridgeError::BroadcastUnconfirmed(reason)) => log_warn!(
                "deposit",
                "Broadcast outcome unknown, polling for the local hash",
                tx_hash = local,
                reason = reason
            ),
            Err(error) => {
                record.tx_hash = None;
                return Err(error);
            }
        }
        record.advance(TxLifecycleState::Submitted)?;
        log_info!("deposit", "Submitted", step = step, nonce = signed.tx.nonce, tx_hash = local);

        Ok(())
    }

    /// Fetch balance, fees and network id concurrently, then the nonce
    async fn snapshot(&self, signer: Address) -> BridgeResult<NetworkSnapshot> {
        let (balance, fees, chain_id) = tokio::try_join!(
            self.provider.get_balance(signer),
            self.provider.get_fee_estimate(),
            self.provider.get_network_id(),
        )?;
        let nonce = self.provider.get_transaction_count(signer).await?;

        log_debug!("deposit", "Network snapshot", balance = balance, nonce = nonce, chain_id = chain_id);
        Ok(NetworkSnapshot {
            balance,
            fees,
            nonce,
            chain_id,
        })
    }

    async fn confirm_step(&self, record: &mut StepRecord, index: usize) -> BridgeResult<()> {
        let tx_hash = record
            .tx_hash
            .clone()
            .ok_or_else(|| BridgeError::InvalidTransaction(format!("step {} has no transaction hash", record.step)))?;

        self.emit(index, record.step, SequencePhase::AwaitConfirmation, Some(tx_hash.clone()));
        match self.await_confirmation(&tx_hash).await {
            Ok(receipt) => {
                record.confirmations = receipt.confirmations;
                record.advance(TxLifecycleState::Confirmed)?;
                self.emit(index, record.step, SequencePhase::StepConfirmed, Some(tx_hash.clone()));
                log_info!(
                    "deposit",
                    "Confirmed",
                    step = record.step,
                    tx_hash = tx_hash,
                    block = receipt.block_number
                );
                Ok(())
            }
            Err(error @ BridgeError::TransactionReverted { .. }) => {
                record.advance(TxLifecycleState::Failed)?;
                record.error = Some(error.to_string());
                Err(error)
            }
            // Still on-chain: stays Submitted so a resume polls it again
            Err(error) => {
                record.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// Poll until the receipt has enough confirmations. No timeout; the
    /// cancel token is the only way out besides a provider error.
    async fn await_confirmation(&self, tx_hash: &str) -> BridgeResult<TxReceipt> {
        loop {
            let receipt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(BridgeError::Cancelled),
                receipt = self.provider.get_receipt(tx_hash) => receipt?,
            };

            if let Some(receipt) = receipt {
                if !receipt.success {
                    return Err(BridgeError::TransactionReverted {
                        tx_hash: tx_hash.to_string(),
                    });
                }
                if receipt.confirmations >= self.config.required_confirmations {
                    return Ok(receipt);
                }
                log_debug!(
                    "deposit",
                    "Waiting for confirmations",
                    tx_hash = tx_hash,
                    confirmations = receipt.confirmations
                );
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(BridgeError::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    fn fail(&self, checkpoint: DepositCheckpoint, stopped: StepError, step: DepositStep) -> DepositFailure {
        let submitted_tx_hash = checkpoint
            .steps
            .get(stopped.index)
            .and_then(|r| r.tx_hash.clone());

        self.emit(stopped.index, step, SequencePhase::Failed, submitted_tx_hash.clone());
        match &stopped.error {
            BridgeError::Cancelled => {
                log_warn!("deposit", "Deposit sequence cancelled", step = step, submitted = submitted_tx_hash.is_some())
            }
            error => log_error!("deposit", "Deposit sequence failed", step = step, error = error),
        }

        DepositFailure {
            step_index: stopped.index,
            step,
            submitted_tx_hash,
            error: stopped.error,
            checkpoint,
        }
    }

    fn emit(&self, step_index: usize, step: DepositStep, phase: SequencePhase, tx_hash: Option<String>) {
        log_debug!("deposit", "Phase", step = step, phase = format!("{:?}", phase));
        if let Some(progress) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = progress.send(ProgressEvent {
                step_index,
                step,
                phase,
                tx_hash,
            });
        }
    }
}
