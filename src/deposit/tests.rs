//! Deposit sequencing tests

#[cfg(test)]
mod tests {
    use crate::abi::KnownSelectors;
    use crate::crypto::{Address, Digest, RawSignature, SignerPublicKey};
    use crate::deposit::*;
    use crate::error::{BridgeError, BridgeResult};
    use crate::principal::{encode_account_text, Bytes32Arg};
    use crate::provider::memory::ProviderEvent;
    use crate::provider::{classify_broadcast_error, ChainProvider, InMemoryProvider, TxReceipt};
    use crate::signer::local::LocalKeyOracle;
    use crate::signer::SigningOracle;
    use crate::tx::{FeeEstimate, SignedTx};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const SEPOLIA: u64 = 11_155_111;
    const SIGNER: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
    const HELPER: &str = "0x2D39863d30716aaf2B7fFFd85Dd03Dda2BFC2E38";
    const USDC: &str = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238";
    const OWNER: &str = "udsqg-qo6cj-4agux-yt2kq-ke242-ylhwx-xio5v-nhsh3-dpjyj-sfqbi-kqe";

    fn key_one() -> LocalKeyOracle {
        LocalKeyOracle::from_hex(&format!("{:064x}", 1)).unwrap()
    }

    fn key_two() -> LocalKeyOracle {
        LocalKeyOracle::from_hex(&format!("{:064x}", 2)).unwrap()
    }

    fn signer() -> Address {
        SIGNER.parse().unwrap()
    }

    fn helper() -> Address {
        HELPER.parse().unwrap()
    }

    fn usdc() -> Address {
        USDC.parse().unwrap()
    }

    fn funded() -> InMemoryProvider {
        InMemoryProvider::new(SEPOLIA).with_balance(signer(), 10u128.pow(18))
    }

    fn config() -> OrchestratorConfig {
        let mut config = OrchestratorConfig::new(helper());
        config.poll_interval = Duration::from_millis(1);
        config.expected_chain_id = Some(SEPOLIA);
        config
    }

    fn eth_plan() -> DepositPlan {
        DepositPlan::eth(10u128.pow(16), encode_account_text(OWNER).unwrap(), Bytes32Arg::ZERO)
    }

    fn token_plan() -> DepositPlan {
        DepositPlan::token(usdc(), 1_000_000, encode_account_text(OWNER).unwrap(), Bytes32Arg::ZERO)
    }

    /// Reports one key but signs with another
    struct SwappedKeyOracle {
        claimed: LocalKeyOracle,
        actual: LocalKeyOracle,
    }

    impl SigningOracle for SwappedKeyOracle {
        async fn public_key(&self) -> BridgeResult<SignerPublicKey> {
            self.claimed.public_key().await
        }

        async fn sign(&self, digest: Digest) -> BridgeResult<RawSignature> {
            self.actual.sign(digest).await
        }
    }

    struct UnavailableOracle {
        inner: LocalKeyOracle,
    }

    impl SigningOracle for UnavailableOracle {
        async fn public_key(&self) -> BridgeResult<SignerPublicKey> {
            self.inner.public_key().await
        }

        async fn sign(&self, _digest: Digest) -> BridgeResult<RawSignature> {
            Err(BridgeError::oracle("signing quota exhausted"))
        }
    }

    /// Fails the first `public_key` call, then serves the key
    struct FlakyKeyOracle {
        inner: LocalKeyOracle,
        failed_once: AtomicBool,
    }

    impl SigningOracle for FlakyKeyOracle {
        async fn public_key(&self) -> BridgeResult<SignerPublicKey> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(BridgeError::oracle("temporarily unavailable"));
            }
            self.inner.public_key().await
        }

        async fn sign(&self, digest: Digest) -> BridgeResult<RawSignature> {
            self.inner.sign(digest).await
        }
    }

    /// Hands the next broadcast to the chain, then answers with `reply`
    /// instead of the hash, as a node or a dropped connection might
    struct LostReplyProvider {
        inner: InMemoryProvider,
        reply: Mutex<Option<BridgeError>>,
    }

    impl LostReplyProvider {
        fn new(inner: InMemoryProvider, reply: BridgeError) -> Self {
            Self {
                inner,
                reply: Mutex::new(Some(reply)),
            }
        }
    }

    impl ChainProvider for LostReplyProvider {
        async fn get_balance(&self, address: Address) -> BridgeResult<u128> {
            self.inner.get_balance(address).await
        }

        async fn get_fee_estimate(&self) -> BridgeResult<FeeEstimate> {
            self.inner.get_fee_estimate().await
        }

        async fn get_network_id(&self) -> BridgeResult<u64> {
            self.inner.get_network_id().await
        }

        async fn get_transaction_count(&self, address: Address) -> BridgeResult<u64> {
            self.inner.get_transaction_count(address).await
        }

        async fn broadcast(&self, signed: &SignedTx) -> BridgeResult<String> {
            let hash = self.inner.broadcast(signed).await?;
            match self.reply.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(hash),
            }
        }

        async fn get_receipt(&self, tx_hash: &str) -> BridgeResult<Option<TxReceipt>> {
            self.inner.get_receipt(tx_hash).await
        }
    }

    #[tokio::test]
    async fn test_eth_deposit_end_to_end() {
        let orchestrator = DepositOrchestrator::new(funded(), key_one(), config());
        let outcome = orchestrator.run(eth_plan()).await.unwrap();

        assert_eq!(outcome.tx_hashes.len(), 1);
        assert!(outcome.checkpoint.is_complete());
        assert_eq!(outcome.checkpoint.signer, Some(signer()));

        let broadcasts = orchestrator.provider().broadcasts();
        assert_eq!(broadcasts.len(), 1);
        let tx = &broadcasts[0].tx;
        assert_eq!(tx.to, helper());
        assert_eq!(tx.value, 10u128.pow(16));
        assert_eq!(tx.nonce, 0);
        assert_eq!(tx.chain_id, SEPOLIA);
        assert_eq!(tx.gas_limit, 107_200);
        assert_eq!(&tx.data[..4], &KnownSelectors::DEPOSIT_ETH);
        assert_eq!(broadcasts[0].sender, signer());
        assert_eq!(outcome.tx_hashes[0], broadcasts[0].tx_hash_hex());
    }

    #[tokio::test]
    async fn test_token_deposit_reads_nonce_after_approve_is_mined() {
        let orchestrator = DepositOrchestrator::new(funded().with_nonce(signer(), 7), key_one(), config());
        let outcome = orchestrator.run(token_plan()).await.unwrap();
        assert_eq!(outcome.tx_hashes.len(), 2);

        let broadcasts = orchestrator.provider().broadcasts();
        assert_eq!(broadcasts[0].tx.to, usdc());
        assert_eq!(&broadcasts[0].tx.data[..4], &KnownSelectors::APPROVE);
        assert_eq!(broadcasts[0].tx.value, 0);
        assert_eq!(broadcasts[1].tx.to, helper());
        assert_eq!(&broadcasts[1].tx.data[..4], &KnownSelectors::DEPOSIT_ERC20);
        assert_eq!(broadcasts[0].tx.nonce, 7);
        assert_eq!(broadcasts[1].tx.nonce, 8);

        let events = orchestrator.provider().events();
        let approve_mined = events
            .iter()
            .position(|e| matches!(e, ProviderEvent::Mined { tx_hash, .. } if *tx_hash == outcome.tx_hashes[0]))
            .unwrap();
        let second_nonce_read = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, ProviderEvent::NonceRead { .. }))
            .map(|(i, _)| i)
            .nth(1)
            .unwrap();
        assert!(second_nonce_read > approve_mined);
    }

    #[tokio::test]
    async fn test_reverted_approve_halts_sequence() {
        let provider = funded();
        provider.revert_nonce(0);
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config());

        let failure = orchestrator.run(token_plan()).await.unwrap_err();
        assert_eq!(failure.step, DepositStep::ApproveToken);
        assert!(matches!(failure.error, BridgeError::TransactionReverted { .. }));
        assert!(failure.submitted_tx_hash.is_some());
        assert!(!failure.is_resumable());
        assert_eq!(failure.checkpoint.steps[0].state, Some(TxLifecycleState::Failed));
        assert_eq!(failure.checkpoint.steps[1].state, None);
        assert_eq!(orchestrator.provider().broadcasts().len(), 1);

        // Resuming does not pretend the approval happened
        let again = orchestrator.resume(failure.checkpoint).await.unwrap_err();
        assert!(matches!(again.error, BridgeError::TransactionReverted { .. }));
        assert_eq!(orchestrator.provider().broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_rejection_is_retried_on_resume() {
        let provider = funded();
        provider.fail_next_broadcast("exceeds block gas limit");
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        assert!(matches!(failure.error, BridgeError::Provider(_)));
        assert!(failure.submitted_tx_hash.is_none());
        assert!(failure.is_resumable());
        assert!(failure.checkpoint.steps[0].is_retryable());
        assert_eq!(failure.checkpoint.steps[0].tx_hash, None);

        let outcome = orchestrator.resume(failure.checkpoint).await.unwrap();
        assert!(outcome.checkpoint.is_complete());
        let broadcasts = orchestrator.provider().broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].tx.nonce, 0);
    }

    #[tokio::test]
    async fn test_receipt_failure_keeps_hash_and_resume_does_not_resubmit() {
        let provider = funded();
        provider.fail_receipts(Some("upstream timeout"));
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        let hash = failure.submitted_tx_hash.clone().unwrap();
        assert!(matches!(failure.error, BridgeError::Provider(_)));
        assert_eq!(failure.checkpoint.steps[0].state, Some(TxLifecycleState::Submitted));

        orchestrator.provider().fail_receipts(None);
        let outcome = orchestrator.resume(failure.checkpoint).await.unwrap();
        assert_eq!(outcome.tx_hashes, vec![hash]);
        assert_eq!(orchestrator.provider().broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_nonce_is_reported() {
        let provider = funded();
        provider.fail_next_broadcast("nonce too low");
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        assert!(matches!(failure.error, BridgeError::StaleNonce { nonce: 0, .. }));
        assert!(failure.submitted_tx_hash.is_none());
        assert!(failure.checkpoint.steps[0].is_retryable());
    }

    #[tokio::test]
    async fn test_already_known_reply_is_tracked_as_submitted() {
        let reply = classify_broadcast_error(0, "already known");
        let orchestrator = DepositOrchestrator::new(LostReplyProvider::new(funded(), reply), key_one(), config());

        let outcome = orchestrator.run(eth_plan()).await.unwrap();
        let broadcasts = orchestrator.provider().inner.broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(outcome.tx_hashes, vec![broadcasts[0].tx_hash_hex()]);
        assert!(outcome.checkpoint.is_complete());
    }

    #[tokio::test]
    async fn test_lost_broadcast_reply_is_polled_not_resubmitted() {
        let reply = BridgeError::BroadcastUnconfirmed("eth_sendRawTransaction request failed: timed out".into());
        let provider = LostReplyProvider::new(funded(), reply);
        provider.inner.fail_receipts(Some("upstream timeout"));
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        let landed = orchestrator.provider().inner.broadcasts();
        assert_eq!(landed.len(), 1);
        assert_eq!(failure.submitted_tx_hash, Some(landed[0].tx_hash_hex()));
        assert_eq!(failure.checkpoint.steps[0].state, Some(TxLifecycleState::Submitted));
        assert!(!failure.checkpoint.steps[0].is_retryable());
        assert!(failure.is_resumable());

        orchestrator.provider().inner.fail_receipts(None);
        let outcome = orchestrator.resume(failure.checkpoint).await.unwrap();
        assert_eq!(outcome.tx_hashes, vec![landed[0].tx_hash_hex()]);

        let broadcasts = orchestrator.provider().inner.broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].tx.nonce, 0);
    }

    #[tokio::test]
    async fn test_key_fetch_failure_resumes_with_same_plan() {
        let oracle = FlakyKeyOracle {
            inner: key_one(),
            failed_once: AtomicBool::new(false),
        };
        let orchestrator = DepositOrchestrator::new(funded(), oracle, config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        assert!(matches!(failure.error, BridgeError::Oracle(_)));
        assert!(failure.is_resumable());
        assert_eq!(failure.checkpoint.signer, None);
        assert!(orchestrator.provider().broadcasts().is_empty());

        let outcome = orchestrator.resume(failure.checkpoint).await.unwrap();
        assert_eq!(outcome.checkpoint.signer, Some(signer()));
        assert_eq!(outcome.tx_hashes.len(), 1);
        assert_eq!(orchestrator.provider().broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_signing_key_is_never_broadcast() {
        let oracle = SwappedKeyOracle {
            claimed: key_one(),
            actual: key_two(),
        };
        let orchestrator = DepositOrchestrator::new(funded(), oracle, config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        assert!(matches!(failure.error, BridgeError::RecoveryMismatch { .. }));
        assert!(failure.error.is_fatal());
        assert!(!failure.is_resumable());
        assert!(orchestrator.provider().broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_oracle_error_stops_before_broadcast() {
        let oracle = UnavailableOracle { inner: key_one() };
        let orchestrator = DepositOrchestrator::new(funded(), oracle, config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        assert!(matches!(failure.error, BridgeError::Oracle(_)));
        assert!(failure.is_resumable());
        assert_eq!(failure.checkpoint.steps[0].state, Some(TxLifecycleState::Failed));
        assert!(orchestrator.provider().broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_chain_mismatch_stops_before_signing() {
        let mut config = config();
        config.expected_chain_id = Some(1);
        let orchestrator = DepositOrchestrator::new(funded(), key_one(), config);

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        assert_eq!(
            failure.error,
            BridgeError::ChainIdMismatch {
                expected: 1,
                actual: SEPOLIA
            }
        );
        assert!(orchestrator.provider().broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let provider = InMemoryProvider::new(SEPOLIA).with_balance(signer(), 1_000);
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config());

        let failure = orchestrator.run(eth_plan()).await.unwrap_err();
        assert!(matches!(failure.error, BridgeError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_waits_for_required_confirmations() {
        let mut config = config();
        config.required_confirmations = 3;
        let provider = funded().with_blocks_until_mined(2);
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config);

        let outcome = orchestrator.run(eth_plan()).await.unwrap();
        assert!(outcome.checkpoint.steps[0].confirmations >= 3);
    }

    #[tokio::test]
    async fn test_cancel_while_polling_keeps_hash() {
        let (progress, mut events) = mpsc::unbounded_channel();
        let provider = funded().with_blocks_until_mined(u32::MAX);
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config()).with_progress(progress);
        let cancel = orchestrator.cancel_token();

        let watcher = async move {
            while let Some(event) = events.recv().await {
                if event.phase == SequencePhase::AwaitConfirmation {
                    cancel.cancel();
                    break;
                }
            }
        };

        let (result, _) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(orchestrator.run(eth_plan()), watcher)
        })
        .await
        .unwrap();

        let failure = result.unwrap_err();
        assert_eq!(failure.error, BridgeError::Cancelled);
        assert!(failure.submitted_tx_hash.is_some());
        assert_eq!(failure.checkpoint.steps[0].state, Some(TxLifecycleState::Submitted));
        assert_eq!(orchestrator.provider().broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start_submits_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let orchestrator = DepositOrchestrator::new(funded(), key_one(), config()).with_cancel_token(cancel);

        let failure = orchestrator.run(token_plan()).await.unwrap_err();
        assert_eq!(failure.error, BridgeError::Cancelled);
        assert_eq!(failure.step_index, 0);
        assert!(orchestrator.provider().broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_resume_rejects_other_signer() {
        let provider = funded();
        provider.fail_next_broadcast("exceeds block gas limit");
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config());
        let failure = orchestrator.run(eth_plan()).await.unwrap_err();

        let other = DepositOrchestrator::new(funded(), key_two(), config());
        let again = other.resume(failure.checkpoint).await.unwrap_err();
        assert!(matches!(again.error, BridgeError::SignerMismatch { .. }));
        assert!(other.provider().broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_progress_events_follow_phases() {
        let (progress, mut events) = mpsc::unbounded_channel();
        let orchestrator = DepositOrchestrator::new(funded(), key_one(), config()).with_progress(progress);
        orchestrator.run(eth_plan()).await.unwrap();

        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            phases.push(event.phase);
        }
        assert_eq!(
            phases,
            vec![
                SequencePhase::Idle,
                SequencePhase::BuildStep,
                SequencePhase::Digest,
                SequencePhase::RequestSignature,
                SequencePhase::ResolveRecovery,
                SequencePhase::Assemble,
                SequencePhase::Submit,
                SequencePhase::AwaitConfirmation,
                SequencePhase::StepConfirmed,
                SequencePhase::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_resume_reports_idle_at_first_unconfirmed_step() {
        let mut checkpoint = DepositCheckpoint::new(token_plan(), signer());
        checkpoint.steps[0].state = Some(TxLifecycleState::Confirmed);
        checkpoint.steps[0].tx_hash = Some(format!("0x{}", "11".repeat(32)));

        let (progress, mut events) = mpsc::unbounded_channel();
        let provider = funded().with_nonce(signer(), 1);
        let orchestrator = DepositOrchestrator::new(provider, key_one(), config()).with_progress(progress);
        let outcome = orchestrator.resume(checkpoint).await.unwrap();
        assert_eq!(outcome.tx_hashes.len(), 2);

        let first = events.try_recv().unwrap();
        assert_eq!(first.phase, SequencePhase::Idle);
        assert_eq!(first.step_index, 1);
        assert_eq!(first.step, DepositStep::DepositToken);

        let broadcasts = orchestrator.provider().broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(&broadcasts[0].tx.data[..4], &KnownSelectors::DEPOSIT_ERC20);
    }
}
