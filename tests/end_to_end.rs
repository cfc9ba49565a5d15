use evm_bridge::crypto::{resolve_recovery_id, Address, SignerPublicKey};
use evm_bridge::deposit::{DepositOrchestrator, DepositPlan, DepositStep, OrchestratorConfig, SequencePhase};
use evm_bridge::error::BridgeError;
use evm_bridge::principal::{encode_account_text, Bytes32Arg};
use evm_bridge::provider::InMemoryProvider;
use evm_bridge::signer::{LocalKeyOracle, SigningOracle};
use evm_bridge::tx::{
    assemble_signed_tx, prepare, recover_sender, FeeEstimate, NetworkSnapshot, PreparedTx, TransactionBuilder, TxRequest,
};
use evm_bridge::units::parse_ether;
use std::time::Duration;
use tokio::sync::mpsc;

const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const DESTINATION: &str = "0x4BD55c4D51ba16420eD10c88fB87958d2107e5fA";
const HELPER: &str = "0x2D39863d30716aaf2B7fFFd85Dd03Dda2BFC2E38";
const USDC: &str = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238";
const OWNER: &str = "udsqg-qo6cj-4agux-yt2kq-ke242-ylhwx-xio5v-nhsh3-dpjyj-sfqbi-kqe";
const SEPOLIA: u64 = 11_155_111;

fn snapshot(nonce: u64) -> NetworkSnapshot {
    NetworkSnapshot {
        balance: 10u128.pow(18),
        fees: FeeEstimate::from_base_fee(30_000_000_000, FeeEstimate::DEFAULT_PRIORITY_FEE),
        nonce,
        chain_id: SEPOLIA,
    }
}

fn transfer(nonce: u64) -> PreparedTx {
    let request = TxRequest::transfer(DESTINATION.parse().unwrap(), parse_ether("0.01").unwrap());
    let unsigned = TransactionBuilder::default().build(&request, &snapshot(nonce)).unwrap();
    prepare(unsigned).unwrap()
}

#[tokio::test]
async fn known_key_transfer_recovers_to_its_address() {
    let oracle = LocalKeyOracle::from_hex(TEST_KEY).unwrap();
    let public_key: SignerPublicKey = oracle.public_key().await.unwrap();
    let signer = public_key.address();

    let prepared = transfer(0);
    assert_eq!(prepared.tx().value, 10_000_000_000_000_000);
    assert_eq!(prepared.tx().gas_limit, 53_600);

    let raw = oracle.sign(*prepared.digest()).await.unwrap();
    let full = resolve_recovery_id(prepared.digest(), &raw, &public_key).unwrap();
    let signed = assemble_signed_tx(prepared.tx(), &full, &signer).unwrap();

    let decoded = recover_sender(&signed.raw).unwrap();
    assert_eq!(decoded.sender, signer);
    assert_eq!(decoded.nonce, 0);
    assert_eq!(decoded.chain_id, Some(SEPOLIA));
    assert_eq!(decoded.signing_hash, prepared.digest().0);
}

#[tokio::test]
async fn signature_over_another_digest_is_rejected() {
    let oracle = LocalKeyOracle::from_hex(TEST_KEY).unwrap();
    let public_key = oracle.public_key().await.unwrap();
    let signer = public_key.address();

    let ours = transfer(0);
    let theirs = transfer(1);
    let raw = oracle.sign(*theirs.digest()).await.unwrap();

    // Resolving against our digest finds no matching recovery id
    let err = resolve_recovery_id(ours.digest(), &raw, &public_key).unwrap_err();
    assert!(matches!(err, BridgeError::RecoveryMismatch { .. }));

    // A recovery id resolved for the other transaction still cannot be
    // attached to this one
    let full = resolve_recovery_id(theirs.digest(), &raw, &public_key).unwrap();
    let err = assemble_signed_tx(ours.tx(), &full, &signer).unwrap_err();
    assert!(matches!(err, BridgeError::SignerMismatch { .. }));
}

#[tokio::test]
async fn token_deposit_builds_only_after_approve_confirms() {
    let oracle = LocalKeyOracle::from_hex(TEST_KEY).unwrap();
    let signer = oracle.signer_public_key().address();
    let provider = InMemoryProvider::new(SEPOLIA)
        .with_balance(signer, 10u128.pow(18))
        .with_blocks_until_mined(3);

    let mut config = OrchestratorConfig::new(HELPER.parse().unwrap());
    config.poll_interval = Duration::from_millis(1);

    let (progress, mut events) = mpsc::unbounded_channel();
    let orchestrator = DepositOrchestrator::new(provider, oracle, config).with_progress(progress);

    let usdc: Address = USDC.parse().unwrap();
    let plan = DepositPlan::token(usdc, 2_500_000, encode_account_text(OWNER).unwrap(), Bytes32Arg::ZERO);
    let outcome = orchestrator.run(plan).await.unwrap();
    assert_eq!(outcome.tx_hashes.len(), 2);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.step, event.phase));
    }
    let approve_confirmed = seen
        .iter()
        .position(|e| *e == (DepositStep::ApproveToken, SequencePhase::StepConfirmed))
        .unwrap();
    let deposit_built = seen
        .iter()
        .position(|e| *e == (DepositStep::DepositToken, SequencePhase::BuildStep))
        .unwrap();
    assert!(approve_confirmed < deposit_built);

    let broadcasts = orchestrator.provider().broadcasts();
    assert_eq!(broadcasts[0].tx.nonce + 1, broadcasts[1].tx.nonce);
    for signed in &broadcasts {
        assert_eq!(recover_sender(&signed.raw).unwrap().sender, signer);
    }
}
