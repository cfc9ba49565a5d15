use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use evm_bridge::config::{BridgeConfig, SEPOLIA_CHAIN_ID, SEPOLIA_USDC};
use evm_bridge::crypto::{derive_address, Address};
use evm_bridge::deposit::{DepositCheckpoint, DepositOrchestrator, DepositPlan, OrchestratorConfig, SequencePhase};
use evm_bridge::principal::{encode_account_text, parse_bytes32_arg, Bytes32Arg};
use evm_bridge::provider::{ChainProvider, InMemoryProvider, JsonRpcProvider};
use evm_bridge::signer::{HttpSigningOracle, LocalKeyOracle, SigningOracle};
use evm_bridge::tx::{encode_unsigned, prepare, FeeEstimate, GasPolicy, UnsignedTx};
use evm_bridge::abi::KnownSelectors;
use evm_bridge::units::{format_ether, format_units, parse_ether, parse_units, USDC_DECIMALS};
use evm_bridge::utils::logging;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "evm-bridge", version, about = "Deposit ETH and ERC-20 tokens through an ECDSA signing oracle")]
struct Cli {
    /// JSON config file (BRIDGE_* environment variables override it)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log every orchestrator phase
    #[arg(long, global = true)]
    debug: bool,
    /// Only log errors
    #[arg(long, global = true, conflicts_with = "debug")]
    quiet: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive the Ethereum address of a secp256k1 public key
    Address {
        /// Hex public key: 33-byte compressed, 65-byte uncompressed or 64-byte raw
        public_key: String,
    },
    /// Encode an account id as the bytes32 deposit argument
    Principal { text: String },
    /// Print the canonical unsigned encoding and signing digest of a transfer
    Digest {
        #[arg(long)]
        to: String,
        /// Amount in ETH, e.g. 0.01
        #[arg(long)]
        value: String,
        #[arg(long, default_value_t = 0)]
        nonce: u64,
        #[arg(long, default_value_t = SEPOLIA_CHAIN_ID)]
        chain_id: u64,
        /// Max fee per gas in wei
        #[arg(long)]
        max_fee: u128,
        /// Max priority fee per gas in wei
        #[arg(long, default_value_t = FeeEstimate::DEFAULT_PRIORITY_FEE)]
        priority_fee: u128,
        #[arg(long, default_value_t = GasPolicy::DEFAULT_TRANSFER_GAS_LIMIT)]
        gas_limit: u64,
        /// Call data as hex
        #[arg(long, value_name = "HEX")]
        data: Option<String>,
    },
    /// Deposit ETH into the helper contract
    DepositEth {
        /// Amount in ETH, e.g. 0.01
        #[arg(long)]
        amount: String,
        #[command(flatten)]
        target: DepositTarget,
    },
    /// Approve the helper contract and deposit an ERC-20 token
    DepositToken {
        #[arg(long, default_value = SEPOLIA_USDC)]
        token: String,
        /// Amount in whole tokens, e.g. 2.5
        #[arg(long)]
        amount: String,
        #[arg(long, default_value_t = USDC_DECIMALS)]
        decimals: u8,
        #[command(flatten)]
        target: DepositTarget,
    },
    /// Continue a deposit from a saved checkpoint
    Resume {
        #[arg(long, value_name = "PATH")]
        checkpoint: PathBuf,
    },
}

#[derive(clap::Args)]
struct DepositTarget {
    /// Account id credited with the deposit
    #[arg(long)]
    principal: String,
    /// Sub-account: account id text or 0x-prefixed 32-byte hex
    #[arg(long)]
    subaccount: Option<String>,
    /// Write the checkpoint here if the deposit stops early
    #[arg(long, value_name = "PATH")]
    checkpoint: Option<PathBuf>,
    /// Run against an in-memory chain with a throwaway key
    #[arg(long)]
    dry_run: bool,
}

impl DepositTarget {
    fn arguments(&self) -> anyhow::Result<(Bytes32Arg, Bytes32Arg)> {
        let principal = encode_account_text(&self.principal).context("invalid --principal")?;
        let subaccount = match &self.subaccount {
            Some(text) => parse_bytes32_arg(text).context("invalid --subaccount")?,
            None => Bytes32Arg::ZERO,
        };
        Ok((principal, subaccount))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }
    logging::set_quiet(cli.quiet);

    match cli.cmd {
        Command::Address { public_key } => {
            let bytes = hex::decode(public_key.trim().trim_start_matches("0x")).context("public key is not hex")?;
            println!("{}", derive_address(&bytes)?);
        }
        Command::Principal { text } => {
            println!("{}", encode_account_text(&text)?.to_hex());
        }
        Command::Digest {
            to,
            value,
            nonce,
            chain_id,
            max_fee,
            priority_fee,
            gas_limit,
            data,
        } => {
            let to: Address = to.parse()?;
            let data = match data {
                Some(hex_data) => hex::decode(hex_data.trim_start_matches("0x")).context("--data is not hex")?,
                None => Vec::new(),
            };
            let fees = FeeEstimate {
                base_fee_per_gas: 0,
                max_priority_fee_per_gas: priority_fee,
                max_fee_per_gas: max_fee,
            };
            let call = data
                .get(..4)
                .and_then(|selector| <[u8; 4]>::try_from(selector).ok())
                .and_then(|selector| KnownSelectors::identify(&selector));
            let tx = UnsignedTx::eip1559(chain_id, nonce, to, parse_ether(&value)?, data, gas_limit, &fees);
            let prepared = prepare(tx)?;
            println!("unsigned: 0x{}", hex::encode(encode_unsigned(prepared.tx())?));
            println!("digest:   {}", prepared.digest());
            if let Some(signature) = call {
                println!("call:     {}", signature);
            }
        }
        Command::DepositEth { amount, target } => {
            let (principal, subaccount) = target.arguments()?;
            let wei = parse_ether(&amount)?;
            if !cli.quiet {
                eprintln!("Depositing {} ETH for {}", format_ether(wei), target.principal);
            }
            let plan = DepositPlan::eth(wei, principal, subaccount);
            deposit(cli.config.as_deref(), Start::Plan(plan), &target).await?;
        }
        Command::DepositToken {
            token,
            amount,
            decimals,
            target,
        } => {
            let (principal, subaccount) = target.arguments()?;
            let token: Address = token.parse().context("invalid --token")?;
            let raw = parse_units(&amount, decimals)?;
            if !cli.quiet {
                eprintln!("Depositing {} of token {} for {}", format_units(raw, decimals), token, target.principal);
            }
            let plan = DepositPlan::token(token, raw, principal, subaccount);
            deposit(cli.config.as_deref(), Start::Plan(plan), &target).await?;
        }
        Command::Resume { checkpoint } => {
            let json = std::fs::read_to_string(&checkpoint)
                .with_context(|| format!("cannot read {}", checkpoint.display()))?;
            let saved: DepositCheckpoint = serde_json::from_str(&json).context("invalid checkpoint")?;
            let target = DepositTarget {
                principal: String::new(),
                subaccount: None,
                checkpoint: Some(checkpoint),
                dry_run: false,
            };
            deposit(cli.config.as_deref(), Start::Resume(saved), &target).await?;
        }
    }

    Ok(())
}

enum Start {
    Plan(DepositPlan),
    Resume(DepositCheckpoint),
}

async fn deposit(config_path: Option<&Path>, start: Start, target: &DepositTarget) -> anyhow::Result<()> {
    let config = BridgeConfig::resolve(config_path)?;
    let orchestrator_config = config.orchestrator_config();

    if target.dry_run {
        let oracle = LocalKeyOracle::random();
        let chain_id = config.expected_chain_id.unwrap_or(SEPOLIA_CHAIN_ID);
        let provider = InMemoryProvider::new(chain_id)
            .with_balance(oracle.signer_public_key().address(), 1_000 * 10u128.pow(18));
        let mut orchestrator_config = orchestrator_config;
        orchestrator_config.poll_interval = std::time::Duration::from_millis(10);
        return execute(provider, oracle, orchestrator_config, start, target.checkpoint.as_deref()).await;
    }

    let provider = JsonRpcProvider::new(&config.rpc_url)?.with_priority_fee(config.priority_fee_per_gas);
    let oracle = HttpSigningOracle::new(&config.oracle_url)?;
    execute(provider, oracle, orchestrator_config, start, target.checkpoint.as_deref()).await
}

async fn execute<P, O>(
    provider: P,
    oracle: O,
    config: OrchestratorConfig,
    start: Start,
    checkpoint_path: Option<&Path>,
) -> anyhow::Result<()>
where
    P: ChainProvider,
    O: SigningOracle,
{
    let (progress, mut events) = mpsc::unbounded_channel();
    let orchestrator = DepositOrchestrator::new(provider, oracle, config).with_progress(progress);

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling; submitted transactions stay submitted");
            cancel.cancel();
        }
    });

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match (event.phase, event.tx_hash) {
                (SequencePhase::AwaitConfirmation, Some(hash)) => {
                    eprintln!("step {} {}: submitted {}", event.step_index, event.step, hash)
                }
                (SequencePhase::StepConfirmed, _) => eprintln!("step {} {}: confirmed", event.step_index, event.step),
                _ => {}
            }
        }
    });

    let result = match start {
        Start::Plan(plan) => orchestrator.run(plan).await,
        Start::Resume(checkpoint) => orchestrator.resume(checkpoint).await,
    };

    match result {
        Ok(outcome) => {
            for hash in &outcome.tx_hashes {
                println!("{}", hash);
            }
            Ok(())
        }
        Err(failure) => {
            if let Some(path) = checkpoint_path {
                let json = serde_json::to_string_pretty(&failure.checkpoint)?;
                std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
                eprintln!("Checkpoint written to {}", path.display());
            }
            if let Some(hash) = &failure.submitted_tx_hash {
                eprintln!("Transaction {} is on-chain; resume instead of starting over", hash);
            }
            if failure.error.is_retryable_by_caller() {
                bail!("{} (transient; resume from the checkpoint to continue)", failure);
            }
            if failure.is_resumable() {
                bail!("{} (resumable)", failure);
            }
            bail!("{}", failure)
        }
    }
}
