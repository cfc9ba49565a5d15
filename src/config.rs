//! Bridge configuration
//!
//! Loaded from a JSON file, then overridden from `BRIDGE_*` environment
//! variables. Defaults target Sepolia.

use crate::crypto::Address;
use crate::deposit::OrchestratorConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::tx::{FeeEstimate, GasPolicy};
use crate::utils::network_config::validate_endpoint;
use crate::log_warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const SEPOLIA_HELPER_CONTRACT: &str = "0x2D39863d30716aaf2B7fFFd85Dd03Dda2BFC2E38";
pub const SEPOLIA_USDC: &str = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238";

pub const ENV_RPC_URL: &str = "BRIDGE_RPC_URL";
pub const ENV_ORACLE_URL: &str = "BRIDGE_ORACLE_URL";
pub const ENV_CHAIN_ID: &str = "BRIDGE_CHAIN_ID";
pub const ENV_HELPER_CONTRACT: &str = "BRIDGE_HELPER_CONTRACT";
pub const ENV_POLL_INTERVAL_MS: &str = "BRIDGE_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub rpc_url: String,
    pub oracle_url: String,
    /// Refuse to sign for any other chain
    pub expected_chain_id: Option<u64>,
    pub helper_contract: Address,
    pub transfer_gas_limit: u64,
    pub contract_call_gas_limit: u64,
    pub priority_fee_per_gas: u128,
    pub poll_interval_ms: u64,
    pub required_confirmations: u64,
    pub check_balance: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let gas = GasPolicy::default();
        Self {
            rpc_url: "https://rpc.sepolia.org".to_string(),
            oracle_url: "http://127.0.0.1:8080".to_string(),
            expected_chain_id: Some(SEPOLIA_CHAIN_ID),
            helper_contract: SEPOLIA_HELPER_CONTRACT.parse().unwrap_or(Address::ZERO),
            transfer_gas_limit: gas.transfer_gas_limit,
            contract_call_gas_limit: gas.contract_call_gas_limit,
            priority_fee_per_gas: FeeEstimate::DEFAULT_PRIORITY_FEE,
            poll_interval_ms: 4_000,
            required_confirmations: 1,
            check_balance: true,
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        serde_json::from_str(json).map_err(|e| BridgeError::config(format!("invalid config JSON: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Defaults or `path`, then environment overrides, then validation
    pub fn resolve(path: Option<&Path>) -> BridgeResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BRIDGE_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> BridgeResult<()> {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(url) = lookup(ENV_ORACLE_URL) {
            self.oracle_url = url;
        }
        if let Some(chain_id) = lookup(ENV_CHAIN_ID) {
            self.expected_chain_id = Some(parse_env(ENV_CHAIN_ID, &chain_id)?);
        }
        if let Some(helper) = lookup(ENV_HELPER_CONTRACT) {
            self.helper_contract = helper
                .parse()
                .map_err(|e| BridgeError::config(format!("{}: {}", ENV_HELPER_CONTRACT, e)))?;
        }
        if let Some(interval) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_env(ENV_POLL_INTERVAL_MS, &interval)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> BridgeResult<()> {
        for (name, url) in [("rpc_url", &self.rpc_url), ("oracle_url", &self.oracle_url)] {
            let check = validate_endpoint(url);
            if !check.is_valid {
                return Err(BridgeError::config(format!("{}: {}", name, check.errors.join("; "))));
            }
            for warning in &check.warnings {
                log_warn!("config", "Endpoint warning", endpoint = name, warning = warning);
            }
        }

        if self.required_confirmations == 0 {
            return Err(BridgeError::config("required_confirmations must be at least 1"));
        }
        if self.transfer_gas_limit == 0 || self.contract_call_gas_limit == 0 {
            return Err(BridgeError::config("gas limits must be non-zero"));
        }
        if self.helper_contract == Address::ZERO {
            return Err(BridgeError::config("helper_contract is not set"));
        }
        Ok(())
    }

    pub fn gas_policy(&self) -> GasPolicy {
        GasPolicy {
            transfer_gas_limit: self.transfer_gas_limit,
            contract_call_gas_limit: self.contract_call_gas_limit,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            helper_contract: self.helper_contract,
            gas_policy: self.gas_policy(),
            expected_chain_id: self.expected_chain_id,
            check_balance: self.check_balance,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            required_confirmations: self.required_confirmations,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> BridgeResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| BridgeError::config(format!("{}={}: {}", name, value, e)))
}
