//! On-disk configuration of the networks a changeset runs against.

use std::{collections::BTreeSet, path::Path, sync::Arc, time::Duration};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    Chain, ChainSelector, ChainState, Environment, GasSettings, GovernanceContracts,
    LocalKeySigner, McmsConfig, RpcClient,
    rpc::{DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL},
};

/// The default name for the enact configuration file.
pub const CONFIG_FILENAME: &str = "Enact.toml";

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_max_polls() -> usize {
    DEFAULT_MAX_POLLS
}

/// Configuration of a single network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub selector: ChainSelector,
    pub chain_id: u64,
    pub rpc_url: Url,
    /// Name of the environment variable holding the deployer private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_env: Option<String>,
    /// Starting nonce. Fetched from the network when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timelock: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposer_mcm: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_proxy: Option<Address>,
    #[serde(default = "default_poll_interval", with = "crate::proposal::duration_str")]
    pub receipt_poll_interval: Duration,
    #[serde(default = "default_max_polls")]
    pub receipt_max_polls: usize,
    #[serde(default)]
    pub gas: GasSettings,
}

impl NetworkConfig {
    /// Governance contracts, when both the timelock and the proposer are set.
    pub fn governance(&self) -> Option<GovernanceContracts> {
        Some(GovernanceContracts {
            timelock: self.timelock?,
            proposer_mcm: self.proposer_mcm?,
            call_proxy: self.call_proxy,
        })
    }

    /// Load the deployer key from the configured environment variable.
    fn load_deployer_key(&self) -> Result<Option<LocalKeySigner>> {
        let Some(var) = &self.private_key_env else {
            return Ok(None);
        };
        let key = std::env::var(var).with_context(|| {
            format!(
                "Environment variable {} not set for network {}",
                var, self.selector
            )
        })?;
        let signer = LocalKeySigner::from_hex(&key)
            .with_context(|| format!("Invalid private key in {}", var))?;
        Ok(Some(signer))
    }
}

/// Top-level configuration, usually stored as `Enact.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnactConfig {
    /// Governance settings. When set, changesets produce timelock proposals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcms: Option<McmsConfig>,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

impl EnactConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize enact config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Enact.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(config_path)
            .context(format!("Failed to read config from {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        config.validate()?;
        tracing::info!(path = %path.display(), networks = config.networks.len(), "Configuration loaded");
        Ok(config)
    }

    /// Check that selectors are unique and governance is complete in proposal mode.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for network in &self.networks {
            if !seen.insert(network.selector) {
                anyhow::bail!("Network {} is configured more than once", network.selector);
            }
            if self.mcms.is_some() && network.governance().is_none() {
                anyhow::bail!(
                    "Network {} needs both timelock and proposer_mcm when mcms is configured",
                    network.selector
                );
            }
        }
        Ok(())
    }

    pub fn network(&self, selector: ChainSelector) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.selector == selector)
    }

    /// Build RPC-backed chains for every configured network.
    pub fn build_environment(&self) -> Result<Environment<RpcClient>> {
        let mut chains = Vec::with_capacity(self.networks.len());

        for network in &self.networks {
            let client = RpcClient::new(network.rpc_url.clone())?
                .receipt_polling(network.receipt_poll_interval, network.receipt_max_polls);

            let mut chain =
                Chain::new(network.selector, network.chain_id, client).gas(network.gas);
            if let Some(key) = network.load_deployer_key()? {
                chain = chain.deployer_key(Arc::new(key));
            }
            if let Some(nonce) = network.nonce {
                chain = chain.nonce(nonce);
            }
            chains.push(chain);
        }

        Ok(Environment::new(chains))
    }

    /// Governance contracts of every network that declares them.
    pub fn build_chain_state(&self) -> ChainState {
        ChainState::new(
            self.networks
                .iter()
                .filter_map(|n| n.governance().map(|g| (n.selector, g))),
        )
    }
}
