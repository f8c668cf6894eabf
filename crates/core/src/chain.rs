//! Environment and on-chain state the deployer group works against.

use std::{collections::BTreeMap, sync::Arc};

use alloy_core::primitives::Address;
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

use crate::{EnactError, TransactionSigner, error::Result};

/// Opaque identifier of a network, used as key of every per-network map.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deref,
    Display,
    From,
)]
#[serde(transparent)]
pub struct ChainSelector(pub u64);

impl<'de> Deserialize<'de> for ChainSelector {
    /// Accepts a number or a decimal string. TOML integers stop at `i64::MAX`,
    /// below many real selectors.
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Self(n)),
            Repr::Text(s) => s
                .parse()
                .map(Self)
                .map_err(<D::Error as serde::de::Error>::custom),
        }
    }
}

/// Gas parameters applied to every transaction built for a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSettings {
    /// Gas limit used when the call does not provide one.
    pub gas_limit: u64,
    /// EIP-1559 max fee per gas, in wei.
    pub max_fee_per_gas: u64,
    /// EIP-1559 priority fee per gas, in wei.
    pub max_priority_fee_per_gas: u64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            gas_limit: 1_000_000,
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }
    }
}

/// A network the group can sign for.
pub struct Chain<C> {
    pub selector: ChainSelector,
    /// EIP-155 chain id embedded in signed transactions.
    pub chain_id: u64,
    pub client: C,
    /// Local key used in direct mode.
    pub deployer_key: Option<Arc<dyn TransactionSigner>>,
    /// Starting nonce supplied by the caller. When unset the pending nonce is
    /// fetched from the network.
    pub nonce: Option<u64>,
    pub gas: GasSettings,
}

impl<C> Chain<C> {
    /// Create a chain without deployer key, fixed nonce, or custom gas settings.
    pub fn new(selector: ChainSelector, chain_id: u64, client: C) -> Self {
        Self {
            selector,
            chain_id,
            client,
            deployer_key: None,
            nonce: None,
            gas: GasSettings::default(),
        }
    }

    /// Set the local key used in direct mode.
    pub fn deployer_key(mut self, key: Arc<dyn TransactionSigner>) -> Self {
        self.deployer_key = Some(key);
        self
    }

    /// Pin the starting nonce instead of querying the network.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Override the gas settings.
    pub fn gas(mut self, gas: GasSettings) -> Self {
        self.gas = gas;
        self
    }
}

/// All networks reachable by a changeset.
pub struct Environment<C> {
    chains: BTreeMap<ChainSelector, Chain<C>>,
}

impl<C> Environment<C> {
    pub fn new(chains: impl IntoIterator<Item = Chain<C>>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.selector, c)).collect(),
        }
    }

    pub fn chain(&self, selector: ChainSelector) -> Result<&Chain<C>> {
        self.chains
            .get(&selector)
            .ok_or(EnactError::NetworkNotFound(selector))
    }

    pub fn selectors(&self) -> impl Iterator<Item = ChainSelector> + '_ {
        self.chains.keys().copied()
    }
}

/// Governance contracts deployed on one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceContracts {
    /// Timelock executing scheduled batches. Also the sender of proposal-mode transactions.
    pub timelock: Address,
    /// Multisig proposing batches to the timelock.
    pub proposer_mcm: Address,
    /// Proxy used to execute ready timelock operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_proxy: Option<Address>,
}

/// Timelock contracts needed to execute a proposal on one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelockExecutionContracts {
    pub timelock: Address,
    pub call_proxy: Option<Address>,
}

/// Addresses of the governance contracts per network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub chains: BTreeMap<ChainSelector, GovernanceContracts>,
}

impl ChainState {
    pub fn new(chains: impl IntoIterator<Item = (ChainSelector, GovernanceContracts)>) -> Self {
        Self {
            chains: chains.into_iter().collect(),
        }
    }

    pub fn governance(&self, selector: ChainSelector) -> Result<&GovernanceContracts> {
        self.chains
            .get(&selector)
            .ok_or(EnactError::NetworkNotFound(selector))
    }

    /// Timelock and call proxy of every requested network.
    pub fn timelock_per_chain(
        &self,
        selectors: impl IntoIterator<Item = ChainSelector>,
    ) -> Result<BTreeMap<ChainSelector, TimelockExecutionContracts>> {
        selectors
            .into_iter()
            .map(|selector| {
                let contracts = self.governance(selector)?;
                Ok((
                    selector,
                    TimelockExecutionContracts {
                        timelock: contracts.timelock,
                        call_proxy: contracts.call_proxy,
                    },
                ))
            })
            .collect()
    }

    /// Timelock address of every requested network.
    pub fn timelock_address_per_chain(
        &self,
        selectors: impl IntoIterator<Item = ChainSelector>,
    ) -> Result<BTreeMap<ChainSelector, Address>> {
        Ok(self
            .timelock_per_chain(selectors)?
            .into_iter()
            .map(|(selector, contracts)| (selector, contracts.timelock))
            .collect())
    }

    /// Proposer multisig address of every requested network.
    pub fn proposer_per_chain(
        &self,
        selectors: impl IntoIterator<Item = ChainSelector>,
    ) -> Result<BTreeMap<ChainSelector, Address>> {
        selectors
            .into_iter()
            .map(|selector| Ok((selector, self.governance(selector)?.proposer_mcm)))
            .collect()
    }
}
