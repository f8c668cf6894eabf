//! Transactions as requested by callers and as captured by the group.

use alloy_core::primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::ChainSelector;

/// What should happen to a transaction once it is signed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SendMode {
    /// Record the transaction; it is realized later by the deployer group.
    Capture,
    /// Broadcast the transaction right away.
    Send,
}

/// A contract call issued through a transactor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Overrides the network's default gas limit.
    pub gas_limit: Option<u64>,
}

impl CallRequest {
    pub fn new(to: Address) -> Self {
        Self {
            to,
            ..Default::default()
        }
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// Output of a [`crate::TransactionSigner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: TxHash,
    /// EIP-2718 encoded payload, empty when produced by a simulated signer.
    pub raw: Bytes,
}

/// A signed transaction recorded in a deployment context, never broadcast at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedTransaction {
    pub chain: ChainSelector,
    pub from: Address,
    pub nonce: u64,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub hash: TxHash,
    pub raw: Bytes,
}

impl CapturedTransaction {
    /// Whether the transaction carries a payload that can be broadcast.
    pub fn is_signed(&self) -> bool {
        !self.raw.is_empty()
    }
}
