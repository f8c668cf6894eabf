//! Error taxonomy surfaced by the deployer group.
//!
//! Collaborator failures (RPC transport, key handling) are carried as
//! [`anyhow::Error`] sources so the caller keeps the full context chain.

use alloy_core::primitives::{Address, TxHash};

use crate::ChainSelector;

/// Result alias used by the deployer group and its components.
pub type Result<T, E = EnactError> = std::result::Result<T, E>;

/// Errors returned while capturing or realizing a changeset.
///
/// Any error coming out of [`crate::DeployerGroup::enact`] in direct mode means a
/// prefix of the captured transactions may already be committed on-chain.
#[derive(Debug, thiserror::Error)]
pub enum EnactError {
    /// The selector is not part of the environment or the chain state.
    #[error("network {0} not found in environment or chain state")]
    NetworkNotFound(ChainSelector),

    /// Direct mode was requested for a network without a deployer key.
    #[error("no deployer key configured for network {0}")]
    MissingDeployerKey(ChainSelector),

    /// The pending nonce of the sender could not be fetched.
    #[error("could not get nonce for {account} on network {chain}")]
    NonceResolution {
        chain: ChainSelector,
        account: Address,
        #[source]
        source: anyhow::Error,
    },

    /// The base signer refused to sign.
    #[error("failed to sign transaction with nonce {nonce} on network {chain}")]
    Signing {
        chain: ChainSelector,
        nonce: u64,
        #[source]
        source: anyhow::Error,
    },

    /// A timelock proposal could not be assembled for a deployment context.
    #[error("failed to build proposal for '{description}': {reason}")]
    ProposalBuild { description: String, reason: String },

    /// The network rejected a captured transaction.
    #[error("failed to send transaction {hash} on network {chain}")]
    Broadcast {
        chain: ChainSelector,
        hash: TxHash,
        #[source]
        source: anyhow::Error,
    },

    /// Waiting for a transaction to be mined failed or the transaction reverted.
    #[error("waiting for tx {hash} to be mined failed on network {chain}")]
    Confirmation {
        chain: ChainSelector,
        hash: TxHash,
        #[source]
        source: anyhow::Error,
    },
}

impl EnactError {
    pub(crate) fn proposal_build(description: &str, reason: impl Into<String>) -> Self {
        Self::ProposalBuild {
            description: description.to_string(),
            reason: reason.into(),
        }
    }
}
