//! enact-core - Capture multi-network changesets once, realize them as direct
//! transactions or as timelock proposals.
//!
//! A [`DeployerGroup`] hands out [`RecordingTransactor`]s that sign and record
//! calls into a stack of [`DeploymentContext`]s. [`DeployerGroup::enact`] then
//! either broadcasts the recorded transactions or turns every context into a
//! [`TimelockProposal`] with chained operation counts.

mod error;
pub use error::{EnactError, Result};

mod chain;
pub use chain::{
    Chain, ChainSelector, ChainState, Environment, GasSettings, GovernanceContracts,
    TimelockExecutionContracts,
};

mod client;
pub use client::{ChainClient, TxReceipt};

mod context;
pub use context::{ContextId, ContextStack, DeploymentContext};

mod transaction;
pub use transaction::{CallRequest, CapturedTransaction, SendMode, SignedTransaction};

mod signer;
pub use signer::{LocalKeySigner, SimulatedSigner, TransactionSigner};

mod group;
pub use group::{ChangesetOutput, DeployerGroup, DeployerGroupBuilder, EnactMode, RecordingTransactor};

mod proposal;
pub use proposal::{
    BatchChainOperation, ChainMetadata, DEFAULT_VALID_UNTIL, McmsConfig, Operation,
    PROPOSAL_VERSION, ProposalAssembler, TimelockOperation, TimelockProposal,
};

mod executor;
pub use executor::DirectExecutor;

pub mod rpc;
pub use rpc::RpcClient;

mod config;
pub use config::{CONFIG_FILENAME, EnactConfig, NetworkConfig};

mod plan;
pub use plan::{ChangesetPlan, PlannedCall, PlannedContext};

#[cfg(test)]
mod test_utils;
