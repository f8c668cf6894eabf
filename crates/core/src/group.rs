//! Deployer group: capture transactions once, realize them either directly or
//! as timelock proposals.
//!
//! Changeset code asks the group for a [`RecordingTransactor`] per network and
//! signs its calls through it without knowing which mode is active:
//!
//! ```no_run
//! # use enact_core::*;
//! # async fn run<C: ChainClient>(env: &Environment<C>, state: &ChainState, mcms: Option<McmsConfig>) -> Result<(), EnactError> {
//! let mut group = DeployerGroup::builder(env, state)
//!     .mcms(mcms)
//!     .with_deployment_context("Curse RMN remote");
//!
//! let deployer = group.transactor(ChainSelector(1)).await?;
//! deployer.sign(CallRequest::new(alloy_core::primitives::Address::ZERO))?;
//!
//! group.with_deployment_context("Update rate limits");
//! deployer.sign(CallRequest::new(alloy_core::primitives::Address::ZERO))?;
//!
//! let output = group.enact().await?;
//! # Ok(()) }
//! ```

use std::{collections::BTreeMap, sync::Arc};

use alloy_consensus::TxEip1559;
use alloy_core::primitives::{Address, TxKind};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    CallRequest, CapturedTransaction, ChainClient, ChainSelector, ChainState, ContextId,
    ContextStack, DeploymentContext, DirectExecutor, EnactError, Environment, GasSettings,
    McmsConfig, ProposalAssembler, SendMode, SimulatedSigner, TimelockProposal,
    TransactionSigner, TxReceipt, error::Result,
};

/// How captured transactions are realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EnactMode {
    /// Broadcast with the deployer key.
    Direct,
    /// Emit timelock proposals.
    Proposal,
}

/// Result of [`DeployerGroup::enact`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetOutput {
    /// Proposals to sign and submit, in proposal mode.
    pub proposals: Vec<TimelockProposal>,
    /// Receipts of the transactions sent, in direct mode.
    pub receipts: Vec<TxReceipt>,
}

/// Context stack plus the context new captures are appended to.
#[derive(Debug)]
struct Ledger {
    stack: ContextStack,
    head: ContextId,
}

/// First half of the group construction: everything except the root context.
pub struct DeployerGroupBuilder<'a, C> {
    env: &'a Environment<C>,
    state: &'a ChainState,
    mcms: Option<McmsConfig>,
}

impl<'a, C: ChainClient> DeployerGroupBuilder<'a, C> {
    /// Switch to proposal mode when `Some`.
    pub fn mcms(mut self, mcms: Option<McmsConfig>) -> Self {
        self.mcms = mcms;
        self
    }

    /// Finish the group with a root context named `description`.
    pub fn with_deployment_context(self, description: impl Into<String>) -> DeployerGroup<'a, C> {
        let stack = ContextStack::new(description);
        let head = stack.root();
        DeployerGroup {
            env: self.env,
            state: self.state,
            mcms: self.mcms,
            ledger: Arc::new(Mutex::new(Ledger { stack, head })),
        }
    }
}

/// Orchestrates capture and realization of a changeset.
pub struct DeployerGroup<'a, C> {
    env: &'a Environment<C>,
    state: &'a ChainState,
    mcms: Option<McmsConfig>,
    ledger: Arc<Mutex<Ledger>>,
}

impl<'a, C: ChainClient> DeployerGroup<'a, C> {
    pub fn builder(env: &'a Environment<C>, state: &'a ChainState) -> DeployerGroupBuilder<'a, C> {
        DeployerGroupBuilder {
            env,
            state,
            mcms: None,
        }
    }

    pub fn mode(&self) -> EnactMode {
        match self.mcms {
            Some(_) => EnactMode::Proposal,
            None => EnactMode::Direct,
        }
    }

    /// Fork the current context. Captures made from now on, by any transactor
    /// of this group, land in the new context.
    pub fn with_deployment_context(&mut self, description: impl Into<String>) -> ContextId {
        let description = description.into();
        let mut ledger = self.ledger.lock();
        let head = ledger.head;
        let child = ledger.stack.fork(head, description.clone());
        ledger.head = child;
        tracing::debug!(description = %description, parent = %head, context = %child, "Forked deployment context");
        child
    }

    pub fn current_context(&self) -> ContextId {
        self.ledger.lock().head
    }

    /// Snapshot of a context as it is now.
    pub fn context(&self, id: ContextId) -> Option<DeploymentContext> {
        self.ledger.lock().stack.get(id).cloned()
    }

    /// Snapshot of the contexts that will be realized, oldest first.
    pub fn contexts(&self) -> Vec<DeploymentContext> {
        let ledger = self.ledger.lock();
        ledger
            .stack
            .flatten(ledger.head)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every captured transaction per network, in realization order.
    pub fn transactions(&self) -> BTreeMap<ChainSelector, Vec<CapturedTransaction>> {
        let ledger = self.ledger.lock();
        ledger.stack.transactions(ledger.head)
    }

    /// Get a signing handle for `selector`.
    ///
    /// The starting nonce is resolved once, here. Every later nonce is derived
    /// from the number of transactions captured for the network.
    pub async fn transactor(&self, selector: ChainSelector) -> Result<RecordingTransactor> {
        let chain = self.env.chain(selector)?;

        let signer: Arc<dyn TransactionSigner> = match self.mcms {
            None => chain
                .deployer_key
                .clone()
                .ok_or(EnactError::MissingDeployerKey(selector))?,
            Some(_) => Arc::new(SimulatedSigner::new(
                self.state.governance(selector)?.timelock,
            )),
        };
        let from = signer.address();

        let starting_nonce = match chain.nonce {
            Some(nonce) => nonce,
            None => chain
                .client
                .pending_nonce(from)
                .await
                .map_err(|source| EnactError::NonceResolution {
                    chain: selector,
                    account: from,
                    source,
                })?,
        };

        tracing::debug!(
            chain = %selector,
            from = %from,
            starting_nonce,
            mode = %self.mode(),
            "Created recording transactor"
        );

        Ok(RecordingTransactor {
            chain: selector,
            chain_id: chain.chain_id,
            from,
            starting_nonce,
            gas: chain.gas,
            signer,
            ledger: Arc::clone(&self.ledger),
        })
    }

    /// Realize every captured transaction, oldest context first.
    ///
    /// Proposal mode returns all proposals or none. Direct mode stops at the
    /// first failure; what was confirmed before it stays on-chain.
    pub async fn enact(self) -> Result<ChangesetOutput> {
        let contexts = self.contexts();
        tracing::info!(
            mode = %self.mode(),
            contexts = contexts.len(),
            "Enacting changeset"
        );

        match &self.mcms {
            Some(config) => {
                let proposals = ProposalAssembler::new(self.env, self.state, config)
                    .assemble(&contexts)
                    .await?;
                Ok(ChangesetOutput {
                    proposals,
                    receipts: Vec::new(),
                })
            }
            None => {
                let receipts = DirectExecutor::new(self.env).execute(&contexts).await?;
                Ok(ChangesetOutput {
                    proposals: Vec::new(),
                    receipts,
                })
            }
        }
    }
}

/// Signing handle that records transactions instead of sending them.
pub struct RecordingTransactor {
    chain: ChainSelector,
    chain_id: u64,
    from: Address,
    starting_nonce: u64,
    gas: GasSettings,
    signer: Arc<dyn TransactionSigner>,
    ledger: Arc<Mutex<Ledger>>,
}

impl RecordingTransactor {
    pub fn chain(&self) -> ChainSelector {
        self.chain
    }

    /// Account the transactions are sent from.
    pub fn from(&self) -> Address {
        self.from
    }

    pub fn starting_nonce(&self) -> u64 {
        self.starting_nonce
    }

    /// Always [`SendMode::Capture`]: the group realizes the transactions.
    pub fn mode(&self) -> SendMode {
        SendMode::Capture
    }

    /// Nonce the next signed transaction will get.
    pub fn next_nonce(&self) -> u64 {
        let ledger = self.ledger.lock();
        self.starting_nonce
            .saturating_add(ledger.stack.transaction_count(ledger.head, self.chain) as u64)
    }

    /// Sign `call` and record it in the group's current context.
    pub fn sign(&self, call: CallRequest) -> Result<CapturedTransaction> {
        let mut ledger = self.ledger.lock();
        let head = ledger.head;
        // Recounted on every call so forks between signatures are accounted for.
        let captured_so_far = ledger.stack.transaction_count(head, self.chain) as u64;
        let nonce = self.starting_nonce.checked_add(captured_so_far).ok_or_else(|| {
            EnactError::Signing {
                chain: self.chain,
                nonce: self.starting_nonce,
                source: anyhow::anyhow!(
                    "nonce overflow after {captured_so_far} captured transactions"
                ),
            }
        })?;

        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit: call.gas_limit.unwrap_or(self.gas.gas_limit),
            max_fee_per_gas: self.gas.max_fee_per_gas.into(),
            max_priority_fee_per_gas: self.gas.max_priority_fee_per_gas.into(),
            to: TxKind::Call(call.to),
            value: call.value,
            input: call.data.clone(),
            ..Default::default()
        };

        let signed = self
            .signer
            .sign_transaction(tx)
            .map_err(|source| EnactError::Signing {
                chain: self.chain,
                nonce,
                source,
            })?;

        let captured = CapturedTransaction {
            chain: self.chain,
            from: self.from,
            nonce,
            to: call.to,
            data: call.data,
            value: call.value,
            hash: signed.hash,
            raw: signed.raw,
        };
        ledger.stack.record(head, captured.clone());

        tracing::debug!(
            chain = %self.chain,
            nonce,
            to = %captured.to,
            context = %head,
            "Captured transaction"
        );

        Ok(captured)
    }
}
