//! Timelock proposals assembled from captured transactions.
//!
//! Every non-empty deployment context becomes one proposal. Starting operation
//! counts are chained so that proposals emitted in one pass can be executed
//! back to back on the proposer multisig.

use std::{collections::BTreeMap, time::Duration};

use alloy_core::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{
    ChainClient, ChainSelector, ChainState, DeploymentContext, EnactError, Environment,
    error::Result,
};

/// Version tag of the proposal format.
pub const PROPOSAL_VERSION: &str = "v1";

/// How long a freshly built proposal can be signed for.
pub const DEFAULT_VALID_UNTIL: Duration = Duration::from_secs(72 * 60 * 60);

/// Governance settings. Their presence switches the group to proposal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McmsConfig {
    /// Minimum timelock delay before a scheduled batch can execute.
    #[serde(with = "duration_str")]
    pub min_delay: Duration,
}

/// A single call executed by the timelock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Operations scheduled as one batch on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchChainOperation {
    pub chain_identifier: ChainSelector,
    pub batch: Vec<Operation>,
}

/// Per-network proposer metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    pub starting_op_count: u64,
    pub mcm_address: Address,
}

/// Action requested from the timelock.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TimelockOperation {
    #[default]
    Schedule,
    Cancel,
    Bypass,
}

/// Proposal handed to the external signing and submission tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelockProposal {
    pub version: String,
    /// Unix timestamp after which signatures are no longer accepted.
    pub valid_until: u32,
    pub signatures: Vec<Bytes>,
    pub override_previous_root: bool,
    pub chain_metadata: BTreeMap<ChainSelector, ChainMetadata>,
    pub description: String,
    pub operation: TimelockOperation,
    #[serde(rename = "delay", with = "duration_str")]
    pub min_delay: Duration,
    pub timelock_addresses: BTreeMap<ChainSelector, Address>,
    pub transactions: Vec<BatchChainOperation>,
}

impl TimelockProposal {
    /// Build a schedule proposal from per-network batches.
    ///
    /// Every network in `batches` must have a timelock, a proposer and a
    /// starting operation count.
    pub fn from_batches(
        timelocks: BTreeMap<ChainSelector, Address>,
        proposers: &BTreeMap<ChainSelector, Address>,
        starting_op_counts: &BTreeMap<ChainSelector, u64>,
        batches: Vec<BatchChainOperation>,
        description: &str,
        min_delay: Duration,
        valid_until: u32,
    ) -> Result<Self> {
        if batches.is_empty() {
            return Err(EnactError::proposal_build(description, "no batches"));
        }

        let mut chain_metadata = BTreeMap::new();
        for batch in &batches {
            let chain = batch.chain_identifier;
            if !timelocks.contains_key(&chain) {
                return Err(EnactError::proposal_build(
                    description,
                    format!("missing timelock for network {chain}"),
                ));
            }
            let mcm_address = *proposers.get(&chain).ok_or_else(|| {
                EnactError::proposal_build(description, format!("missing proposer for network {chain}"))
            })?;
            let starting_op_count = *starting_op_counts.get(&chain).ok_or_else(|| {
                EnactError::proposal_build(
                    description,
                    format!("missing starting op count for network {chain}"),
                )
            })?;
            chain_metadata.insert(
                chain,
                ChainMetadata {
                    starting_op_count,
                    mcm_address,
                },
            );
        }

        Ok(Self {
            version: PROPOSAL_VERSION.to_string(),
            valid_until,
            signatures: Vec::new(),
            override_previous_root: false,
            chain_metadata,
            description: description.to_string(),
            operation: TimelockOperation::Schedule,
            min_delay,
            timelock_addresses: timelocks,
            transactions: batches,
        })
    }

    pub fn starting_op_count(&self, chain: ChainSelector) -> Option<u64> {
        self.chain_metadata.get(&chain).map(|m| m.starting_op_count)
    }

    /// Number of operations scheduled on `chain`.
    pub fn batch_len(&self, chain: ChainSelector) -> u64 {
        self.transactions
            .iter()
            .filter(|b| b.chain_identifier == chain)
            .map(|b| b.batch.len() as u64)
            .sum()
    }

    /// Networks touched by this proposal.
    pub fn chains(&self) -> impl Iterator<Item = ChainSelector> + '_ {
        self.chain_metadata.keys().copied()
    }
}

/// One batch per network with at least one captured transaction.
fn batches_from_context(context: &DeploymentContext) -> Vec<BatchChainOperation> {
    context
        .transactions
        .iter()
        .filter(|(_, txs)| !txs.is_empty())
        .map(|(chain, txs)| BatchChainOperation {
            chain_identifier: *chain,
            batch: txs
                .iter()
                .map(|tx| Operation {
                    to: tx.to,
                    data: tx.data.clone(),
                    value: tx.value,
                })
                .collect(),
        })
        .collect()
}

/// Converts deployment contexts into chained timelock proposals.
pub struct ProposalAssembler<'a, C> {
    env: &'a Environment<C>,
    state: &'a ChainState,
    config: &'a McmsConfig,
}

impl<'a, C: ChainClient> ProposalAssembler<'a, C> {
    pub fn new(env: &'a Environment<C>, state: &'a ChainState, config: &'a McmsConfig) -> Self {
        Self { env, state, config }
    }

    /// Build one proposal per non-empty context, oldest first.
    ///
    /// Fails as a whole: no proposal is returned if any context cannot be built.
    pub async fn assemble(&self, contexts: &[DeploymentContext]) -> Result<Vec<TimelockProposal>> {
        let valid_until = valid_until_from_now();
        let mut proposals: Vec<TimelockProposal> = Vec::new();
        // Next free operation index per proposer, carried across proposals.
        let mut next_op_counts: BTreeMap<ChainSelector, u64> = BTreeMap::new();

        for context in contexts {
            let description = context.description.as_str();
            let batches = batches_from_context(context);

            if batches.is_empty() {
                tracing::warn!(
                    description,
                    "No batch was produced from deployment context, skipping proposal"
                );
                continue;
            }

            let chains: Vec<ChainSelector> = batches.iter().map(|b| b.chain_identifier).collect();
            let timelocks = self
                .state
                .timelock_address_per_chain(chains.iter().copied())
                .map_err(|e| EnactError::proposal_build(description, e.to_string()))?;
            let proposers = self
                .state
                .proposer_per_chain(chains.iter().copied())
                .map_err(|e| EnactError::proposal_build(description, e.to_string()))?;

            let mut starting_op_counts = BTreeMap::new();
            for (chain, mcm) in &proposers {
                let start = match next_op_counts.get(chain) {
                    Some(count) => *count,
                    None => self.live_op_count(*chain, *mcm, description).await?,
                };
                starting_op_counts.insert(*chain, start);
            }

            let proposal = TimelockProposal::from_batches(
                timelocks,
                &proposers,
                &starting_op_counts,
                batches,
                description,
                self.config.min_delay,
                valid_until,
            )?;

            for chain in proposal.chains() {
                let start = starting_op_counts[&chain];
                let next = start.checked_add(proposal.batch_len(chain)).ok_or_else(|| {
                    EnactError::proposal_build(
                        description,
                        format!("op count overflow on network {chain}"),
                    )
                })?;
                next_op_counts.insert(chain, next);
            }

            tracing::info!(
                description,
                networks = proposal.chain_metadata.len(),
                index = proposals.len(),
                "Built timelock proposal"
            );
            proposals.push(proposal);
        }

        Ok(proposals)
    }

    async fn live_op_count(
        &self,
        chain: ChainSelector,
        mcm: Address,
        description: &str,
    ) -> Result<u64> {
        let client = &self
            .env
            .chain(chain)
            .map_err(|e| EnactError::proposal_build(description, e.to_string()))?
            .client;
        let count = client.op_count(mcm).await.map_err(|e| {
            EnactError::proposal_build(
                description,
                format!("failed to get op count of {mcm} on network {chain}: {e:#}"),
            )
        })?;
        tracing::debug!(chain = %chain, mcm = %mcm, count, "Fetched proposer op count");
        Ok(count)
    }
}

fn valid_until_from_now() -> u32 {
    let deadline = chrono::Utc::now().timestamp() + DEFAULT_VALID_UNTIL.as_secs() as i64;
    u32::try_from(deadline).unwrap_or(u32::MAX)
}

/// Serialize durations as human readable strings such as `24h` or `1h 30m`.
pub(crate) mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::TxHash;

    use super::*;
    use crate::{CapturedTransaction, Chain, ContextStack, GovernanceContracts, test_utils::MockClient};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn captured(chain: u64, nonce: u64, to: u8) -> CapturedTransaction {
        CapturedTransaction {
            chain: ChainSelector(chain),
            from: Address::repeat_byte(0x01),
            nonce,
            to: Address::repeat_byte(to),
            data: Bytes::from(vec![to, nonce as u8]),
            value: U256::from(nonce),
            hash: TxHash::with_last_byte(nonce as u8),
            raw: Bytes::new(),
        }
    }

    fn governance(byte: u8) -> GovernanceContracts {
        GovernanceContracts {
            timelock: Address::repeat_byte(byte),
            proposer_mcm: Address::repeat_byte(byte + 1),
            call_proxy: None,
        }
    }

    fn fixture(op_count: u64) -> (Environment<MockClient>, ChainState) {
        let env = Environment::new([
            Chain::new(ChainSelector(1), 1, MockClient::with_op_count(op_count)),
            Chain::new(ChainSelector(7), 7, MockClient::with_op_count(op_count + 100)),
        ]);
        let state = ChainState::new([
            (ChainSelector(1), governance(0x10)),
            (ChainSelector(7), governance(0x70)),
        ]);
        (env, state)
    }

    fn contexts(stack: &ContextStack, head: crate::ContextId) -> Vec<DeploymentContext> {
        stack.flatten(head).into_iter().cloned().collect()
    }

    #[tokio::test]
    async fn test_chained_starting_op_counts() {
        let (env, state) = fixture(3);
        let config = McmsConfig { min_delay: DAY };

        let mut stack = ContextStack::new("A");
        let a = stack.root();
        stack.record(a, captured(7, 0, 0xaa));
        stack.record(a, captured(7, 1, 0xbb));
        let b = stack.fork(a, "B");
        stack.record(b, captured(7, 2, 0xcc));

        let proposals = ProposalAssembler::new(&env, &state, &config)
            .assemble(&contexts(&stack, b))
            .await
            .unwrap();

        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].description, "A");
        assert_eq!(proposals[1].description, "B");
        let chain = ChainSelector(7);
        assert_eq!(proposals[0].starting_op_count(chain), Some(103));
        assert_eq!(
            proposals[1].starting_op_count(chain),
            Some(proposals[0].starting_op_count(chain).unwrap() + 2)
        );
        assert_eq!(proposals[1].min_delay, DAY);
        assert_eq!(
            proposals[1].chain_metadata[&chain].mcm_address,
            Address::repeat_byte(0x71)
        );
        assert_eq!(
            proposals[1].timelock_addresses[&chain],
            Address::repeat_byte(0x70)
        );
        // The live count is fetched only for the first proposal.
        assert_eq!(env.chain(chain).unwrap().client.op_count_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_contexts_are_skipped() {
        let (env, state) = fixture(0);
        let config = McmsConfig { min_delay: DAY };

        let mut stack = ContextStack::new("empty root");
        let root = stack.root();
        let a = stack.fork(root, "A");
        stack.record(a, captured(1, 0, 0xaa));
        let empty = stack.fork(a, "empty middle");
        let b = stack.fork(empty, "B");
        stack.record(b, captured(1, 1, 0xbb));

        let proposals = ProposalAssembler::new(&env, &state, &config)
            .assemble(&contexts(&stack, b))
            .await
            .unwrap();

        let descriptions: Vec<&str> = proposals.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(descriptions, vec!["A", "B"]);
        assert_eq!(proposals[1].starting_op_count(ChainSelector(1)), Some(1));
    }

    #[tokio::test]
    async fn test_offsets_carry_over_proposals_not_touching_a_network() {
        let (env, state) = fixture(10);
        let config = McmsConfig { min_delay: DAY };

        let mut stack = ContextStack::new("A");
        let a = stack.root();
        stack.record(a, captured(1, 0, 0xaa));
        stack.record(a, captured(1, 1, 0xab));
        stack.record(a, captured(7, 0, 0xac));
        let b = stack.fork(a, "B");
        stack.record(b, captured(7, 1, 0xba));
        let c = stack.fork(b, "C");
        stack.record(c, captured(1, 2, 0xca));

        let proposals = ProposalAssembler::new(&env, &state, &config)
            .assemble(&contexts(&stack, c))
            .await
            .unwrap();

        assert_eq!(proposals.len(), 3);
        assert_eq!(proposals[0].starting_op_count(ChainSelector(1)), Some(10));
        assert_eq!(proposals[0].starting_op_count(ChainSelector(7)), Some(110));
        assert_eq!(proposals[1].starting_op_count(ChainSelector(1)), None);
        assert_eq!(proposals[1].starting_op_count(ChainSelector(7)), Some(111));
        assert_eq!(proposals[2].starting_op_count(ChainSelector(1)), Some(12));
    }

    #[tokio::test]
    async fn test_operations_preserve_captured_fields() {
        let (env, state) = fixture(0);
        let config = McmsConfig { min_delay: DAY };

        let mut stack = ContextStack::new("A");
        let tx = captured(1, 4, 0xee);
        stack.record(stack.root(), tx.clone());

        let proposals = ProposalAssembler::new(&env, &state, &config)
            .assemble(&contexts(&stack, stack.root()))
            .await
            .unwrap();

        let batch = &proposals[0].transactions[0];
        assert_eq!(batch.chain_identifier, ChainSelector(1));
        assert_eq!(
            batch.batch,
            vec![Operation {
                to: tx.to,
                data: tx.data,
                value: tx.value
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_governance_aborts_everything() {
        let (env, _) = fixture(0);
        let state = ChainState::new([(ChainSelector(1), governance(0x10))]);
        let config = McmsConfig { min_delay: DAY };

        let mut stack = ContextStack::new("A");
        let a = stack.root();
        stack.record(a, captured(1, 0, 0xaa));
        let b = stack.fork(a, "B");
        stack.record(b, captured(7, 0, 0xbb));

        let err = ProposalAssembler::new(&env, &state, &config)
            .assemble(&contexts(&stack, b))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EnactError::ProposalBuild { ref description, .. } if description == "B"
        ));
    }

    #[tokio::test]
    async fn test_op_count_failure_is_a_build_error() {
        let env = Environment::new([Chain::new(ChainSelector(1), 1, MockClient::failing_op_count())]);
        let state = ChainState::new([(ChainSelector(1), governance(0x10))]);
        let config = McmsConfig { min_delay: DAY };

        let mut stack = ContextStack::new("A");
        stack.record(stack.root(), captured(1, 0, 0xaa));

        let err = ProposalAssembler::new(&env, &state, &config)
            .assemble(&contexts(&stack, stack.root()))
            .await
            .unwrap_err();
        assert!(matches!(err, EnactError::ProposalBuild { .. }));
    }

    #[tokio::test]
    async fn test_op_count_overflow_is_a_build_error() {
        let env = Environment::new([Chain::new(
            ChainSelector(1),
            1,
            MockClient::with_op_count(u64::MAX),
        )]);
        let state = ChainState::new([(ChainSelector(1), governance(0x10))]);
        let config = McmsConfig { min_delay: DAY };

        let mut stack = ContextStack::new("A");
        stack.record(stack.root(), captured(1, 0, 0xaa));

        let err = ProposalAssembler::new(&env, &state, &config)
            .assemble(&contexts(&stack, stack.root()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnactError::ProposalBuild { ref description, .. } if description == "A"
        ));
    }

    #[test]
    fn test_proposal_json_shape() {
        let proposal = TimelockProposal::from_batches(
            BTreeMap::from([(ChainSelector(7), Address::repeat_byte(0x70))]),
            &BTreeMap::from([(ChainSelector(7), Address::repeat_byte(0x71))]),
            &BTreeMap::from([(ChainSelector(7), 4)]),
            vec![BatchChainOperation {
                chain_identifier: ChainSelector(7),
                batch: vec![Operation {
                    to: Address::repeat_byte(0xaa),
                    data: Bytes::from_static(&[0x01]),
                    value: U256::ZERO,
                }],
            }],
            "Set config",
            DAY,
            1_700_000_000,
        )
        .unwrap();

        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["version"], "v1");
        assert_eq!(json["operation"], "schedule");
        assert_eq!(json["delay"], "1day");
        assert_eq!(json["validUntil"], 1_700_000_000);
        assert_eq!(json["overridePreviousRoot"], false);
        assert_eq!(json["chainMetadata"]["7"]["startingOpCount"], 4);
        assert_eq!(json["transactions"][0]["chainIdentifier"], 7);

        let back: TimelockProposal = serde_json::from_value(json).unwrap();
        assert_eq!(back, proposal);
    }

    #[test]
    fn test_mcms_config_from_toml() {
        let config: McmsConfig = toml::from_str(r#"min_delay = "24h""#).unwrap();
        assert_eq!(config.min_delay, DAY);
    }
}
