//! Deployment contexts: named, per-network logs of captured transactions.
//!
//! Contexts form a parent-linked stack stored in an arena. Forking adds a new
//! record pointing at its parent and never touches the parent, so anyone
//! holding an older [`ContextId`] keeps observing that context's own batch.

use std::collections::BTreeMap;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{CapturedTransaction, ChainSelector};

/// Index of a context in its [`ContextStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct ContextId(usize);

/// A named unit of work and the transactions captured while it was current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentContext {
    pub description: String,
    /// Captured transactions per network, in nonce order.
    pub transactions: BTreeMap<ChainSelector, Vec<CapturedTransaction>>,
    #[serde(skip)]
    parent: Option<ContextId>,
}

impl DeploymentContext {
    fn new(description: impl Into<String>, parent: Option<ContextId>) -> Self {
        Self {
            description: description.into(),
            transactions: BTreeMap::new(),
            parent,
        }
    }

    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    /// Total number of captured transactions across all networks.
    pub fn len(&self) -> usize {
        self.transactions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Arena holding every context created for one deployer group.
#[derive(Debug, Clone)]
pub struct ContextStack {
    contexts: Vec<DeploymentContext>,
}

impl ContextStack {
    /// Create a stack containing only an empty root context.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            contexts: vec![DeploymentContext::new(description, None)],
        }
    }

    pub fn root(&self) -> ContextId {
        ContextId(0)
    }

    /// Create a new context whose parent is `parent`.
    pub fn fork(&mut self, parent: ContextId, description: impl Into<String>) -> ContextId {
        let id = ContextId(self.contexts.len());
        self.contexts
            .push(DeploymentContext::new(description, Some(parent)));
        id
    }

    pub fn get(&self, id: ContextId) -> Option<&DeploymentContext> {
        self.contexts.get(id.0)
    }

    /// Contexts from the root down to `id`, oldest ancestor first.
    pub fn flatten(&self, id: ContextId) -> Vec<&DeploymentContext> {
        let mut chain = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            let Some(context) = self.get(current) else {
                break;
            };
            chain.push(context);
            next = context.parent;
        }
        chain.reverse();
        chain
    }

    /// Captured transactions for `chain` across the flattened stack ending at `id`.
    pub fn transaction_count(&self, id: ContextId, chain: ChainSelector) -> usize {
        self.flatten(id)
            .into_iter()
            .filter_map(|c| c.transactions.get(&chain))
            .map(Vec::len)
            .sum()
    }

    /// All captured transactions per network, in realization order.
    pub fn transactions(&self, id: ContextId) -> BTreeMap<ChainSelector, Vec<CapturedTransaction>> {
        let mut all: BTreeMap<ChainSelector, Vec<CapturedTransaction>> = BTreeMap::new();
        for context in self.flatten(id) {
            for (chain, txs) in &context.transactions {
                all.entry(*chain).or_default().extend(txs.iter().cloned());
            }
        }
        all
    }

    /// Append a captured transaction to context `id`.
    pub(crate) fn record(&mut self, id: ContextId, tx: CapturedTransaction) {
        if let Some(context) = self.contexts.get_mut(id.0) {
            context.transactions.entry(tx.chain).or_default().push(tx);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::{Address, Bytes, TxHash, U256};

    use super::*;

    fn captured(chain: u64, nonce: u64) -> CapturedTransaction {
        CapturedTransaction {
            chain: ChainSelector(chain),
            from: Address::ZERO,
            nonce,
            to: Address::repeat_byte(0xaa),
            data: Bytes::new(),
            value: U256::ZERO,
            hash: TxHash::with_last_byte(nonce as u8),
            raw: Bytes::new(),
        }
    }

    fn descriptions(stack: &ContextStack, id: ContextId) -> Vec<&str> {
        stack
            .flatten(id)
            .into_iter()
            .map(|c| c.description.as_str())
            .collect()
    }

    #[test]
    fn test_root_flattens_to_itself() {
        let stack = ContextStack::new("root");
        assert_eq!(descriptions(&stack, stack.root()), vec!["root"]);
        assert!(stack.get(stack.root()).unwrap().parent().is_none());
    }

    #[test]
    fn test_flatten_after_k_forks() {
        let mut stack = ContextStack::new("ctx-0");
        let mut head = stack.root();
        for k in 1..=5 {
            stack.record(head, captured(1, k));
            head = stack.fork(head, format!("ctx-{k}"));
        }

        assert_eq!(
            descriptions(&stack, head),
            vec!["ctx-0", "ctx-1", "ctx-2", "ctx-3", "ctx-4", "ctx-5"]
        );
    }

    #[test]
    fn test_fork_leaves_parent_untouched() {
        let mut stack = ContextStack::new("parent");
        let parent = stack.root();
        stack.record(parent, captured(1, 0));
        let before = stack.get(parent).unwrap().clone();

        let child = stack.fork(parent, "child");
        stack.record(child, captured(1, 1));
        stack.record(child, captured(2, 0));

        assert_eq!(stack.get(parent).unwrap(), &before);
        assert_eq!(stack.get(child).unwrap().len(), 2);
        assert_eq!(stack.get(child).unwrap().parent(), Some(parent));
    }

    #[test]
    fn test_sibling_forks_do_not_see_each_other() {
        let mut stack = ContextStack::new("root");
        let root = stack.root();
        stack.record(root, captured(1, 0));

        let left = stack.fork(root, "left");
        let right = stack.fork(root, "right");
        stack.record(left, captured(1, 1));

        assert_eq!(descriptions(&stack, right), vec!["root", "right"]);
        assert_eq!(stack.transaction_count(left, ChainSelector(1)), 2);
        assert_eq!(stack.transaction_count(right, ChainSelector(1)), 1);
    }

    #[test]
    fn test_transactions_are_collected_oldest_first() {
        let mut stack = ContextStack::new("a");
        let a = stack.root();
        stack.record(a, captured(1, 0));
        stack.record(a, captured(2, 0));
        let b = stack.fork(a, "b");
        stack.record(b, captured(1, 1));
        stack.record(b, captured(1, 2));

        let all = stack.transactions(b);
        let nonces: Vec<u64> = all[&ChainSelector(1)].iter().map(|t| t.nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
        assert_eq!(all[&ChainSelector(2)].len(), 1);
        assert_eq!(stack.transaction_count(b, ChainSelector(3)), 0);
    }
}
