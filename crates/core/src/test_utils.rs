//! In-memory [`ChainClient`] used by unit tests.

use alloy_core::primitives::{Address, Bytes, TxHash, keccak256};
use anyhow::Result;
use parking_lot::Mutex;

use crate::{ChainClient, TxReceipt};

/// Network interaction observed by a [`MockClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    Sent(TxHash),
    Confirmed(TxHash),
}

#[derive(Debug, Default)]
pub struct MockClient {
    pub nonce: u64,
    pub op_count: u64,
    pub fail_nonce: bool,
    pub fail_op_count: bool,
    /// Zero-based index of the broadcast that should be rejected.
    pub reject_send_at: Option<usize>,
    /// Zero-based index of the transaction that should revert.
    pub revert_at: Option<usize>,
    nonce_calls: Mutex<usize>,
    op_count_calls: Mutex<usize>,
    events: Mutex<Vec<MockEvent>>,
    sent: Mutex<Vec<Bytes>>,
}

impl MockClient {
    pub fn with_nonce(nonce: u64) -> Self {
        Self {
            nonce,
            ..Default::default()
        }
    }

    pub fn with_op_count(op_count: u64) -> Self {
        Self {
            op_count,
            ..Default::default()
        }
    }

    pub fn failing_op_count() -> Self {
        Self {
            fail_op_count: true,
            ..Default::default()
        }
    }

    pub fn failing_nonce() -> Self {
        Self {
            fail_nonce: true,
            ..Default::default()
        }
    }

    pub fn rejecting_send_at(index: usize) -> Self {
        Self {
            reject_send_at: Some(index),
            ..Default::default()
        }
    }

    pub fn reverting_at(index: usize) -> Self {
        Self {
            revert_at: Some(index),
            ..Default::default()
        }
    }

    pub fn nonce_calls(&self) -> usize {
        *self.nonce_calls.lock()
    }

    pub fn op_count_calls(&self) -> usize {
        *self.op_count_calls.lock()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().clone()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }
}

impl ChainClient for MockClient {
    async fn pending_nonce(&self, _account: Address) -> Result<u64> {
        *self.nonce_calls.lock() += 1;
        if self.fail_nonce {
            anyhow::bail!("connection refused");
        }
        Ok(self.nonce)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash> {
        let mut sent = self.sent.lock();
        if self.reject_send_at == Some(sent.len()) {
            anyhow::bail!("nonce too low");
        }
        let hash = keccak256(&raw);
        sent.push(raw);
        self.events.lock().push(MockEvent::Sent(hash));
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        let mut events = self.events.lock();
        let mined = events
            .iter()
            .filter(|e| matches!(e, MockEvent::Confirmed(_)))
            .count();
        events.push(MockEvent::Confirmed(hash));
        Ok(TxReceipt {
            hash,
            block_number: mined as u64 + 1,
            success: self.revert_at != Some(mined),
        })
    }

    async fn op_count(&self, _mcm: Address) -> Result<u64> {
        *self.op_count_calls.lock() += 1;
        if self.fail_op_count {
            anyhow::bail!("execution reverted");
        }
        Ok(self.op_count)
    }
}
