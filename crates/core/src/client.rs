//! Network client contract consumed by the deployer group.

use std::future::Future;

use alloy_core::primitives::{Address, Bytes, TxHash};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: u64,
    /// `false` when the transaction reverted.
    pub success: bool,
}

/// Operations the group needs from a network.
///
/// Errors are collaborator errors; the group maps them onto [`crate::EnactError`].
pub trait ChainClient: Send + Sync {
    /// Pending nonce of `account`.
    fn pending_nonce(&self, account: Address) -> impl Future<Output = Result<u64>> + Send;

    /// Broadcast an EIP-2718 encoded transaction.
    fn send_raw_transaction(&self, raw: Bytes) -> impl Future<Output = Result<TxHash>> + Send;

    /// Block until the transaction is mined and return its receipt.
    fn wait_for_receipt(&self, hash: TxHash) -> impl Future<Output = Result<TxReceipt>> + Send;

    /// Current operation count of a proposer multisig.
    fn op_count(&self, mcm: Address) -> impl Future<Output = Result<u64>> + Send;
}
