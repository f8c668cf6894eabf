//! Base signers wrapped by the recording transactor.

use std::str::FromStr;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_core::primitives::Address;
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

use crate::SignedTransaction;

/// Produces a signed transaction for a fully populated EIP-1559 request.
pub trait TransactionSigner: Send + Sync {
    /// The account transactions are sent from.
    fn address(&self) -> Address;

    /// Sign the transaction. The nonce and chain id are already set.
    fn sign_transaction(&self, tx: TxEip1559) -> Result<SignedTransaction>;
}

/// Signer backed by a local secp256k1 private key.
#[derive(Debug, Clone)]
pub struct LocalKeySigner {
    inner: PrivateKeySigner,
}

impl LocalKeySigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    /// Parse a hex-encoded private key, with or without `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self> {
        let inner = PrivateKeySigner::from_str(key.trim()).context("Invalid private key")?;
        Ok(Self { inner })
    }

    /// Generate a throwaway key.
    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }
}

impl TransactionSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn sign_transaction(&self, mut tx: TxEip1559) -> Result<SignedTransaction> {
        let signature = self
            .inner
            .sign_transaction_sync(&mut tx)
            .context("Local key failed to sign transaction")?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        })
    }
}

/// Signer standing in for a contract account (the timelock) in proposal mode.
///
/// Nothing is signed: the returned hash is the signing hash and the payload is
/// empty, since proposal-mode transactions are never broadcast.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedSigner {
    from: Address,
}

impl SimulatedSigner {
    pub fn new(from: Address) -> Self {
        Self { from }
    }
}

impl TransactionSigner for SimulatedSigner {
    fn address(&self) -> Address {
        self.from
    }

    fn sign_transaction(&self, tx: TxEip1559) -> Result<SignedTransaction> {
        Ok(SignedTransaction {
            hash: tx.signature_hash(),
            raw: Default::default(),
        })
    }
}
