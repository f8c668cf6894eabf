//! Direct execution of captured transactions with the deployer key.

use crate::{ChainClient, DeploymentContext, EnactError, Environment, TxReceipt, error::Result};

/// Broadcasts captured transactions one at a time, waiting for each receipt.
pub struct DirectExecutor<'a, C> {
    env: &'a Environment<C>,
}

impl<'a, C: ChainClient> DirectExecutor<'a, C> {
    pub fn new(env: &'a Environment<C>) -> Self {
        Self { env }
    }

    /// Send every transaction of `contexts` in capture order.
    ///
    /// Stops at the first failure. Transactions confirmed before the failure
    /// stay on-chain.
    pub async fn execute(&self, contexts: &[DeploymentContext]) -> Result<Vec<TxReceipt>> {
        let mut receipts = Vec::new();

        for context in contexts {
            tracing::info!(
                description = %context.description,
                transactions = context.len(),
                "Executing deployment context"
            );

            for (selector, txs) in &context.transactions {
                let chain = self.env.chain(*selector)?;

                for tx in txs {
                    if !tx.is_signed() {
                        return Err(EnactError::Broadcast {
                            chain: *selector,
                            hash: tx.hash,
                            source: anyhow::anyhow!("transaction was captured without a signature"),
                        });
                    }

                    chain
                        .client
                        .send_raw_transaction(tx.raw.clone())
                        .await
                        .map_err(|source| EnactError::Broadcast {
                            chain: *selector,
                            hash: tx.hash,
                            source,
                        })?;

                    tracing::info!(chain = %selector, nonce = tx.nonce, hash = %tx.hash, "Transaction sent");

                    let receipt = chain.client.wait_for_receipt(tx.hash).await.map_err(|source| {
                        EnactError::Confirmation {
                            chain: *selector,
                            hash: tx.hash,
                            source,
                        }
                    })?;

                    if !receipt.success {
                        return Err(EnactError::Confirmation {
                            chain: *selector,
                            hash: tx.hash,
                            source: anyhow::anyhow!(
                                "transaction reverted in block {}",
                                receipt.block_number
                            ),
                        });
                    }

                    tracing::info!(
                        chain = %selector,
                        hash = %tx.hash,
                        block = receipt.block_number,
                        "Transaction confirmed"
                    );
                    receipts.push(receipt);
                }
            }
        }

        Ok(receipts)
    }
}
