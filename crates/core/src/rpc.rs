//! JSON-RPC backed [`ChainClient`].

use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, TxHash, U64, U256, keccak256};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::{ChainClient, TxReceipt};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of receipt polls before giving up.
pub const DEFAULT_MAX_POLLS: usize = 90;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Receipt fields read from `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    block_number: U64,
    status: Option<U64>,
}

impl From<RpcReceipt> for TxReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number.to(),
            // Pre-byzantium receipts carry no status.
            success: receipt.status.is_none_or(|s| s == U64::from(1)),
        }
    }
}

/// Selector of `getOpCount()` on the proposer multisig.
fn get_op_count_selector() -> Bytes {
    Bytes::copy_from_slice(&keccak256("getOpCount()")[..4])
}

/// Decode a single ABI-encoded uint word.
fn decode_uint(data: &[u8]) -> anyhow::Result<u64> {
    if data.len() < 32 {
        anyhow::bail!("Expected a 32-byte word, got {} bytes", data.len());
    }
    let value = U256::from_be_slice(&data[..32]);
    if value > U256::from(u64::MAX) {
        anyhow::bail!("Value {} does not fit in u64", value);
    }
    Ok(value.to())
}

/// Client for one network's JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
    poll_interval: Duration,
    max_polls: usize,
}

impl RpcClient {
    pub fn new(url: Url) -> Result<Self, anyhow::Error> {
        Ok(Self {
            http: create_client()?,
            url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// Set how receipts are polled.
    pub fn receipt_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        json_rpc_call(&self.http, self.url.as_str(), method, params).await
    }
}

impl ChainClient for RpcClient {
    async fn pending_nonce(&self, account: Address) -> anyhow::Result<u64> {
        let nonce: U64 = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(account), serde_json::json!("pending")],
            )
            .await?;
        Ok(nonce.to())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<TxHash> {
        self.call("eth_sendRawTransaction", vec![serde_json::json!(raw)])
            .await
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> anyhow::Result<TxReceipt> {
        let fetch = || async move {
            let receipt: Option<RpcReceipt> = self
                .call("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
                .await?;
            receipt.context("Transaction not mined yet")
        };

        let receipt = fetch
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(self.max_polls),
            )
            .sleep(tokio::time::sleep)
            .notify(|err, _| {
                tracing::trace!(error = %err, hash = %hash, "Receipt not available, retrying...");
            })
            .await
            .with_context(|| format!("Timeout waiting for receipt of {}", hash))?;

        Ok(receipt.into())
    }

    async fn op_count(&self, mcm: Address) -> anyhow::Result<u64> {
        let output: Bytes = self
            .call(
                "eth_call",
                vec![
                    serde_json::json!({ "to": mcm, "data": get_op_count_selector() }),
                    serde_json::json!("latest"),
                ],
            )
            .await?;
        decode_uint(&output)
    }
}
