//! JSON-RPC backed provider.
//!
//! Talks to a node whose accounts are unlocked (a local dev chain, or a signer
//! proxy in front of one) over HTTP. Such nodes have no push channel, so account
//! and chain changes are discovered by polling and republished as
//! [`ProviderEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U64, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::provider::{
    ChainId, ProviderEvent, ReceiptLog, TransactionReceipt, TransactionRequest, WalletProvider,
};

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    /// Interval between account/chain polls and between receipt polls
    pub poll_interval: Duration,
    /// Timeout of a single HTTP request
    pub request_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl From<RpcErrorObject> for ProviderError {
    fn from(err: RpcErrorObject) -> Self {
        // Some nodes only put the revert reason in `data`
        let message = match err.data {
            Some(Value::String(data)) if !err.message.contains(&data) => {
                format!("{}: {data}", err.message)
            }
            _ => err.message,
        };
        ProviderError::new(err.code, message)
    }
}

/// Transaction object as expected by `eth_estimateGas`, `eth_sendTransaction` and `eth_call`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: Bytes,
    #[serde(skip_serializing_if = "U256::is_zero")]
    value: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas: Option<U64>,
}

impl From<&TransactionRequest> for RpcTransaction {
    fn from(tx: &TransactionRequest) -> Self {
        Self {
            from: tx.from,
            to: tx.to,
            data: tx.data.clone(),
            value: tx.value,
            gas: tx.gas.map(U64::from),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: Option<U64>,
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
}

impl From<RpcReceipt> for TransactionReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.to::<u64>()).unwrap_or_default(),
            // Pre-Byzantium receipts carry no status
            status: receipt.status.is_none_or(|s| !s.is_zero()),
            logs: receipt
                .logs
                .into_iter()
                .map(|log| ReceiptLog {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        }
    }
}

struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("RPC request #{id}: {method}");

        let response = self
            .http
            .post(&self.url)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("{method} request failed: {e}")))?;

        let status = response.status();
        let body: RpcResponse = response.json().await.map_err(|e| {
            ProviderError::transport(format!("Invalid {method} response ({status}): {e}"))
        })?;

        if let Some(err) = body.error {
            debug!("RPC request #{id} failed: {} {}", err.code, err.message);
            return Err(err.into());
        }
        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|e| ProviderError::transport(format!("Unexpected {method} result: {e}")))
    }
}

pub struct RpcProvider {
    client: Arc<RpcClient>,
    poll_interval: Duration,
}

impl RpcProvider {
    pub fn new(config: RpcConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(RpcClient {
                http,
                url: config.url,
                next_id: AtomicU64::new(1),
            }),
            poll_interval: config.poll_interval,
        })
    }

    pub fn url(&self) -> &str {
        &self.client.url
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TransactionReceipt, ProviderError> {
        loop {
            let receipt: Option<RpcReceipt> = self
                .client
                .request("eth_getTransactionReceipt", json!([hash]))
                .await?;
            match receipt {
                Some(receipt) if receipt.block_number.is_some() => return Ok(receipt.into()),
                _ => {
                    debug!("Transaction {hash} pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl WalletProvider for RpcProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        match self.client.request("eth_requestAccounts", json!([])).await {
            Err(e) if e.is_method_not_found() => {
                debug!("Node has no eth_requestAccounts, using eth_accounts");
                self.accounts().await
            }
            other => other,
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.client.request("eth_accounts", json!([])).await
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        let chain_id: U64 = self.client.request("eth_chainId", json!([])).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ProviderError> {
        let gas: U64 = self
            .client
            .request("eth_estimateGas", json!([RpcTransaction::from(tx)]))
            .await?;
        Ok(gas.to::<u64>())
    }

    async fn send_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> Result<TransactionReceipt, ProviderError> {
        let hash: B256 = self
            .client
            .request("eth_sendTransaction", json!([RpcTransaction::from(tx)]))
            .await?;
        debug!("Transaction {hash} submitted");
        self.wait_for_receipt(hash).await
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, ProviderError> {
        self.client
            .request("eth_call", json!([RpcTransaction::from(tx), "latest"]))
            .await
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(poll_changes(
            Arc::clone(&self.client),
            self.poll_interval,
            tx,
        ));
        rx
    }
}

/// Publishes account and chain changes until the receiver goes away.
///
/// The first observation only sets the baseline; the session manager reads the
/// initial accounts itself.
async fn poll_changes(
    client: Arc<RpcClient>,
    interval: Duration,
    events: mpsc::UnboundedSender<ProviderEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut known_accounts: Option<Vec<Address>> = None;
    let mut known_chain: Option<U64> = None;

    loop {
        ticker.tick().await;
        if events.is_closed() {
            break;
        }

        match client.request::<U64>("eth_chainId", json!([])).await {
            Ok(chain) => {
                if known_chain.is_some_and(|known| known != chain)
                    && events
                        .send(ProviderEvent::NetworkChanged(chain.to::<u64>()))
                        .is_err()
                {
                    break;
                }
                known_chain = Some(chain);
            }
            Err(e) => warn!("Polling eth_chainId failed: {e}"),
        }

        match client.request::<Vec<Address>>("eth_accounts", json!([])).await {
            Ok(accounts) => {
                if known_accounts.as_ref().is_some_and(|known| *known != accounts)
                    && events
                        .send(ProviderEvent::AccountsChanged(accounts.clone()))
                        .is_err()
                {
                    break;
                }
                known_accounts = Some(accounts);
            }
            Err(e) => warn!("Polling eth_accounts failed: {e}"),
        }
    }
}
