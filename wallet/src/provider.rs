//! Wallet provider abstraction.
//!
//! A provider is whatever holds the user's accounts and signs on their behalf: a
//! browser extension bridged into the host, or a development node with unlocked
//! accounts (see [`crate::rpc::RpcProvider`]). Everything in this crate talks to it
//! through [`WalletProvider`], and provider-side notifications arrive as
//! [`ProviderEvent`]s on a channel handed out by [`WalletProvider::subscribe`].

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// Chain identifier as reported by `eth_chainId`
pub type ChainId = u64;

/// Shared handle to the detected provider
pub type ProviderHandle = Arc<dyn WalletProvider>;

/// Notifications pushed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The set of authorized accounts changed; the first entry is the selected one
    AccountsChanged(Vec<Address>),
    /// The provider switched to another chain
    NetworkChanged(ChainId),
}

/// A contract call, used for estimation, submission and read-only calls alike
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    /// Payment attached to the call, in base units
    pub value: U256,
    /// Gas limit; left empty for estimation
    pub gas: Option<u64>,
}

impl TransactionRequest {
    pub fn new(to: Address, data: Bytes) -> Self {
        Self {
            from: None,
            to,
            data,
            value: U256::ZERO,
            gas: None,
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Log entry emitted while executing a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Mined transaction as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// `false` when execution reverted
    pub status: bool,
    pub logs: Vec<ReceiptLog>,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the user to authorize accounts (`eth_requestAccounts`). May prompt.
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Accounts already authorized, without prompting (`eth_accounts`)
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

    async fn chain_id(&self) -> Result<ChainId, ProviderError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ProviderError>;

    /// Signs and broadcasts `tx`, resolving once it is mined.
    async fn send_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> Result<TransactionReceipt, ProviderError>;

    /// Executes a read-only call against the latest block
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, ProviderError>;

    /// Opens the provider's notification channel
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent>;
}
