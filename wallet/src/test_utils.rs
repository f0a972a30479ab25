use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256, Bytes, U256, address};
use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use crate::backend::AddressRecorder;
use crate::contract::{LandRegistryContract, events};
use crate::error::{ProviderError, WalletError};
use crate::notifier::{Banner, BannerId, ConnectionView, UiSink};
use crate::provider::{
    ChainId, ProviderEvent, ReceiptLog, TransactionReceipt, TransactionRequest, WalletProvider,
};

pub const TEST_CONTRACT: Address = address!("322D4Ab5baC728982Fb228CC37f527b599817836");
pub const ALICE: Address = address!("ABC0000000000000000000000000000000000001");
pub const BOB: Address = address!("B0B0000000000000000000000000000000000002");

/// A provider request as observed by [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    RequestAccounts,
    Accounts,
    ChainId,
    EstimateGas(TransactionRequest),
    SendTransaction(TransactionRequest),
    Call(TransactionRequest),
}

/// Scriptable provider recording every request it receives
pub struct MockProvider {
    calls: Mutex<Vec<ProviderCall>>,
    accounts: Mutex<Result<Vec<Address>, ProviderError>>,
    authorized: Mutex<Result<Vec<Address>, ProviderError>>,
    chain_id: Mutex<ChainId>,
    estimate: Mutex<Result<u64, ProviderError>>,
    receipt: Mutex<Result<TransactionReceipt, ProviderError>>,
    call_output: Mutex<Result<Bytes, ProviderError>>,
    hold_submissions: Mutex<bool>,
    events: Mutex<Option<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            accounts: Mutex::new(Ok(Vec::new())),
            authorized: Mutex::new(Ok(Vec::new())),
            chain_id: Mutex::new(1),
            estimate: Mutex::new(Ok(100_000)),
            receipt: Mutex::new(Ok(receipt(B256::repeat_byte(0x01), 1, Vec::new()))),
            call_output: Mutex::new(Ok(Bytes::new())),
            hold_submissions: Mutex::new(false),
            events: Mutex::new(None),
        }
    }
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Accounts returned by `eth_accounts`
    pub fn set_accounts(&self, accounts: Result<Vec<Address>, ProviderError>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    /// Result of `eth_requestAccounts`; a successful authorization also becomes
    /// the `eth_accounts` answer
    pub fn set_authorization(&self, result: Result<Vec<Address>, ProviderError>) {
        *self.authorized.lock().unwrap() = result;
    }

    pub fn set_chain_id(&self, chain_id: ChainId) {
        *self.chain_id.lock().unwrap() = chain_id;
    }

    pub fn set_estimate(&self, estimate: Result<u64, ProviderError>) {
        *self.estimate.lock().unwrap() = estimate;
    }

    pub fn set_receipt(&self, receipt: Result<TransactionReceipt, ProviderError>) {
        *self.receipt.lock().unwrap() = receipt;
    }

    pub fn set_call_output(&self, output: Result<Bytes, ProviderError>) {
        *self.call_output.lock().unwrap() = output;
    }

    /// Makes `send_transaction` wait forever, as if the signing prompt stayed open
    pub fn hold_submissions(&self) {
        *self.hold_submissions.lock().unwrap() = true;
    }

    /// Pushes a notification to the subscriber; returns false if nobody subscribed
    pub fn emit(&self, event: ProviderEvent) -> bool {
        self.events
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Closes the notification channel
    pub fn close_events(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.record(ProviderCall::RequestAccounts);
        let result = self.authorized.lock().unwrap().clone();
        if let Ok(accounts) = &result {
            *self.accounts.lock().unwrap() = Ok(accounts.clone());
        }
        result
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.record(ProviderCall::Accounts);
        self.accounts.lock().unwrap().clone()
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        self.record(ProviderCall::ChainId);
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ProviderError> {
        self.record(ProviderCall::EstimateGas(tx.clone()));
        self.estimate.lock().unwrap().clone()
    }

    async fn send_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> Result<TransactionReceipt, ProviderError> {
        self.record(ProviderCall::SendTransaction(tx.clone()));
        let hold = *self.hold_submissions.lock().unwrap();
        if hold {
            std::future::pending::<()>().await;
        }
        self.receipt.lock().unwrap().clone()
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, ProviderError> {
        self.record(ProviderCall::Call(tx.clone()));
        self.call_output.lock().unwrap().clone()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        rx
    }
}

pub fn receipt(hash: B256, block_number: u64, logs: Vec<ReceiptLog>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash,
        block_number,
        status: true,
        logs,
    }
}

/// A `LandRegistered(landId, owner, timestamp)` log as the contract would emit it
pub fn land_registered_log(
    contract: &LandRegistryContract,
    land_id: U256,
    owner: Address,
    timestamp: u64,
) -> ReceiptLog {
    let selector = contract
        .event(events::LAND_REGISTERED)
        .map(|event| event.selector())
        .unwrap_or_default();
    ReceiptLog {
        address: contract.address(),
        topics: vec![
            selector,
            B256::from(land_id.to_be_bytes::<32>()),
            owner.into_word(),
        ],
        data: Bytes::from(U256::from(timestamp).to_be_bytes::<32>().to_vec()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Connection(ConnectionView),
    Show(Banner),
    Fade(BannerId),
    Remove(BannerId),
}

/// UI sink keeping every rendering command in order
#[derive(Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<UiCommand>>,
}

impl RecordingSink {
    pub fn commands(&self) -> Vec<UiCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn last_connection(&self) -> Option<ConnectionView> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|command| match command {
                UiCommand::Connection(view) => Some(view.clone()),
                _ => None,
            })
    }

    pub fn banners(&self) -> Vec<Banner> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter_map(|command| match command {
                UiCommand::Show(banner) => Some(banner.clone()),
                _ => None,
            })
            .collect()
    }
}

impl UiSink for RecordingSink {
    fn render_connection(&self, view: &ConnectionView) {
        self.commands
            .lock()
            .unwrap()
            .push(UiCommand::Connection(view.clone()));
    }

    fn show_banner(&self, banner: &Banner) {
        self.commands
            .lock()
            .unwrap()
            .push(UiCommand::Show(banner.clone()));
    }

    fn fade_banner(&self, id: BannerId) {
        self.commands.lock().unwrap().push(UiCommand::Fade(id));
    }

    fn remove_banner(&self, id: BannerId) {
        self.commands.lock().unwrap().push(UiCommand::Remove(id));
    }
}

/// Address recorder that remembers what it was asked to record
#[derive(Default)]
pub struct RecordingAddressRecorder {
    recorded: Mutex<Vec<Address>>,
    failure: Option<String>,
    recorded_signal: Notify,
}

impl RecordingAddressRecorder {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<Address> {
        self.recorded.lock().unwrap().clone()
    }

    /// Waits until at least `count` addresses were recorded
    pub async fn wait_for(&self, count: usize) -> Vec<Address> {
        loop {
            let notified = self.recorded_signal.notified();
            let recorded = self.recorded();
            if recorded.len() >= count {
                return recorded;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl AddressRecorder for RecordingAddressRecorder {
    async fn record(&self, address: Address) -> Result<(), WalletError> {
        self.recorded.lock().unwrap().push(address);
        self.recorded_signal.notify_waiters();
        match &self.failure {
            Some(message) => Err(WalletError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}
