//! `RpcProvider` against an in-process JSON-RPC node.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes};
use axum::{Json, Router, extract::State, routing::post};
use land_wallet::provider::{ProviderEvent, TransactionRequest, WalletProvider};
use land_wallet::rpc::{RpcConfig, RpcProvider};
use land_wallet::test_utils::{ALICE, BOB, TEST_CONTRACT};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::mpsc::error::TryRecvError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Scripted dev node answering the handful of methods the provider uses
struct StubNode {
    accounts: Vec<Address>,
    chain_id: u64,
    request_accounts_error: Option<(i64, &'static str)>,
    /// Answers to `eth_getTransactionReceipt` before the mined receipt
    receipts: VecDeque<Value>,
    calls: Vec<String>,
}

impl Default for StubNode {
    fn default() -> Self {
        Self {
            accounts: vec![ALICE],
            chain_id: 1,
            request_accounts_error: None,
            receipts: VecDeque::new(),
            calls: Vec::new(),
        }
    }
}

type SharedNode = Arc<Mutex<StubNode>>;

fn tx_hash() -> B256 {
    B256::repeat_byte(0x42)
}

fn answer(node: &mut StubNode, method: &str) -> Result<Value, (i64, &'static str)> {
    node.calls.push(method.to_string());
    match method {
        "eth_requestAccounts" => match node.request_accounts_error {
            Some(err) => Err(err),
            None => Ok(json!(node.accounts)),
        },
        "eth_accounts" => Ok(json!(node.accounts)),
        "eth_chainId" => Ok(json!(format!("{:#x}", node.chain_id))),
        "eth_estimateGas" => Ok(json!("0x5208")),
        "eth_sendTransaction" => Ok(json!(tx_hash())),
        "eth_getTransactionReceipt" => Ok(node.receipts.pop_front().unwrap_or_else(|| {
            json!({
                "transactionHash": tx_hash(),
                "blockNumber": "0x2a",
                "status": "0x1",
                "logs": [],
            })
        })),
        _ => Err((-32601, "method not found")),
    }
}

async fn rpc(State(node): State<SharedNode>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default();
    let response = match answer(&mut node.lock().unwrap(), method) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message },
        }),
    };
    Json(response)
}

async fn start_node(node: StubNode) -> (SharedNode, RpcProvider) {
    let node = Arc::new(Mutex::new(node));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", post(rpc)).with_state(node.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let provider = RpcProvider::new(
        RpcConfig::new(format!("http://{addr}"))
            .with_poll_interval(POLL_INTERVAL)
            .with_request_timeout(Duration::from_secs(5)),
    )
    .unwrap();
    (node, provider)
}

fn calls(node: &SharedNode) -> Vec<String> {
    node.lock().unwrap().calls.clone()
}

fn count(node: &SharedNode, method: &str) -> usize {
    calls(node).iter().filter(|call| *call == method).count()
}

#[tokio::test]
async fn test_request_accounts_uses_node_method() {
    let (node, provider) = start_node(StubNode::default()).await;

    assert_eq!(provider.request_accounts().await, Ok(vec![ALICE]));
    assert_eq!(calls(&node), vec!["eth_requestAccounts"]);
}

#[tokio::test]
async fn test_request_accounts_falls_back_on_missing_method() {
    let (node, provider) = start_node(StubNode {
        request_accounts_error: Some((-32601, "the method eth_requestAccounts does not exist")),
        ..StubNode::default()
    })
    .await;

    assert_eq!(provider.request_accounts().await, Ok(vec![ALICE]));
    assert_eq!(calls(&node), vec!["eth_requestAccounts", "eth_accounts"]);
}

#[tokio::test]
async fn test_request_accounts_rejection_is_not_retried() {
    let (node, provider) = start_node(StubNode {
        request_accounts_error: Some((4001, "User rejected the request.")),
        ..StubNode::default()
    })
    .await;

    let err = provider.request_accounts().await.unwrap_err();
    assert!(err.is_user_rejection());
    assert_eq!(calls(&node), vec!["eth_requestAccounts"]);
}

#[tokio::test]
async fn test_polling_publishes_only_changes() {
    let (node, provider) = start_node(StubNode::default()).await;
    let mut events = provider.subscribe();

    // The first poll only records the baseline
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while count(&node, "eth_accounts") == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(POLL_INTERVAL * 5).await;
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert!(count(&node, "eth_chainId") > 1);

    node.lock().unwrap().chain_id = 5;
    assert_eq!(
        tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap(),
        Some(ProviderEvent::NetworkChanged(5))
    );

    node.lock().unwrap().accounts = vec![BOB, ALICE];
    assert_eq!(
        tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap(),
        Some(ProviderEvent::AccountsChanged(vec![BOB, ALICE]))
    );

    node.lock().unwrap().accounts = Vec::new();
    assert_eq!(
        tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap(),
        Some(ProviderEvent::AccountsChanged(Vec::new()))
    );

    tokio::time::sleep(POLL_INTERVAL * 5).await;
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_send_waits_until_receipt_is_mined() {
    let (node, provider) = start_node(StubNode {
        receipts: VecDeque::from([
            Value::Null,
            json!({
                "transactionHash": tx_hash(),
                "blockNumber": null,
                "status": null,
                "logs": [],
            }),
        ]),
        ..StubNode::default()
    })
    .await;

    let tx = TransactionRequest::new(TEST_CONTRACT, Bytes::new())
        .with_from(ALICE)
        .with_gas(25_200);
    let receipt = provider.send_transaction(&tx).await.unwrap();

    assert_eq!(receipt.transaction_hash, tx_hash());
    assert_eq!(receipt.block_number, 42);
    assert!(receipt.status);
    assert_eq!(count(&node, "eth_sendTransaction"), 1);
    assert_eq!(count(&node, "eth_getTransactionReceipt"), 3);
}

#[tokio::test]
async fn test_estimate_and_chain_id() {
    let (_node, provider) = start_node(StubNode {
        chain_id: 11155111,
        ..StubNode::default()
    })
    .await;

    let tx = TransactionRequest::new(TEST_CONTRACT, Bytes::new()).with_from(ALICE);
    assert_eq!(provider.estimate_gas(&tx).await, Ok(21_000));
    assert_eq!(provider.chain_id().await, Ok(11155111));
}
