use std::collections::BTreeMap;

use alloy_primitives::{B256, U256};
use serde::Serialize;

use crate::contract::{EventPayload, events};
use crate::error::WalletError;

/// A mined, successful contract call
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedTransaction {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// Gas limit the transaction was submitted with
    pub gas_limit: u64,
    pub events: BTreeMap<String, EventPayload>,
}

/// Normalized result of a contract action. Actions never return anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOutcome {
    Confirmed(ConfirmedTransaction),
    Failed(WalletError),
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionOutcome::Confirmed(_))
    }

    pub fn transaction_hash(&self) -> Option<B256> {
        match self {
            TransactionOutcome::Confirmed(tx) => Some(tx.transaction_hash),
            TransactionOutcome::Failed(_) => None,
        }
    }

    pub fn block_number(&self) -> Option<u64> {
        match self {
            TransactionOutcome::Confirmed(tx) => Some(tx.block_number),
            TransactionOutcome::Failed(_) => None,
        }
    }

    pub fn event(&self, name: &str) -> Option<&EventPayload> {
        match self {
            TransactionOutcome::Confirmed(tx) => tx.events.get(name),
            TransactionOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&WalletError> {
        match self {
            TransactionOutcome::Confirmed(_) => None,
            TransactionOutcome::Failed(err) => Some(err),
        }
    }

    /// Id of the parcel created by a registration, taken from `LandRegistered`
    pub fn registered_land_id(&self) -> Option<U256> {
        self.event(events::LAND_REGISTERED)
            .and_then(|payload| payload.uint("landId"))
    }

    pub fn summary(&self) -> OutcomeSummary {
        match self {
            TransactionOutcome::Confirmed(tx) => OutcomeSummary {
                success: true,
                transaction_hash: Some(tx.transaction_hash.to_string()),
                block_number: Some(tx.block_number),
                events: tx
                    .events
                    .iter()
                    .map(|(name, payload)| (name.clone(), payload.display_fields()))
                    .collect(),
                error: None,
            },
            TransactionOutcome::Failed(err) => OutcomeSummary {
                success: false,
                transaction_hash: None,
                block_number: None,
                events: BTreeMap::new(),
                error: Some(err.message()),
            },
        }
    }
}

/// Serializable view of an outcome, shaped like the `{success, transactionHash, error}`
/// objects the web client hands back to its callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
