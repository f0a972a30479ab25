//! Contract actions.
//!
//! Every state-changing action goes through the same two phases: estimate the gas
//! for the call with the session account as sender, then send the identical call
//! with the estimate padded by [`apply_safety_margin`]. Failures at any step come
//! back as [`TransactionOutcome::Failed`]; nothing is raised past this boundary.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::contract::{LandRecord, LandRegistryContract, methods};
use crate::error::WalletError;
use crate::gas::apply_safety_margin;
use crate::outcome::{ConfirmedTransaction, TransactionOutcome};
use crate::provider::{ProviderHandle, TransactionRequest};
use crate::session::Session;
use crate::units::{ETHER_EXPONENT, to_base_units};

/// Fields of a land parcel as entered by the user.
///
/// Values are sent to the contract as-is; only `price` is converted from ether to
/// wei. Validation belongs to the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandInput {
    pub title: String,
    pub location: String,
    pub description: String,
    /// Decimal price in ether, e.g. `"1.5"`
    pub price: String,
    pub for_sale: bool,
}

pub struct ActionDispatcher {
    provider: Option<ProviderHandle>,
    contract: LandRegistryContract,
    exponent: u8,
    resets: watch::Receiver<u64>,
}

impl ActionDispatcher {
    pub fn new(provider: Option<ProviderHandle>, contract: LandRegistryContract) -> Self {
        // Never changes unless replaced by a session manager's signal
        let (_, resets) = watch::channel(0);
        Self {
            provider,
            contract,
            exponent: ETHER_EXPONENT,
            resets,
        }
    }

    /// Cancels pending actions whenever `resets` changes
    pub fn with_reset_signal(mut self, resets: watch::Receiver<u64>) -> Self {
        self.resets = resets;
        self
    }

    pub fn with_unit_exponent(mut self, exponent: u8) -> Self {
        self.exponent = exponent;
        self
    }

    pub fn contract(&self) -> &LandRegistryContract {
        &self.contract
    }

    pub async fn register_land(&self, session: &Session, land: &LandInput) -> TransactionOutcome {
        let args = self.price(&land.price).map(|price| {
            vec![
                DynSolValue::String(land.title.clone()),
                DynSolValue::String(land.location.clone()),
                DynSolValue::String(land.description.clone()),
                DynSolValue::Uint(price, 256),
                DynSolValue::Bool(land.for_sale),
            ]
        });
        self.execute("Register land", session, methods::REGISTER_LAND, args, U256::ZERO)
            .await
    }

    pub async fn update_land(
        &self,
        session: &Session,
        land_id: U256,
        land: &LandInput,
    ) -> TransactionOutcome {
        let args = self.price(&land.price).map(|price| {
            vec![
                DynSolValue::Uint(land_id, 256),
                DynSolValue::String(land.title.clone()),
                DynSolValue::String(land.location.clone()),
                DynSolValue::String(land.description.clone()),
                DynSolValue::Uint(price, 256),
                DynSolValue::Bool(land.for_sale),
            ]
        });
        self.execute("Update land", session, methods::UPDATE_LAND, args, U256::ZERO)
            .await
    }

    /// Buys `land_id`, attaching `price` (in ether) as payment
    pub async fn buy_land(&self, session: &Session, land_id: U256, price: &str) -> TransactionOutcome {
        let value = match self.price(price) {
            Ok(value) => value,
            Err(e) => return self.fail("Buy land", session, e),
        };
        let args = Ok(vec![DynSolValue::Uint(land_id, 256)]);
        self.execute("Buy land", session, methods::BUY_LAND, args, value)
            .await
    }

    pub async fn change_land_price(
        &self,
        session: &Session,
        land_id: U256,
        new_price: &str,
    ) -> TransactionOutcome {
        let args = self.price(new_price).map(|price| {
            vec![
                DynSolValue::Uint(land_id, 256),
                DynSolValue::Uint(price, 256),
            ]
        });
        self.execute(
            "Change land price",
            session,
            methods::CHANGE_LAND_PRICE,
            args,
            U256::ZERO,
        )
        .await
    }

    pub async fn toggle_for_sale(
        &self,
        session: &Session,
        land_id: U256,
        for_sale: bool,
    ) -> TransactionOutcome {
        let args = Ok(vec![
            DynSolValue::Uint(land_id, 256),
            DynSolValue::Bool(for_sale),
        ]);
        self.execute(
            "Toggle for sale",
            session,
            methods::TOGGLE_FOR_SALE,
            args,
            U256::ZERO,
        )
        .await
    }

    pub async fn land(&self, land_id: U256) -> Result<LandRecord, WalletError> {
        let values = self
            .read(methods::LANDS, &[DynSolValue::Uint(land_id, 256)])
            .await?;
        LandRecord::from_values(&values)
    }

    pub async fn lands_by_owner(&self, owner: Address) -> Result<Vec<U256>, WalletError> {
        let values = self
            .read(methods::GET_LANDS_BY_OWNER, &[DynSolValue::Address(owner)])
            .await?;
        let Some(DynSolValue::Array(ids)) = values.into_iter().next() else {
            return Err(WalletError::Abi(
                "getLandsByOwner did not return an array".to_string(),
            ));
        };
        ids.iter()
            .map(|id| {
                id.as_uint().map(|(u, _)| u).ok_or_else(|| {
                    WalletError::Abi("getLandsByOwner returned a non-integer id".to_string())
                })
            })
            .collect()
    }

    pub async fn transaction_count(&self) -> Result<U256, WalletError> {
        let values = self.read(methods::GET_TRANSACTION_COUNT, &[]).await?;
        values
            .first()
            .and_then(|v| v.as_uint())
            .map(|(u, _)| u)
            .ok_or_else(|| {
                WalletError::Abi("getTransactionCount did not return an integer".to_string())
            })
    }

    fn price(&self, price: &str) -> Result<U256, WalletError> {
        to_base_units(price, self.exponent)
    }

    async fn read(
        &self,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, WalletError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(WalletError::ProviderUnavailable)?;
        let data = self.contract.encode_call(method, args)?;
        let output = provider
            .call(&TransactionRequest::new(self.contract.address(), data))
            .await
            .map_err(|e| WalletError::Provider(e.message))?;
        self.contract.decode_output(method, &output)
    }

    fn fail(&self, action: &str, session: &Session, err: WalletError) -> TransactionOutcome {
        // The session check always wins so no work is reported for a missing wallet
        let err = if session.is_active() {
            err
        } else {
            WalletError::NotConnected
        };
        error!("{action} failed: {err}");
        TransactionOutcome::Failed(err)
    }

    async fn execute(
        &self,
        action: &str,
        session: &Session,
        method: &str,
        args: Result<Vec<DynSolValue>, WalletError>,
        value: U256,
    ) -> TransactionOutcome {
        let Some(sender) = session.account() else {
            return self.fail(action, session, WalletError::NotConnected);
        };
        let Some(provider) = self.provider.as_ref() else {
            return self.fail(action, session, WalletError::ProviderUnavailable);
        };
        let data = match args.and_then(|args| self.contract.encode_call(method, &args)) {
            Ok(data) => data,
            Err(e) => return self.fail(action, session, e),
        };
        let request = TransactionRequest::new(self.contract.address(), data)
            .with_from(sender)
            .with_value(value);

        let mut resets = self.resets.clone();
        resets.borrow_and_update();

        let outcome = tokio::select! {
            result = self.estimate_and_submit(provider, request) => result,
            _ = wait_for_reset(resets) => Err(WalletError::NetworkChanged),
        };

        match outcome {
            Ok(confirmed) => {
                info!(
                    "{action} confirmed: tx {} in block {}",
                    confirmed.transaction_hash, confirmed.block_number
                );
                TransactionOutcome::Confirmed(confirmed)
            }
            Err(e) => self.fail(action, session, e),
        }
    }

    async fn estimate_and_submit(
        &self,
        provider: &ProviderHandle,
        request: TransactionRequest,
    ) -> Result<ConfirmedTransaction, WalletError> {
        let estimate = provider
            .estimate_gas(&request)
            .await
            .map_err(WalletError::from_estimate)?;
        let gas_limit = apply_safety_margin(estimate);
        debug!("Gas estimate {estimate}, submitting with limit {gas_limit}");

        let receipt = provider
            .send_transaction(&request.with_gas(gas_limit))
            .await
            .map_err(WalletError::from_submit)?;
        if !receipt.status {
            return Err(WalletError::SubmissionFailed(format!(
                "Transaction {} reverted in block {}",
                receipt.transaction_hash, receipt.block_number
            )));
        }

        Ok(ConfirmedTransaction {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_limit,
            events: self.contract.decode_events(&receipt.logs),
        })
    }
}

/// Resolves on the next reset; never resolves once the signal's sender is gone
async fn wait_for_reset(mut resets: watch::Receiver<u64>) {
    if resets.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}
