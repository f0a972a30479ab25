//! Wallet integration for the Land Registry contract.
//!
//! - [`session::SessionManager`] tracks the account authorized by the wallet provider
//!   and follows its account and network notifications.
//! - [`dispatcher::ActionDispatcher`] turns land actions into contract calls using an
//!   estimate-then-submit flow and reports normalized [`outcome::TransactionOutcome`]s.
//! - [`notifier::Notifier`] renders connection state and result banners to a
//!   [`notifier::UiSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use land_wallet::prelude::*;
//!
//! let provider: ProviderHandle = Arc::new(RpcProvider::new(RpcConfig::default())?);
//! let mut sessions = SessionManager::new(Some(provider.clone()), Notifier::new(sink));
//! sessions.initialize().await?;
//! sessions.connect().await?;
//!
//! let dispatcher = ActionDispatcher::new(
//!     Some(provider),
//!     LandRegistryContract::embedded(DEFAULT_CONTRACT_ADDRESS)?,
//! )
//! .with_reset_signal(sessions.reset_signal());
//! let outcome = dispatcher.register_land(&sessions.session(), &land).await;
//! ```

pub mod backend;
pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod gas;
pub mod notifier;
pub mod outcome;
pub mod provider;
pub mod rpc;
pub mod session;
pub mod test_utils;
pub mod units;

pub use error::{ProviderError, WalletError};

pub mod prelude {
    pub use crate::backend::{AddressRecorder, HttpAddressRecorder};
    pub use crate::contract::{DEFAULT_CONTRACT_ADDRESS, LandRecord, LandRegistryContract};
    pub use crate::dispatcher::{ActionDispatcher, LandInput};
    pub use crate::error::{ProviderError, WalletError};
    pub use crate::notifier::{ConnectionView, Notifier, Severity, UiSink};
    pub use crate::outcome::{OutcomeSummary, TransactionOutcome};
    pub use crate::provider::{ProviderEvent, ProviderHandle, WalletProvider};
    pub use crate::rpc::{RpcConfig, RpcProvider};
    pub use crate::session::{Session, SessionManager};
}
