//! Wallet session tracking.
//!
//! [`SessionManager`] owns the single active [`Session`] and keeps it in step with
//! the provider: explicit connects, account-set notifications and network
//! switches. Every transition is rendered through the [`Notifier`].

use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::backend::AddressRecorder;
use crate::error::WalletError;
use crate::notifier::Notifier;
use crate::provider::{ProviderEvent, ProviderHandle};

/// The currently authorized account, if any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session(Option<Address>);

impl Session {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn connected(account: Address) -> Self {
        Self(Some(account))
    }

    pub fn account(&self) -> Option<Address> {
        self.0
    }

    pub fn is_active(&self) -> bool {
        self.0.is_some()
    }
}

/// What applying an account set did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Connected(Address),
    Disconnected,
    Unchanged,
}

pub struct SessionManager {
    provider: Option<ProviderHandle>,
    notifier: Notifier,
    recorder: Option<Arc<dyn AddressRecorder>>,
    session: Session,
    events: Option<mpsc::UnboundedReceiver<ProviderEvent>>,
    /// Bumped on every network switch; pending dispatcher calls watch it
    resets: watch::Sender<u64>,
    /// Address notifications still in flight
    notifications: JoinSet<()>,
}

impl SessionManager {
    /// `provider` is `None` when no compatible wallet was detected
    pub fn new(provider: Option<ProviderHandle>, notifier: Notifier) -> Self {
        let (resets, _) = watch::channel(0);
        Self {
            provider,
            notifier,
            recorder: None,
            session: Session::none(),
            events: None,
            resets,
            notifications: JoinSet::new(),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn AddressRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn provider(&self) -> Option<ProviderHandle> {
        self.provider.clone()
    }

    /// Receiver that changes whenever the context is reset by a network switch
    pub fn reset_signal(&self) -> watch::Receiver<u64> {
        self.resets.subscribe()
    }

    /// Subscribes to provider notifications and applies the already authorized accounts.
    pub async fn initialize(&mut self) -> Result<(), WalletError> {
        let Some(provider) = self.provider.clone() else {
            warn!("Please install MetaMask!");
            self.notifier.provider_unavailable();
            return Err(WalletError::ProviderUnavailable);
        };

        self.events = Some(provider.subscribe());
        self.sync_accounts().await
    }

    /// Requests authorization from the provider and returns the selected account.
    pub async fn connect(&mut self) -> Result<Address, WalletError> {
        let Some(provider) = self.provider.clone() else {
            self.notifier.provider_unavailable();
            return Err(WalletError::ProviderUnavailable);
        };

        let accounts = provider.request_accounts().await.map_err(|e| {
            error!("User denied account access: {e}");
            if e.is_user_rejection() {
                WalletError::UserRejected
            } else {
                WalletError::Provider(e.message)
            }
        })?;

        let Some(&account) = accounts.first() else {
            error!("Provider authorized no accounts");
            return Err(WalletError::UserRejected);
        };
        self.apply_accounts(&accounts);
        Ok(account)
    }

    /// Forgets the local session. The provider's authorization is left untouched.
    pub fn disconnect(&mut self) {
        info!("Wallet disconnected locally");
        self.session = Session::none();
        self.notifier.update_connection(None);
    }

    /// Applies an account set as reported by the provider.
    pub fn apply_accounts(&mut self, accounts: &[Address]) -> SessionChange {
        match accounts.first() {
            None => {
                if self.session.is_active() {
                    info!("No authorized accounts, wallet disconnected");
                }
                self.session = Session::none();
                self.notifier.update_connection(None);
                SessionChange::Disconnected
            }
            Some(&account) if self.session.account() != Some(account) => {
                info!("Wallet connected: {account}");
                self.session = Session::connected(account);
                self.notifier.update_connection(Some(account));
                self.record_address(account);
                SessionChange::Connected(account)
            }
            Some(_) => SessionChange::Unchanged,
        }
    }

    pub async fn handle_event(&mut self, event: ProviderEvent) -> Result<(), WalletError> {
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                self.apply_accounts(&accounts);
                Ok(())
            }
            ProviderEvent::NetworkChanged(chain_id) => {
                info!("Network changed to chain {chain_id}, resetting wallet context");
                self.reset().await
            }
        }
    }

    /// Waits for the next provider notification; `None` once the channel is closed
    /// or before [`initialize`](Self::initialize) succeeded.
    pub async fn next_event(&mut self) -> Option<ProviderEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Processes provider notifications until the provider closes the channel.
    pub async fn run(&mut self) {
        while let Some(event) = self.next_event().await {
            if let Err(e) = self.handle_event(event).await {
                warn!("Failed to handle provider event: {e}");
            }
        }
    }

    /// Waits for every pending address notification.
    ///
    /// Hosts that tear the runtime down right after a command must call this
    /// first, or the notifications are dropped unsent.
    pub async fn flush(&mut self) {
        while let Some(result) = self.notifications.join_next().await {
            if let Err(e) = result {
                warn!("Address notification task failed: {e}");
            }
        }
    }

    /// Drops everything tied to the previous network and starts over from the
    /// provider's current account set.
    async fn reset(&mut self) -> Result<(), WalletError> {
        self.resets.send_modify(|epoch| *epoch += 1);
        self.session = Session::none();
        self.sync_accounts().await
    }

    async fn sync_accounts(&mut self) -> Result<(), WalletError> {
        let Some(provider) = self.provider.clone() else {
            return Err(WalletError::ProviderUnavailable);
        };
        match provider.accounts().await {
            Ok(accounts) => {
                self.apply_accounts(&accounts);
                Ok(())
            }
            Err(e) => {
                error!("Error reading authorized accounts: {e}");
                self.apply_accounts(&[]);
                Err(WalletError::Provider(e.message))
            }
        }
    }

    /// Fire and forget: failures are logged, never surfaced
    fn record_address(&mut self, address: Address) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        // Reap finished notifications so the set only holds pending ones
        while self.notifications.try_join_next().is_some() {}
        self.notifications.spawn(async move {
            if let Err(e) = recorder.record(address).await {
                error!("Failed to update wallet address: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ALICE, BOB, MockProvider, RecordingAddressRecorder, RecordingSink};
    use tracing_test::traced_test;

    fn manager(
        provider: &Arc<MockProvider>,
        recorder: &Arc<RecordingAddressRecorder>,
    ) -> (SessionManager, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let handle: ProviderHandle = provider.clone();
        let manager = SessionManager::new(Some(handle), Notifier::new(sink.clone()))
            .with_recorder(recorder.clone());
        (manager, sink)
    }

    #[tokio::test]
    async fn test_same_account_is_not_reapplied() {
        let provider = MockProvider::new();
        let recorder = Arc::new(RecordingAddressRecorder::default());
        let (mut manager, sink) = manager(&provider, &recorder);

        assert_eq!(manager.apply_accounts(&[ALICE]), SessionChange::Connected(ALICE));
        assert_eq!(manager.apply_accounts(&[ALICE, BOB]), SessionChange::Unchanged);
        assert_eq!(manager.apply_accounts(&[BOB, ALICE]), SessionChange::Connected(BOB));

        assert_eq!(recorder.wait_for(2).await, vec![ALICE, BOB]);
        let renders = sink
            .commands()
            .into_iter()
            .filter(|c| matches!(c, crate::test_utils::UiCommand::Connection(_)))
            .count();
        assert_eq!(renders, 2);
    }

    #[tokio::test]
    async fn test_disconnect_keeps_provider_untouched() {
        let provider = MockProvider::new();
        let recorder = Arc::new(RecordingAddressRecorder::default());
        let (mut manager, sink) = manager(&provider, &recorder);

        manager.apply_accounts(&[ALICE]);
        manager.disconnect();

        assert!(!manager.session().is_active());
        assert_eq!(sink.last_connection().map(|v| v.connected), Some(false));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_address_notification_is_only_logged() {
        let provider = MockProvider::new();
        provider.set_authorization(Ok(vec![ALICE]));
        let recorder = Arc::new(RecordingAddressRecorder::failing("Unauthorized"));
        let (mut manager, sink) = manager(&provider, &recorder);

        assert_eq!(manager.connect().await, Ok(ALICE));
        recorder.wait_for(1).await;
        tokio::task::yield_now().await;

        assert!(manager.session().is_active());
        assert!(sink.banners().is_empty());
        assert!(logs_contain("Failed to update wallet address"));
    }
}
