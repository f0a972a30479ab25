//! Rendering of wallet state and transient banners.
//!
//! The notifier only computes what should be shown and forwards it to a
//! [`UiSink`]; it keeps no state about the page.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::Address;

use crate::error::WalletError;
use crate::outcome::TransactionOutcome;

pub const CONNECT_BUTTON_ID: &str = "connect-wallet-btn";
pub const WALLET_STATUS_ID: &str = "wallet-status";
pub const WALLET_ADDRESS_ID: &str = "wallet-address";
/// Marker class of elements that only work with a connected wallet
pub const REQUIRES_WALLET_CLASS: &str = "requires-wallet";

pub const CONNECTED_TEXT: &str = "Connected";
pub const DISCONNECTED_TEXT: &str = "Not Connected";
pub const NO_WALLET_LABEL: &str = "No wallet connected";
pub const CONNECTED_CLASS: &str = "badge bg-success me-2";
pub const DISCONNECTED_CLASS: &str = "badge bg-danger me-2";

/// Time a banner stays fully visible
pub const BANNER_DISMISS_DELAY: Duration = Duration::from_secs(5);
/// Length of the fade-out transition before removal
pub const BANNER_FADE_DURATION: Duration = Duration::from_millis(150);

/// Shortens an address to its first 6 and last 4 characters.
///
/// `0x1234567890abcdef1234567890abcdef12345678` becomes `0x1234...5678`. Strings too
/// short to abbreviate are returned unchanged.
pub fn abbreviate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Everything the status area shows for one connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionView {
    pub connected: bool,
    pub status_text: &'static str,
    pub status_class: &'static str,
    pub address_label: String,
    pub connect_button_enabled: bool,
    /// Applies to every element carrying [`REQUIRES_WALLET_CLASS`]
    pub wallet_actions_enabled: bool,
}

impl ConnectionView {
    pub fn render(account: Option<Address>) -> Self {
        match account {
            Some(address) => Self {
                connected: true,
                status_text: CONNECTED_TEXT,
                status_class: CONNECTED_CLASS,
                address_label: abbreviate_address(&address.to_string()),
                connect_button_enabled: false,
                wallet_actions_enabled: true,
            },
            None => Self::disconnected(),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            status_text: DISCONNECTED_TEXT,
            status_class: DISCONNECTED_CLASS,
            address_label: NO_WALLET_LABEL.to_string(),
            connect_button_enabled: true,
            wallet_actions_enabled: false,
        }
    }

    /// No provider at all: nothing wallet related can be used, connecting included
    pub fn unavailable() -> Self {
        Self {
            connect_button_enabled: false,
            ..Self::disconnected()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

impl Severity {
    pub fn css_class(&self) -> &'static str {
        match self {
            Severity::Success => "alert-success",
            Severity::Error => "alert-danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BannerId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub id: BannerId,
    pub message: String,
    pub severity: Severity,
    /// Persistent banners are never dismissed automatically
    pub persistent: bool,
}

/// Where rendered output goes: a DOM bridge, a terminal, a test recorder
pub trait UiSink: Send + Sync {
    fn render_connection(&self, view: &ConnectionView);

    /// Inserts `banner` at the top of the page
    fn show_banner(&self, banner: &Banner);

    fn fade_banner(&self, id: BannerId);

    fn remove_banner(&self, id: BannerId);
}

#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn UiSink>,
    next_id: Arc<AtomicU64>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn UiSink>) -> Self {
        Self {
            sink,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn update_connection(&self, account: Option<Address>) {
        self.sink.render_connection(&ConnectionView::render(account));
    }

    /// Disables wallet features and pins an explanation at the top of the page
    pub fn provider_unavailable(&self) -> BannerId {
        self.sink.render_connection(&ConnectionView::unavailable());
        let banner = self.banner(
            WalletError::ProviderUnavailable.to_string(),
            Severity::Error,
            true,
        );
        self.sink.show_banner(&banner);
        banner.id
    }

    pub fn success(&self, message: impl Into<String>) -> BannerId {
        self.flash(message.into(), Severity::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> BannerId {
        self.flash(message.into(), Severity::Error)
    }

    /// Shows the result of a contract action
    pub fn report(&self, action: &str, outcome: &TransactionOutcome) -> BannerId {
        match outcome {
            TransactionOutcome::Confirmed(tx) => self.success(format!(
                "{action} confirmed in block {} (tx {})",
                tx.block_number, tx.transaction_hash
            )),
            TransactionOutcome::Failed(err) => {
                self.error(format!("{action} failed: {}", err.message()))
            }
        }
    }

    fn banner(&self, message: String, severity: Severity, persistent: bool) -> Banner {
        Banner {
            id: BannerId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            message,
            severity,
            persistent,
        }
    }

    fn flash(&self, message: String, severity: Severity) -> BannerId {
        let banner = self.banner(message, severity, false);
        self.sink.show_banner(&banner);

        let sink = Arc::clone(&self.sink);
        let id = banner.id;
        tokio::spawn(async move {
            tokio::time::sleep(BANNER_DISMISS_DELAY).await;
            sink.fade_banner(id);
            tokio::time::sleep(BANNER_FADE_DURATION).await;
            sink.remove_banner(id);
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingSink, UiCommand};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_abbreviation() {
        let address = "0x1234567890abcdef1234567890abcdef12345678";
        assert_eq!(abbreviate_address(address), "0x1234...5678");
        assert_eq!(abbreviate_address("0xABC"), "0xABC");
    }

    #[test]
    fn test_abbreviation_is_stable_across_renders() {
        let address = Address::repeat_byte(0x5a);
        let first = ConnectionView::render(Some(address));
        let second = ConnectionView::render(Some(address));
        assert_eq!(first, second);

        let full = address.to_string();
        assert_eq!(
            first.address_label,
            format!("{}...{}", &full[..6], &full[full.len() - 4..])
        );
    }

    #[test]
    fn test_views() {
        let connected = ConnectionView::render(Some(Address::repeat_byte(1)));
        assert!(connected.connected);
        assert_eq!(connected.status_text, CONNECTED_TEXT);
        assert_eq!(connected.status_class, CONNECTED_CLASS);
        assert!(!connected.connect_button_enabled);
        assert!(connected.wallet_actions_enabled);

        let disconnected = ConnectionView::render(None);
        assert_eq!(disconnected.status_text, DISCONNECTED_TEXT);
        assert_eq!(disconnected.address_label, NO_WALLET_LABEL);
        assert!(disconnected.connect_button_enabled);
        assert!(!disconnected.wallet_actions_enabled);

        let unavailable = ConnectionView::unavailable();
        assert!(!unavailable.connect_button_enabled);
        assert!(!unavailable.wallet_actions_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_fades_then_disappears() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(sink.clone());

        let id = notifier.success("Land registered");
        assert_eq!(sink.banners().len(), 1);
        assert_eq!(sink.banners()[0].severity, Severity::Success);

        tokio::time::sleep(BANNER_DISMISS_DELAY - Duration::from_millis(1)).await;
        assert!(!sink.commands().contains(&UiCommand::Fade(id)));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(sink.commands().contains(&UiCommand::Fade(id)));
        assert!(!sink.commands().contains(&UiCommand::Remove(id)));

        tokio::time::sleep(BANNER_FADE_DURATION).await;
        assert!(sink.commands().contains(&UiCommand::Remove(id)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_banner_is_persistent() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(sink.clone());

        let id = notifier.provider_unavailable();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(sink.last_connection(), Some(ConnectionView::unavailable()));
        assert!(sink.banners()[0].persistent);
        assert!(!sink.commands().contains(&UiCommand::Remove(id)));
    }
}
