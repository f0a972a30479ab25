use land_wallet::notifier::{Banner, BannerId, ConnectionView, Severity, UiSink};
use tracing::debug;

/// Prints connection changes and banners to stderr, leaving stdout to command output
#[derive(Debug, Default)]
pub struct TerminalSink;

impl TerminalSink {
    pub fn connection_line(view: &ConnectionView) -> String {
        format!("Wallet: {} ({})", view.status_text, view.address_label)
    }

    pub fn banner_line(banner: &Banner) -> String {
        let tag = match banner.severity {
            Severity::Success => "ok",
            Severity::Error => "error",
        };
        format!("[{tag}] {}", banner.message)
    }
}

impl UiSink for TerminalSink {
    fn render_connection(&self, view: &ConnectionView) {
        eprintln!("{}", Self::connection_line(view));
    }

    fn show_banner(&self, banner: &Banner) {
        eprintln!("{}", Self::banner_line(banner));
    }

    // A terminal line cannot fade; the timers only show up in debug logs
    fn fade_banner(&self, id: BannerId) {
        debug!("Banner {} fading", id.0);
    }

    fn remove_banner(&self, id: BannerId) {
        debug!("Banner {} removed", id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lines() {
        let view = ConnectionView::render(None);
        assert_eq!(
            TerminalSink::connection_line(&view),
            "Wallet: Not Connected (No wallet connected)"
        );

        let view = ConnectionView::render(Some(Address::repeat_byte(0x11)));
        assert_eq!(
            TerminalSink::connection_line(&view),
            "Wallet: Connected (0x1111...1111)"
        );

        let banner = Banner {
            id: BannerId(3),
            message: "Wallet not connected".to_string(),
            severity: Severity::Error,
            persistent: false,
        };
        assert_eq!(TerminalSink::banner_line(&banner), "[error] Wallet not connected");
    }
}
