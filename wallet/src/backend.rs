//! Best-effort notification of the connected address to the application backend.

use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Path of the backend endpoint recording a user's wallet address
pub const UPDATE_WALLET_ADDRESS_PATH: &str = "/update_wallet_address";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWalletAddressRequest {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWalletAddressResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait AddressRecorder: Send + Sync {
    async fn record(&self, address: Address) -> Result<(), WalletError>;
}

/// Posts `{ "address": ... }` to the backend's update endpoint
pub struct HttpAddressRecorder {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpAddressRecorder {
    /// `base_url` is the backend origin, e.g. `http://localhost:5000`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WalletError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Backend(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!(
                "{}{UPDATE_WALLET_ADDRESS_PATH}",
                base_url.trim_end_matches('/')
            ),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AddressRecorder for HttpAddressRecorder {
    async fn record(&self, address: Address) -> Result<(), WalletError> {
        tracing::debug!("Recording wallet address {address} at {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&UpdateWalletAddressRequest {
                address: address.to_string(),
            })
            .send()
            .await
            .map_err(|e| WalletError::Backend(format!("Error updating wallet address: {e}")))?;

        // Rejections come back as JSON bodies with 4xx/5xx statuses
        let status = response.status();
        let result: UpdateWalletAddressResponse = response.json().await.map_err(|e| {
            WalletError::Backend(format!("Unexpected response ({status}): {e}"))
        })?;

        if result.success {
            Ok(())
        } else {
            Err(WalletError::Backend(format!(
                "Failed to update wallet address: {}",
                result.error.unwrap_or_else(|| status.to_string())
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let recorder =
            HttpAddressRecorder::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            recorder.endpoint(),
            "http://localhost:5000/update_wallet_address"
        );
    }

    #[test]
    fn test_wire_format() {
        let body = serde_json::to_value(UpdateWalletAddressRequest {
            address: Address::repeat_byte(0x11).to_string(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "address": "0x1111111111111111111111111111111111111111" })
        );

        let rejected: UpdateWalletAddressResponse =
            serde_json::from_str(r#"{"success": false, "error": "Invalid wallet address"}"#)
                .unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.error.as_deref(), Some("Invalid wallet address"));

        let accepted: UpdateWalletAddressResponse =
            serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(accepted.success);
        assert_eq!(accepted.error, None);
    }
}
