use thiserror::Error;

/// EIP-1193 code returned when the user dismisses an authorization or signing prompt
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 code for a request the user has not authorized yet
pub const UNAUTHORIZED_CODE: i64 = 4100;
/// JSON-RPC code for a method the node does not implement
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Error reported by a wallet provider.
///
/// Mirrors the `{ code, message }` shape providers use for failed requests; `code`
/// is absent when the failure happened before a response was received (transport
/// errors, malformed payloads).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self.code, Some(USER_REJECTED_CODE) | Some(UNAUTHORIZED_CODE))
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code == Some(METHOD_NOT_FOUND_CODE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("No compatible wallet provider detected. Please install MetaMask!")]
    ProviderUnavailable,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Gas estimation failed: {0}")]
    EstimationFailed(String),

    #[error("Transaction failed: {0}")]
    SubmissionFailed(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Contract interface error: {0}")]
    Abi(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Network changed while the request was pending")]
    NetworkChanged,
}

impl WalletError {
    /// The message shown to the user.
    ///
    /// Provider and contract failures surface the underlying message verbatim,
    /// everything else uses the error's display text.
    pub fn message(&self) -> String {
        match self {
            WalletError::EstimationFailed(msg)
            | WalletError::SubmissionFailed(msg)
            | WalletError::Provider(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the user can retry the same action after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, WalletError::ProviderUnavailable | WalletError::Abi(_))
    }

    pub(crate) fn from_estimate(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            WalletError::UserRejected
        } else {
            WalletError::EstimationFailed(err.message)
        }
    }

    pub(crate) fn from_submit(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            WalletError::UserRejected
        } else {
            WalletError::SubmissionFailed(err.message)
        }
    }
}
