use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateWalletAddressRequest {
    /// `0x` prefixed, 42 character account address
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UpdateWalletAddressResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub wallet_addresses: usize,
}

// ============================================================================
// Validation
// ============================================================================

const ADDRESS_LENGTH: usize = 42;

/// Only the shape is checked; hex digits and checksum are left to the wallet
fn is_valid_address(address: &str) -> bool {
    address.starts_with("0x") && address.len() == ADDRESS_LENGTH
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid wallet address")]
    InvalidAddress,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidAddress | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(UpdateWalletAddressResponse {
            success: false,
            error: Some(self.to_string()),
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

// ============================================================================
// Application State
// ============================================================================

#[derive(Default)]
struct AppState {
    wallet_addresses: RwLock<BTreeSet<String>>,
}

// ============================================================================
// API Handlers
// ============================================================================

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        wallet_addresses: state.wallet_addresses.read().await.len(),
    })
}

/// Records the wallet address a client just connected
async fn update_wallet_address(
    State(state): State<Arc<AppState>>,
    request: Result<Json<UpdateWalletAddressRequest>, JsonRejection>,
) -> Result<Json<UpdateWalletAddressResponse>, ApiError> {
    let Json(request) = request?;

    if !is_valid_address(&request.address) {
        warn!("Rejected wallet address: {}", request.address);
        return Err(ApiError::InvalidAddress);
    }

    let inserted = state
        .wallet_addresses
        .write()
        .await
        .insert(request.address.clone());
    info!("Wallet address updated: {} (new: {inserted})", request.address);

    Ok(Json(UpdateWalletAddressResponse {
        success: true,
        error: None,
    }))
}

fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/update_wallet_address", post(update_wallet_address))
        .with_state(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

// ============================================================================
// Main Application
// ============================================================================

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Starting Land Registry API Server");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);
    info!("  - Health check: http://{}:{}/health", "localhost", port);
    info!(
        "  - Wallet address: POST http://{}:{}/update_wallet_address",
        "localhost", port
    );

    axum::serve(listener, app(Arc::new(AppState::default()))).await
}
