//! WeChat login flow endpoints
//!
//! Drives the session state machine: a QR code is issued (`waiting` to
//! `scanning`), the phone scans it (`scanning` to `scanned_confirming`),
//! and the user confirms or rejects (`online` or `failed`). Accounts
//! that already hold a device key can skip the QR dance entirely with a
//! wakeup call to the gateway.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::WeChatAccountRepository,
    middleware::{require_ownership, AuthUser},
    models::{AccountStatus, WeChatAccount},
    services::GatewayEnvelope,
    utils::AppError,
    AppState,
};

/// Login flow routes, mounted under /api/wechat
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/qr-login", post(qr_login))
        .route("/simulate-scan/{auth_key}", post(simulate_scan))
        .route("/simulate-confirm/{auth_key}", post(simulate_confirm))
        .route("/wakeup-login", post(wakeup_login))
        .route("/login-status", post(login_status))
}

#[derive(Debug, Deserialize)]
struct QrLoginRequest {
    auth_key: String,
}

#[derive(Debug, Serialize)]
struct QrLoginResponse {
    message: String,
    auth_key: String,
    qr_code_url: String,
    status: AccountStatus,
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    message: String,
    auth_key: String,
    status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_auth_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimulateConfirmRequest {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct WakeupLoginRequest {
    auth_key: String,
}

#[derive(Debug, Serialize)]
struct WakeupResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginStatusRequest {
    auth_key: String,
}

#[derive(Debug, Serialize)]
struct LoginStatusResponse {
    auth_key: String,
    status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_login: Option<DateTime<Utc>>,
    /// Raw gateway envelope, present when a gateway is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<GatewayEnvelope>,
}

async fn resolve_account(
    repo: &WeChatAccountRepository<'_>,
    auth_user: &AuthUser,
    auth_key: &str,
) -> Result<WeChatAccount, AppError> {
    let account = repo
        .get_by_auth_key(auth_key)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up WeChat account: {}", e);
            AppError::internal("Failed to look up WeChat account")
        })?
        .ok_or_else(|| AppError::not_found("WeChat account not found"))?;

    require_ownership(auth_user, account.user_id)?;
    Ok(account)
}

fn placeholder_qr_url() -> String {
    format!("https://example.com/qr/{}.png", Uuid::new_v4())
}

/// Issue a login QR code and move the account to `scanning`
///
/// POST /api/wechat/qr-login
async fn qr_login(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<QrLoginRequest>,
) -> Result<Json<QrLoginResponse>, AppError> {
    let repo = WeChatAccountRepository::new(&state.db);
    let mut account = resolve_account(&repo, &auth_user, &payload.auth_key).await?;

    if !account.status.can_request_qr() {
        return Err(AppError::InvalidStateTransition(format!(
            "Account status is {}, cannot request a login QR code",
            account.status
        )));
    }

    // The gateway is the source of real QR codes; without one the flow
    // still works end to end against the simulate endpoints
    let qr_code_url = match &state.gateway {
        Some(gateway) => match gateway.get_login_qr(&account.auth_key).await {
            Ok(envelope) if envelope.is_success() => envelope
                .qr_code_url()
                .unwrap_or_else(placeholder_qr_url),
            Ok(envelope) => {
                tracing::warn!(
                    "Gateway refused QR issuance: {}",
                    envelope.error_message()
                );
                placeholder_qr_url()
            }
            Err(e) => {
                tracing::warn!("Gateway QR issuance failed: {}", e);
                placeholder_qr_url()
            }
        },
        None => placeholder_qr_url(),
    };

    account.status = AccountStatus::Scanning;
    account.qr_code_url = Some(qr_code_url.clone());

    repo.update(&account).await.map_err(|e| {
        tracing::error!("Failed to update WeChat account: {}", e);
        AppError::internal("Failed to start QR login")
    })?;

    tracing::info!(auth_key = %account.auth_key, "QR login started");

    Ok(Json(QrLoginResponse {
        message: "Scan the QR code to log in".to_string(),
        auth_key: account.auth_key,
        qr_code_url,
        status: AccountStatus::Scanning,
    }))
}

/// Simulate the phone scanning the QR code
///
/// POST /api/wechat/simulate-scan/{auth_key}
async fn simulate_scan(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(auth_key): Path<String>,
) -> Result<Json<SimulateResponse>, AppError> {
    let repo = WeChatAccountRepository::new(&state.db);
    let mut account = resolve_account(&repo, &auth_user, &auth_key).await?;

    if !account.status.can_scan() {
        return Err(AppError::InvalidStateTransition(format!(
            "Account status is {}, expected scanning",
            account.status
        )));
    }

    account.status = AccountStatus::ScannedConfirming;

    repo.update(&account).await.map_err(|e| {
        tracing::error!("Failed to update WeChat account: {}", e);
        AppError::internal("Failed to simulate scan")
    })?;

    Ok(Json(SimulateResponse {
        message: "Scan simulated, awaiting confirmation".to_string(),
        auth_key: account.auth_key,
        status: AccountStatus::ScannedConfirming,
        device_auth_key: None,
    }))
}

/// Simulate the user confirming or rejecting the login on the phone
///
/// POST /api/wechat/simulate-confirm/{auth_key}
async fn simulate_confirm(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(auth_key): Path<String>,
    Json(payload): Json<SimulateConfirmRequest>,
) -> Result<Json<SimulateResponse>, AppError> {
    let repo = WeChatAccountRepository::new(&state.db);
    let mut account = resolve_account(&repo, &auth_user, &auth_key).await?;

    if !account.status.can_confirm() {
        return Err(AppError::InvalidStateTransition(format!(
            "Account status is {}, expected scanned_confirming",
            account.status
        )));
    }

    if payload.success {
        account.status = AccountStatus::Online;
        account.device_auth_key = Some(format!("sim_dak_{}", Uuid::new_v4()));
        account.last_login = Some(Utc::now());
    } else {
        account.status = AccountStatus::Failed;
        account.device_auth_key = None;
    }

    repo.update(&account).await.map_err(|e| {
        tracing::error!("Failed to update WeChat account: {}", e);
        AppError::internal("Failed to simulate confirm")
    })?;

    Ok(Json(SimulateResponse {
        message: format!("Confirm simulated, status: {}", account.status),
        auth_key: account.auth_key,
        status: account.status,
        device_auth_key: account.device_auth_key,
    }))
}

/// Re-login an account through its bound device key
///
/// POST /api/wechat/wakeup-login
async fn wakeup_login(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<WakeupLoginRequest>,
) -> Result<(StatusCode, Json<WakeupResponse>), AppError> {
    let repo = WeChatAccountRepository::new(&state.db);
    let mut account = resolve_account(&repo, &auth_user, &payload.auth_key).await?;

    let Some(device_key) = account.device_auth_key.clone() else {
        return Err(AppError::NotBound(
            "This account has no bound device, scan to log in first".to_string(),
        ));
    };

    let Some(gateway) = state.gateway.as_ref() else {
        return Err(AppError::Gateway("Gateway is not configured".to_string()));
    };

    let envelope = gateway.wakeup_login(&device_key).await?;

    if !envelope.is_success() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(WakeupResponse {
                success: false,
                message: "Wakeup login failed".to_string(),
                data: None,
                error: Some(envelope.error_message()),
            }),
        ));
    }

    // The gateway already accepted the wakeup, so a bookkeeping failure
    // here is logged rather than turned into an error response
    account.status = AccountStatus::Online;
    account.last_login = Some(Utc::now());
    if let Err(e) = repo.update(&account).await {
        tracing::error!("Failed to record wakeup login: {}", e);
    }

    tracing::info!(auth_key = %account.auth_key, "Wakeup login succeeded");

    Ok((
        StatusCode::OK,
        Json(WakeupResponse {
            success: true,
            message: "Wakeup login successful".to_string(),
            data: envelope.data,
            error: None,
        }),
    ))
}

/// Stored account status, with the gateway's own view attached when a
/// gateway is configured
///
/// POST /api/wechat/login-status
async fn login_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<LoginStatusRequest>,
) -> Result<Json<LoginStatusResponse>, AppError> {
    let repo = WeChatAccountRepository::new(&state.db);
    let account = resolve_account(&repo, &auth_user, &payload.auth_key).await?;

    let gateway = match &state.gateway {
        Some(client) => match client.check_login_status(&account.auth_key).await {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::warn!("Gateway status check failed: {}", e);
                None
            }
        },
        None => None,
    };

    Ok(Json(LoginStatusResponse {
        auth_key: account.auth_key,
        status: account.status,
        last_login: account.last_login,
        gateway,
    }))
}
