//! WeChat account management endpoints
//!
//! Accounts are visible to their owners and to admins. The create
//! endpoint doubles as an upsert: device agents report login results by
//! posting the account's authorization key together with fresh profile
//! fields.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{AuthKeyRepository, WeChatAccountRepository},
    middleware::{require_ownership, AuthUser},
    models::{
        AccountStatus, AuthKey, CreateWeChatAccountRequest, UpdateAccountStatusRequest,
        UpdateWeChatAccountRequest, WeChatAccount,
    },
    utils::{validation, AppError},
    AppState,
};

/// Account routes, mounted under /api/wechat-accounts
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts).post(create_or_update_account))
        .route(
            "/{id}",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/{id}/status", put(update_account_status))
}

/// Default display name for accounts created before their first login
const DEFAULT_NICKNAME: &str = "New WeChat account";

/// Response for account mutations
#[derive(Debug, Serialize)]
struct AccountMutationResponse {
    message: String,
    account: WeChatAccount,
    /// Lifetime of the freshly minted key, present only when this
    /// request created one
    #[serde(skip_serializing_if = "Option::is_none")]
    days: Option<i64>,
}

/// List accounts: admins see everything with key and owner metadata,
/// other roles see their own rows
///
/// GET /api/wechat-accounts
async fn list_accounts(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Response, AppError> {
    let repo = WeChatAccountRepository::new(&state.db);

    if auth_user.is_admin() {
        let accounts = repo.list_all_detailed().await.map_err(|e| {
            tracing::error!("Failed to list WeChat accounts: {}", e);
            AppError::internal("Failed to list WeChat accounts")
        })?;
        Ok(Json(accounts).into_response())
    } else {
        let accounts = repo.list_for_user(auth_user.id).await.map_err(|e| {
            tracing::error!("Failed to list WeChat accounts: {}", e);
            AppError::internal("Failed to list WeChat accounts")
        })?;
        Ok(Json(accounts).into_response())
    }
}

/// Create an account, or update the one already bound to the offered
/// authorization key
///
/// POST /api/wechat-accounts
async fn create_or_update_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateWeChatAccountRequest>,
) -> Result<Json<AccountMutationResponse>, AppError> {
    let accounts = WeChatAccountRepository::new(&state.db);
    let keys = AuthKeyRepository::new(&state.db);

    let Some(offered_key) = payload.auth_key.clone() else {
        // No key offered: mint a fresh one for the caller and start the
        // account in `waiting`
        let key = AuthKey::new(auth_user.id, payload.days);
        keys.insert(&key).await.map_err(|e| {
            tracing::error!("Failed to mint auth key: {}", e);
            AppError::internal("Failed to create WeChat account")
        })?;

        let now = Utc::now();
        let account = WeChatAccount {
            id: Uuid::new_v4(),
            auth_key: key.key_value.clone(),
            device_auth_key: None,
            nickname: payload
                .nickname
                .clone()
                .or_else(|| Some(DEFAULT_NICKNAME.to_string())),
            username: None,
            avatar: None,
            status: AccountStatus::Waiting,
            last_login: None,
            qr_code_url: None,
            user_id: auth_user.id,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(&account).await.map_err(|e| {
            tracing::error!("Failed to create WeChat account: {}", e);
            AppError::internal("Failed to create WeChat account")
        })?;

        return Ok(Json(AccountMutationResponse {
            message: "WeChat account created successfully".to_string(),
            account,
            days: Some(payload.days),
        }));
    };

    if !validation::validate_auth_key(&offered_key) {
        return Err(AppError::bad_request("Invalid auth key format"));
    }

    let existing = accounts.get_by_auth_key(&offered_key).await.map_err(|e| {
        tracing::error!("Failed to look up WeChat account: {}", e);
        AppError::internal("Failed to create WeChat account")
    })?;

    if let Some(mut account) = existing {
        // Update the account bound to this key in place
        require_ownership(&auth_user, account.user_id)?;

        if payload.nickname.is_some() {
            account.nickname = payload.nickname.clone();
        }
        if payload.username.is_some() {
            account.username = payload.username.clone();
        }
        if payload.avatar.is_some() {
            account.avatar = payload.avatar.clone();
        }
        if payload.device_auth_key.is_some() {
            account.device_auth_key = payload.device_auth_key.clone();
        }
        account.status = payload.status.unwrap_or(AccountStatus::Online);
        account.last_login = Some(Utc::now());

        accounts.update(&account).await.map_err(|e| {
            tracing::error!("Failed to update WeChat account: {}", e);
            AppError::internal("Failed to update WeChat account")
        })?;

        return Ok(Json(AccountMutationResponse {
            message: "WeChat account updated successfully".to_string(),
            account,
            days: None,
        }));
    }

    // No account for this key yet: register the key if it is unknown,
    // then insert the account around it
    let owner_id = match keys.find_by_value(&offered_key).await.map_err(|e| {
        tracing::error!("Failed to look up auth key: {}", e);
        AppError::internal("Failed to create WeChat account")
    })? {
        Some(key) => {
            require_ownership(&auth_user, key.user_id)?;
            key.user_id
        }
        None => {
            let mut key = AuthKey::new(auth_user.id, payload.days);
            key.key_value = offered_key.clone();
            keys.insert(&key).await.map_err(|e| {
                tracing::error!("Failed to register offered auth key: {}", e);
                AppError::internal("Failed to create WeChat account")
            })?;
            auth_user.id
        }
    };

    let now = Utc::now();
    let account = WeChatAccount {
        id: Uuid::new_v4(),
        auth_key: offered_key,
        device_auth_key: payload.device_auth_key.clone(),
        nickname: payload.nickname.clone(),
        username: payload.username.clone(),
        avatar: payload.avatar.clone(),
        status: payload.status.unwrap_or(AccountStatus::Online),
        last_login: None,
        qr_code_url: None,
        user_id: owner_id,
        created_at: now,
        updated_at: now,
    };
    accounts.insert(&account).await.map_err(|e| {
        tracing::error!("Failed to create WeChat account: {}", e);
        AppError::internal("Failed to create WeChat account")
    })?;

    Ok(Json(AccountMutationResponse {
        message: "WeChat account created successfully".to_string(),
        account,
        days: None,
    }))
}

/// Account detail with key metadata and owner username
///
/// GET /api/wechat-accounts/{id}
async fn get_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let repo = WeChatAccountRepository::new(&state.db);

    let detail = repo
        .get_detail_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch WeChat account: {}", e);
            AppError::internal("Failed to fetch WeChat account")
        })?
        .ok_or_else(|| AppError::not_found("WeChat account not found"))?;

    require_ownership(&auth_user, detail.account.user_id)?;

    Ok(Json(detail).into_response())
}

/// Partial update of an account
///
/// PUT /api/wechat-accounts/{id}
async fn update_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWeChatAccountRequest>,
) -> Result<Json<AccountMutationResponse>, AppError> {
    if payload.is_empty() {
        return Err(AppError::bad_request("Missing update parameters"));
    }

    let repo = WeChatAccountRepository::new(&state.db);

    let mut account = repo
        .get_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch WeChat account: {}", e);
            AppError::internal("Failed to update WeChat account")
        })?
        .ok_or_else(|| AppError::not_found("WeChat account not found"))?;

    require_ownership(&auth_user, account.user_id)?;

    if payload.nickname.is_some() {
        account.nickname = payload.nickname;
    }
    if payload.username.is_some() {
        account.username = payload.username;
    }
    if payload.avatar.is_some() {
        account.avatar = payload.avatar;
    }
    if payload.qr_code_url.is_some() {
        account.qr_code_url = payload.qr_code_url;
    }
    if payload.device_auth_key.is_some() {
        account.device_auth_key = payload.device_auth_key;
    }
    if let Some(status) = payload.status {
        account.status = status;
        if status == AccountStatus::Online {
            account.last_login = Some(Utc::now());
        }
    }

    repo.update(&account).await.map_err(|e| {
        tracing::error!("Failed to update WeChat account: {}", e);
        AppError::internal("Failed to update WeChat account")
    })?;

    Ok(Json(AccountMutationResponse {
        message: "WeChat account updated successfully".to_string(),
        account,
        days: None,
    }))
}

/// Deletion response
#[derive(Debug, Serialize)]
struct DeleteAccountResponse {
    message: String,
}

/// Delete an account and its authorization key
///
/// DELETE /api/wechat-accounts/{id}
async fn delete_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteAccountResponse>, AppError> {
    let accounts = WeChatAccountRepository::new(&state.db);

    let account = accounts
        .get_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch WeChat account: {}", e);
            AppError::internal("Failed to delete WeChat account")
        })?
        .ok_or_else(|| AppError::not_found("WeChat account not found"))?;

    require_ownership(&auth_user, account.user_id)?;

    accounts.delete(id).await.map_err(|e| {
        tracing::error!("Failed to delete WeChat account: {}", e);
        AppError::internal("Failed to delete WeChat account")
    })?;

    // Best-effort removal of the consumed key; the account row is
    // already gone so a failure here is only logged
    let keys = AuthKeyRepository::new(&state.db);
    if let Err(e) = keys.delete_by_value(&account.auth_key).await {
        tracing::error!("Failed to delete auth key for removed account: {}", e);
    }

    Ok(Json(DeleteAccountResponse {
        message: "WeChat account deleted successfully".to_string(),
    }))
}

/// Status update response
#[derive(Debug, Serialize)]
struct StatusUpdateResponse {
    message: String,
}

/// Update status and QR code URL only
///
/// PUT /api/wechat-accounts/{id}/status
async fn update_account_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAccountStatusRequest>,
) -> Result<Json<StatusUpdateResponse>, AppError> {
    if payload.status.is_none() && payload.qr_code_url.is_none() {
        return Err(AppError::bad_request("Missing update parameters"));
    }

    let repo = WeChatAccountRepository::new(&state.db);

    let mut account = repo
        .get_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch WeChat account: {}", e);
            AppError::internal("Failed to update account status")
        })?
        .ok_or_else(|| AppError::not_found("WeChat account not found"))?;

    require_ownership(&auth_user, account.user_id)?;

    if payload.qr_code_url.is_some() {
        account.qr_code_url = payload.qr_code_url;
    }
    if let Some(status) = payload.status {
        account.status = status;
        if status == AccountStatus::Online {
            account.last_login = Some(Utc::now());
        }
    }

    repo.update(&account).await.map_err(|e| {
        tracing::error!("Failed to update account status: {}", e);
        AppError::internal("Failed to update account status")
    })?;

    Ok(Json(StatusUpdateResponse {
        message: "Status updated successfully".to_string(),
    }))
}
