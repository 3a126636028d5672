//! Authorization key management endpoints
//!
//! Admin surface for minting, listing, deleting and extending the
//! opaque keys that gate WeChat account sessions.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use validator::Validate;

use crate::{
    db::{AuthKeyRepository, WeChatAccountRepository},
    middleware::{require_admin, AuthUser},
    models::{AuthKeyWithOwner, DelayAuthKeyRequest, GenerateAuthKeysRequest, GenerateAuthKeysResponse},
    utils::AppError,
    AppState,
};

/// Admin-only key routes, mounted under /api/admin
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/gen-auth-key", post(generate_auth_keys))
        .route("/auth-keys", get(list_auth_keys))
        .route("/auth-key/{key}", delete(delete_auth_key))
        .route("/delay-auth-key", post(delay_auth_key))
}

/// Mint a batch of authorization keys owned by the calling admin
///
/// POST /api/admin/gen-auth-key
async fn generate_auth_keys(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<GenerateAuthKeysRequest>,
) -> Result<Json<GenerateAuthKeysResponse>, AppError> {
    require_admin(&auth_user)?;
    payload.validate()?;

    let repo = AuthKeyRepository::new(&state.db);
    let keys = repo
        .mint(auth_user.id, payload.count, payload.days)
        .await
        .map_err(|e| {
            tracing::error!("Failed to generate auth keys: {}", e);
            AppError::internal("Failed to generate auth keys")
        })?;

    Ok(Json(GenerateAuthKeysResponse {
        count: keys.len() as u32,
        keys,
        days: payload.days,
    }))
}

/// List all keys together with their owners' usernames
///
/// GET /api/admin/auth-keys
async fn list_auth_keys(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<AuthKeyWithOwner>>, AppError> {
    require_admin(&auth_user)?;

    let repo = AuthKeyRepository::new(&state.db);
    let keys = repo.list_with_owner().await.map_err(|e| {
        tracing::error!("Failed to list auth keys: {}", e);
        AppError::internal("Failed to list auth keys")
    })?;

    Ok(Json(keys))
}

/// Deletion response
#[derive(Debug, Serialize)]
struct DeleteKeyResponse {
    message: String,
}

/// Delete a key by its value
///
/// DELETE /api/admin/auth-key/{key}
///
/// A key bound to a WeChat account cannot be deleted directly; delete the
/// account instead, which removes its key as well.
async fn delete_auth_key(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<DeleteKeyResponse>, AppError> {
    require_admin(&auth_user)?;

    let accounts = WeChatAccountRepository::new(&state.db);
    let bound = accounts.get_by_auth_key(&key).await.map_err(|e| {
        tracing::error!("Failed to look up account for auth key: {}", e);
        AppError::internal("Failed to delete auth key")
    })?;
    if bound.is_some() {
        return Err(AppError::conflict(
            "Auth key is bound to a WeChat account",
        ));
    }

    let repo = AuthKeyRepository::new(&state.db);
    let deleted = repo.delete_by_value(&key).await.map_err(|e| {
        tracing::error!("Failed to delete auth key: {}", e);
        AppError::internal("Failed to delete auth key")
    })?;

    if !deleted {
        return Err(AppError::not_found("Auth key not found"));
    }

    Ok(Json(DeleteKeyResponse {
        message: "Auth key deleted successfully".to_string(),
    }))
}

/// Extension response
#[derive(Debug, Serialize)]
struct DelayKeyResponse {
    message: String,
}

/// Extend a key's lifetime, measured from now
///
/// POST /api/admin/delay-auth-key
async fn delay_auth_key(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<DelayAuthKeyRequest>,
) -> Result<Json<DelayKeyResponse>, AppError> {
    require_admin(&auth_user)?;
    payload.validate()?;

    let repo = AuthKeyRepository::new(&state.db);
    let updated = repo.delay(&payload.key, payload.days).await.map_err(|e| {
        tracing::error!("Failed to extend auth key: {}", e);
        AppError::internal("Failed to extend auth key")
    })?;

    if !updated {
        return Err(AppError::not_found("Auth key not found"));
    }

    Ok(Json(DelayKeyResponse {
        message: "Auth key extended successfully".to_string(),
    }))
}
