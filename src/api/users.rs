//! User management API endpoints
//!
//! Public user count, the authenticated profile endpoint and the admin
//! user CRUD surface.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    middleware::{require_admin, AuthUser},
    models::{UpdateUserRequest, UserPublic},
    services::AuthService,
    utils::AppError,
    AppState,
};

/// Routes that require no authentication
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/count", get(count_users))
}

/// Routes for the authenticated user's own profile
pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile))
}

/// Admin-only user management routes, mounted under /api/admin
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", put(update_user).delete(delete_user))
}

/// Public user count response
#[derive(Debug, Serialize)]
struct UserCountResponse {
    count: i64,
}

/// Total number of registered users
///
/// GET /api/users/count
async fn count_users(State(state): State<AppState>) -> Result<Json<UserCountResponse>, AppError> {
    let auth_service = AuthService::new(state.db.clone());

    let count = auth_service.count_users().await.map_err(|e| {
        tracing::error!("Failed to count users: {}", e);
        AppError::internal("Failed to count users")
    })?;

    Ok(Json(UserCountResponse { count }))
}

/// Current user profile
///
/// GET /api/user/profile
async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserPublic>, AppError> {
    let auth_service = AuthService::new(state.db.clone());

    let user = auth_service
        .get_user_by_id(&auth_user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch user profile: {}", e);
            AppError::internal("Failed to fetch user profile")
        })?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(user.into()))
}

/// List all users, newest first
///
/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<UserPublic>>, AppError> {
    require_admin(&auth_user)?;

    let auth_service = AuthService::new(state.db.clone());

    let users = auth_service.list_users().await.map_err(|e| {
        tracing::error!("Failed to list users: {}", e);
        AppError::internal("Failed to list users")
    })?;

    Ok(Json(users))
}

/// Update a user
///
/// PUT /api/admin/users/{id}
async fn update_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserPublic>, AppError> {
    require_admin(&auth_user)?;

    let auth_service = AuthService::new(state.db.clone());

    let user = auth_service
        .update_user(
            &id,
            payload.username.as_deref(),
            payload.email.as_deref(),
            payload.password.as_deref(),
            payload.role,
            payload.phone.as_deref(),
        )
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                AppError::conflict(message)
            } else if message.contains("User not found") {
                AppError::not_found("User not found")
            } else {
                tracing::error!("Failed to update user: {}", e);
                AppError::internal("Failed to update user")
            }
        })?;

    Ok(Json(user.into()))
}

/// Deletion response
#[derive(Debug, Serialize)]
struct DeleteUserResponse {
    message: String,
}

/// Delete a user and everything the account owns
///
/// DELETE /api/admin/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteUserResponse>, AppError> {
    require_admin(&auth_user)?;

    let auth_service = AuthService::new(state.db.clone());

    let target = auth_service
        .get_user_by_id(&id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch user for deletion: {}", e);
            AppError::internal("Failed to delete user")
        })?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    // The system must never lose its last administrator
    if target.role.is_admin() {
        let admins = auth_service.count_admins().await.map_err(|e| {
            tracing::error!("Failed to count admins: {}", e);
            AppError::internal("Failed to delete user")
        })?;
        if admins <= 1 {
            return Err(AppError::bad_request("Cannot delete the last admin"));
        }
    }

    auth_service.delete_user_cascade(&id).await.map_err(|e| {
        tracing::error!("Failed to delete user: {}", e);
        AppError::internal("Failed to delete user")
    })?;

    Ok(Json(DeleteUserResponse {
        message: "User deleted successfully".to_string(),
    }))
}
