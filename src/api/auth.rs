//! Authentication API endpoints
//!
//! Provides registration, login and password change endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::BootstrapAdmin,
    middleware::auth::create_access_token,
    middleware::AuthUser,
    models::{ChangePasswordRequest, LoginRequest, LoginResponse, LoginUser, RegisterRequest, Role},
    services::AuthService,
    utils::{validation, AppError},
    AppState,
};

/// Create public routes for authentication endpoints (no auth required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Create protected routes for authentication endpoints (auth required)
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/change-password", post(change_password))
}

/// Registration response
#[derive(Debug, Serialize)]
struct RegisterResponse {
    message: String,
    #[serde(rename = "userId")]
    user_id: Uuid,
}

/// Register handler
///
/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    // Validate input
    if !validation::validate_username(&payload.username) {
        return Err(AppError::bad_request(
            "Username must be 3-64 characters, start with a letter and contain only letters, digits, '.', '_' or '-'",
        ));
    }

    if payload.password.len() < state.config.auth.password_min_length {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters",
            state.config.auth.password_min_length
        )));
    }

    if !payload.email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }

    let auth_service = AuthService::new(state.db.clone());

    // Under the first-registrant bootstrap policy the first user to
    // sign up becomes the administrator
    let role = if state.config.auth.bootstrap_admin == BootstrapAdmin::FirstRegistrant
        && auth_service.count_users().await.map_err(|e| {
            tracing::error!("Failed to count users: {}", e);
            AppError::internal("Failed to register user")
        })? == 0
    {
        Role::Admin
    } else {
        Role::User
    };

    let user = auth_service
        .create_user(
            &payload.username,
            &payload.email,
            &payload.password,
            role,
            payload.phone.as_deref(),
        )
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                AppError::conflict(message)
            } else {
                tracing::error!("Failed to create user: {}", e);
                AppError::internal("Failed to register user")
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

/// Login handler
///
/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let auth_service = AuthService::new(state.db.clone());

    let user = auth_service
        .authenticate(&payload.username, &payload.password)
        .await
        .map_err(|e| {
            tracing::error!("Authentication failed: {}", e);
            AppError::internal("Authentication failed")
        })?
        .ok_or(AppError::InvalidCredentials)?;

    let token = create_access_token(
        &user.id,
        &user.username,
        user.role,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )
    .map_err(|e| {
        tracing::error!("Failed to create access token: {}", e);
        AppError::internal("Failed to create access token")
    })?;

    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            id: user.id,
            username: user.username,
            role: user.role,
            email: user.email,
        },
    }))
}

/// Change password response
#[derive(Debug, Serialize)]
struct ChangePasswordResponse {
    message: String,
}

/// Change password for the authenticated user
///
/// POST /api/auth/change-password
async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, AppError> {
    if payload.new_password.len() < state.config.auth.password_min_length {
        return Err(AppError::bad_request(format!(
            "New password must be at least {} characters",
            state.config.auth.password_min_length
        )));
    }

    if payload.current_password == payload.new_password {
        return Err(AppError::bad_request(
            "New password must be different from current password",
        ));
    }

    let auth_service = AuthService::new(state.db.clone());

    let success = auth_service
        .change_password(
            &auth_user.id,
            &payload.current_password,
            &payload.new_password,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to change password: {}", e);
            AppError::internal("Failed to change password")
        })?;

    if success {
        Ok(Json(ChangePasswordResponse {
            message: "Password changed successfully".to_string(),
        }))
    } else {
        Err(AppError::unauthorized("Current password is incorrect"))
    }
}
