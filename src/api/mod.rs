//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{routing::get, Router};

use crate::AppState;

mod auth;
mod auth_keys;
mod devices;
mod health;
mod users;
mod wechat_accounts;
mod wechat_login;

pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        // Authentication endpoints (no auth required)
        .nest("/api/auth", auth::public_routes())
        // Registration page needs the user count to offer first-admin signup
        .nest("/api/users", users::public_routes())
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        // Protected auth endpoints (change-password)
        .nest("/api/auth", auth::protected_routes())
        // Current user profile
        .nest("/api/user", users::profile_routes())
        // Admin area: user management, auth keys, device overview
        .nest(
            "/api/admin",
            users::admin_routes()
                .merge(auth_keys::routes())
                .merge(devices::routes()),
        )
        // WeChat account CRUD
        .nest("/api/wechat-accounts", wechat_accounts::routes())
        // Login flows
        .nest("/api/wechat", wechat_login::routes())
}

/// Create the full API router (public + protected; useful for tests)
pub fn routes() -> Router<AppState> {
    public_routes().merge(protected_routes())
}
