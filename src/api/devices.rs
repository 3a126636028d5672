//! Device reporting endpoints
//!
//! Device rows are recorded by the bot runtime that holds the session;
//! this API only reads them back for the admin overview.

use axum::{extract::State, routing::get, Json, Router};

use crate::{
    db::DeviceRepository,
    middleware::{require_admin, AuthUser},
    models::DeviceWithOwner,
    utils::AppError,
    AppState,
};

/// Admin-only device routes, mounted under /api/admin
pub fn routes() -> Router<AppState> {
    Router::new().route("/devices", get(list_devices))
}

/// List all devices with their owners' usernames
///
/// GET /api/admin/devices
async fn list_devices(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<DeviceWithOwner>>, AppError> {
    require_admin(&auth_user)?;

    let repo = DeviceRepository::new(&state.db);
    let devices = repo.list_with_owner().await.map_err(|e| {
        tracing::error!("Failed to list devices: {}", e);
        AppError::internal("Failed to list devices")
    })?;

    Ok(Json(devices))
}
