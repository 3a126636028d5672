//! Device model (reporting only)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A device associated with a user's authorization key
///
/// Devices are written by external tooling and only listed here; the admin
/// panel never creates or edits them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub device_name: String,
    pub auth_key: String,
    pub user_id: Uuid,
    pub status: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Device joined with its owner's username for admin listings
#[derive(Debug, Clone, Serialize)]
pub struct DeviceWithOwner {
    #[serde(flatten)]
    pub device: Device,
    pub owner_name: Option<String>,
}
