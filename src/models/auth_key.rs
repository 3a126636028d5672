//! Authorization key model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Authorization key entity
///
/// Keys are opaque tokens consumed by WeChat bot accounts. Each key is valid
/// for `days` days from creation and can be extended by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthKey {
    pub id: Uuid,
    pub key_value: String,
    pub user_id: Uuid,
    pub days: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl AuthKey {
    /// Create a new key owned by `user_id`, valid for `days` days from now
    pub fn new(user_id: Uuid, days: i64) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key_value: Uuid::new_v4().to_string(),
            user_id,
            days,
            created_at,
            expires_at: created_at + chrono::Duration::days(days),
            is_active: true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Authorization key joined with its owner's username for admin listings
#[derive(Debug, Clone, Serialize)]
pub struct AuthKeyWithOwner {
    #[serde(flatten)]
    pub key: AuthKey,
    pub owner_name: Option<String>,
}

/// Request to mint a batch of keys
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateAuthKeysRequest {
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 100))]
    pub count: u32,
    #[serde(default = "default_days")]
    #[validate(range(min = 1))]
    pub days: i64,
}

fn default_count() -> u32 {
    1
}

fn default_days() -> i64 {
    30
}

/// Response to a mint request
#[derive(Debug, Clone, Serialize)]
pub struct GenerateAuthKeysResponse {
    pub keys: Vec<String>,
    pub count: u32,
    pub days: i64,
}

/// Request to extend a key's validity window
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DelayAuthKeyRequest {
    pub key: String,
    #[validate(range(min = 1))]
    pub days: i64,
}
