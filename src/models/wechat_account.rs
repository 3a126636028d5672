//! WeChat bot-account model and login-lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login-lifecycle state of a WeChat bot account
///
/// The normal path is waiting -> scanning -> scanned_confirming -> online.
/// A failed confirmation lands in failed; accounts that drop their session
/// become offline and can re-enter the flow via a new QR code or a wakeup
/// call (when a device key is bound).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Created, no login attempted yet
    #[default]
    Waiting,
    /// QR code issued, waiting for the phone to scan it
    Scanning,
    /// QR scanned, waiting for in-app confirmation
    ScannedConfirming,
    /// Logged in
    Online,
    /// Session ended
    Offline,
    /// Login confirmation failed
    Failed,
}

impl AccountStatus {
    /// States from which a QR code may be requested
    pub fn can_request_qr(&self) -> bool {
        matches!(
            self,
            AccountStatus::Waiting
                | AccountStatus::Scanning
                | AccountStatus::Offline
                | AccountStatus::Failed
        )
    }

    /// A scan is only meaningful while a QR code is being shown
    pub fn can_scan(&self) -> bool {
        matches!(self, AccountStatus::Scanning)
    }

    /// Confirmation is only meaningful after a scan
    pub fn can_confirm(&self) -> bool {
        matches!(self, AccountStatus::ScannedConfirming)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountStatus::Waiting => "waiting",
            AccountStatus::Scanning => "scanning",
            AccountStatus::ScannedConfirming => "scanned_confirming",
            AccountStatus::Online => "online",
            AccountStatus::Offline => "offline",
            AccountStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(AccountStatus::Waiting),
            "scanning" => Ok(AccountStatus::Scanning),
            "scanned_confirming" => Ok(AccountStatus::ScannedConfirming),
            "online" => Ok(AccountStatus::Online),
            "offline" => Ok(AccountStatus::Offline),
            "failed" => Ok(AccountStatus::Failed),
            _ => Err(format!(
                "Invalid account status: {} (expected one of waiting, scanning, \
                 scanned_confirming, online, offline, failed)",
                s
            )),
        }
    }
}

/// WeChat bot-account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeChatAccount {
    pub id: Uuid,
    /// The authorization key this account consumes (unique per account)
    pub auth_key: String,
    /// Device session key, bound on a successful login confirmation
    pub device_auth_key: Option<String>,
    pub nickname: Option<String>,
    /// WeChat handle, filled in once the account is logged in
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub status: AccountStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub qr_code_url: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeChatAccount {
    pub fn is_bound(&self) -> bool {
        self.device_auth_key.is_some()
    }
}

/// Account joined with key metadata and owner username for listings
#[derive(Debug, Clone, Serialize)]
pub struct WeChatAccountDetail {
    #[serde(flatten)]
    pub account: WeChatAccount,
    pub days: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_name: Option<String>,
}

/// Create-or-update request
///
/// With `auth_key` set this updates the existing account for that key (or
/// registers one around it); without it a fresh key is minted and the account
/// starts in `waiting`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWeChatAccountRequest {
    pub nickname: Option<String>,
    #[serde(default = "default_days")]
    pub days: i64,
    pub auth_key: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub status: Option<AccountStatus>,
    pub device_auth_key: Option<String>,
}

fn default_days() -> i64 {
    30
}

/// Partial update of an account record
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateWeChatAccountRequest {
    pub nickname: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub status: Option<AccountStatus>,
    pub qr_code_url: Option<String>,
    pub device_auth_key: Option<String>,
}

impl UpdateWeChatAccountRequest {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.username.is_none()
            && self.avatar.is_none()
            && self.status.is_none()
            && self.qr_code_url.is_none()
            && self.device_auth_key.is_none()
    }
}

/// Status-only update (`PUT .../{id}/status`)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAccountStatusRequest {
    pub status: Option<AccountStatus>,
    pub qr_code_url: Option<String>,
}
