//! WeChat account repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{AccountStatus, WeChatAccount, WeChatAccountDetail};

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    auth_key: String,
    device_auth_key: Option<String>,
    nickname: Option<String>,
    username: Option<String>,
    avatar: Option<String>,
    status: String,
    last_login: Option<String>,
    qr_code_url: Option<String>,
    user_id: String,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountDetailRow {
    #[sqlx(flatten)]
    account: AccountRow,
    days: Option<i64>,
    expires_at: Option<String>,
    owner_name: Option<String>,
}

impl AccountRow {
    fn into_account(self) -> Result<WeChatAccount> {
        Ok(WeChatAccount {
            id: Uuid::parse_str(&self.id).context("Invalid account id")?,
            auth_key: self.auth_key,
            device_auth_key: self.device_auth_key,
            nickname: self.nickname,
            username: self.username,
            avatar: self.avatar,
            status: self
                .status
                .parse::<AccountStatus>()
                .map_err(anyhow::Error::msg)?,
            last_login: self.last_login.as_deref().map(parse_db_timestamp),
            qr_code_url: self.qr_code_url,
            user_id: Uuid::parse_str(&self.user_id).context("Invalid user id")?,
            created_at: parse_db_timestamp(&self.created_at),
            updated_at: parse_db_timestamp(&self.updated_at),
        })
    }
}

impl AccountDetailRow {
    fn into_detail(self) -> Result<WeChatAccountDetail> {
        Ok(WeChatAccountDetail {
            days: self.days,
            expires_at: self.expires_at.as_deref().map(parse_db_timestamp),
            owner_name: self.owner_name,
            account: self.account.into_account()?,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "wa.id, wa.auth_key, wa.device_auth_key, wa.nickname, wa.username, \
     wa.avatar, wa.status, wa.last_login, wa.qr_code_url, wa.user_id, wa.created_at, wa.updated_at";

pub struct WeChatAccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WeChatAccountRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All accounts with key metadata and owner usernames, newest first
    pub async fn list_all_detailed(&self) -> Result<Vec<WeChatAccountDetail>> {
        let rows = sqlx::query_as::<_, AccountDetailRow>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}, ak.days, ak.expires_at, u.username AS owner_name
            FROM wechat_accounts wa
            LEFT JOIN auth_keys ak ON wa.auth_key = ak.key_value
            LEFT JOIN users u ON wa.user_id = u.id
            ORDER BY wa.created_at DESC
            "#
        ))
        .fetch_all(self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.into_iter().map(AccountDetailRow::into_detail).collect()
    }

    /// One user's accounts, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<WeChatAccount>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM wechat_accounts wa
            WHERE wa.user_id = ?
            ORDER BY wa.created_at DESC
            "#
        ))
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list accounts for user")?;

        rows.into_iter().map(AccountRow::into_account).collect()
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<WeChatAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM wechat_accounts wa WHERE wa.id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get account")?;

        row.map(AccountRow::into_account).transpose()
    }

    pub async fn get_detail_by_id(&self, id: Uuid) -> Result<Option<WeChatAccountDetail>> {
        let row = sqlx::query_as::<_, AccountDetailRow>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}, ak.days, ak.expires_at, u.username AS owner_name
            FROM wechat_accounts wa
            LEFT JOIN auth_keys ak ON wa.auth_key = ak.key_value
            LEFT JOIN users u ON wa.user_id = u.id
            WHERE wa.id = ?
            "#
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get account detail")?;

        row.map(AccountDetailRow::into_detail).transpose()
    }

    pub async fn get_by_auth_key(&self, auth_key: &str) -> Result<Option<WeChatAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM wechat_accounts wa WHERE wa.auth_key = ?"
        ))
        .bind(auth_key)
        .fetch_optional(self.pool)
        .await
        .context("Failed to look up account by auth key")?;

        row.map(AccountRow::into_account).transpose()
    }

    pub async fn insert(&self, account: &WeChatAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wechat_accounts
                (id, auth_key, device_auth_key, nickname, username, avatar, status,
                 last_login, qr_code_url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.auth_key)
        .bind(&account.device_auth_key)
        .bind(&account.nickname)
        .bind(&account.username)
        .bind(&account.avatar)
        .bind(account.status.to_string())
        .bind(account.last_login.map(|t| t.to_rfc3339()))
        .bind(&account.qr_code_url)
        .bind(account.user_id.to_string())
        .bind(account.created_at.to_rfc3339())
        .bind(account.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to insert account")?;

        Ok(())
    }

    /// Persist the full mutable state of an account row
    pub async fn update(&self, account: &WeChatAccount) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE wechat_accounts
            SET device_auth_key = ?, nickname = ?, username = ?, avatar = ?, status = ?,
                last_login = ?, qr_code_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.device_auth_key)
        .bind(&account.nickname)
        .bind(&account.username)
        .bind(&account.avatar)
        .bind(account.status.to_string())
        .bind(account.last_login.map(|t| t.to_rfc3339()))
        .bind(&account.qr_code_url)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(account.id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update account")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wechat_accounts WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete account")?;

        Ok(result.rows_affected() > 0)
    }
}
