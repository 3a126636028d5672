//! Authorization key repository

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{AuthKey, AuthKeyWithOwner};

#[derive(Debug, sqlx::FromRow)]
struct AuthKeyRow {
    id: String,
    key_value: String,
    user_id: String,
    days: i64,
    created_at: String,
    expires_at: String,
    is_active: i64,
    owner_name: Option<String>,
}

impl AuthKeyRow {
    fn into_key(self) -> Result<AuthKey> {
        Ok(AuthKey {
            id: Uuid::parse_str(&self.id).context("Invalid auth key id")?,
            key_value: self.key_value,
            user_id: Uuid::parse_str(&self.user_id).context("Invalid user id")?,
            days: self.days,
            created_at: parse_db_timestamp(&self.created_at),
            expires_at: parse_db_timestamp(&self.expires_at),
            is_active: self.is_active != 0,
        })
    }
}

pub struct AuthKeyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuthKeyRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one key row
    pub async fn insert(&self, key: &AuthKey) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_keys (id, key_value, user_id, days, created_at, expires_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.id.to_string())
        .bind(&key.key_value)
        .bind(key.user_id.to_string())
        .bind(key.days)
        .bind(key.created_at.to_rfc3339())
        .bind(key.expires_at.to_rfc3339())
        .bind(key.is_active as i64)
        .execute(self.pool)
        .await
        .context("Failed to insert auth key")?;

        Ok(())
    }

    /// Mint a batch of fresh keys owned by `owner`
    pub async fn mint(&self, owner: Uuid, count: u32, days: i64) -> Result<Vec<String>> {
        let mut keys = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = AuthKey::new(owner, days);
            self.insert(&key).await?;
            keys.push(key.key_value);
        }
        Ok(keys)
    }

    /// All keys with their owner's username, newest first
    pub async fn list_with_owner(&self) -> Result<Vec<AuthKeyWithOwner>> {
        let rows = sqlx::query_as::<_, AuthKeyRow>(
            r#"
            SELECT ak.id, ak.key_value, ak.user_id, ak.days, ak.created_at, ak.expires_at,
                   ak.is_active, u.username AS owner_name
            FROM auth_keys ak
            LEFT JOIN users u ON ak.user_id = u.id
            ORDER BY ak.created_at DESC
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list auth keys")?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let owner_name = row.owner_name.clone();
            keys.push(AuthKeyWithOwner {
                key: row.into_key()?,
                owner_name,
            });
        }
        Ok(keys)
    }

    pub async fn find_by_value(&self, key_value: &str) -> Result<Option<AuthKey>> {
        let row = sqlx::query_as::<_, AuthKeyRow>(
            r#"
            SELECT id, key_value, user_id, days, created_at, expires_at, is_active,
                   NULL AS owner_name
            FROM auth_keys
            WHERE key_value = ?
            "#,
        )
        .bind(key_value)
        .fetch_optional(self.pool)
        .await
        .context("Failed to look up auth key")?;

        row.map(AuthKeyRow::into_key).transpose()
    }

    /// Delete a key by its value; false when the key does not exist
    pub async fn delete_by_value(&self, key_value: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_keys WHERE key_value = ?")
            .bind(key_value)
            .execute(self.pool)
            .await
            .context("Failed to delete auth key")?;

        Ok(result.rows_affected() > 0)
    }

    /// Extend a key: `days` is replaced and the expiry becomes now + days.
    /// The extension is measured from the moment of the call, not from the
    /// key's creation time.
    pub async fn delay(&self, key_value: &str, days: i64) -> Result<bool> {
        let expires_at = Utc::now() + chrono::Duration::days(days);

        let result = sqlx::query("UPDATE auth_keys SET days = ?, expires_at = ? WHERE key_value = ?")
            .bind(days)
            .bind(expires_at.to_rfc3339())
            .bind(key_value)
            .execute(self.pool)
            .await
            .context("Failed to delay auth key")?;

        Ok(result.rows_affected() > 0)
    }
}
