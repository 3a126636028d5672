//! Device repository (reporting only)

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{Device, DeviceWithOwner};

#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: String,
    device_name: String,
    auth_key: String,
    user_id: String,
    status: String,
    last_login: Option<String>,
    created_at: String,
    owner_name: Option<String>,
}

impl DeviceRow {
    fn into_device(self) -> Result<Device> {
        Ok(Device {
            id: Uuid::parse_str(&self.id).context("Invalid device id")?,
            device_name: self.device_name,
            auth_key: self.auth_key,
            user_id: Uuid::parse_str(&self.user_id).context("Invalid user id")?,
            status: self.status,
            last_login: self.last_login.as_deref().map(parse_db_timestamp),
            created_at: parse_db_timestamp(&self.created_at),
        })
    }
}

pub struct DeviceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DeviceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All devices with their owner's username, newest first
    pub async fn list_with_owner(&self) -> Result<Vec<DeviceWithOwner>> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT d.id, d.device_name, d.auth_key, d.user_id, d.status, d.last_login,
                   d.created_at, u.username AS owner_name
            FROM devices d
            LEFT JOIN users u ON d.user_id = u.id
            ORDER BY d.created_at DESC
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list devices")?;

        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            let owner_name = row.owner_name.clone();
            devices.push(DeviceWithOwner {
                device: row.into_device()?,
                owner_name,
            });
        }
        Ok(devices)
    }
}
