//! Schema migrations
//!
//! The schema is an ordered list of SQL statements applied in sequence at
//! startup. Applied versions are recorded in `schema_migrations` so restarts
//! skip completed steps; the first failure aborts startup.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Ordered migration list. Append only; never reorder or edit applied entries.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_create_users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'agent', 'user')),
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "0002_create_auth_keys",
        r#"
        CREATE TABLE IF NOT EXISTS auth_keys (
            id TEXT PRIMARY KEY,
            key_value TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL REFERENCES users (id),
            days INTEGER NOT NULL DEFAULT 30,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    ),
    (
        "0003_create_wechat_accounts",
        r#"
        CREATE TABLE IF NOT EXISTS wechat_accounts (
            id TEXT PRIMARY KEY,
            auth_key TEXT NOT NULL UNIQUE REFERENCES auth_keys (key_value),
            device_auth_key TEXT,
            nickname TEXT,
            username TEXT,
            avatar TEXT,
            status TEXT NOT NULL DEFAULT 'waiting' CHECK (
                status IN ('waiting', 'scanning', 'scanned_confirming', 'online', 'offline', 'failed')
            ),
            last_login TEXT,
            qr_code_url TEXT,
            user_id TEXT NOT NULL REFERENCES users (id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "0004_create_devices",
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            device_name TEXT NOT NULL,
            auth_key TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES users (id),
            status TEXT NOT NULL DEFAULT 'offline',
            last_login TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "0005_index_auth_keys_user",
        "CREATE INDEX IF NOT EXISTS idx_auth_keys_user_id ON auth_keys (user_id)",
    ),
    (
        "0006_index_wechat_accounts_user",
        "CREATE INDEX IF NOT EXISTS idx_wechat_accounts_user_id ON wechat_accounts (user_id)",
    ),
    (
        "0007_index_devices_user",
        "CREATE INDEX IF NOT EXISTS idx_devices_user_id ON devices (user_id)",
    ),
];

/// Apply all pending migrations in order
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
    )
    .execute(pool)
    .await
    .context("Failed to create schema_migrations table")?;

    for (version, sql) in MIGRATIONS {
        let applied = sqlx::query("SELECT version FROM schema_migrations WHERE version = ?")
            .bind(version)
            .fetch_optional(pool)
            .await
            .context("Failed to read schema_migrations")?;

        if applied.is_some() {
            continue;
        }

        sqlx::query(sql)
            .execute(pool)
            .await
            .with_context(|| format!("Migration {} failed", version))?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(pool)
            .await
            .with_context(|| format!("Failed to record migration {}", version))?;

        info!(version, "Applied migration");
    }

    Ok(())
}
