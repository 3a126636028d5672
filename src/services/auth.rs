//! Authentication service
//!
//! Provides password hashing with Argon2 and user account management.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AuthConfig, BootstrapAdmin};
use crate::models::{Role, User, UserPublic};

/// Authentication service for user management
pub struct AuthService {
    pool: SqlitePool,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Authenticate a user by username and password
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self.get_user_by_username(username).await?;

        match user {
            Some(user) => {
                if Self::verify_password(password, &user.password_hash)? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, role, phone, created_at, updated_at FROM users WHERE username = ?"
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let id_str = id.to_string();
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, role, phone, created_at, updated_at FROM users WHERE id = ?"
        )
        .bind(&id_str)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by ID")?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, role, phone, created_at, updated_at FROM users WHERE email = ?"
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Create a new user
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
        phone: Option<&str>,
    ) -> Result<User> {
        // Check if username already exists
        if self.get_user_by_username(username).await?.is_some() {
            anyhow::bail!("Username already exists");
        }

        // Check if email already exists
        if self.get_user_by_email(email).await?.is_some() {
            anyhow::bail!("Email already exists");
        }

        let password_hash = Self::hash_password(password)?;
        let mut user = User::new(
            username.to_string(),
            email.to_string(),
            password_hash,
            role,
        );
        user.phone = phone.map(|p| p.to_string());

        let id_str = user.id.to_string();
        let role_str = user.role.to_string();
        let created_at = user.created_at.to_rfc3339();
        let updated_at = user.updated_at.to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, phone, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id_str)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&role_str)
        .bind(&user.phone)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(user)
    }

    /// Update a user
    ///
    /// Fields left as `None` keep their current value.
    pub async fn update_user(
        &self,
        id: &Uuid,
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
        role: Option<Role>,
        phone: Option<&str>,
    ) -> Result<User> {
        let existing = self.get_user_by_id(id).await?.context("User not found")?;

        let new_username = username.unwrap_or(&existing.username);
        let new_email = email.unwrap_or(&existing.email);
        let new_role = role.unwrap_or(existing.role);
        let new_phone = match phone {
            Some(p) => Some(p.to_string()),
            None => existing.phone.clone(),
        };

        // Check username uniqueness if changed
        if new_username != existing.username
            && self.get_user_by_username(new_username).await?.is_some()
        {
            anyhow::bail!("Username already exists");
        }

        // Check email uniqueness if changed
        if new_email != existing.email && self.get_user_by_email(new_email).await?.is_some() {
            anyhow::bail!("Email already exists");
        }

        let new_password_hash = match password {
            Some(p) => Self::hash_password(p)?,
            None => existing.password_hash.clone(),
        };

        let id_str = id.to_string();
        let role_str = new_role.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE users SET username = ?, email = ?, password_hash = ?, role = ?, phone = ?, updated_at = ? WHERE id = ?"
        )
        .bind(new_username)
        .bind(new_email)
        .bind(&new_password_hash)
        .bind(&role_str)
        .bind(&new_phone)
        .bind(&updated_at)
        .bind(&id_str)
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;

        self.get_user_by_id(id)
            .await?
            .context("User not found after update")
    }

    /// Delete a user together with everything the account owns.
    ///
    /// Devices, WeChat accounts and authorization keys belonging to the
    /// user are removed in a single transaction so a failure partway
    /// through leaves the database untouched.
    pub async fn delete_user_cascade(&self, id: &Uuid) -> Result<bool> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM devices WHERE user_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user devices")?;

        sqlx::query("DELETE FROM wechat_accounts WHERE user_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user WeChat accounts")?;

        sqlx::query("DELETE FROM auth_keys WHERE user_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user auth keys")?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user")?;

        tx.commit().await.context("Failed to commit user deletion")?;

        Ok(result.rows_affected() > 0)
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<UserPublic>> {
        let rows = sqlx::query(
            "SELECT id, username, email, password_hash, role, phone, created_at, updated_at FROM users ORDER BY created_at DESC"
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        Ok(rows.iter().map(|r| row_to_user(r).into()).collect())
    }

    /// Count all registered users
    pub async fn count_users(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        Ok(row.get("count"))
    }

    /// Count users holding the admin role
    pub async fn count_admins(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE role = ?")
            .bind(Role::Admin.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count admins")?;

        Ok(row.get("count"))
    }

    /// Change password for a user (requires current password verification)
    pub async fn change_password(
        &self,
        user_id: &Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        // Get user to verify current password
        let user = self
            .get_user_by_id(user_id)
            .await?
            .context("User not found")?;

        // Verify current password
        if !Self::verify_password(current_password, &user.password_hash)? {
            return Ok(false);
        }

        let new_password_hash = Self::hash_password(new_password)?;
        let user_id_str = user_id.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&new_password_hash)
            .bind(&updated_at)
            .bind(&user_id_str)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;

        Ok(true)
    }

    /// Seed the bootstrap administrator when the database has none.
    ///
    /// Only runs under the `seed` bootstrap policy. Under
    /// `first-registrant` the first registered user is promoted instead
    /// and startup leaves the user table alone.
    pub async fn ensure_seed_admin(&self, config: &AuthConfig) -> Result<()> {
        if config.bootstrap_admin != BootstrapAdmin::Seed {
            return Ok(());
        }

        if self.count_admins().await? > 0 {
            return Ok(());
        }

        if self
            .get_user_by_username(&config.seed_username)
            .await?
            .is_some()
        {
            warn!(
                username = %config.seed_username,
                "Seed admin username is already taken by a non-admin user, skipping bootstrap"
            );
            return Ok(());
        }

        self.create_user(
            &config.seed_username,
            &config.seed_email,
            &config.seed_password,
            Role::Admin,
            None,
        )
        .await
        .context("Failed to create seed admin")?;

        if config.seed_password == "admin123" {
            warn!(
                username = %config.seed_username,
                "Seed admin created with the default password, change it immediately"
            );
        } else {
            info!(username = %config.seed_username, "Seed admin created");
        }

        Ok(())
    }
}

/// Convert a database row to a User
fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    let id_str: String = row.get("id");
    let role_str: String = row.get("role");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    User {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: role_str.parse().unwrap_or_default(),
        phone: row.get("phone"),
        created_at: crate::db::parse_db_timestamp(&created_at_str),
        updated_at: crate::db::parse_db_timestamp(&updated_at_str),
    }
}
