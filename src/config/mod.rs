//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Optional TLS and static frontend serving
//! - Optional WeChat login gateway connection

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    /// WeChat login gateway connection (if not set, gateway calls are disabled
    /// and QR codes are generated locally)
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// TLS/HTTPS configuration (if not set, server runs HTTP)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Path to static files directory (frontend build output)
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
    /// Whether to serve the frontend SPA (enables fallback to index.html)
    #[serde(default = "default_serve_frontend")]
    pub serve_frontend: bool,
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    pub cert_file: PathBuf,
    /// Path to TLS private key file (PEM format)
    pub key_file: PathBuf,
    /// Minimum TLS version (1.2 or 1.3, defaults to 1.3)
    #[serde(default = "default_min_tls_version")]
    pub min_version: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_static_dir() -> Option<PathBuf> {
    // Default to looking for the frontend build in the current directory
    let path = PathBuf::from("frontend/dist");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn default_serve_frontend() -> bool {
    true
}

fn default_min_tls_version() -> String {
    "1.3".to_string()
}

/// WeChat login gateway connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    pub url: String,
    /// Timeout in seconds (supports both timeout_secs and timeout field names)
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// How the first admin account comes to exist
    #[serde(default)]
    pub bootstrap_admin: BootstrapAdmin,
    #[serde(default = "default_seed_username")]
    pub seed_username: String,
    #[serde(default = "default_seed_password")]
    pub seed_password: String,
    #[serde(default = "default_seed_email")]
    pub seed_email: String,
}

/// Bootstrap admin policy
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapAdmin {
    /// Create a seed admin at startup when no admin exists
    #[default]
    Seed,
    /// The first registered user becomes admin; no startup seeding
    FirstRegistrant,
}

fn default_token_expiry() -> u64 {
    24
}

fn default_password_min_length() -> usize {
    8
}

fn default_seed_username() -> String {
    "admin".to_string()
}

fn default_seed_password() -> String {
    "admin123".to_string()
}

fn default_seed_email() -> String {
    "admin@example.com".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix (default: "wechat-admin")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation (default: true for production)
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr) - default for development
    #[default]
    Console,
    /// Log to file with optional rotation - recommended for production
    File,
    /// Log to both console and file
    Both,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/wechat-admin")
}

fn default_log_prefix() -> String {
    "wechat-admin".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                workers: default_workers(),
                request_timeout_secs: None,
                tls: None,
                static_dir: default_static_dir(),
                serve_frontend: default_serve_frontend(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production-minimum-32-characters-long".to_string(),
                token_expiry_hours: default_token_expiry(),
                password_min_length: default_password_min_length(),
                bootstrap_admin: BootstrapAdmin::default(),
                seed_username: default_seed_username(),
                seed_password: default_seed_password(),
                seed_email: default_seed_email(),
            },
            database: DatabaseConfig {
                url: "sqlite://./data/wechat-admin.db".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            gateway: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with WECHAT_ADMIN_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        // Check for config path override from environment
        let config_path = std::env::var("WECHAT_ADMIN_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = if let Some(ref path) = config_path {
            if path.exists() {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_norway::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            } else {
                eprintln!("[CONFIG] Config file path exists but file not found: {:?}", path);
                AppConfig::default()
            }
        } else {
            eprintln!("[CONFIG] No config file found, using defaults");
            AppConfig::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            // System config directory
            PathBuf::from("/etc/wechat-admin/config.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("wechat-admin/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(host) = std::env::var("WECHAT_ADMIN_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("WECHAT_ADMIN_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Database overrides
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        // Auth overrides
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(policy) = std::env::var("WECHAT_ADMIN_BOOTSTRAP_ADMIN") {
            self.auth.bootstrap_admin = match policy.to_lowercase().as_str() {
                "first-registrant" | "first_registrant" => BootstrapAdmin::FirstRegistrant,
                _ => BootstrapAdmin::Seed,
            };
        }
        if let Ok(username) = std::env::var("WECHAT_ADMIN_SEED_USERNAME") {
            self.auth.seed_username = username;
        }
        if let Ok(password) = std::env::var("WECHAT_ADMIN_SEED_PASSWORD") {
            self.auth.seed_password = password;
        }

        // Gateway overrides
        if let Ok(url) = std::env::var("WECHAT_GATEWAY_URL") {
            let gateway = self.gateway.get_or_insert_with(|| GatewayConfig {
                url: url.clone(),
                timeout_secs: default_timeout(),
            });
            gateway.url = url;
        }
        if let Ok(timeout) = std::env::var("WECHAT_GATEWAY_TIMEOUT") {
            if let (Some(gateway), Ok(t)) = (self.gateway.as_mut(), timeout.parse()) {
                gateway.timeout_secs = t;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("WECHAT_ADMIN_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(target) = std::env::var("WECHAT_ADMIN_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Ok(dir) = std::env::var("WECHAT_ADMIN_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("WECHAT_ADMIN_LOG_PREFIX") {
            self.logging.log_prefix = prefix;
        }
        if let Ok(rotation) = std::env::var("WECHAT_ADMIN_LOG_ROTATION") {
            self.logging.daily_rotation = rotation.parse().unwrap_or(true);
        }

        // Server TLS overrides
        if let Ok(cert) = std::env::var("WECHAT_ADMIN_TLS_CERT") {
            let key = std::env::var("WECHAT_ADMIN_TLS_KEY").unwrap_or_default();
            if !key.is_empty() {
                self.server.tls = Some(TlsConfig {
                    cert_file: PathBuf::from(cert),
                    key_file: PathBuf::from(key),
                    min_version: std::env::var("WECHAT_ADMIN_TLS_MIN_VERSION")
                        .unwrap_or_else(|_| default_min_tls_version()),
                });
            }
        }

        // Static directory override
        if let Ok(dir) = std::env::var("WECHAT_ADMIN_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }

        // Serve frontend override
        if let Ok(serve) = std::env::var("WECHAT_ADMIN_SERVE_FRONTEND") {
            self.server.serve_frontend = serve.parse().unwrap_or(true);
        }
    }

    fn validate(&self) -> Result<()> {
        // Validate JWT secret length
        if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }

        // Validate port
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // Validate gateway URL if the section is present
        if let Some(ref gateway) = self.gateway {
            if gateway.url.is_empty() {
                anyhow::bail!("Gateway URL cannot be empty when the gateway section is present");
            }
        }

        // Validate seed credentials when seeding is the active policy
        if self.auth.bootstrap_admin == BootstrapAdmin::Seed {
            if self.auth.seed_username.is_empty() {
                anyhow::bail!("Seed admin username cannot be empty");
            }
            if self.auth.seed_password.len() < self.auth.password_min_length {
                anyhow::bail!(
                    "Seed admin password must be at least {} characters long",
                    self.auth.password_min_length
                );
            }
        }

        // Validate TLS configuration if present
        if let Some(ref tls) = self.server.tls {
            if !tls.cert_file.exists() {
                anyhow::bail!("TLS certificate file not found: {:?}", tls.cert_file);
            }
            if !tls.key_file.exists() {
                anyhow::bail!("TLS key file not found: {:?}", tls.key_file);
            }
            if tls.min_version != "1.2" && tls.min_version != "1.3" {
                anyhow::bail!(
                    "Invalid TLS minimum version: {}. Must be '1.2' or '1.3'",
                    tls.min_version
                );
            }
        }

        // Validate static directory if specified
        if let Some(ref static_dir) = self.server.static_dir {
            if !static_dir.exists() {
                tracing::warn!(
                    "Static directory does not exist: {:?}. Frontend will not be served.",
                    static_dir
                );
            }
        }

        Ok(())
    }

    /// Create a default configuration file
    pub fn create_default_config(path: &PathBuf) -> Result<()> {
        let config = AppConfig::default();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_norway::to_string(&config)?;
        std::fs::write(path, yaml)?;

        Ok(())
    }
}
