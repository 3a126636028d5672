//! WeChat login gateway client
//!
//! Thin HTTP client for the external login gateway. Every call is a
//! single attempt with no retries. The gateway reports failures inside
//! its response envelope rather than through HTTP status codes, so
//! bodies are decoded regardless of status.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::utils::AppError;

/// Response envelope used by every gateway endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEnvelope {
    #[serde(rename = "Code")]
    pub code: i64,
    #[serde(rename = "Data", default)]
    pub data: Option<serde_json::Value>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

impl GatewayEnvelope {
    /// Whether the gateway reported success
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// Gateway-supplied failure message, with a fallback when the
    /// gateway fails silently
    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string())
    }

    /// Pull a QR code URL out of the envelope data, if present.
    ///
    /// The gateway returns either a bare URL string or an object
    /// keyed by `QrUrl`, `QrCodeUrl` or `Url` depending on endpoint
    /// version.
    pub fn qr_code_url(&self) -> Option<String> {
        let data = self.data.as_ref()?;
        if let Some(url) = data.as_str() {
            return Some(url.to_string());
        }
        for field in ["QrUrl", "QrCodeUrl", "Url"] {
            if let Some(url) = data.get(field).and_then(|v| v.as_str()) {
                return Some(url.to_string());
            }
        }
        None
    }
}

/// Request body shared by the login endpoints
#[derive(Debug, Serialize)]
struct KeyRequest<'a> {
    key: &'a str,
}

/// Client for the WeChat login gateway
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        info!("Initializing login gateway client for {}", config.url);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .use_rustls_tls()
            .build()
            .context("Failed to create gateway HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Wake up a previously bound device session
    pub async fn wakeup_login(&self, device_key: &str) -> Result<GatewayEnvelope, AppError> {
        self.post_key("/login/WakeUpLogin", device_key).await
    }

    /// Request a fresh login QR code for an authorization key
    pub async fn get_login_qr(&self, auth_key: &str) -> Result<GatewayEnvelope, AppError> {
        self.post_key("/login/GetLoginQrCodeNew", auth_key).await
    }

    /// Query the gateway-side login state for an authorization key
    pub async fn check_login_status(&self, auth_key: &str) -> Result<GatewayEnvelope, AppError> {
        self.post_key("/login/CheckLoginStatus", auth_key).await
    }

    async fn post_key(&self, path: &str, key: &str) -> Result<GatewayEnvelope, AppError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Calling login gateway");

        let response = self
            .client
            .post(&url)
            .json(&KeyRequest { key })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            // Truncate body for the error message if too long, on a
            // character boundary since gateway messages are Chinese
            let mut truncated: String = body.chars().take(500).collect();
            if truncated.len() < body.len() {
                truncated.push_str("... (truncated)");
            }
            AppError::Gateway(format!(
                "Unexpected gateway response (status {}): {}: {}",
                status, e, truncated
            ))
        })
    }
}
