//! # Gateway Configuration
//!
//! Configuration for the hosted checkout gateway and the wallet service.
//! All secrets are loaded from environment variables.

use shop_core::CheckoutError;
use std::env;
use std::time::Duration;

/// Hosted checkout gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Endpoint that creates hosted checkouts
    pub api_url: String,

    /// Sent as the `apiKey` header
    pub api_key: String,

    /// Shared secret for `X-Gateway-Signature`
    pub webhook_secret: String,

    /// Seconds before an HTTP call is abandoned
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `GATEWAY_API_URL`
    /// - `GATEWAY_API_KEY`
    /// - `GATEWAY_WEBHOOK_SECRET`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok();

        let api_url = required("GATEWAY_API_URL")?;
        let api_key = required("GATEWAY_API_KEY")?;
        let webhook_secret = required("GATEWAY_WEBHOOK_SECRET")?;

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(CheckoutError::Configuration(
                "GATEWAY_API_URL must be an http(s) URL".to_string(),
            ));
        }

        let timeout = env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            api_url,
            api_key,
            webhook_secret,
            timeout,
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            webhook_secret: webhook_secret.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Builder: HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Wallet service configuration
#[derive(Debug, Clone)]
pub struct WalletServiceConfig {
    pub api_url: String,
    /// Sent as the `apiKey` header; may be empty
    pub api_key: String,
}

impl WalletServiceConfig {
    /// Load from `WALLET_API_URL` (required) and `WALLET_API_KEY`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api_url: required("WALLET_API_URL")?,
            api_key: env::var("WALLET_API_KEY").unwrap_or_default(),
        })
    }

    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }
}

fn required(name: &str) -> Result<String, CheckoutError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CheckoutError::Configuration(format!("{} not set", name)))
}
