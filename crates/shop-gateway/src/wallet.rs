//! # Wallet Service Client
//!
//! `POST /` on the wallet service creates a wallet; the answer is wrapped in
//! a `{ "data": ... }` envelope and errors carry `{ "message": ... }`.

use crate::config::WalletServiceConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shop_core::{CheckoutError, CheckoutResult, Wallet, WalletProvisioner};
use tracing::{error, instrument};

const PROVIDER: &str = "wallet-service";

pub struct HttpWalletProvisioner {
    config: WalletServiceConfig,
    client: Client,
}

impl HttpWalletProvisioner {
    pub fn new(config: WalletServiceConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| CheckoutError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> CheckoutResult<Self> {
        Self::new(WalletServiceConfig::from_env()?)
    }

    fn failure(message: impl Into<String>) -> CheckoutError {
        CheckoutError::Provider {
            provider: PROVIDER.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[async_trait]
impl WalletProvisioner for HttpWalletProvisioner {
    #[instrument(skip(self))]
    async fn provision(&self) -> CheckoutResult<Wallet> {
        let url = format!("{}/", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("apiKey", &self.config.api_key)
            .send()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;

        if !status.is_success() {
            error!("Wallet service error: status={}, body={}", status, text);
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Failed to create wallet".to_string());
            return Err(Self::failure(message));
        }

        let envelope: Envelope<Wallet> = serde_json::from_str(&text).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse wallet response: {}", e))
        })?;
        Ok(envelope.data)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
