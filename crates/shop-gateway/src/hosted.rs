//! # Hosted Checkout Gateway
//!
//! HTTP adapter for the hosted external-network checkout. A JSON POST opens
//! a hosted page; the gateway later reports the result through the redirect
//! landings and a signed server callback.

use crate::config::GatewayConfig;
use crate::signature;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shop_core::{
    CallbackPayload, CheckoutError, CheckoutResult, IntentRequest, PaymentGateway, PaymentIntent,
    PaymentOutcome,
};
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "hosted-checkout";

/// Hosted checkout gateway over HTTP
pub struct HostedCheckoutGateway {
    config: GatewayConfig,
    client: Client,
}

impl HostedCheckoutGateway {
    pub fn new(config: GatewayConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckoutError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    fn build_body(request: &IntentRequest) -> HostedCheckoutBody {
        HostedCheckoutBody {
            items: request
                .lines
                .iter()
                .map(|line| HostedItem {
                    name: line.name.clone(),
                    description: line.description.clone(),
                    quantity: line.quantity,
                    image: line.image.clone(),
                    amount: line.unit_amount.as_major(),
                })
                .collect(),
            success_url: request.success_url.clone(),
            currency: request.currency.code(),
            cancel_url: request.cancel_url.clone(),
            webhook_url: request.callback_url.clone(),
            expires_in_minutes: request.expires_in_minutes,
            metadata: HostedMetadata {
                order_id: request.metadata.order_id.clone(),
                customer_email: request.metadata.customer_email.clone(),
                customer_name: request.metadata.customer_name.clone(),
                total_amount: request.metadata.total.as_major(),
            },
        }
    }

    fn provider_error(message: impl Into<String>) -> CheckoutError {
        CheckoutError::Provider {
            provider: PROVIDER.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HostedCheckoutGateway {
    #[instrument(skip(self, request), fields(order_id = %request.metadata.order_id))]
    async fn create_intent(&self, request: &IntentRequest) -> CheckoutResult<PaymentIntent> {
        if request.lines.is_empty() {
            return Err(CheckoutError::InvalidRequest(
                "Checkout has no items".to_string(),
            ));
        }

        let body = Self::build_body(request);
        debug!(
            "Creating hosted checkout: {} items, total={}",
            body.items.len(),
            request.total
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .header("apiKey", &self.config.api_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            error!("Gateway unavailable: status={}, body={}", status, text);
            return Err(CheckoutError::GatewayUnavailable(format!("HTTP {}", status)));
        }

        if !status.is_success() {
            error!("Gateway rejected checkout: status={}, body={}", status, text);
            let message = serde_json::from_str::<HostedErrorResponse>(&text)
                .ok()
                .and_then(HostedErrorResponse::message)
                .unwrap_or_else(|| format!("HTTP {}: {}", status, text));
            return Err(Self::provider_error(message));
        }

        let parsed: HostedCheckoutResponse = serde_json::from_str(&text).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse gateway response: {}", e))
        })?;

        let redirect_url = match (parsed.success, parsed.checkout_url) {
            (true, Some(url)) if !url.is_empty() => url,
            _ => {
                return Err(Self::provider_error(
                    parsed
                        .message
                        .unwrap_or_else(|| "Failed to create checkout".to_string()),
                ))
            }
        };

        let intent = PaymentIntent {
            intent_id: parsed
                .intent_id
                .unwrap_or_else(|| request.metadata.order_id.clone()),
            redirect_url,
            expires_at: parsed.expires_at.unwrap_or_else(|| {
                Utc::now() + Duration::minutes(i64::from(request.expires_in_minutes))
            }),
        };

        info!(
            "Created hosted checkout: id={}, url={}",
            intent.intent_id, intent.redirect_url
        );
        Ok(intent)
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> CheckoutResult<Option<PaymentOutcome>> {
        signature::verify(
            &self.config.webhook_secret,
            payload,
            signature,
            Utc::now().timestamp(),
        )?;

        let callback = CallbackPayload::from_slice(payload)?;
        debug!(
            "Verified gateway callback: event={:?}, status={}",
            callback.event_id, callback.status
        );
        callback.into_outcome()
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Gateway API Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HostedCheckoutBody {
    items: Vec<HostedItem>,
    success_url: String,
    currency: String,
    cancel_url: String,
    webhook_url: String,
    expires_in_minutes: u32,
    metadata: HostedMetadata,
}

#[derive(Debug, Serialize)]
struct HostedItem {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HostedMetadata {
    order_id: String,
    customer_email: String,
    customer_name: String,
    total_amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostedCheckoutResponse {
    success: bool,
    #[serde(default)]
    checkout_url: Option<String>,
    #[serde(default)]
    intent_id: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostedErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HostedErrorResponse {
    fn message(self) -> Option<String> {
        self.message.or(self.error)
    }
}
