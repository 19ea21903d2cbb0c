//! # Payment Gateway Trait
//!
//! Contract for the hosted payment processor that settles external-network
//! payments. The core only depends on two things from it: creating a hosted
//! payment intent, and turning an inbound server callback into a
//! `PaymentOutcome`.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           PaymentGateway (trait)             │
//! │  ├── create_intent()                         │
//! │  ├── verify_notification()                   │
//! │  └── provider_name()                         │
//! └──────────────────────────────────────────────┘
//!                        ▲
//!          ┌─────────────┴─────────────┐
//!  ┌───────┴────────┐         ┌────────┴────────┐
//!  │ HostedCheckout │         │ InMemoryGateway │
//!  │ (shop-gateway) │         │   (sandbox)     │
//!  └────────────────┘         └─────────────────┘
//! ```

use crate::error::{CheckoutError, CheckoutResult};
use crate::money::{Currency, Money};
use crate::outcome::{OutcomeResult, OutcomeSource, PaymentOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One line item sent to the hosted checkout page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentLine {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_amount: Money,
}

/// Opaque metadata echoed back by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub order_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub total: Money,
}

/// Everything the gateway needs to open a hosted payment page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub lines: Vec<IntentLine>,
    pub total: Money,
    pub currency: Currency,
    pub success_url: String,
    pub cancel_url: String,
    pub callback_url: String,
    pub expires_in_minutes: u32,
    pub metadata: IntentMetadata,
    /// Same key for a retried submit of the same draft
    pub idempotency_key: String,
}

/// A created hosted payment intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway's id for the intent
    pub intent_id: String,
    /// Hosted page the buyer is sent to
    pub redirect_url: String,
    /// After this instant the hosted page no longer accepts payment
    pub expires_at: DateTime<Utc>,
}

/// Core trait for payment gateway implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment intent and return the redirect URL.
    ///
    /// Implementations must honor `request.idempotency_key`: a repeated call
    /// with the same key returns the same intent instead of creating another.
    async fn create_intent(&self, request: &IntentRequest) -> CheckoutResult<PaymentIntent>;

    /// Verify a server callback and parse it.
    ///
    /// Returns `Ok(None)` for well-formed callbacks that carry no terminal
    /// result (e.g. "pending").
    async fn verify_notification(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> CheckoutResult<Option<PaymentOutcome>>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;

    /// Path the gateway posts callbacks to.
    fn callback_path(&self) -> String {
        "/webhook/gateway".to_string()
    }
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Server callback body, as the hosted gateway posts it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub intent_id: Option<String>,
    pub status: String,
    /// Decimal amount, either a JSON number or a string
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CallbackPayload {
    /// Parse a raw callback body
    pub fn from_slice(payload: &[u8]) -> CheckoutResult<Self> {
        serde_json::from_slice(payload).map_err(|e| {
            CheckoutError::NotificationParse(format!("Failed to parse callback: {}", e))
        })
    }

    fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Normalize into a `PaymentOutcome`; non-terminal statuses yield `None`.
    ///
    /// The gateway intent id is preferred as reference, then `metadata.orderId`.
    pub fn into_outcome(self) -> CheckoutResult<Option<PaymentOutcome>> {
        let Some(result) = OutcomeResult::from_status(&self.status) else {
            return Ok(None);
        };

        let reference = self
            .intent_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.metadata_str("orderId"))
            .ok_or_else(|| {
                CheckoutError::NotificationParse(
                    "callback carries neither intentId nor metadata.orderId".to_string(),
                )
            })?;

        let currency = self
            .currency
            .as_deref()
            .and_then(Currency::from_code)
            .unwrap_or_default();

        let amount = match &self.amount {
            Some(serde_json::Value::Number(n)) => n
                .as_f64()
                .and_then(|v| Money::from_major(v, currency).ok()),
            Some(serde_json::Value::String(s)) => Money::parse(s, currency).ok(),
            _ => None,
        };

        Ok(Some(PaymentOutcome {
            reference,
            result,
            amount,
            payer_email: self.metadata_str("customerEmail"),
            payer_name: self.metadata_str("customerName"),
            payment_method: self.payment_method.clone(),
            reason: self.reason.clone(),
            source: OutcomeSource::Callback,
            external_timestamp: self.created_at.unwrap_or_else(Utc::now),
        }))
    }
}

/// Configuration for URLs used in checkout
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the application (e.g., "https://shop.example.com")
    pub base_url: String,
    /// Success landing path
    pub success_path: String,
    /// Cancel landing path
    pub cancel_path: String,
    /// Server callback path
    pub callback_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            success_path: "/checkout/success".to_string(),
            cancel_path: "/checkout/cancel".to_string(),
            callback_path: "/webhook/gateway".to_string(),
        }
    }

    pub fn success_url(&self) -> String {
        format!("{}{}", self.base_url, self.success_path)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }

    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url, self.callback_path)
    }

    /// Success and cancel targets that carry our order reference back
    pub fn for_order(&self, order_ref: &str) -> (String, String) {
        (
            format!("{}?order_id={}", self.success_url(), order_ref),
            format!("{}?order_id={}", self.cancel_url(), order_ref),
        )
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_urls() {
        let urls = CheckoutUrls::new("https://shop.example.com/");

        assert_eq!(urls.success_url(), "https://shop.example.com/checkout/success");
        assert_eq!(urls.cancel_url(), "https://shop.example.com/checkout/cancel");
        assert_eq!(urls.callback_url(), "https://shop.example.com/webhook/gateway");

        let (success, cancel) = urls.for_order("order_abc_1");
        assert_eq!(success, "https://shop.example.com/checkout/success?order_id=order_abc_1");
        assert_eq!(cancel, "https://shop.example.com/checkout/cancel?order_id=order_abc_1");
    }

    #[test]
    fn test_callback_prefers_intent_id() {
        let body = br#"{
            "eventId": "evt_1",
            "intentId": "intent_42",
            "status": "succeeded",
            "amount": "59.97",
            "currency": "USD",
            "paymentMethod": "pi",
            "metadata": { "orderId": "order_x_1", "customerEmail": "a@b.co" }
        }"#;

        let outcome = CallbackPayload::from_slice(body)
            .unwrap()
            .into_outcome()
            .unwrap()
            .unwrap();

        assert_eq!(outcome.reference, "intent_42");
        assert_eq!(outcome.result, OutcomeResult::Succeeded);
        assert_eq!(outcome.amount.unwrap().amount, 5997);
        assert_eq!(outcome.payer_email.as_deref(), Some("a@b.co"));
        assert_eq!(outcome.source, OutcomeSource::Callback);
    }

    #[test]
    fn test_callback_falls_back_to_order_id_and_numeric_amount() {
        let body = br#"{ "status": "cancelled", "amount": 12.5, "metadata": { "orderId": "order_y_2" } }"#;
        let outcome = CallbackPayload::from_slice(body)
            .unwrap()
            .into_outcome()
            .unwrap()
            .unwrap();
        assert_eq!(outcome.reference, "order_y_2");
        assert_eq!(outcome.amount.unwrap().amount, 1250);
    }

    #[test]
    fn test_callback_non_terminal_status_is_ignored() {
        let body = br#"{ "intentId": "intent_1", "status": "pending" }"#;
        let outcome = CallbackPayload::from_slice(body).unwrap().into_outcome().unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_callback_without_reference_is_rejected() {
        let body = br#"{ "status": "failed" }"#;
        assert!(CallbackPayload::from_slice(body).unwrap().into_outcome().is_err());
        assert!(CallbackPayload::from_slice(b"not json").is_err());
    }
}
