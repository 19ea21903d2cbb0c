//! # Payment Outcomes
//!
//! The terminal result of an external settlement attempt. Redirect landings
//! and signed server callbacks are both normalized into `PaymentOutcome`
//! here, at the boundary, so nothing untyped reaches the reconciler.

use crate::error::{CheckoutError, CheckoutResult};
use crate::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Closed set of settlement results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Succeeded,
    Cancelled,
    Failed,
}

impl OutcomeResult {
    /// Map a gateway status string onto the closed set
    pub fn from_status(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "succeeded" | "success" | "completed" | "complete" | "paid" => {
                Some(OutcomeResult::Succeeded)
            }
            "cancelled" | "canceled" => Some(OutcomeResult::Cancelled),
            "failed" | "declined" | "expired" => Some(OutcomeResult::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeResult::Succeeded => "succeeded",
            OutcomeResult::Cancelled => "cancelled",
            OutcomeResult::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OutcomeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which delivery path produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    /// Buyer's browser followed the success/cancel redirect
    Redirect,
    /// Gateway called our webhook
    Callback,
}

/// A normalized payment outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// Gateway intent id or our order reference
    pub reference: String,

    pub result: OutcomeResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,

    /// Cancel/failure reason, when the gateway gives one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub source: OutcomeSource,

    pub external_timestamp: DateTime<Utc>,
}

impl PaymentOutcome {
    pub fn new(reference: impl Into<String>, result: OutcomeResult, source: OutcomeSource) -> Self {
        Self {
            reference: reference.into(),
            result,
            amount: None,
            payer_email: None,
            payer_name: None,
            payment_method: None,
            reason: None,
            source,
            external_timestamp: Utc::now(),
        }
    }

    /// Builder: set the amount reported by the gateway
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Builder: set payer details
    pub fn with_payer(mut self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.payer_email = Some(email.into());
        self.payer_name = Some(name.into());
        self
    }

    /// Normalize redirect landing query parameters.
    ///
    /// Recognized keys: `order_id`/`orderId`, `total`, `email`, `name`,
    /// `payment_method`/`paymentMethod`, `reason`. Anything else is ignored.
    /// A missing order reference is rejected rather than invented.
    pub fn from_redirect(
        result: OutcomeResult,
        params: &HashMap<String, String>,
        currency: Currency,
    ) -> CheckoutResult<Self> {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| params.get(*k))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let reference = get(&["order_id", "orderId"]).ok_or_else(|| {
            CheckoutError::NotificationParse("redirect is missing order_id".to_string())
        })?;

        let amount = get(&["total"]).and_then(|raw| match Money::parse(&raw, currency) {
            Ok(money) => Some(money),
            Err(e) => {
                warn!(reference = %reference, "Ignoring unparsable redirect total: {}", e);
                None
            }
        });

        Ok(Self {
            reference,
            result,
            amount,
            payer_email: get(&["email"]),
            payer_name: get(&["name"]),
            payment_method: get(&["payment_method", "paymentMethod"]),
            reason: get(&["reason"]),
            source: OutcomeSource::Redirect,
            external_timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(OutcomeResult::from_status("PAID"), Some(OutcomeResult::Succeeded));
        assert_eq!(OutcomeResult::from_status("canceled"), Some(OutcomeResult::Cancelled));
        assert_eq!(OutcomeResult::from_status("expired"), Some(OutcomeResult::Failed));
        assert_eq!(OutcomeResult::from_status("pending"), None);
    }

    #[test]
    fn test_success_redirect() {
        let outcome = PaymentOutcome::from_redirect(
            OutcomeResult::Succeeded,
            &params(&[
                ("order_id", "order_abc"),
                ("total", "59.97"),
                ("email", "buyer@example.com"),
                ("name", "Ada Lovelace"),
                ("payment_method", "Pi Network"),
                ("utm_source", "ignored"),
            ]),
            Currency::USD,
        )
        .unwrap();

        assert_eq!(outcome.reference, "order_abc");
        assert_eq!(outcome.amount.unwrap().amount, 5997);
        assert_eq!(outcome.payer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(outcome.payment_method.as_deref(), Some("Pi Network"));
        assert_eq!(outcome.source, OutcomeSource::Redirect);
    }

    #[test]
    fn test_redirect_without_reference_is_rejected() {
        let err = PaymentOutcome::from_redirect(
            OutcomeResult::Succeeded,
            &params(&[("total", "1.00")]),
            Currency::USD,
        )
        .unwrap_err();
        assert!(matches!(err, CheckoutError::NotificationParse(_)));
    }

    #[test]
    fn test_bad_total_is_dropped_not_fatal() {
        let outcome = PaymentOutcome::from_redirect(
            OutcomeResult::Cancelled,
            &params(&[("orderId", "order_1"), ("total", "NaN"), ("reason", "user closed tab")]),
            Currency::USD,
        )
        .unwrap();
        assert!(outcome.amount.is_none());
        assert_eq!(outcome.reason.as_deref(), Some("user closed tab"));
    }
}
