//! # Checkout Error Types
//!
//! Typed error handling for the storefront checkout core.
//! Every cart, checkout and reconciliation operation returns
//! `Result<T, CheckoutError>`; nothing in the core panics on bad input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-scoped validation failure on the checkout form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Form field name (e.g. "email", "zip_code")
    pub field: String,
    /// Message shown next to the field
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Buyer input failed validation; the session stays in `Draft`
    #[error("Validation failed for: {}", fields_list(.errors))]
    Validation { errors: Vec<FieldError> },

    /// The payment gateway could not be reached or timed out (retryable)
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// An outcome referenced a session we never created
    #[error("Unknown checkout session: {reference}")]
    UnknownSession { reference: String },

    /// Price is negative, non-finite, or in the wrong currency
    #[error("Invalid price: {message}")]
    InvalidPrice { message: String },

    /// Quantity cannot be represented on a cart line
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// The hosted payment page expired before an outcome arrived
    #[error("Checkout session expired: {session_id}")]
    ExpiredSession { session_id: String },

    /// Operation not allowed in the session's current state
    #[error("Invalid transition from {from} on {action}")]
    InvalidTransition { from: String, action: String },

    /// Cart context not found
    #[error("Cart not found: {cart_id}")]
    CartNotFound { cart_id: String },

    /// Product not found in catalog
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Product exists but is out of stock
    #[error("Product is not available: {product_id}")]
    ProductUnavailable { product_id: String },

    /// Checkout submitted against an empty cart
    #[error("Cart is empty")]
    EmptyCart,

    /// Malformed request data at a boundary
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Gateway or wallet service answered with an error
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Server callback signature check failed
    #[error("Notification verification failed: {0}")]
    NotificationVerificationFailed(String),

    /// Server callback or redirect payload could not be parsed
    #[error("Notification parse error: {0}")]
    NotificationParse(String),

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (corrupted state)
    #[error("Internal error: {0}")]
    Internal(String),
}

fn fields_list(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl CheckoutError {
    /// Shorthand for a single-field validation error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        CheckoutError::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Returns true if the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::GatewayUnavailable(_))
    }

    /// Field errors carried by a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            CheckoutError::Validation { errors } => errors,
            _ => &[],
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::Validation { .. } => 422,
            CheckoutError::GatewayUnavailable(_) => 503,
            CheckoutError::UnknownSession { .. } => 404,
            CheckoutError::InvalidPrice { .. } => 400,
            CheckoutError::InvalidQuantity { .. } => 400,
            CheckoutError::ExpiredSession { .. } => 410,
            CheckoutError::InvalidTransition { .. } => 409,
            CheckoutError::CartNotFound { .. } => 404,
            CheckoutError::ProductNotFound { .. } => 404,
            CheckoutError::ProductUnavailable { .. } => 409,
            CheckoutError::EmptyCart => 400,
            CheckoutError::InvalidRequest(_) => 400,
            CheckoutError::Provider { .. } => 502,
            CheckoutError::NotificationVerificationFailed(_) => 401,
            CheckoutError::NotificationParse(_) => 400,
            CheckoutError::Configuration(_) => 500,
            CheckoutError::Serialization(_) => 500,
            CheckoutError::Internal(_) => 500,
        }
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CheckoutError::GatewayUnavailable("timeout".into()).is_retryable());
        assert!(!CheckoutError::EmptyCart.is_retryable());
        assert!(!CheckoutError::UnknownSession {
            reference: "order_1".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CheckoutError::field("email", "Email is required").status_code(), 422);
        assert_eq!(
            CheckoutError::GatewayUnavailable("down".into()).status_code(),
            503
        );
        assert_eq!(
            CheckoutError::CartNotFound {
                cart_id: "x".into()
            }
            .status_code(),
            404
        );
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = CheckoutError::Validation {
            errors: vec![
                FieldError::new("email", "Email is required"),
                FieldError::new("phone", "Phone number is required"),
            ],
        };
        assert_eq!(err.to_string(), "Validation failed for: email, phone");
        assert_eq!(err.field_errors().len(), 2);
    }
}
