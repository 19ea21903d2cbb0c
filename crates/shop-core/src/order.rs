//! # Order Types
//!
//! The record of a successful checkout. An order is built from the session
//! snapshot, never from the live cart, so later cart edits cannot change it.

use crate::cart::{CartId, CartLine};
use crate::checkout::{BuyerInfo, CheckoutSession, PaymentMethod, PriceBreakdown, SessionId};
use crate::error::{CheckoutError, CheckoutResult};
use crate::money::Money;
use crate::outcome::PaymentOutcome;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days added to the order time for the delivery estimate
pub const DELIVERY_ESTIMATE_DAYS: i64 = 3;

/// A placed order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order reference (same as the session's `order_ref`)
    pub id: String,

    pub cart_id: CartId,

    pub session_id: SessionId,

    /// Line items as priced at submission
    pub lines: Vec<CartLine>,

    pub breakdown: PriceBreakdown,

    pub buyer: BuyerInfo,

    pub payment_method: PaymentMethod,

    /// Outcome that confirmed payment; `None` for immediately settled methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentOutcome>,

    pub created_at: DateTime<Utc>,

    pub estimated_delivery: DateTime<Utc>,
}

impl Order {
    /// Build an order from a session that has been prepared
    pub fn from_session(session: &CheckoutSession) -> CheckoutResult<Self> {
        let missing = |what: &str| {
            CheckoutError::Internal(format!("session {} has no {}", session.id, what))
        };

        let buyer = session.buyer.clone().ok_or_else(|| missing("buyer"))?;
        let payment_method = session.method.ok_or_else(|| missing("payment method"))?;
        let breakdown = session.breakdown.ok_or_else(|| missing("price breakdown"))?;
        let created_at = Utc::now();

        Ok(Self {
            id: session.order_ref.clone(),
            cart_id: session.cart_id,
            session_id: session.id,
            lines: session.lines.clone(),
            breakdown,
            buyer,
            payment_method,
            payment: session.outcome.clone(),
            created_at,
            estimated_delivery: created_at + Duration::days(DELIVERY_ESTIMATE_DAYS),
        })
    }

    /// Amount charged
    pub fn total(&self) -> Money {
        self.breakdown.total
    }

    /// Get item count
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}
