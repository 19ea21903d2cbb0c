//! # Checkout Session
//!
//! The bounded attempt to turn a cart into a paid order.
//!
//! ```text
//! Draft ──submit(external)──► PendingExternalPayment ──┬──► Succeeded
//!   │                                │                 ├──► Cancelled
//!   │                                └─(expiry passes)─┴──► Failed
//!   └──submit(immediate)──────────────────────────────────► Succeeded
//! ```
//!
//! Methods here are pure state transitions; gateway calls, cart clearing
//! and order creation are driven by `CartContext`.

use crate::cart::{CartId, CartLine};
use crate::error::{CheckoutError, CheckoutResult, FieldError};
use crate::gateway::PaymentIntent;
use crate::money::Money;
use crate::outcome::{OutcomeResult, PaymentOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a checkout session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of payment methods offered at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card details collected on the form; settles immediately
    Card,
    /// Hosted external-network payment (Pi Network)
    #[serde(alias = "pi")]
    ExternalNetwork,
}

impl PaymentMethod {
    /// True if the method completes without leaving the storefront
    pub fn settles_immediately(&self) -> bool {
        matches!(self, PaymentMethod::Card)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::ExternalNetwork => "Pi Network",
        }
    }
}

/// Buyer contact and shipping details from the checkout form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    #[serde(default, alias = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, alias = "zipCode")]
    pub zip_code: String,
    #[serde(default)]
    pub phone: String,
}

impl BuyerInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Check every required field, reporting all failures at once
    pub fn validate(&self) -> CheckoutResult<()> {
        let mut errors = Vec::new();

        if self.email.trim().is_empty() {
            errors.push(FieldError::new("email", "Email is required"));
        } else if !is_valid_email(self.email.trim()) {
            errors.push(FieldError::new("email", "Invalid email"));
        }

        let required = [
            ("first_name", &self.first_name, "First name is required"),
            ("last_name", &self.last_name, "Last name is required"),
            ("address", &self.address, "Address is required"),
            ("city", &self.city, "City is required"),
            ("state", &self.state, "State is required"),
            ("zip_code", &self.zip_code, "ZIP code is required"),
            ("phone", &self.phone, "Phone number is required"),
        ];
        for (field, value, message) in required {
            if value.trim().is_empty() {
                errors.push(FieldError::new(field, message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::Validation { errors })
        }
    }
}

/// `local@domain` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

/// Tax and shipping rules applied at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// Tax rate in basis points (800 = 8%)
    pub rate_bps: u32,
    /// Flat shipping in minor units
    pub shipping_minor: i64,
}

impl TaxPolicy {
    pub fn new(rate_bps: u32) -> Self {
        Self {
            rate_bps,
            shipping_minor: 0,
        }
    }

    /// No tax, free shipping
    pub fn exempt() -> Self {
        Self::new(0)
    }
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self::new(800)
    }
}

/// Subtotal, shipping, tax and total for one checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl PriceBreakdown {
    pub fn compute(subtotal: Money, policy: &TaxPolicy) -> Self {
        let shipping = Money::from_minor(policy.shipping_minor, subtotal.currency);
        let tax = subtotal.percent_bps(policy.rate_bps);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

/// The state of a checkout session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Collecting buyer data; may be submitted (again)
    #[default]
    Draft,

    /// Buyer was sent to the hosted payment page
    PendingExternalPayment,

    /// Payment confirmed (terminal)
    Succeeded,

    /// Buyer cancelled on the hosted page (terminal)
    Cancelled,

    /// Payment declined or the intent expired (terminal)
    Failed,
}

impl SessionState {
    pub fn can_submit(&self) -> bool {
        matches!(self, SessionState::Draft)
    }

    pub fn awaits_outcome(&self) -> bool {
        matches!(self, SessionState::PendingExternalPayment)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Succeeded | SessionState::Cancelled | SessionState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Draft => "Draft",
            SessionState::PendingExternalPayment => "PendingExternalPayment",
            SessionState::Succeeded => "Succeeded",
            SessionState::Cancelled => "Cancelled",
            SessionState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<OutcomeResult> for SessionState {
    fn from(result: OutcomeResult) -> Self {
        match result {
            OutcomeResult::Succeeded => SessionState::Succeeded,
            OutcomeResult::Cancelled => SessionState::Cancelled,
            OutcomeResult::Failed => SessionState::Failed,
        }
    }
}

/// Why a session ended up `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Gateway reported the payment failed
    Declined,
    /// The hosted page expired with no outcome
    Expired,
}

/// What an outcome did to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed to the given state
    Applied(SessionState),
    /// Same result already recorded; nothing to do
    Duplicate,
    /// Session could not accept it (terminal with another result, or not yet pending)
    Dropped(SessionState),
}

/// What callers see of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub cart_id: CartId,
    pub order_ref: String,
    pub attempt: u32,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<PriceBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: SessionId,
    pub cart_id: CartId,

    /// 1-based submit attempt for this cart
    pub attempt: u32,

    /// Our order reference, passed to the gateway as `metadata.orderId`
    pub order_ref: String,

    /// Derived from (cart, attempt); stable across retried submits
    pub idempotency_key: String,

    state: SessionState,

    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<BuyerInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,

    /// Lines priced at submission
    #[serde(default)]
    pub lines: Vec<CartLine>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<PriceBreakdown>,

    /// Intent returned by the gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<PaymentIntent>,

    /// Outcome that moved the session to its terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PaymentOutcome>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Start a draft for the given cart attempt
    pub fn new(cart_id: CartId, attempt: u32) -> Self {
        let now = Utc::now();
        let cart = cart_id.as_uuid().simple();
        Self {
            id: SessionId::new(),
            cart_id,
            attempt,
            order_ref: format!("order_{}_{}", cart, attempt),
            idempotency_key: format!("cart_{}_attempt_{}", cart, attempt),
            state: SessionState::Draft,
            failure: None,
            buyer: None,
            method: None,
            lines: Vec::new(),
            breakdown: None,
            external: None,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stored state, without the expiry check
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// State as observed at `now`: a pending session past its expiry reads as `Failed`
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.is_expired_at(now) {
            SessionState::Failed
        } else {
            self.state
        }
    }

    /// Failure reason as observed at `now`
    pub fn failure_at(&self, now: DateTime<Utc>) -> Option<FailureReason> {
        if self.is_expired_at(now) {
            Some(FailureReason::Expired)
        } else {
            self.failure
        }
    }

    /// Pending, and the gateway expiry has passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.state.awaits_outcome()
            && self
                .external
                .as_ref()
                .map(|intent| now > intent.expires_at)
                .unwrap_or(false)
    }

    /// True if `reference` is our order ref or the gateway intent id
    pub fn matches(&self, reference: &str) -> bool {
        self.order_ref == reference
            || self
                .external
                .as_ref()
                .map(|intent| intent.intent_id == reference)
                .unwrap_or(false)
    }

    /// True if this session has not been priced yet or was priced with
    /// exactly these lines and breakdown
    pub fn priced_as(&self, lines: &[CartLine], breakdown: &PriceBreakdown) -> bool {
        match &self.breakdown {
            None => true,
            Some(recorded) => recorded == breakdown && self.lines == lines,
        }
    }

    /// Validate and record the submission; stays `Draft` either way.
    pub fn prepare(
        &mut self,
        buyer: BuyerInfo,
        method: PaymentMethod,
        lines: Vec<CartLine>,
        breakdown: PriceBreakdown,
    ) -> CheckoutResult<()> {
        self.require(SessionState::Draft, "submit")?;
        buyer.validate()?;

        self.buyer = Some(buyer);
        self.method = Some(method);
        self.lines = lines;
        self.breakdown = Some(breakdown);
        self.touch();
        Ok(())
    }

    /// Draft -> PendingExternalPayment once the gateway returned an intent
    pub fn begin_external(&mut self, intent: PaymentIntent) -> CheckoutResult<()> {
        self.require(SessionState::Draft, "begin_external")?;
        self.external = Some(intent);
        self.state = SessionState::PendingExternalPayment;
        self.touch();
        Ok(())
    }

    /// Draft -> Succeeded for methods that settle without a redirect
    pub fn settle_immediately(&mut self) -> CheckoutResult<()> {
        self.require(SessionState::Draft, "settle_immediately")?;
        match self.method {
            Some(method) if method.settles_immediately() => {
                self.state = SessionState::Succeeded;
                self.touch();
                Ok(())
            }
            _ => Err(CheckoutError::InvalidTransition {
                from: self.state.to_string(),
                action: "settle_immediately".to_string(),
            }),
        }
    }

    /// Apply a payment outcome observed at `now`.
    pub fn apply_outcome(&mut self, outcome: &PaymentOutcome, now: DateTime<Utc>) -> Transition {
        self.expire_if_due(now);

        match self.state {
            SessionState::PendingExternalPayment => {
                let next = SessionState::from(outcome.result);
                self.state = next;
                if next == SessionState::Failed {
                    self.failure = Some(FailureReason::Declined);
                }
                self.outcome = Some(outcome.clone());
                self.touch();
                Transition::Applied(next)
            }
            state if state == SessionState::from(outcome.result) => Transition::Duplicate,
            state => Transition::Dropped(state),
        }
    }

    /// Materialize an elapsed expiry; returns true if the state changed
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired_at(now) {
            self.state = SessionState::Failed;
            self.failure = Some(FailureReason::Expired);
            self.touch();
            true
        } else {
            false
        }
    }

    /// Read model at `now`, with expiry applied
    pub fn view_at(&self, now: DateTime<Utc>) -> SessionView {
        SessionView {
            session_id: self.id,
            cart_id: self.cart_id,
            order_ref: self.order_ref.clone(),
            attempt: self.attempt,
            state: self.state_at(now),
            failure: self.failure_at(now),
            payment_method: self.method,
            breakdown: self.breakdown,
            redirect_url: self.external.as_ref().map(|i| i.redirect_url.clone()),
            expires_at: self.external.as_ref().map(|i| i.expires_at),
            updated_at: self.updated_at,
        }
    }

    fn require(&self, expected: SessionState, action: &str) -> CheckoutResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CheckoutError::InvalidTransition {
                from: self.state.to_string(),
                action: action.to_string(),
            })
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::outcome::OutcomeSource;
    use chrono::Duration;

    fn buyer() -> BuyerInfo {
        BuyerInfo {
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            address: "12 Analytical Way".into(),
            city: "London".into(),
            state: "LDN".into(),
            zip_code: "10001".into(),
            phone: "555-0100".into(),
        }
    }

    fn breakdown() -> PriceBreakdown {
        PriceBreakdown::compute(Money::from_minor(5997, Currency::USD), &TaxPolicy::exempt())
    }

    fn pending_session(expires_at: DateTime<Utc>) -> CheckoutSession {
        let mut session = CheckoutSession::new(CartId::new(), 1);
        session
            .prepare(buyer(), PaymentMethod::ExternalNetwork, Vec::new(), breakdown())
            .unwrap();
        session
            .begin_external(PaymentIntent {
                intent_id: "intent_1".into(),
                redirect_url: "https://pay.example.com/intent_1".into(),
                expires_at,
            })
            .unwrap();
        session
    }

    fn outcome(result: OutcomeResult) -> PaymentOutcome {
        PaymentOutcome::new("intent_1", result, OutcomeSource::Callback)
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a@b"));
        assert!(is_valid_email("buyer@example.com"));
        assert!(!is_valid_email("buyer.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("buyer@"));
        assert!(!is_valid_email("bu yer@example.com"));
    }

    #[test]
    fn test_validation_reports_every_field() {
        let info = BuyerInfo {
            email: "not-an-email".into(),
            ..BuyerInfo::default()
        };
        let err = info.validate().unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["email", "first_name", "last_name", "address", "city", "state", "zip_code", "phone"]
        );
        assert_eq!(err.field_errors()[0].message, "Invalid email");
    }

    #[test]
    fn test_missing_email_keeps_draft() {
        let mut session = CheckoutSession::new(CartId::new(), 1);
        let info = BuyerInfo {
            email: String::new(),
            ..buyer()
        };
        let err = session
            .prepare(info, PaymentMethod::ExternalNetwork, Vec::new(), breakdown())
            .unwrap_err();

        assert_eq!(err.field_errors(), &[FieldError::new("email", "Email is required")]);
        assert_eq!(session.state(), SessionState::Draft);
        assert!(session.buyer.is_none());
    }

    #[test]
    fn test_breakdown_default_tax() {
        let breakdown =
            PriceBreakdown::compute(Money::from_minor(5997, Currency::USD), &TaxPolicy::default());
        assert_eq!(breakdown.shipping.amount, 0);
        assert_eq!(breakdown.tax.amount, 480);
        assert_eq!(breakdown.total.amount, 6477);
    }

    #[test]
    fn test_keys_are_stable_per_attempt() {
        let cart = CartId::new();
        let a = CheckoutSession::new(cart, 1);
        let b = CheckoutSession::new(cart, 1);
        let c = CheckoutSession::new(cart, 2);
        assert_eq!(a.idempotency_key, b.idempotency_key);
        assert_eq!(a.order_ref, b.order_ref);
        assert_ne!(a.idempotency_key, c.idempotency_key);
    }

    #[test]
    fn test_priced_as_compares_recorded_pricing() {
        let mut session = CheckoutSession::new(CartId::new(), 1);
        assert!(session.priced_as(&[], &breakdown()));

        session
            .prepare(buyer(), PaymentMethod::ExternalNetwork, Vec::new(), breakdown())
            .unwrap();
        assert!(session.priced_as(&[], &breakdown()));

        let repriced =
            PriceBreakdown::compute(Money::from_minor(6497, Currency::USD), &TaxPolicy::exempt());
        assert!(!session.priced_as(&[], &repriced));
    }

    #[test]
    fn test_pending_to_succeeded_then_duplicate() {
        let mut session = pending_session(Utc::now() + Duration::minutes(45));
        let now = Utc::now();

        assert_eq!(
            session.apply_outcome(&outcome(OutcomeResult::Succeeded), now),
            Transition::Applied(SessionState::Succeeded)
        );
        assert_eq!(
            session.apply_outcome(&outcome(OutcomeResult::Succeeded), now),
            Transition::Duplicate
        );
        assert_eq!(
            session.apply_outcome(&outcome(OutcomeResult::Cancelled), now),
            Transition::Dropped(SessionState::Succeeded)
        );
        assert_eq!(session.state(), SessionState::Succeeded);
    }

    #[test]
    fn test_failed_records_declined() {
        let mut session = pending_session(Utc::now() + Duration::minutes(45));
        let now = Utc::now();
        session.apply_outcome(&outcome(OutcomeResult::Failed), now);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.failure_at(now), Some(FailureReason::Declined));
    }

    #[test]
    fn test_expiry_is_derived_on_read() {
        let expires_at = Utc::now() + Duration::minutes(45);
        let session = pending_session(expires_at);

        assert_eq!(session.state_at(expires_at), SessionState::PendingExternalPayment);
        let later = expires_at + Duration::seconds(1);
        assert_eq!(session.state_at(later), SessionState::Failed);
        assert_eq!(session.failure_at(later), Some(FailureReason::Expired));
        // stored state is untouched by reads
        assert_eq!(session.state(), SessionState::PendingExternalPayment);
    }

    #[test]
    fn test_outcome_after_expiry_is_dropped() {
        let expires_at = Utc::now() - Duration::minutes(1);
        let mut session = pending_session(expires_at);

        let transition = session.apply_outcome(&outcome(OutcomeResult::Succeeded), Utc::now());

        assert_eq!(transition, Transition::Dropped(SessionState::Failed));
        assert_eq!(session.failure_at(Utc::now()), Some(FailureReason::Expired));
    }

    #[test]
    fn test_outcome_on_draft_is_dropped() {
        let mut session = CheckoutSession::new(CartId::new(), 1);
        assert_eq!(
            session.apply_outcome(&outcome(OutcomeResult::Succeeded), Utc::now()),
            Transition::Dropped(SessionState::Draft)
        );
    }

    #[test]
    fn test_immediate_settlement_only_for_card() {
        let mut card = CheckoutSession::new(CartId::new(), 1);
        card.prepare(buyer(), PaymentMethod::Card, Vec::new(), breakdown())
            .unwrap();
        card.settle_immediately().unwrap();
        assert_eq!(card.state(), SessionState::Succeeded);
        assert!(card.prepare(buyer(), PaymentMethod::Card, Vec::new(), breakdown()).is_err());

        let mut external = CheckoutSession::new(CartId::new(), 1);
        external
            .prepare(buyer(), PaymentMethod::ExternalNetwork, Vec::new(), breakdown())
            .unwrap();
        assert!(matches!(
            external.settle_immediately(),
            Err(CheckoutError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_payment_method_aliases() {
        let method: PaymentMethod = serde_json::from_str("\"pi\"").unwrap();
        assert_eq!(method, PaymentMethod::ExternalNetwork);
        let method: PaymentMethod = serde_json::from_str("\"card\"").unwrap();
        assert!(method.settles_immediately());
    }
}
