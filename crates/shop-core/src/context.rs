//! # Cart Context
//!
//! Everything that belongs to one shopper's cart: the cart itself, the
//! active checkout session, earlier sessions and placed orders.
//!
//! A context is owned by exactly one `Mutex` in the `CartStore`, so every
//! method here runs with the cart's single-writer lock held. That lock is
//! also what makes session transitions mutually exclusive.

use crate::cart::{Cart, CartId, CartLine, CartTotals};
use crate::checkout::{
    BuyerInfo, CheckoutSession, FailureReason, PaymentMethod, PriceBreakdown, SessionId, SessionState,
    SessionView, TaxPolicy, Transition,
};
use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::{CheckoutUrls, IntentLine, IntentMetadata, IntentRequest, PaymentGateway};
use crate::money::Currency;
use crate::order::Order;
use crate::outcome::PaymentOutcome;
use crate::product::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Checkout knobs shared by every cart
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub tax: TaxPolicy,
    pub urls: CheckoutUrls,
    /// Lifetime requested for hosted payment pages
    pub expires_in_minutes: u32,
    /// Upper bound on a single `create_intent` call
    pub gateway_timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            tax: TaxPolicy::default(),
            urls: CheckoutUrls::default(),
            expires_in_minutes: 45,
            gateway_timeout: Duration::from_secs(30),
        }
    }
}

/// Checkout form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub buyer: BuyerInfo,
    #[serde(alias = "paymentMethod")]
    pub payment_method: PaymentMethod,
}

/// Result of a successful submit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Send the buyer to the hosted payment page
    Redirect {
        session_id: SessionId,
        order_ref: String,
        redirect_url: String,
        expires_at: DateTime<Utc>,
    },
    /// Settled without leaving the storefront
    Completed { order: Order },
}

/// How an outcome was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The session changed state
    Applied,
    /// Redelivery of an outcome already recorded
    Duplicate,
    /// Session could not take it (already terminal, expired, or not submitted)
    Dropped,
}

/// What `OutcomeReconciler::apply` reports back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedResult {
    pub reference: String,
    pub cart_id: CartId,
    pub session_id: SessionId,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub disposition: Disposition,
    /// Present only when this call placed the order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

impl AppliedResult {
    pub fn changed(&self) -> bool {
        self.disposition == Disposition::Applied
    }
}

/// Per-cart state
#[derive(Debug)]
pub struct CartContext {
    cart: Cart,
    session: Option<CheckoutSession>,
    history: Vec<CheckoutSession>,
    attempts: u32,
    orders: Vec<Order>,
}

impl CartContext {
    pub fn new(currency: Currency) -> Self {
        Self {
            cart: Cart::new(currency),
            session: None,
            history: Vec::new(),
            attempts: 0,
            orders: Vec::new(),
        }
    }

    pub fn id(&self) -> CartId {
        self.cart.id
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    // =========================================================================
    // Cart mutation
    // =========================================================================

    /// Add one unit of a catalog product at its current price
    pub fn add_product(&mut self, product: &Product) -> CheckoutResult<CartTotals> {
        if !product.in_stock {
            return Err(CheckoutError::ProductUnavailable {
                product_id: product.id.clone(),
            });
        }
        self.cart.add_product(product)
    }

    pub fn set_quantity(&mut self, product_id: &str, qty: i64) -> CheckoutResult<CartTotals> {
        self.cart.set_quantity(product_id, qty)
    }

    pub fn remove_item(&mut self, product_id: &str) -> CartTotals {
        self.cart.remove_item(product_id)
    }

    pub fn clear(&mut self) -> CartTotals {
        self.cart.clear()
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Submit the checkout form.
    ///
    /// On any error the active session is left in `Draft`; resubmitting an
    /// unchanged cart reuses its idempotency key, while a cart whose lines or
    /// total changed since the draft was priced opens a new attempt. A submit
    /// while the hosted page is still open returns the same redirect.
    pub async fn submit(
        &mut self,
        request: SubmitRequest,
        gateway: &dyn PaymentGateway,
        settings: &CheckoutSettings,
    ) -> CheckoutResult<SubmitOutcome> {
        let now = Utc::now();
        let cart_id = self.cart.id;

        if let Some(session) = self.session.as_mut() {
            if session.expire_if_due(now) {
                info!(cart_id = %cart_id, session_id = %session.id, "Checkout session expired");
            }
            if session.state().awaits_outcome() {
                if let Some(intent) = &session.external {
                    debug!(session_id = %session.id, "Submit while pending; returning open redirect");
                    return Ok(SubmitOutcome::Redirect {
                        session_id: session.id,
                        order_ref: session.order_ref.clone(),
                        redirect_url: intent.redirect_url.clone(),
                        expires_at: intent.expires_at,
                    });
                }
            }
        }

        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let lines = self.cart.lines().to_vec();
        let breakdown = PriceBreakdown::compute(self.cart.totals().subtotal, &settings.tax);
        let method = request.payment_method;
        let session = self.draft_session(&lines, &breakdown);
        session.prepare(request.buyer, method, lines, breakdown)?;

        if method.settles_immediately() {
            session.settle_immediately()?;
            let order = Order::from_session(session)?;
            info!(
                cart_id = %cart_id,
                order_id = %order.id,
                total = %order.total(),
                "Order placed with immediate settlement"
            );
            self.cart.remove_purchased(&order.lines);
            self.orders.push(order.clone());
            return Ok(SubmitOutcome::Completed { order });
        }

        let intent_request = intent_request(session, settings)?;
        let intent = match tokio::time::timeout(
            settings.gateway_timeout,
            gateway.create_intent(&intent_request),
        )
        .await
        {
            Ok(Ok(intent)) => intent,
            Ok(Err(e)) => {
                error!(
                    cart_id = %cart_id,
                    key = %intent_request.idempotency_key,
                    provider = gateway.provider_name(),
                    "create_intent failed: {}", e
                );
                return Err(e);
            }
            Err(_) => {
                error!(
                    cart_id = %cart_id,
                    key = %intent_request.idempotency_key,
                    provider = gateway.provider_name(),
                    "create_intent timed out after {:?}", settings.gateway_timeout
                );
                return Err(CheckoutError::GatewayUnavailable(format!(
                    "{} did not answer within {:?}",
                    gateway.provider_name(),
                    settings.gateway_timeout
                )));
            }
        };

        session.begin_external(intent.clone())?;
        info!(
            cart_id = %cart_id,
            session_id = %session.id,
            intent_id = %intent.intent_id,
            "Checkout awaiting external payment"
        );

        Ok(SubmitOutcome::Redirect {
            session_id: session.id,
            order_ref: session.order_ref.clone(),
            redirect_url: intent.redirect_url,
            expires_at: intent.expires_at,
        })
    }

    /// The active draft, opening a new attempt if the last session ended or
    /// was priced for a different cart. A gateway that already saw the old
    /// key would replay the stale intent, so a repriced cart needs a new one.
    fn draft_session(
        &mut self,
        lines: &[CartLine],
        breakdown: &PriceBreakdown,
    ) -> &mut CheckoutSession {
        let cart_id = self.cart.id;
        let reusable = match &self.session {
            Some(s) if s.state().can_submit() => {
                let same = s.priced_as(lines, breakdown);
                if !same {
                    info!(
                        cart_id = %cart_id,
                        session_id = %s.id,
                        key = %s.idempotency_key,
                        "Cart changed since draft was priced; opening new attempt"
                    );
                }
                same
            }
            _ => false,
        };
        if !reusable {
            if let Some(done) = self.session.take() {
                self.history.push(done);
            }
            self.attempts += 1;
        }
        let attempt = self.attempts;
        self.session
            .get_or_insert_with(|| CheckoutSession::new(cart_id, attempt))
    }

    // =========================================================================
    // Outcomes
    // =========================================================================

    /// Apply an outcome to whichever of this cart's sessions it names
    pub fn apply_outcome(
        &mut self,
        outcome: &PaymentOutcome,
        now: DateTime<Utc>,
    ) -> CheckoutResult<AppliedResult> {
        let cart_id = self.cart.id;
        let session = self
            .session
            .iter_mut()
            .chain(self.history.iter_mut())
            .find(|s| s.matches(&outcome.reference))
            .ok_or_else(|| CheckoutError::UnknownSession {
                reference: outcome.reference.clone(),
            })?;

        if let (Some(reported), Some(breakdown)) = (outcome.amount, session.breakdown) {
            if reported != breakdown.total {
                warn!(
                    reference = %outcome.reference,
                    reported = %reported,
                    expected = %breakdown.total,
                    "Outcome amount differs from session total"
                );
            }
        }

        let transition = session.apply_outcome(outcome, now);
        let session_id = session.id;
        let state = session.state();
        let failure = session.failure_at(now);

        let (disposition, order) = match transition {
            Transition::Applied(SessionState::Succeeded) => {
                let order = Order::from_session(session)?;
                info!(
                    cart_id = %cart_id,
                    session_id = %session_id,
                    order_id = %order.id,
                    source = ?outcome.source,
                    "Payment succeeded; order placed"
                );
                // items added while the hosted page was open stay in the cart
                self.cart.remove_purchased(&order.lines);
                self.orders.push(order.clone());
                (Disposition::Applied, Some(order))
            }
            Transition::Applied(next) => {
                info!(
                    cart_id = %cart_id,
                    session_id = %session_id,
                    state = %next,
                    reason = outcome.reason.as_deref().unwrap_or(""),
                    "Checkout ended without payment; cart kept"
                );
                (Disposition::Applied, None)
            }
            Transition::Duplicate => {
                debug!(session_id = %session_id, result = %outcome.result, "Duplicate outcome ignored");
                (Disposition::Duplicate, None)
            }
            Transition::Dropped(current) => {
                warn!(
                    session_id = %session_id,
                    state = %current,
                    result = %outcome.result,
                    source = ?outcome.source,
                    "Late outcome dropped"
                );
                (Disposition::Dropped, None)
            }
        };

        Ok(AppliedResult {
            reference: outcome.reference.clone(),
            cart_id,
            session_id,
            state,
            failure,
            disposition,
            order,
        })
    }

    /// Materialize expiry of the active session; true if it changed
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> bool {
        let cart_id = self.cart.id;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.expire_if_due(now) {
            return false;
        }
        info!(cart_id = %cart_id, session_id = %session.id, "Checkout session expired");
        true
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn session(&self) -> Option<&CheckoutSession> {
        self.session.as_ref()
    }

    pub fn session_view(&self, now: DateTime<Utc>) -> Option<SessionView> {
        self.session.as_ref().map(|s| s.view_at(now))
    }

    /// References an outcome for the active session may carry
    pub fn session_references(&self) -> Vec<String> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let mut refs = vec![session.order_ref.clone()];
        if let Some(intent) = &session.external {
            refs.push(intent.intent_id.clone());
        }
        refs
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

fn intent_request(
    session: &CheckoutSession,
    settings: &CheckoutSettings,
) -> CheckoutResult<IntentRequest> {
    let (buyer, breakdown) = match (&session.buyer, session.breakdown) {
        (Some(buyer), Some(breakdown)) => (buyer, breakdown),
        _ => {
            return Err(CheckoutError::Internal(format!(
                "session {} was not prepared",
                session.id
            )))
        }
    };
    let (success_url, cancel_url) = settings.urls.for_order(&session.order_ref);

    Ok(IntentRequest {
        lines: session
            .lines
            .iter()
            .map(|line| IntentLine {
                name: line.name.clone(),
                description: line.description.clone(),
                image: line.image.clone(),
                quantity: line.quantity,
                unit_amount: line.unit_price,
            })
            .collect(),
        total: breakdown.total,
        currency: breakdown.total.currency,
        success_url,
        cancel_url,
        callback_url: settings.urls.callback_url(),
        expires_in_minutes: settings.expires_in_minutes,
        metadata: IntentMetadata {
            order_id: session.order_ref.clone(),
            customer_email: buyer.email.trim().to_string(),
            customer_name: buyer.full_name(),
            total: breakdown.total,
        },
        idempotency_key: session.idempotency_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryGateway;
    use crate::money::Money;
    use crate::outcome::{OutcomeResult, OutcomeSource};

    fn usd(cents: i64) -> Money {
        Money::from_minor(cents, Currency::USD)
    }

    fn exempt() -> CheckoutSettings {
        CheckoutSettings {
            tax: TaxPolicy::exempt(),
            ..CheckoutSettings::default()
        }
    }

    fn request(method: PaymentMethod) -> SubmitRequest {
        SubmitRequest {
            buyer: BuyerInfo {
                email: "ada@example.com".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                address: "12 Analytical Way".into(),
                city: "London".into(),
                state: "LDN".into(),
                zip_code: "10001".into(),
                phone: "555-0100".into(),
            },
            payment_method: method,
        }
    }

    /// 19.99 x 3 = 59.97
    fn context() -> CartContext {
        let mut ctx = CartContext::new(Currency::USD);
        let shirt = Product::new("shirt", "Shirt", "Fashion", usd(1999));
        for _ in 0..3 {
            ctx.add_product(&shirt).unwrap();
        }
        ctx
    }

    fn outcome(reference: &str, result: OutcomeResult) -> PaymentOutcome {
        PaymentOutcome::new(reference, result, OutcomeSource::Callback)
    }

    async fn pending(ctx: &mut CartContext, gateway: &InMemoryGateway) -> String {
        match ctx
            .submit(request(PaymentMethod::ExternalNetwork), gateway, &exempt())
            .await
            .unwrap()
        {
            SubmitOutcome::Redirect { order_ref, .. } => order_ref,
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_external_checkout_happy_path() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();

        let order_ref = pending(&mut ctx, &gateway).await;
        assert_eq!(
            ctx.session().unwrap().state(),
            SessionState::PendingExternalPayment
        );

        let sent = &gateway.requests().await[0];
        assert_eq!(sent.total, usd(5997));
        assert_eq!(sent.metadata.customer_name, "Ada Lovelace");
        assert!(sent.success_url.ends_with(&format!("?order_id={}", order_ref)));

        let applied = ctx
            .apply_outcome(
                &outcome(&order_ref, OutcomeResult::Succeeded).with_amount(usd(5997)),
                Utc::now(),
            )
            .unwrap();

        assert!(applied.changed());
        assert_eq!(applied.state, SessionState::Succeeded);
        assert_eq!(applied.order.unwrap().total(), usd(5997));
        assert!(ctx.cart().is_empty());
        assert_eq!(ctx.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_double_success_places_one_order() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();
        let order_ref = pending(&mut ctx, &gateway).await;

        ctx.apply_outcome(&outcome(&order_ref, OutcomeResult::Succeeded), Utc::now())
            .unwrap();
        // shopper starts filling a new cart before the webhook redelivers
        ctx.add_product(&Product::new("mug", "Mug", "Home", usd(500)))
            .unwrap();
        let again = ctx
            .apply_outcome(&outcome(&order_ref, OutcomeResult::Succeeded), Utc::now())
            .unwrap();

        assert_eq!(again.disposition, Disposition::Duplicate);
        assert!(again.order.is_none());
        assert_eq!(ctx.orders().len(), 1);
        assert_eq!(ctx.cart().totals().item_count, 1);
    }

    #[tokio::test]
    async fn test_cancel_and_fail_keep_cart() {
        for result in [OutcomeResult::Cancelled, OutcomeResult::Failed] {
            let gateway = InMemoryGateway::new();
            let mut ctx = context();
            let order_ref = pending(&mut ctx, &gateway).await;

            let applied = ctx.apply_outcome(&outcome(&order_ref, result), Utc::now()).unwrap();

            assert_eq!(applied.state, SessionState::from(result));
            assert_eq!(ctx.cart().totals().subtotal, usd(5997));
            assert!(ctx.orders().is_empty());
        }
    }

    #[tokio::test]
    async fn test_retry_after_cancel_opens_new_attempt() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();
        let first = pending(&mut ctx, &gateway).await;
        ctx.apply_outcome(&outcome(&first, OutcomeResult::Cancelled), Utc::now())
            .unwrap();

        let second = pending(&mut ctx, &gateway).await;

        assert_ne!(first, second);
        assert_eq!(ctx.attempts(), 2);
        assert_eq!(gateway.intent_count().await, 2);

        // a late success for the cancelled attempt must not touch the new one
        let late = ctx
            .apply_outcome(&outcome(&first, OutcomeResult::Succeeded), Utc::now())
            .unwrap();
        assert_eq!(late.disposition, Disposition::Dropped);
        assert_eq!(
            ctx.session().unwrap().state(),
            SessionState::PendingExternalPayment
        );
        assert!(!ctx.cart().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_pending_returns_same_redirect() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();

        let a = ctx
            .submit(request(PaymentMethod::ExternalNetwork), &gateway, &exempt())
            .await
            .unwrap();
        let b = ctx
            .submit(request(PaymentMethod::ExternalNetwork), &gateway, &exempt())
            .await
            .unwrap();

        match (a, b) {
            (
                SubmitOutcome::Redirect { redirect_url: a, .. },
                SubmitOutcome::Redirect { redirect_url: b, .. },
            ) => assert_eq!(a, b),
            other => panic!("expected two redirects, got {:?}", other),
        }
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_draft_and_key() {
        let gateway = InMemoryGateway::new();
        gateway.set_unavailable(true);
        let mut ctx = context();

        let err = ctx
            .submit(request(PaymentMethod::ExternalNetwork), &gateway, &exempt())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(ctx.session().unwrap().state(), SessionState::Draft);

        gateway.set_unavailable(false);
        pending(&mut ctx, &gateway).await;

        let keys: Vec<_> = gateway
            .requests()
            .await
            .into_iter()
            .map(|r| r.idempotency_key)
            .collect();
        assert_eq!(keys[0], keys[1]);
        assert_eq!(ctx.attempts(), 1);
    }

    #[tokio::test]
    async fn test_cart_change_after_failed_submit_opens_new_attempt() {
        let gateway = InMemoryGateway::new();
        gateway.set_unavailable(true);
        let mut ctx = context();

        ctx.submit(request(PaymentMethod::ExternalNetwork), &gateway, &exempt())
            .await
            .unwrap_err();
        let first = gateway.requests().await[0].clone();
        let first_ref = ctx.session().unwrap().order_ref.clone();

        // the gateway kept an intent for the first key even though we never saw it
        gateway.set_unavailable(false);
        let stale = gateway.create_intent(&first).await.unwrap();

        ctx.add_product(&Product::new("mug", "Mug", "Home", usd(500)))
            .unwrap();
        let order_ref = pending(&mut ctx, &gateway).await;

        let requests = gateway.requests().await;
        let resent = requests.last().unwrap();
        assert_ne!(resent.idempotency_key, first.idempotency_key);
        assert_eq!(resent.total, usd(6497));
        assert_eq!(resent.lines.len(), 2);
        assert_ne!(order_ref, first_ref);
        assert_eq!(ctx.attempts(), 2);

        let session = ctx.session().unwrap();
        assert_eq!(session.breakdown.unwrap().total, usd(6497));
        assert_ne!(
            session.external.as_ref().unwrap().redirect_url,
            stale.redirect_url
        );

        let late = ctx
            .apply_outcome(&outcome(&first_ref, OutcomeResult::Succeeded), Utc::now())
            .unwrap();
        assert_eq!(late.disposition, Disposition::Dropped);
        assert!(ctx.orders().is_empty());
    }

    #[tokio::test]
    async fn test_success_keeps_items_added_during_payment() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();
        let order_ref = pending(&mut ctx, &gateway).await;

        // shopper keeps browsing in another tab while the hosted page is open
        ctx.add_product(&Product::new("shirt", "Shirt", "Fashion", usd(1999)))
            .unwrap();
        ctx.add_product(&Product::new("mug", "Mug", "Home", usd(500)))
            .unwrap();

        let applied = ctx
            .apply_outcome(&outcome(&order_ref, OutcomeResult::Succeeded), Utc::now())
            .unwrap();

        assert_eq!(applied.order.unwrap().item_count(), 3);
        assert_eq!(ctx.cart().totals().item_count, 2);
        assert_eq!(ctx.cart().line("shirt").unwrap().quantity, 1);
        assert_eq!(ctx.cart().totals().subtotal, usd(2499));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_gateway_times_out() {
        let gateway = InMemoryGateway::new().with_delay(Duration::from_secs(60));
        let settings = CheckoutSettings {
            gateway_timeout: Duration::from_secs(5),
            ..exempt()
        };
        let mut ctx = context();

        let err = ctx
            .submit(request(PaymentMethod::ExternalNetwork), &gateway, &settings)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::GatewayUnavailable(_)));
        assert_eq!(ctx.session().unwrap().state(), SessionState::Draft);
        assert_eq!(ctx.cart().totals().item_count, 3);
    }

    #[tokio::test]
    async fn test_card_settles_immediately() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();

        let outcome = ctx
            .submit(request(PaymentMethod::Card), &gateway, &CheckoutSettings::default())
            .await
            .unwrap();

        let SubmitOutcome::Completed { order } = outcome else {
            panic!("card checkout should complete");
        };
        assert_eq!(order.total(), usd(6477));
        assert!(ctx.cart().is_empty());
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_email_leaves_cart_untouched() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();
        let mut req = request(PaymentMethod::ExternalNetwork);
        req.buyer.email.clear();

        let err = ctx.submit(req, &gateway, &exempt()).await.unwrap_err();

        assert_eq!(err.field_errors()[0].field, "email");
        assert_eq!(ctx.session().unwrap().state(), SessionState::Draft);
        assert_eq!(ctx.cart().totals().subtotal, usd(5997));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_submit() {
        let gateway = InMemoryGateway::new();
        let mut ctx = CartContext::new(Currency::USD);
        assert!(matches!(
            ctx.submit(request(PaymentMethod::Card), &gateway, &exempt()).await,
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_reads_failed() {
        let gateway = InMemoryGateway::new().with_ttl(chrono::Duration::seconds(-1));
        let mut ctx = context();
        let order_ref = pending(&mut ctx, &gateway).await;

        let view = ctx.session_view(Utc::now()).unwrap();
        assert_eq!(view.state, SessionState::Failed);
        assert_eq!(view.failure, Some(FailureReason::Expired));
        assert_eq!(ctx.cart().totals().item_count, 3);

        let late = ctx
            .apply_outcome(&outcome(&order_ref, OutcomeResult::Succeeded), Utc::now())
            .unwrap();
        assert_eq!(late.disposition, Disposition::Dropped);
        assert_eq!(late.failure, Some(FailureReason::Expired));
        assert!(ctx.orders().is_empty());
    }

    #[tokio::test]
    async fn test_expire_due_materializes_once() {
        let gateway = InMemoryGateway::new().with_ttl(chrono::Duration::seconds(-1));
        let mut ctx = context();
        pending(&mut ctx, &gateway).await;

        assert!(ctx.expire_due(Utc::now()));
        assert!(!ctx.expire_due(Utc::now()));
        assert_eq!(ctx.session().unwrap().state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_intent_id_is_a_reference() {
        let gateway = InMemoryGateway::new();
        let mut ctx = context();
        pending(&mut ctx, &gateway).await;

        let refs = ctx.session_references();
        assert_eq!(refs.len(), 2);
        assert!(refs[1].starts_with("intent_"));

        let applied = ctx
            .apply_outcome(&outcome(&refs[1], OutcomeResult::Failed), Utc::now())
            .unwrap();
        assert_eq!(applied.state, SessionState::Failed);
    }

    #[test]
    fn test_out_of_stock_rejected() {
        let mut ctx = CartContext::new(Currency::USD);
        let product = Product::new("4", "Coffee Maker", "Home", usd(40)).out_of_stock();
        assert!(matches!(
            ctx.add_product(&product),
            Err(CheckoutError::ProductUnavailable { .. })
        ));
        assert!(ctx.cart().is_empty());
    }

    #[test]
    fn test_unknown_reference() {
        let mut ctx = context();
        assert!(matches!(
            ctx.apply_outcome(&outcome("nope", OutcomeResult::Succeeded), Utc::now()),
            Err(CheckoutError::UnknownSession { .. })
        ));
    }
}
