//! # Outcome Reconciler
//!
//! Applies payment outcomes from either delivery path to the session they
//! name. Redirect landings and callbacks for the same payment can arrive in
//! any order, any number of times; the cart lock serializes them and the
//! session state makes all but the first a no-op.

use crate::context::AppliedResult;
use crate::error::{CheckoutError, CheckoutResult};
use crate::outcome::PaymentOutcome;
use crate::store::CartStore;
use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct OutcomeReconciler {
    store: CartStore,
}

impl OutcomeReconciler {
    pub fn new(store: CartStore) -> Self {
        Self { store }
    }

    /// Apply an outcome observed now
    pub async fn apply(&self, outcome: &PaymentOutcome) -> CheckoutResult<AppliedResult> {
        self.apply_at(outcome, Utc::now()).await
    }

    /// Apply an outcome observed at `now`.
    ///
    /// Unknown references are reported, never turned into sessions.
    #[instrument(skip(self, outcome), fields(reference = %outcome.reference, result = %outcome.result))]
    pub async fn apply_at(
        &self,
        outcome: &PaymentOutcome,
        now: DateTime<Utc>,
    ) -> CheckoutResult<AppliedResult> {
        let Some(cart_id) = self.store.resolve(&outcome.reference).await else {
            warn!(source = ?outcome.source, "Outcome for unknown session");
            return Err(CheckoutError::UnknownSession {
                reference: outcome.reference.clone(),
            });
        };

        let shared = self.store.get(cart_id).await?;
        let mut context = shared.lock().await;
        context.apply_outcome(outcome, now)
    }
}
