//! # Checkout Service
//!
//! Entry point used by the HTTP layer: looks carts up in the store, prices
//! adds from the catalog, and wires submissions to the configured gateway.

use crate::cart::{CartId, CartLine, CartTotals};
use crate::checkout::SessionView;
use crate::context::{CartContext, CheckoutSettings, SubmitOutcome, SubmitRequest};
use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::BoxedPaymentGateway;
use crate::money::Currency;
use crate::order::Order;
use crate::product::ProductCatalog;
use crate::reconciler::OutcomeReconciler;
use crate::store::CartStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Cart as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub cart_id: CartId,
    pub currency: Currency,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    fn of(context: &CartContext) -> Self {
        let cart = context.cart();
        Self {
            cart_id: cart.id,
            currency: cart.currency,
            lines: cart.lines().to_vec(),
            totals: cart.totals(),
            updated_at: cart.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    store: CartStore,
    catalog: Arc<ProductCatalog>,
    gateway: BoxedPaymentGateway,
    settings: Arc<CheckoutSettings>,
    currency: Currency,
}

impl CheckoutService {
    pub fn new(
        catalog: ProductCatalog,
        gateway: BoxedPaymentGateway,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store: CartStore::new(),
            catalog: Arc::new(catalog),
            gateway,
            settings: Arc::new(settings),
            currency: Currency::default(),
        }
    }

    /// Builder: currency for new carts
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn store(&self) -> &CartStore {
        &self.store
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn gateway(&self) -> &BoxedPaymentGateway {
        &self.gateway
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Reconciler sharing this service's store
    pub fn reconciler(&self) -> OutcomeReconciler {
        OutcomeReconciler::new(self.store.clone())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    pub async fn create_cart(&self) -> CheckoutResult<CartView> {
        let cart_id = self.store.create(self.currency).await;
        debug!(cart_id = %cart_id, "Created cart");
        self.cart(cart_id).await
    }

    pub async fn cart(&self, cart_id: CartId) -> CheckoutResult<CartView> {
        let shared = self.store.get(cart_id).await?;
        let context = shared.lock().await;
        Ok(CartView::of(&context))
    }

    /// Add one unit at the catalog's current price
    pub async fn add_item(&self, cart_id: CartId, product_id: &str) -> CheckoutResult<CartView> {
        let product = self
            .catalog
            .get(product_id)
            .ok_or_else(|| CheckoutError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;

        let shared = self.store.get(cart_id).await?;
        let mut context = shared.lock().await;
        context.add_product(product)?;
        Ok(CartView::of(&context))
    }

    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: &str,
        quantity: i64,
    ) -> CheckoutResult<CartView> {
        let shared = self.store.get(cart_id).await?;
        let mut context = shared.lock().await;
        context.set_quantity(product_id, quantity)?;
        Ok(CartView::of(&context))
    }

    pub async fn remove_item(&self, cart_id: CartId, product_id: &str) -> CheckoutResult<CartView> {
        let shared = self.store.get(cart_id).await?;
        let mut context = shared.lock().await;
        context.remove_item(product_id);
        Ok(CartView::of(&context))
    }

    pub async fn clear(&self, cart_id: CartId) -> CheckoutResult<CartView> {
        let shared = self.store.get(cart_id).await?;
        let mut context = shared.lock().await;
        context.clear();
        Ok(CartView::of(&context))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Submit the checkout form for a cart.
    ///
    /// The cart stays locked while the gateway call is in flight.
    #[instrument(skip(self, request), fields(cart_id = %cart_id, method = ?request.payment_method))]
    pub async fn submit(
        &self,
        cart_id: CartId,
        request: SubmitRequest,
    ) -> CheckoutResult<SubmitOutcome> {
        let shared = self.store.get(cart_id).await?;
        let mut context = shared.lock().await;
        let result = context
            .submit(request, self.gateway.as_ref(), &self.settings)
            .await;
        let references = context.session_references();
        drop(context);

        self.store.register_references(cart_id, references).await;
        result
    }

    /// Active session as seen now (expiry applied)
    pub async fn session(&self, cart_id: CartId) -> CheckoutResult<Option<SessionView>> {
        let shared = self.store.get(cart_id).await?;
        let context = shared.lock().await;
        Ok(context.session_view(Utc::now()))
    }

    pub async fn orders(&self, cart_id: CartId) -> CheckoutResult<Vec<Order>> {
        let shared = self.store.get(cart_id).await?;
        let context = shared.lock().await;
        Ok(context.orders().to_vec())
    }

    /// Move every pending session past its expiry to `Failed`
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for cart_id in self.store.cart_ids().await {
            if let Ok(shared) = self.store.get(cart_id).await {
                if shared.lock().await.expire_due(now) {
                    expired += 1;
                }
            }
        }
        if expired > 0 {
            info!(expired, "Expiry sweep finished");
        }
        expired
    }
}
