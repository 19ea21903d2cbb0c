//! # shop-core
//!
//! Order-and-payment core for the storefront.
//!
//! This crate provides:
//! - `Money` and `Currency` for exact minor-unit amounts
//! - `Product` and `ProductCatalog` for the read-only catalog
//! - `Cart` with derived totals
//! - `CheckoutSession`, the draft-to-terminal payment state machine
//! - `PaymentGateway` trait for the hosted payment processor
//! - `OutcomeReconciler` for redirect and callback outcomes
//! - `WalletRegistry` for provisioned receiving wallets
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CheckoutService, CheckoutSettings, InMemoryGateway, SubmitOutcome};
//!
//! let service = CheckoutService::new(catalog, Arc::new(InMemoryGateway::new()), CheckoutSettings::default());
//! let cart = service.create_cart().await?;
//! service.add_item(cart.cart_id, "1").await?;
//!
//! match service.submit(cart.cart_id, request).await? {
//!     SubmitOutcome::Redirect { redirect_url, .. } => { /* send the buyer there */ }
//!     SubmitOutcome::Completed { order } => { /* show confirmation */ }
//! }
//!
//! // later, from the success landing or the webhook
//! service.reconciler().apply(&outcome).await?;
//! ```

pub mod cart;
pub mod checkout;
pub mod context;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod money;
pub mod order;
pub mod outcome;
pub mod product;
pub mod reconciler;
pub mod service;
pub mod store;
pub mod wallet;

// Re-exports for convenience
pub use cart::{Cart, CartId, CartLine, CartTotals};
pub use checkout::{
    is_valid_email, BuyerInfo, CheckoutSession, FailureReason, PaymentMethod, PriceBreakdown,
    SessionId, SessionState, SessionView, TaxPolicy, Transition,
};
pub use context::{
    AppliedResult, CartContext, CheckoutSettings, Disposition, SubmitOutcome, SubmitRequest,
};
pub use error::{CheckoutError, CheckoutResult, FieldError};
pub use gateway::{
    BoxedPaymentGateway, CallbackPayload, CheckoutUrls, IntentLine, IntentMetadata,
    IntentRequest, PaymentGateway, PaymentIntent,
};
pub use memory::{InMemoryGateway, InMemoryWalletProvisioner};
pub use money::{Currency, Money};
pub use order::Order;
pub use outcome::{OutcomeResult, OutcomeSource, PaymentOutcome};
pub use product::{Product, ProductCatalog};
pub use reconciler::OutcomeReconciler;
pub use service::{CartView, CheckoutService};
pub use store::CartStore;
pub use wallet::{BoxedWalletProvisioner, Wallet, WalletProvisioner, WalletRegistry};
