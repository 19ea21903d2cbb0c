//! # shop-gateway
//!
//! HTTP adapters for the storefront's external collaborators:
//!
//! 1. **HostedCheckoutGateway** - hosted external-network checkout
//!    - JSON line items, success/cancel/webhook URLs, expiry
//!    - `Idempotency-Key` per checkout attempt
//!    - Signed server callbacks (`X-Gateway-Signature`)
//!
//! 2. **HttpWalletProvisioner** - receiving wallet service
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_gateway::HostedCheckoutGateway;
//! use shop_core::{CheckoutService, CheckoutSettings};
//!
//! let gateway = HostedCheckoutGateway::from_env()?;
//! let service = CheckoutService::new(catalog, Arc::new(gateway), CheckoutSettings::default());
//! ```
//!
//! ## Callback Handling
//!
//! ```rust,ignore
//! let outcome = gateway.verify_notification(body, signature_header).await?;
//! if let Some(outcome) = outcome {
//!     service.reconciler().apply(&outcome).await?;
//! }
//! ```

pub mod config;
pub mod hosted;
pub mod signature;
pub mod wallet;

// Re-exports
pub use config::{GatewayConfig, WalletServiceConfig};
pub use hosted::HostedCheckoutGateway;
pub use signature::SIGNATURE_HEADER;
pub use wallet::HttpWalletProvisioner;
