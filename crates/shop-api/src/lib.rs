//! # shop-api
//!
//! HTTP API layer for the storefront.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for catalog, carts and checkout
//! - Redirect landings and the signed gateway callback
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | List products |
//! | GET | `/api/v1/products/{id}` | Get product |
//! | POST | `/api/v1/carts` | Create cart |
//! | GET | `/api/v1/carts/{id}` | Cart with totals |
//! | POST | `/api/v1/carts/{id}/items` | Add item |
//! | PUT | `/api/v1/carts/{id}/items/{product_id}` | Set quantity |
//! | DELETE | `/api/v1/carts/{id}/items/{product_id}` | Remove item |
//! | DELETE | `/api/v1/carts/{id}/items` | Clear cart |
//! | POST | `/api/v1/carts/{id}/checkout` | Submit checkout |
//! | GET | `/api/v1/carts/{id}/checkout` | Checkout session |
//! | GET | `/api/v1/carts/{id}/orders` | Placed orders |
//! | GET | `/checkout/success` | Success landing |
//! | GET | `/checkout/cancel` | Cancel landing |
//! | POST | `/webhook/gateway` | Gateway callback |
//! | POST | `/api/v1/wallets` | Provision wallet |
//! | GET | `/api/v1/wallets` | List wallets |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
