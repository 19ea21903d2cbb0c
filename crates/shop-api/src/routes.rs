//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET  /api/v1/products - List products (`?category=`)
///   - GET  /api/v1/products/{id} - Get product by ID
///
/// - Carts:
///   - POST   /api/v1/carts - Create cart
///   - GET    /api/v1/carts/{cart_id} - Cart with totals
///   - POST   /api/v1/carts/{cart_id}/items - Add one unit
///   - DELETE /api/v1/carts/{cart_id}/items - Clear
///   - PUT    /api/v1/carts/{cart_id}/items/{product_id} - Set quantity
///   - DELETE /api/v1/carts/{cart_id}/items/{product_id} - Remove line
///   - POST   /api/v1/carts/{cart_id}/checkout - Submit checkout form
///   - GET    /api/v1/carts/{cart_id}/checkout - Current session
///   - GET    /api/v1/carts/{cart_id}/orders - Placed orders
///
/// - Wallets:
///   - POST /api/v1/wallets - Provision
///   - GET  /api/v1/wallets - List
///
/// - Gateway:
///   - GET  /checkout/success - Success redirect landing
///   - GET  /checkout/cancel - Cancel redirect landing
///   - POST /webhook/gateway - Signed server callback
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let checkout_routes = Router::new()
        .route("/success", get(handlers::checkout_success))
        .route("/cancel", get(handlers::checkout_cancel));

    let api_routes = Router::new()
        // Catalog
        .route("/products", get(handlers::list_products))
        .route("/products/{product_id}", get(handlers::get_product))
        // Carts
        .route("/carts", post(handlers::create_cart))
        .route("/carts/{cart_id}", get(handlers::get_cart))
        .route(
            "/carts/{cart_id}/items",
            post(handlers::add_item).delete(handlers::clear_cart),
        )
        .route(
            "/carts/{cart_id}/items/{product_id}",
            put(handlers::set_quantity).delete(handlers::remove_item),
        )
        .route(
            "/carts/{cart_id}/checkout",
            post(handlers::submit_checkout).get(handlers::get_checkout),
        )
        .route("/carts/{cart_id}/orders", get(handlers::list_orders))
        // Wallets
        .route(
            "/wallets",
            post(handlers::provision_wallet).get(handlers::list_wallets),
        );

    // Callbacks must see the raw body for signature checks
    let webhook_routes = Router::new().route("/gateway", post(handlers::gateway_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/checkout", checkout_routes)
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
