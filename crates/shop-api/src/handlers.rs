//! # Request Handlers
//!
//! Axum request handlers for the storefront API.
//! Cart mutations return the cart with fresh totals; checkout and outcome
//! handlers delegate to the checkout service and the reconciler.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use shop_core::{
    AppliedResult, CartId, CartView, CheckoutError, Disposition, FailureReason, FieldError,
    Money, Order, OutcomeResult, PaymentOutcome, SessionState, SubmitOutcome, SubmitRequest,
};
use shop_gateway::SIGNATURE_HEADER;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add-to-cart request
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    #[serde(alias = "productId")]
    pub product_id: String,
}

/// Set-quantity request; zero or negative removes the line
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

/// Catalog listing filter
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub category: Option<String>,
}

/// What a redirect landing reports back to the page
#[derive(Debug, Serialize)]
pub struct LandingResponse {
    pub order_id: String,
    pub state: SessionState,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Items still in the cart (cancel landing offers a retry)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_item_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
            fields: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn checkout_error_to_response(err: CheckoutError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    response.fields = err.field_errors().to_vec();
    if err.is_retryable() {
        response = response.with_details("retry the same request");
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn parse_cart_id(raw: &str) -> Result<CartId, ApiError> {
    raw.parse().map_err(checkout_error_to_response)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List products, optionally filtered by category
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> impl IntoResponse {
    let catalog = state.service.catalog();
    let products: Vec<_> = catalog.by_category(query.category.as_deref()).collect();
    Json(serde_json::json!({
        "products": products,
        "count": products.len(),
        "categories": catalog.categories(),
    }))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.service.catalog().get(&product_id).ok_or_else(|| {
        checkout_error_to_response(CheckoutError::ProductNotFound {
            product_id: product_id.clone(),
        })
    })?;

    Ok(Json(product.clone()))
}

/// Create an empty cart
pub async fn create_cart(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let cart = state
        .service
        .create_cart()
        .await
        .map_err(checkout_error_to_response)?;
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn get_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    state
        .service
        .cart(cart_id)
        .await
        .map(Json)
        .map_err(checkout_error_to_response)
}

/// Add one unit of a product at its current catalog price
#[instrument(skip(state, request), fields(product_id = %request.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    state
        .service
        .add_item(cart_id, &request.product_id)
        .await
        .map(Json)
        .map_err(checkout_error_to_response)
}

pub async fn set_quantity(
    State(state): State<AppState>,
    Path((cart_id, product_id)): Path<(String, String)>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    state
        .service
        .set_quantity(cart_id, &product_id, request.quantity)
        .await
        .map(Json)
        .map_err(checkout_error_to_response)
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path((cart_id, product_id)): Path<(String, String)>,
) -> Result<Json<CartView>, ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    state
        .service
        .remove_item(cart_id, &product_id)
        .await
        .map(Json)
        .map_err(checkout_error_to_response)
}

pub async fn clear_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    state
        .service
        .clear(cart_id)
        .await
        .map(Json)
        .map_err(checkout_error_to_response)
}

/// Submit the checkout form
#[instrument(skip(state, request), fields(cart_id = %cart_id))]
pub async fn submit_checkout(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitOutcome>), ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    let outcome = state
        .service
        .submit(cart_id, request)
        .await
        .map_err(|e| {
            if !matches!(e, CheckoutError::Validation { .. }) {
                error!("Failed to submit checkout: {}", e);
            }
            checkout_error_to_response(e)
        })?;

    let status = match &outcome {
        SubmitOutcome::Completed { .. } => StatusCode::CREATED,
        SubmitOutcome::Redirect { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

/// Current checkout session for a cart, with expiry applied
pub async fn get_checkout(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    let session = state
        .service
        .session(cart_id)
        .await
        .map_err(checkout_error_to_response)?;

    session.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                format!("No checkout session for cart {}", cart_id),
                404,
            )),
        )
    })
}

/// Orders placed from a cart, oldest first
pub async fn list_orders(
    State(state): State<AppState>,
    Path(cart_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cart_id = parse_cart_id(&cart_id)?;
    let orders = state
        .service
        .orders(cart_id)
        .await
        .map_err(checkout_error_to_response)?;
    Ok(Json(serde_json::json!({
        "count": orders.len(),
        "orders": orders,
    })))
}

/// Success redirect landing
#[instrument(skip(state, params))]
pub async fn checkout_success(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<LandingResponse>, ApiError> {
    let (outcome, applied) = reconcile_redirect(&state, OutcomeResult::Succeeded, &params).await?;

    if applied.state == SessionState::Failed && applied.failure == Some(FailureReason::Expired) {
        return Err(checkout_error_to_response(CheckoutError::ExpiredSession {
            session_id: applied.session_id.to_string(),
        }));
    }

    Ok(Json(landing(outcome, applied, None)))
}

/// Cancel redirect landing; the cart is kept for a retry
#[instrument(skip(state, params))]
pub async fn checkout_cancel(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<LandingResponse>, ApiError> {
    let (outcome, applied) = reconcile_redirect(&state, OutcomeResult::Cancelled, &params).await?;

    let cart = state
        .service
        .cart(applied.cart_id)
        .await
        .map_err(checkout_error_to_response)?;

    Ok(Json(landing(outcome, applied, Some(cart.totals.item_count))))
}

async fn reconcile_redirect(
    state: &AppState,
    result: OutcomeResult,
    params: &HashMap<String, String>,
) -> Result<(PaymentOutcome, AppliedResult), ApiError> {
    let outcome = PaymentOutcome::from_redirect(result, params, state.service.currency())
        .map_err(checkout_error_to_response)?;

    let applied = state
        .service
        .reconciler()
        .apply(&outcome)
        .await
        .map_err(checkout_error_to_response)?;

    Ok((outcome, applied))
}

fn landing(
    outcome: PaymentOutcome,
    applied: AppliedResult,
    cart_item_count: Option<u32>,
) -> LandingResponse {
    LandingResponse {
        order_id: outcome.reference,
        state: applied.state,
        disposition: applied.disposition,
        total: outcome.amount,
        email: outcome.payer_email,
        name: outcome.payer_name,
        payment_method: outcome.payment_method,
        reason: outcome.reason,
        cart_item_count,
        order: applied.order,
    }
}

/// Gateway server callback
#[instrument(skip(state, headers, body))]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let outcome = state
        .service
        .gateway()
        .verify_notification(&body, signature)
        .await
        .map_err(|e| {
            error!("Callback verification failed: {}", e);
            checkout_error_to_response(e)
        })?;

    let Some(outcome) = outcome else {
        info!("Callback without a terminal status; acknowledged");
        return Ok(Json(serde_json::json!({ "status": "ignored" })));
    };

    match state.service.reconciler().apply(&outcome).await {
        Ok(applied) => Ok(Json(serde_json::json!({
            "status": "processed",
            "result": applied,
        }))),
        Err(CheckoutError::UnknownSession { reference }) => {
            // acknowledged so the gateway stops redelivering
            warn!(reference = %reference, "Callback acknowledged for unknown session");
            Ok(Json(serde_json::json!({
                "status": "unknown_session",
                "reference": reference,
            })))
        }
        Err(e) => {
            error!("Failed to apply callback: {}", e);
            Err(checkout_error_to_response(e))
        }
    }
}

/// Provision a receiving wallet
pub async fn provision_wallet(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.wallets.provision().await.map_err(|e| {
        error!("Wallet provisioning failed: {}", e);
        checkout_error_to_response(e)
    })?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

/// Wallets provisioned by this process
pub async fn list_wallets(State(state): State<AppState>) -> impl IntoResponse {
    let wallets = state.wallets.list().await;
    Json(serde_json::json!({
        "count": wallets.len(),
        "current": wallets.last(),
        "wallets": wallets,
    }))
}
