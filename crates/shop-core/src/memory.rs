//! # In-Memory Collaborators
//!
//! Sandbox gateway and wallet provisioner for local development and tests.
//! They honor the same contracts as the HTTP adapters: the gateway dedups
//! by idempotency key and parses unsigned callbacks.

use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::{CallbackPayload, IntentRequest, PaymentGateway, PaymentIntent};
use crate::outcome::PaymentOutcome;
use crate::wallet::{Wallet, WalletProvisioner};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Sandbox payment gateway
pub struct InMemoryGateway {
    base_url: String,
    intents: RwLock<HashMap<String, PaymentIntent>>,
    requests: RwLock<Vec<IntentRequest>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
    delay: Option<std::time::Duration>,
    ttl: Option<Duration>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            base_url: "https://sandbox.gateway.local".to_string(),
            intents: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
            calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            delay: None,
            ttl: None,
        }
    }

    /// Builder: hosted page base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builder: sleep before answering each create call
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Builder: override the intent lifetime (negative values create expired intents)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Make subsequent create calls fail with `GatewayUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of create calls received, including failed ones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of distinct intents created
    pub async fn intent_count(&self) -> usize {
        self.intents.read().await.len()
    }

    /// Requests received, in order
    pub async fn requests(&self) -> Vec<IntentRequest> {
        self.requests.read().await.clone()
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_intent(&self, request: &IntentRequest) -> CheckoutResult<PaymentIntent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CheckoutError::GatewayUnavailable(
                "sandbox gateway is unavailable".to_string(),
            ));
        }

        let mut intents = self.intents.write().await;
        if let Some(existing) = intents.get(&request.idempotency_key) {
            debug!(key = %request.idempotency_key, "Replaying intent for idempotency key");
            return Ok(existing.clone());
        }

        let intent_id = format!("intent_{}", Uuid::new_v4().simple());
        let ttl = self
            .ttl
            .unwrap_or_else(|| Duration::minutes(i64::from(request.expires_in_minutes)));
        let intent = PaymentIntent {
            redirect_url: format!("{}/pay/{}", self.base_url, intent_id),
            intent_id,
            expires_at: Utc::now() + ttl,
        };
        intents.insert(request.idempotency_key.clone(), intent.clone());
        Ok(intent)
    }

    async fn verify_notification(
        &self,
        payload: &[u8],
        _signature: &str,
    ) -> CheckoutResult<Option<PaymentOutcome>> {
        CallbackPayload::from_slice(payload)?.into_outcome()
    }

    fn provider_name(&self) -> &'static str {
        "sandbox"
    }
}

/// Sandbox wallet service
pub struct InMemoryWalletProvisioner {
    unavailable: AtomicBool,
}

impl InMemoryWalletProvisioner {
    pub fn new() -> Self {
        Self {
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for InMemoryWalletProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvisioner for InMemoryWalletProvisioner {
    async fn provision(&self) -> CheckoutResult<Wallet> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CheckoutError::Provider {
                provider: "sandbox".to_string(),
                message: "wallet service is unavailable".to_string(),
            });
        }

        let id = Uuid::new_v4();
        Ok(Wallet {
            address: format!("G{}", id.simple().to_string().to_uppercase()),
            id: id.to_string(),
            created_at: Utc::now(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "sandbox"
    }
}
