//! # Wallet Registry
//!
//! Receiving wallets provisioned from an external wallet service. The pool
//! is append-only and has nothing to do with checkout sessions.

use crate::error::CheckoutResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// A provisioned receiving wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(rename = "wallet_address")]
    pub address: String,

    #[serde(rename = "wallet_id")]
    pub id: String,

    pub created_at: DateTime<Utc>,
}

/// External service that creates wallets
#[async_trait]
pub trait WalletProvisioner: Send + Sync {
    async fn provision(&self) -> CheckoutResult<Wallet>;

    fn provider_name(&self) -> &'static str;
}

pub type BoxedWalletProvisioner = Arc<dyn WalletProvisioner>;

/// Wallets provisioned during this process lifetime
pub struct WalletRegistry {
    provisioner: BoxedWalletProvisioner,
    wallets: RwLock<Vec<Wallet>>,
}

impl WalletRegistry {
    pub fn new(provisioner: BoxedWalletProvisioner) -> Self {
        Self {
            provisioner,
            wallets: RwLock::new(Vec::new()),
        }
    }

    /// Provision a new wallet and remember it; failures leave the pool unchanged
    #[instrument(skip(self), fields(provider = self.provisioner.provider_name()))]
    pub async fn provision(&self) -> CheckoutResult<Wallet> {
        let wallet = self.provisioner.provision().await?;
        self.wallets.write().await.push(wallet.clone());
        info!(wallet_id = %wallet.id, "Provisioned wallet");
        Ok(wallet)
    }

    /// All wallets, oldest first
    pub async fn list(&self) -> Vec<Wallet> {
        self.wallets.read().await.clone()
    }

    /// Most recently provisioned wallet
    pub async fn current(&self) -> Option<Wallet> {
        self.wallets.read().await.last().cloned()
    }

    pub fn provider_name(&self) -> &'static str {
        self.provisioner.provider_name()
    }

    pub async fn len(&self) -> usize {
        self.wallets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.wallets.read().await.is_empty()
    }
}
