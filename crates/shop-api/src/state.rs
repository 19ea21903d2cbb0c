//! # Application State
//!
//! Shared state for the Axum application: the checkout service (carts,
//! sessions, gateway), the wallet registry and configuration.

use anyhow::Context;
use shop_core::{
    BoxedPaymentGateway, BoxedWalletProvisioner, CheckoutService, CheckoutSettings, CheckoutUrls,
    InMemoryGateway, InMemoryWalletProvisioner, ProductCatalog, TaxPolicy, WalletRegistry,
};
use shop_gateway::{HostedCheckoutGateway, HttpWalletProvisioner};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for redirect and callback targets
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Tax rate in basis points
    pub tax_rate_bps: u32,
    /// Lifetime of hosted payment pages
    pub intent_expiry_minutes: u32,
    /// Upper bound on one gateway call
    pub gateway_timeout_secs: u64,
    /// Interval of the expiry sweep; 0 disables it
    pub expiry_sweep_secs: u64,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT", 8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            tax_rate_bps: env_parse("TAX_RATE_BPS", 800),
            intent_expiry_minutes: env_parse("INTENT_EXPIRY_MINUTES", 45),
            gateway_timeout_secs: env_parse("GATEWAY_TIMEOUT_SECS", 30),
            expiry_sweep_secs: env_parse("EXPIRY_SWEEP_SECS", 60),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Checkout knobs derived from this config
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            tax: TaxPolicy::new(self.tax_rate_bps),
            urls: CheckoutUrls::new(&self.base_url),
            expires_in_minutes: self.intent_expiry_minutes,
            gateway_timeout: Duration::from_secs(self.gateway_timeout_secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            tax_rate_bps: 800,
            intent_expiry_minutes: 45,
            gateway_timeout_secs: 30,
            expiry_sweep_secs: 60,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Carts, checkout sessions and the payment gateway
    pub service: CheckoutService,
    /// Provisioned receiving wallets
    pub wallets: Arc<WalletRegistry>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Build state from the environment
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let catalog = load_product_catalog()?;
        let gateway = payment_gateway(&config)?;
        let wallets = wallet_provisioner(&config)?;

        Ok(Self::with_collaborators(config, catalog, gateway, wallets))
    }

    /// Build state around explicit collaborators
    pub fn with_collaborators(
        config: AppConfig,
        catalog: ProductCatalog,
        gateway: BoxedPaymentGateway,
        wallets: BoxedWalletProvisioner,
    ) -> Self {
        let service = CheckoutService::new(catalog, gateway, config.checkout_settings());
        Self {
            service,
            wallets: Arc::new(WalletRegistry::new(wallets)),
            config,
        }
    }

    /// Sandbox collaborators (development and tests)
    pub fn sandbox(config: AppConfig, catalog: ProductCatalog) -> Self {
        Self::with_collaborators(
            config,
            catalog,
            Arc::new(InMemoryGateway::new()),
            Arc::new(InMemoryWalletProvisioner::new()),
        )
    }
}

fn payment_gateway(config: &AppConfig) -> anyhow::Result<BoxedPaymentGateway> {
    if std::env::var("GATEWAY_API_URL").is_ok() || config.is_production() {
        let gateway = HostedCheckoutGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize payment gateway: {}", e))?;
        return Ok(Arc::new(gateway));
    }

    warn!("GATEWAY_API_URL not set; using the sandbox payment gateway");
    Ok(Arc::new(InMemoryGateway::new()))
}

fn wallet_provisioner(config: &AppConfig) -> anyhow::Result<BoxedWalletProvisioner> {
    if std::env::var("WALLET_API_URL").is_ok() || config.is_production() {
        let provisioner = HttpWalletProvisioner::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize wallet service: {}", e))?;
        return Ok(Arc::new(provisioner));
    }

    warn!("WALLET_API_URL not set; using the sandbox wallet service");
    Ok(Arc::new(InMemoryWalletProvisioner::new()))
}

/// Load product catalog from config file
pub fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            info!("Loaded {} products from {}", catalog.len(), path);
            return Ok(catalog);
        }
    }

    warn!("No product catalog found, using empty catalog");
    Ok(ProductCatalog::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..AppConfig::default()
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");

        let bad = AppConfig {
            host: "not a host".to_string(),
            ..AppConfig::default()
        };
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_checkout_settings() {
        let config = AppConfig {
            tax_rate_bps: 500,
            base_url: "https://shop.example.com/".to_string(),
            gateway_timeout_secs: 7,
            ..AppConfig::default()
        };

        let settings = config.checkout_settings();
        assert_eq!(settings.tax.rate_bps, 500);
        assert_eq!(settings.urls.callback_url(), "https://shop.example.com/webhook/gateway");
        assert_eq!(settings.gateway_timeout, Duration::from_secs(7));
        assert_eq!(settings.expires_in_minutes, 45);
    }

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = ProductCatalog::from_toml(include_str!("../../../config/products.toml"))
            .unwrap();
        assert_eq!(catalog.len(), 6);
        assert!(!catalog.get("4").unwrap().in_stock);
    }
}
