//! # Storefront
//!
//! Cart, checkout and payment reconciliation server.
//!
//! ## Usage
//!
//! ```bash
//! # Hosted gateway (omit to run against the sandbox gateway)
//! export GATEWAY_API_URL=https://gateway.example.com/checkout
//! export GATEWAY_API_KEY=...
//! export GATEWAY_WEBHOOK_SECRET=...
//!
//! # Run the server
//! storefront
//! ```

use chrono::Utc;
use shop_api::{routes, state::AppState};
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Products loaded: {}", state.service.catalog().len());
    info!(
        "Payment gateway: {}, wallet service: {}",
        state.service.gateway().provider_name(),
        state.wallets.provider_name()
    );

    if state.config.expiry_sweep_secs > 0 {
        spawn_expiry_sweep(state.clone(), Duration::from_secs(state.config.expiry_sweep_secs));
    }

    let app = routes::create_router(state);

    info!("Storefront starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Carts: POST http://{}/api/v1/carts", addr);
        info!("Webhook: POST http://{}/webhook/gateway", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Materialize expired sessions so stale pending pages don't linger
fn spawn_expiry_sweep(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let expired = state.service.sweep_expired(Utc::now()).await;
            if expired > 0 {
                info!(expired, "Expired checkout sessions");
            } else {
                debug!("Expiry sweep found nothing");
            }
        }
    });
}

fn print_banner() {
    println!(
        r#"
  Storefront
  ━━━━━━━━━━━━━━━━━━━━━━━
  Carts, checkout and payment reconciliation
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
