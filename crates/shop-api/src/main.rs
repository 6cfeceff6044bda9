//! # storefront
//!
//! Storefront payment backend: saved cards and checkout over Stripe,
//! persisted in Postgres.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export DATABASE_URL=postgres://localhost/storefront
//! export JWT_SECRET=change-me-to-something-long
//! export STRIPE_SECRET_KEY=sk_test_...
//!
//! # Run the server
//! storefront
//! ```

use shop_api::{routes, AppConfig, AppState, TokenIssuer};
use shop_core::{SharedPaymentGateway, SharedStore};
use shop_postgres::PgStore;
use shop_stripe::StripeGateway;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;

    let pool = shop_postgres::create_pool(&config.database_url, config.database_max_connections)
        .await?;
    shop_postgres::migrate(&pool).await?;
    info!("Database ready");

    let stripe = StripeGateway::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

    let store: SharedStore = Arc::new(PgStore::new(pool));
    let payments: SharedPaymentGateway = Arc::new(stripe);
    let tokens = TokenIssuer::new(&config.jwt_secret, config.jwt_ttl);
    let state = AppState::new(store, payments, tokens, config.currency);

    info!("Environment: {}", config.environment);
    info!("Charging in {}", config.currency);

    let app = routes::create_router(state);

    info!("Storefront listening on http://{}", addr);
    if !config.is_production() {
        info!("Health: http://{}/health", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Storefront stopped");
    Ok(())
}

/// Human-readable logs by default, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
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

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
