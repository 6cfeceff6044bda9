//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the injected store, the card registry, the checkout orchestrator,
//! and the token issuer.

use crate::auth::TokenIssuer;
use anyhow::Context;
use shop_core::{
    CardRegistry, CheckoutOrchestrator, Currency, SharedPaymentGateway, SharedReconciliationHook,
    SharedStore,
};
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Postgres connection string
    pub database_url: String,
    /// Pool size
    pub database_max_connections: u32,
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,
    /// Token lifetime
    pub jwt_ttl: Duration,
    /// Currency every checkout is charged in
    pub currency: Currency,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_ttl", &self.jwt_ttl)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match lookup("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("Invalid PORT: {}", raw))?,
            None => 8080,
        };
        let database_max_connections: u32 = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {}", raw))?,
            None => 10,
        };
        let jwt_ttl_secs: u64 = match lookup("JWT_TTL_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid JWT_TTL_SECS: {}", raw))?,
            None => 86_400,
        };
        let currency = match lookup("STORE_CURRENCY") {
            Some(raw) => raw.parse::<Currency>()?,
            None => Currency::default(),
        };

        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET not set")?;
        if jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            database_url: lookup("DATABASE_URL").context("DATABASE_URL not set")?,
            database_max_connections,
            jwt_secret,
            jwt_ttl: Duration::from_secs(jwt_ttl_secs),
            currency,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Relational store, used directly by the catalog, history and auth routes
    pub store: SharedStore,
    /// Card attach/detach
    pub cards: CardRegistry,
    /// Checkout flow
    pub checkout: CheckoutOrchestrator,
    /// Session token signing and verification
    pub tokens: TokenIssuer,
}

impl AppState {
    /// Wire the components around an injected store and payment gateway.
    pub fn new(
        store: SharedStore,
        payments: SharedPaymentGateway,
        tokens: TokenIssuer,
        currency: Currency,
    ) -> Self {
        Self {
            cards: CardRegistry::new(store.clone(), payments.clone()),
            checkout: CheckoutOrchestrator::new(store.clone(), payments).with_currency(currency),
            store,
            tokens,
        }
    }

    /// Builder: route reconciliation gaps from both components to `hook`
    pub fn with_reconciliation_hook(mut self, hook: SharedReconciliationHook) -> Self {
        self.cards = self.cards.with_reconciliation_hook(hook.clone());
        self.checkout = self.checkout.with_reconciliation_hook(hook);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/storefront"),
        ("JWT_SECRET", "0123456789abcdef0123"),
    ];

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.jwt_ttl, Duration::from_secs(86_400));
        assert_eq!(config.currency, Currency::CAD);
        assert!(!config.is_production());
    }

    #[test]
    fn test_app_config_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PORT", "3000"),
            ("STORE_CURRENCY", "usd"),
            ("ENVIRONMENT", "production"),
        ]);
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.currency, Currency::USD);
        assert!(config.is_production());
    }

    #[test]
    fn test_app_config_rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[("JWT_SECRET", "0123456789abcdef0123")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/storefront"),
            ("JWT_SECRET", "short"),
        ]))
        .is_err());

        let mut vars = REQUIRED.to_vec();
        vars.push(("STORE_CURRENCY", "doubloons"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let mut config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;

        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:3000");

        config.host = "not a host".to_string();
        assert!(config.socket_addr().is_err());
    }
}
