//! # shop-postgres
//!
//! PostgreSQL implementation of the storefront `StoreGateway`.
//!
//! ```rust,ignore
//! let pool = shop_postgres::create_pool(&database_url, 10).await?;
//! shop_postgres::migrate(&pool).await?;
//! let store: SharedStore = Arc::new(PgStore::new(pool));
//! ```

pub mod store;

pub use store::PgStore;

use shop_core::ShopError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Create a connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, ShopError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| ShopError::Database(format!("Failed to connect: {}", e)))
}

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), ShopError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ShopError::Database(format!("Migration failed: {}", e)))
}

/// Map a driver error, turning unique violations into conflicts.
pub(crate) fn db_error(conflict: &str) -> impl Fn(sqlx::Error) -> ShopError + '_ {
    move |e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            ShopError::Conflict(conflict.to_string())
        }
        other => ShopError::Database(other.to_string()),
    }
}

pub(crate) fn db(e: sqlx::Error) -> ShopError {
    ShopError::Database(e.to_string())
}
