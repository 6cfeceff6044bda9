//! # Postgres Store
//!
//! Runtime-checked queries against the schema in `migrations/`.

use crate::{db, db_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shop_core::{
    CardId, CustomerProfile, NewPurchase, NewStoredCard, NewUser, Product, ProductId,
    ProductInput, Purchase, PurchaseHistoryItem, SaleRecord, SalesFilter, ShopError, ShopResult,
    StoreGateway, StoredCard, User, UserCredentials, UserId,
};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, instrument};

/// `StoreGateway` backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::new(row.id),
            username: row.username,
            email: row.email,
        }
    }
}

#[derive(Debug, FromRow)]
struct CredentialsRow {
    id: i64,
    username: String,
    password_hash: String,
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    email: String,
    stripe_customer_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct CardRow {
    id: i64,
    user_id: i64,
    stripe_payment_method_id: String,
    brand: String,
    last4: String,
    exp_month: i32,
    exp_year: i32,
}

impl From<CardRow> for StoredCard {
    fn from(row: CardRow) -> Self {
        StoredCard {
            id: CardId::new(row.id),
            user_id: UserId::new(row.user_id),
            payment_method_id: row.stripe_payment_method_id,
            brand: row.brand,
            last4: row.last4,
            exp_month: row.exp_month,
            exp_year: row.exp_year,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    price_cents: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
        }
    }
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: i64,
    user_id: i64,
    product_id: i64,
    quantity: i32,
    total_price_cents: i64,
    stripe_payment_intent_id: String,
    purchased_at: DateTime<Utc>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Purchase {
            id: row.id,
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            total_price_cents: row.total_price_cents,
            payment_intent_id: row.stripe_payment_intent_id,
            purchased_at: row.purchased_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    purchase_id: i64,
    product_id: i64,
    product_name: String,
    quantity: i32,
    total_price_cents: i64,
    purchased_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleRow {
    purchase_id: i64,
    product_id: i64,
    product_name: String,
    user_id: i64,
    username: String,
    quantity: i32,
    total_price_cents: i64,
    purchased_at: DateTime<Utc>,
}

const CARD_COLUMNS: &str =
    "id, user_id, stripe_payment_method_id, brand, last4, exp_month, exp_year";

// =============================================================================
// StoreGateway
// =============================================================================

#[async_trait]
impl StoreGateway for PgStore {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: &NewUser) -> ShopResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, username, email",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("User already exists"))?;

        Ok(row.into())
    }

    async fn credentials_by_email(&self, email: &str) -> ShopResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT id, username, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(|r| UserCredentials {
            id: UserId::new(r.id),
            username: r.username,
            password_hash: r.password_hash,
        }))
    }

    async fn customer_profile(&self, user_id: UserId) -> ShopResult<Option<CustomerProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT email, stripe_customer_id FROM users WHERE id = $1",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(|r| CustomerProfile {
            email: r.email,
            customer_id: r.stripe_customer_id,
        }))
    }

    async fn set_customer_id(&self, user_id: UserId, customer_id: &str) -> ShopResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET stripe_customer_id = $1 \
             WHERE id = $2 AND (stripe_customer_id IS NULL OR stripe_customer_id = '')",
        )
        .bind(customer_id)
        .bind(user_id.get())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_admin(&self, user_id: UserId) -> ShopResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM admins WHERE user_id = $1)")
            .bind(user_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(db)
    }

    #[instrument(skip(self, card), fields(user_id = %card.user_id))]
    async fn insert_card(&self, card: &NewStoredCard) -> ShopResult<StoredCard> {
        let sql = format!(
            "INSERT INTO credit_cards \
             (user_id, stripe_payment_method_id, brand, last4, exp_month, exp_year) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            CARD_COLUMNS
        );
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(card.user_id.get())
            .bind(&card.payment_method_id)
            .bind(&card.brand)
            .bind(&card.last4)
            .bind(card.exp_month)
            .bind(card.exp_year)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Credit card already on file"))?;

        Ok(row.into())
    }

    async fn find_card(&self, user_id: UserId, card_id: CardId) -> ShopResult<Option<StoredCard>> {
        let sql = format!(
            "SELECT {} FROM credit_cards WHERE id = $1 AND user_id = $2",
            CARD_COLUMNS
        );
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(card_id.get())
            .bind(user_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;

        Ok(row.map(Into::into))
    }

    async fn delete_card(&self, user_id: UserId, card_id: CardId) -> ShopResult<u64> {
        let result = sqlx::query("DELETE FROM credit_cards WHERE id = $1 AND user_id = $2")
            .bind(card_id.get())
            .bind(user_id.get())
            .execute(&self.pool)
            .await
            .map_err(db)?;

        Ok(result.rows_affected())
    }

    async fn list_cards(&self, user_id: UserId) -> ShopResult<Vec<StoredCard>> {
        let sql = format!(
            "SELECT {} FROM credit_cards WHERE user_id = $1 ORDER BY id",
            CARD_COLUMNS
        );
        let rows = sqlx::query_as::<_, CardRow>(&sql)
            .bind(user_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn product_price(&self, product_id: ProductId) -> ShopResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT price_cents FROM products WHERE id = $1")
            .bind(product_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)
    }

    async fn list_products(&self) -> ShopResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description, price_cents FROM products ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_product(&self, input: &ProductInput) -> ShopResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            "INSERT INTO products (name, description, price_cents) VALUES ($1, $2, $3) \
             RETURNING id, name, description, price_cents",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price_cents)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.into())
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        input: &ProductInput,
    ) -> ShopResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET name = $1, description = $2, price_cents = $3 WHERE id = $4 \
             RETURNING id, name, description, price_cents",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price_cents)
        .bind(product_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(Into::into))
    }

    async fn delete_product(&self, product_id: ProductId) -> ShopResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    ShopError::Conflict("Product has recorded purchases".to_string())
                }
                other => db(other),
            })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, purchases), fields(rows = purchases.len()))]
    async fn record_purchases(&self, purchases: &[NewPurchase]) -> ShopResult<Vec<Purchase>> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut recorded = Vec::with_capacity(purchases.len());

        for purchase in purchases {
            let row = sqlx::query_as::<_, PurchaseRow>(
                "INSERT INTO purchases \
                 (user_id, product_id, quantity, total_price_cents, stripe_payment_intent_id) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, user_id, product_id, quantity, total_price_cents, \
                           stripe_payment_intent_id, purchased_at",
            )
            .bind(purchase.user_id.get())
            .bind(purchase.product_id.get())
            .bind(purchase.quantity)
            .bind(purchase.total_price_cents)
            .bind(&purchase.payment_intent_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db)?;

            recorded.push(row.into());
        }

        // Dropping `tx` on an early return rolls every insert back.
        tx.commit().await.map_err(db)?;

        debug!("Recorded {} purchase rows", recorded.len());
        Ok(recorded)
    }

    async fn purchase_history(&self, user_id: UserId) -> ShopResult<Vec<PurchaseHistoryItem>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT pu.id AS purchase_id, p.id AS product_id, p.name AS product_name, \
                    pu.quantity, pu.total_price_cents, pu.purchased_at \
             FROM purchases pu \
             JOIN products p ON p.id = pu.product_id \
             WHERE pu.user_id = $1 \
             ORDER BY pu.purchased_at DESC, pu.id DESC",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        Ok(rows
            .into_iter()
            .map(|r| PurchaseHistoryItem {
                purchase_id: r.purchase_id,
                product_id: ProductId::new(r.product_id),
                product_name: r.product_name,
                quantity: r.quantity,
                total_price_cents: r.total_price_cents,
                purchased_at: r.purchased_at,
            })
            .collect())
    }

    async fn sales(&self, filter: &SalesFilter) -> ShopResult<Vec<SaleRecord>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT pu.id AS purchase_id, p.id AS product_id, p.name AS product_name, \
                    u.id AS user_id, u.username, pu.quantity, pu.total_price_cents, \
                    pu.purchased_at \
             FROM purchases pu \
             JOIN products p ON p.id = pu.product_id \
             JOIN users u ON u.id = pu.user_id \
             WHERE ($1::timestamptz IS NULL OR pu.purchased_at >= $1) \
               AND ($2::timestamptz IS NULL OR pu.purchased_at < $2) \
               AND ($3::text IS NULL OR u.username = $3) \
             ORDER BY pu.purchased_at DESC, pu.id DESC",
        )
        .bind(filter.lower_bound())
        .bind(filter.upper_bound())
        .bind(filter.username.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        Ok(rows
            .into_iter()
            .map(|r| SaleRecord {
                purchase_id: r.purchase_id,
                product_id: ProductId::new(r.product_id),
                product_name: r.product_name,
                user_id: UserId::new(r.user_id),
                username: r.username,
                quantity: r.quantity,
                total_price_cents: r.total_price_cents,
                purchased_at: r.purchased_at,
            })
            .collect())
    }
}
