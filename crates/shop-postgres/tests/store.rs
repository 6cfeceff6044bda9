//! Store tests against a live Postgres.
//!
//! Skipped unless `DATABASE_URL` points at a database the tests may migrate.

use chrono::Utc;
use shop_core::{
    ErrorKind, NewPurchase, NewUser, ProductId, ProductInput, StoreGateway, User,
};
use shop_postgres::PgStore;

async fn connect() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = shop_postgres::create_pool(&url, 2).await.unwrap();
    shop_postgres::migrate(&pool).await.unwrap();
    Some(PgStore::new(pool))
}

async fn fresh_user(store: &PgStore) -> User {
    let tag = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    store
        .create_user(&NewUser {
            username: format!("buyer_{}", tag),
            email: format!("buyer_{}@example.com", tag),
            password_hash: "not-a-real-hash".to_string(),
        })
        .await
        .unwrap()
}

fn row(user: &User, product_id: ProductId, intent: &str) -> NewPurchase {
    NewPurchase {
        user_id: user.id,
        product_id,
        quantity: 1,
        total_price_cents: 500,
        payment_intent_id: intent.to_string(),
    }
}

#[tokio::test]
async fn record_purchases_is_all_or_nothing() {
    let Some(store) = connect().await else {
        return;
    };
    let user = fresh_user(&store).await;
    let product = store
        .create_product(&ProductInput::new("Widget", 500))
        .await
        .unwrap();

    let rows = [
        row(&user, product.id, "pi_all_or_nothing"),
        row(&user, ProductId::new(i64::MAX), "pi_all_or_nothing"),
    ];
    let err = store.record_purchases(&rows).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(store.purchase_history(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn record_purchases_commits_every_row() {
    let Some(store) = connect().await else {
        return;
    };
    let user = fresh_user(&store).await;
    let product = store
        .create_product(&ProductInput::new("Gadget", 500))
        .await
        .unwrap();

    let rows = [
        row(&user, product.id, "pi_committed"),
        row(&user, product.id, "pi_committed"),
    ];
    let recorded = store.record_purchases(&rows).await.unwrap();

    assert_eq!(recorded.len(), 2);
    assert_eq!(store.purchase_history(user.id).await.unwrap().len(), 2);
}
