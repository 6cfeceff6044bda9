//! HTTP-level tests against the in-memory store and scripted processor.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use shop_api::handlers::{BuyResponse, CardResponse, LoginResponse};
use shop_api::{create_router, AppState, ErrorResponse, TokenIssuer};
use shop_core::testing::{InMemoryStore, RecordingHook, ScriptedProcessor, StoreFault};
use shop_core::{Currency, Product, PurchaseHistoryItem, ReconciliationGap, SaleRecord, User};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "test-secret-0123456789";

struct Harness {
    server: TestServer,
    store: Arc<InMemoryStore>,
    processor: Arc<ScriptedProcessor>,
    hook: Arc<RecordingHook>,
}

fn state(store: &Arc<InMemoryStore>, processor: &Arc<ScriptedProcessor>) -> AppState {
    AppState::new(
        store.clone(),
        processor.clone(),
        TokenIssuer::new(SECRET, Duration::from_secs(3600)),
        Currency::CAD,
    )
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(ScriptedProcessor::new());
    let hook = Arc::new(RecordingHook::default());
    let app = create_router(state(&store, &processor).with_reconciliation_hook(hook.clone()));

    Harness {
        server: TestServer::new(app).unwrap(),
        store,
        processor,
        hook,
    }
}

impl Harness {
    /// Sign up and log in, returning the user and a bearer token.
    async fn register(&self, username: &str) -> (User, String) {
        let email = format!("{}@example.com", username);
        let response = self
            .server
            .post("/signup")
            .json(&json!({ "username": username, "email": email, "password": "hunter22" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let user: User = response.json();

        let response = self
            .server
            .post("/login")
            .json(&json!({ "email": email, "password": "hunter22" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let login: LoginResponse = response.json();

        (user, login.token)
    }

    async fn attach(&self, token: &str, payment_method_id: &str) -> CardResponse {
        let response = self
            .server
            .post("/users/creditcards")
            .authorization_bearer(token)
            .json(&json!({ "payment_method_id": payment_method_id }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json()
    }
}

#[tokio::test]
async fn health_endpoints() {
    let h = harness();

    for path in ["/health", "/check"] {
        let response = h.server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }
}

#[tokio::test]
async fn signup_and_login() {
    let h = harness();
    let (user, token) = h.register("ana").await;
    assert_eq!(user.username, "ana");
    assert!(!token.is_empty());

    let duplicate = h
        .server
        .post("/signup")
        .json(&json!({ "username": "ana", "email": "ana@example.com", "password": "x" }))
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);

    let missing = h
        .server
        .post("/signup")
        .json(&json!({ "username": "bo", "email": "bo@example.com" }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

    let wrong = h
        .server
        .post("/login")
        .json(&json!({ "email": "ana@example.com", "password": "hunter23" }))
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
    assert!(wrong.json::<ErrorResponse>().error.contains("Invalid credentials"));
}

#[tokio::test]
async fn user_routes_require_a_valid_token() {
    let h = harness();

    let response = h.server.get("/users/creditcards").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(response.json::<ErrorResponse>().error.contains("Missing token"));

    let response = h
        .server
        .post("/users/buy")
        .authorization_bearer("garbage")
        .json(&json!({ "items": [], "payment_method_id": "pm_card_visa" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(response.json::<ErrorResponse>().error.contains("Invalid token"));
}

#[tokio::test]
async fn malformed_bodies_use_the_error_shape() {
    let h = harness();
    let (_, token) = h.register("ana").await;

    let response = h
        .server
        .post("/users/buy")
        .authorization_bearer(&token)
        .json(&json!({ "items": [{ "product_id": 1 }] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, 400);
    assert!(body.error.starts_with("Invalid request"));

    let response = h
        .server
        .post("/users/creditcards")
        .authorization_bearer(&token)
        .text("payment_method_id=pm_card_visa")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorResponse>().code, 400);
    assert!(h.processor.calls().is_empty());
}

#[tokio::test]
async fn card_lifecycle() {
    let h = harness();
    let (_, token) = h.register("ana").await;

    h.processor
        .set_card_details("pm_card_mastercard", "mastercard", "4444", 8, 2029);
    let card = h.attach(&token, "pm_card_mastercard").await;
    assert_eq!(card.stripe_pm_id, "pm_card_mastercard");
    assert_eq!(card.brand, "mastercard");
    assert_eq!(card.last4, "4444");
    assert_eq!((card.exp_month, card.exp_year), (8, 2029));

    let listed: Vec<CardResponse> = h
        .server
        .get("/users/creditcards")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(listed.len(), 1);

    let path = format!("/users/creditcards/{}", card.id);
    let response = h.server.delete(&path).authorization_bearer(&token).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    assert!(h.processor.attached_to("pm_card_mastercard").is_none());

    let response = h.server.delete(&path).authorization_bearer(&token).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<ErrorResponse>().error,
        "Credit card not found"
    );
}

#[tokio::test]
async fn cards_of_other_users_are_invisible() {
    let h = harness();
    let (_, ana) = h.register("ana").await;
    let (_, bo) = h.register("bo").await;
    let card = h.attach(&ana, "pm_card_visa").await;

    let response = h
        .server
        .delete(&format!("/users/creditcards/{}", card.id))
        .authorization_bearer(&bo)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(h.processor.attached_to("pm_card_visa").is_some());
}

#[tokio::test]
async fn buy_charges_catalog_prices_and_records_history() {
    let h = harness();
    let a = h.store.seed_product("A", 500);
    let b = h.store.seed_product("B", 1200);
    let (user, token) = h.register("ana").await;
    let card = h.attach(&token, "pm_card_visa").await;

    let response = h
        .server
        .post("/users/buy")
        .authorization_bearer(&token)
        .json(&json!({
            "items": [
                { "product_id": a, "quantity": 2 },
                { "product_id": b, "quantity": 1 }
            ],
            "payment_method_id": card.stripe_pm_id
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let bought: BuyResponse = response.json();
    assert!(bought.success);

    let charges = h.processor.intent_requests();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount_cents, 2200);
    assert_eq!(charges[0].currency, Currency::CAD);

    let rows = h.store.purchases();
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|r| r.payment_intent_id == bought.stripe_payment_intent_id && r.user_id == user.id));

    let history: Vec<PurchaseHistoryItem> = h
        .server
        .get("/users/history")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(history.len(), 2);
    assert_eq!(
        history.iter().map(|p| p.total_price_cents).sum::<i64>(),
        2200
    );

    let again: Vec<PurchaseHistoryItem> = h
        .server
        .get("/users/history")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(history, again);
}

#[tokio::test]
async fn buy_rejections_happen_before_any_charge() {
    let h = harness();
    let a = h.store.seed_product("A", 500);
    let (_, token) = h.register("ana").await;

    // No customer on file yet.
    let response = h
        .server
        .post("/users/buy")
        .authorization_bearer(&token)
        .json(&json!({ "items": [{ "product_id": a, "quantity": 1 }], "payment_method_id": "pm_card_visa" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response
        .json::<ErrorResponse>()
        .error
        .contains("No Stripe customer on file"));

    h.attach(&token, "pm_card_visa").await;

    let response = h
        .server
        .post("/users/buy")
        .authorization_bearer(&token)
        .json(&json!({ "items": [{ "product_id": 999, "quantity": 1 }], "payment_method_id": "pm_card_visa" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.json::<ErrorResponse>().error.contains("999"));

    let response = h
        .server
        .post("/users/buy")
        .authorization_bearer(&token)
        .json(&json!({ "items": [{ "product_id": a, "quantity": 0 }], "payment_method_id": "pm_card_visa" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert!(h.processor.intent_requests().is_empty());
    assert!(h.store.purchases().is_empty());
}

#[tokio::test]
async fn unrecorded_charge_is_reported_without_leaking_detail() {
    let h = harness();
    let a = h.store.seed_product("A", 500);
    let (user, token) = h.register("ana").await;
    h.attach(&token, "pm_card_visa").await;
    h.store.arm(StoreFault::RecordPurchases);

    let response = h
        .server
        .post("/users/buy")
        .authorization_bearer(&token)
        .json(&json!({ "items": [{ "product_id": a, "quantity": 3 }], "payment_method_id": "pm_card_visa" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<ErrorResponse>().error,
        "Internal server error"
    );

    match h.hook.gaps().as_slice() {
        [ReconciliationGap::UnrecordedCharge {
            user_id,
            amount_cents,
            ..
        }] => {
            assert_eq!(*user_id, user.id);
            assert_eq!(*amount_cents, 1500);
        }
        other => panic!("unexpected gaps: {:?}", other),
    }
}

#[tokio::test]
async fn catalog_admin_routes() {
    let h = harness();
    let (admin, admin_token) = h.register("root").await;
    let (_, token) = h.register("ana").await;
    h.store.grant_admin(admin.id);

    let body = json!({ "name": "Kettle", "description": "Stovetop", "price_cents": 3999 });

    let response = h
        .server
        .post("/products")
        .authorization_bearer(&token)
        .json(&body)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = h
        .server
        .post("/products")
        .authorization_bearer(&admin_token)
        .json(&json!({ "name": "Free", "price_cents": 0 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = h
        .server
        .post("/products")
        .authorization_bearer(&admin_token)
        .json(&body)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let product: Product = response.json();

    let path = format!("/products/{}", product.id);
    let response = h
        .server
        .put(&path)
        .authorization_bearer(&admin_token)
        .json(&json!({ "name": "Kettle", "price_cents": 4499 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Product>().price_cents, 4499);

    let products: Vec<Product> = h.server.get("/products").await.json();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].price_cents, 4499);

    let response = h.server.delete(&path).authorization_bearer(&admin_token).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = h
        .server
        .put(&path)
        .authorization_bearer(&admin_token)
        .json(&json!({ "name": "Kettle", "price_cents": 4499 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = h.server.delete(&path).authorization_bearer(&admin_token).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sales_report_filters() {
    let h = harness();
    let a = h.store.seed_product("A", 500);
    let (admin, admin_token) = h.register("root").await;
    h.store.grant_admin(admin.id);

    for (name, month) in [("ana", 3), ("bo", 6)] {
        h.store
            .set_clock(Utc.with_ymd_and_hms(2024, month, 1, 12, 0, 0).unwrap());
        let (_, token) = h.register(name).await;
        h.attach(&token, &format!("pm_{}", name)).await;
        let response = h
            .server
            .post("/users/buy")
            .authorization_bearer(&token)
            .json(&json!({ "items": [{ "product_id": a, "quantity": 1 }], "payment_method_id": format!("pm_{}", name) }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let all: Vec<SaleRecord> = h
        .server
        .get("/admin/sales?from=2000-01-01")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(all.len(), 2);

    let bo: Vec<SaleRecord> = h
        .server
        .get("/admin/sales?username=bo")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(bo.len(), 1);
    assert_eq!(bo[0].username, "bo");

    let none: Vec<SaleRecord> = h
        .server
        .get("/admin/sales?to=2000-01-01")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert!(none.is_empty());

    let summer: Vec<SaleRecord> = h
        .server
        .get("/admin/sales?from=2024-05-01&to=2024-06-01")
        .authorization_bearer(&admin_token)
        .await
        .json();
    assert_eq!(summer.len(), 1);
    assert_eq!(summer[0].username, "bo");

    let response = h
        .server
        .get("/admin/sales?from=yesterday")
        .authorization_bearer(&admin_token)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(ScriptedProcessor::new());
    let app = create_router(state(&store, &processor));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/users/buy")
        .header(header::ORIGIN, "https://shop.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
