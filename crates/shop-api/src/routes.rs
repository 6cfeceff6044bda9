//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Public:
///   - GET  /health, /check - Health check
///   - POST /signup - Create an account
///   - POST /login - Exchange credentials for a bearer token
///   - GET  /products - List the catalog
///
/// - Authenticated (`Authorization: Bearer <token>`):
///   - GET    /users/creditcards - List saved cards
///   - POST   /users/creditcards - Attach a tokenized card
///   - DELETE /users/creditcards/{card_id} - Detach a card
///   - POST   /users/buy - Charge a saved card for a list of items
///   - GET    /users/history - Own purchase history
///
/// - Admin:
///   - POST   /products - Create a product
///   - PUT    /products/{product_id} - Replace a product
///   - DELETE /products/{product_id} - Delete a product
///   - GET    /admin/sales - Sales report with date and username filters
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let user_routes = Router::new()
        .route(
            "/creditcards",
            get(handlers::list_cards).post(handlers::add_card),
        )
        .route("/creditcards/{card_id}", delete(handlers::delete_card))
        .route("/buy", post(handlers::buy))
        .route("/history", get(handlers::purchase_history));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/check", get(handlers::health))
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/products/{product_id}",
            put(handlers::update_product).delete(handlers::delete_product),
        )
        .route("/admin/sales", get(handlers::sales))
        .nest("/users", user_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
