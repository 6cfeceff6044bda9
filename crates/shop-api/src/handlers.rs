//! # Request Handlers
//!
//! Axum request handlers for the storefront API.
//! Card and checkout handlers delegate to the core components; the
//! remaining routes are thin wrappers over single store calls.

use crate::auth::{hash_password, verify_password, Auth, RequireAdmin};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use shop_core::{
    validate_signup, CardId, CheckoutRequest, NewUser, Product, ProductId, ProductInput,
    PurchaseHistoryItem, SaleRecord, SalesFilter, ShopError, StoredCard, User,
};
use tracing::{info, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    #[serde(default)]
    pub payment_method_id: String,
}

/// A saved card as returned to the client
#[derive(Debug, Serialize, Deserialize)]
pub struct CardResponse {
    pub id: CardId,
    pub stripe_pm_id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: i32,
    pub exp_year: i32,
}

impl From<StoredCard> for CardResponse {
    fn from(card: StoredCard) -> Self {
        Self {
            id: card.id,
            stripe_pm_id: card.payment_method_id,
            brand: card.brand,
            last4: card.last4,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuyResponse {
    pub success: bool,
    pub stripe_payment_intent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub username: Option<String>,
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// =============================================================================
// Accounts
// =============================================================================

#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validate_signup(&request.username, &request.email, &request.password)?;

    let user = state
        .store
        .create_user(&NewUser {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash: hash_password(&request.password)?,
        })
        .await?;

    info!("Created user {} ({})", user.id, user.username);
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError(ShopError::Unauthorized("Invalid credentials".to_string()));

    let credentials = state
        .store
        .credentials_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&request.password, &credentials.password_hash) {
        return Err(invalid());
    }

    let token = state.tokens.issue(credentials.id, &credentials.username)?;
    Ok(Json(LoginResponse { token }))
}

// =============================================================================
// Cards
// =============================================================================

pub async fn add_card(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ApiJson(request): ApiJson<AddCardRequest>,
) -> ApiResult<(StatusCode, Json<CardResponse>)> {
    let card = state.cards.attach_card(&auth, &request.payment_method_id).await?;
    Ok((StatusCode::CREATED, Json(card.into())))
}

pub async fn list_cards(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> ApiResult<Json<Vec<CardResponse>>> {
    let cards = state.cards.list_cards(&auth).await?;
    Ok(Json(cards.into_iter().map(Into::into).collect()))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Auth(auth): Auth,
    Path(card_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.cards.detach_card(&auth, CardId::new(card_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Checkout
// =============================================================================

pub async fn buy(
    State(state): State<AppState>,
    Auth(auth): Auth,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> ApiResult<Json<BuyResponse>> {
    let confirmation = state.checkout.checkout(&auth, &request).await?;

    Ok(Json(BuyResponse {
        success: confirmation.success,
        stripe_payment_intent_id: confirmation.payment_intent_id,
    }))
}

pub async fn purchase_history(
    State(state): State<AppState>,
    Auth(auth): Auth,
) -> ApiResult<Json<Vec<PurchaseHistoryItem>>> {
    let history = state.store.purchase_history(auth.user_id).await?;
    Ok(Json(history))
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.store.list_products().await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    input.validate()?;
    let product = state.store.create_product(&input).await?;

    info!("Created product {} ({})", product.id, product.name);
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(product_id): Path<i64>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    input.validate()?;
    let product = state
        .store
        .update_product(ProductId::new(product_id), &input)
        .await?
        .ok_or_else(|| ShopError::not_found("Product"))?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(product_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_product(ProductId::new(product_id)).await? {
        return Err(ShopError::not_found("Product").into());
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Admin
// =============================================================================

pub async fn sales(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<SalesQuery>,
) -> ApiResult<Json<Vec<SaleRecord>>> {
    let filter = SalesFilter::parse(
        query.from.as_deref(),
        query.to.as_deref(),
        query.username.as_deref(),
    )?;

    Ok(Json(state.store.sales(&filter).await?))
}
