//! # shop-api
//!
//! HTTP API layer for storefront-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Bearer-token authentication and an admin guard
//! - REST endpoints for saved cards, checkout, catalog and reports
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/signup` | Create account |
//! | POST | `/login` | Get bearer token |
//! | GET/POST | `/users/creditcards` | List / attach saved cards |
//! | DELETE | `/users/creditcards/{card_id}` | Detach saved card |
//! | POST | `/users/buy` | Checkout |
//! | GET | `/users/history` | Purchase history |
//! | GET/POST | `/products` | Catalog (POST is admin-only) |
//! | PUT/DELETE | `/products/{product_id}` | Admin catalog edits |
//! | GET | `/admin/sales` | Sales report |

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::TokenIssuer;
pub use error::{ApiError, ApiJson, ErrorResponse};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
