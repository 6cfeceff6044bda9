//! # Gateway Traits
//!
//! The two external collaborators of the storefront core, expressed as
//! traits so that the card registry and checkout orchestrator never depend
//! on a concrete processor or database driver.
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │    CardRegistry      │        │ CheckoutOrchestrator │
//! └─────────┬────────────┘        └──────────┬───────────┘
//!           │                                │
//!     ┌─────┴──────────────┬─────────────────┤
//!     ▼                    ▼                 ▼
//! ┌────────────────┐   ┌──────────────────────────┐
//! │ PaymentGateway │   │       StoreGateway       │
//! │  (trait)       │   │        (trait)           │
//! └───────┬────────┘   └────────────┬─────────────┘
//!         ▼                         ▼
//!   StripeGateway               PgStore
//!   (shop-stripe)            (shop-postgres)
//! ```

use crate::card::{CardId, NewStoredCard, PaymentMethodCard, StoredCard};
use crate::error::ShopResult;
use crate::product::{Currency, Product, ProductId, ProductInput};
use crate::purchase::{NewPurchase, Purchase, PurchaseHistoryItem, SaleRecord, SalesFilter};
use crate::user::{CustomerProfile, NewUser, User, UserCredentials, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for a create-and-confirm payment intent call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Amount in smallest currency unit
    pub amount_cents: i64,
    pub currency: Currency,
    /// Processor customer id (cus_...)
    pub customer_id: String,
    /// Payment method to charge (pm_...)
    pub payment_method_id: String,
    /// Allowed payment method types
    pub payment_method_types: Vec<String>,
    /// Confirm in the same call
    pub confirm: bool,
}

impl PaymentIntentRequest {
    /// A card-only intent confirmed on creation.
    pub fn card(
        amount_cents: i64,
        currency: Currency,
        customer_id: impl Into<String>,
        payment_method_id: impl Into<String>,
    ) -> Self {
        Self {
            amount_cents,
            currency,
            customer_id: customer_id.into(),
            payment_method_id: payment_method_id.into(),
            payment_method_types: vec!["card".to_string()],
            confirm: true,
        }
    }
}

/// Lifecycle states of a processor payment intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentIntentStatus::RequiresAction => "requires_action",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::RequiresCapture => "requires_capture",
            PaymentIntentStatus::Canceled => "canceled",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Unknown => "unknown",
        }
    }

    /// Funds were captured.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, PaymentIntentStatus::Succeeded)
    }

    /// Not captured yet, but funds are held or may still settle.
    pub fn may_move_funds(&self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::Processing | PaymentIntentStatus::RequiresCapture
        )
    }
}

/// A payment intent as returned by the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub status: PaymentIntentStatus,
    pub amount_cents: i64,
}

/// Processor operations used by the card registry and checkout.
///
/// None of these calls are safe to retry blindly; callers treat every
/// failure as final for the current request.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a processor customer for the given email, returning its id.
    async fn create_customer(&self, email: &str) -> ShopResult<String>;

    /// Attach a client-supplied payment method token to a customer.
    ///
    /// The returned card metadata is the only trusted source of brand,
    /// last4 and expiry.
    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> ShopResult<PaymentMethodCard>;

    /// Detach a payment method from whatever customer holds it.
    async fn detach_payment_method(&self, payment_method_id: &str) -> ShopResult<()>;

    /// Create and confirm a payment intent in one call.
    async fn create_payment_intent(&self, request: &PaymentIntentRequest)
        -> ShopResult<PaymentIntent>;

    /// Get the provider name (for logging and error messages).
    fn provider_name(&self) -> &'static str;
}

/// Relational reads and writes.
///
/// Each method is a single statement except [`StoreGateway::record_purchases`],
/// which must insert all rows in one transaction or none of them.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    // ---- users -------------------------------------------------------------

    /// Create a user. Duplicate username/email yields `ShopError::Conflict`.
    async fn create_user(&self, user: &NewUser) -> ShopResult<User>;

    /// Login material for the user with this email.
    async fn credentials_by_email(&self, email: &str) -> ShopResult<Option<UserCredentials>>;

    /// Email and processor customer id for a user.
    async fn customer_profile(&self, user_id: UserId) -> ShopResult<Option<CustomerProfile>>;

    /// Persist the processor customer id, only if none is on file yet.
    ///
    /// Returns `false` when another customer id was already stored.
    async fn set_customer_id(&self, user_id: UserId, customer_id: &str) -> ShopResult<bool>;

    /// Whether the user is listed as an admin.
    async fn is_admin(&self, user_id: UserId) -> ShopResult<bool>;

    // ---- cards -------------------------------------------------------------

    async fn insert_card(&self, card: &NewStoredCard) -> ShopResult<StoredCard>;

    /// Card by id, only if owned by `user_id`.
    async fn find_card(&self, user_id: UserId, card_id: CardId) -> ShopResult<Option<StoredCard>>;

    /// Delete a card owned by `user_id`; returns rows affected.
    async fn delete_card(&self, user_id: UserId, card_id: CardId) -> ShopResult<u64>;

    async fn list_cards(&self, user_id: UserId) -> ShopResult<Vec<StoredCard>>;

    // ---- catalog -----------------------------------------------------------

    /// Current unit price of a product in cents.
    async fn product_price(&self, product_id: ProductId) -> ShopResult<Option<i64>>;

    /// All products ordered by id.
    async fn list_products(&self) -> ShopResult<Vec<Product>>;

    async fn create_product(&self, input: &ProductInput) -> ShopResult<Product>;

    /// Replace a product's fields; `None` if it does not exist.
    async fn update_product(
        &self,
        product_id: ProductId,
        input: &ProductInput,
    ) -> ShopResult<Option<Product>>;

    /// Delete a product; `false` if it did not exist.
    async fn delete_product(&self, product_id: ProductId) -> ShopResult<bool>;

    // ---- purchases ---------------------------------------------------------

    /// Insert every row in one transaction. Any failure rolls back all rows.
    async fn record_purchases(&self, purchases: &[NewPurchase]) -> ShopResult<Vec<Purchase>>;

    /// The user's purchases with product names, newest first.
    async fn purchase_history(&self, user_id: UserId) -> ShopResult<Vec<PurchaseHistoryItem>>;

    /// Sales across all users, newest first.
    async fn sales(&self, filter: &SalesFilter) -> ShopResult<Vec<SaleRecord>>;
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;

/// Type alias for a shared store gateway (dynamic dispatch)
pub type SharedStore = Arc<dyn StoreGateway>;
