//! # shop-core
//!
//! Core types and services for the storefront payment backend.
//!
//! This crate provides:
//! - `PaymentGateway` and `StoreGateway` traits for the processor and database
//! - `CardRegistry` for attaching and detaching saved cards
//! - `CheckoutOrchestrator` for server-priced, single-intent checkouts
//! - `ReconciliationHook` for partial failures that leave the two sides out of sync
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{AuthContext, CardRegistry, CheckoutOrchestrator, CheckoutRequest, OrderItem};
//!
//! let cards = CardRegistry::new(store.clone(), payments.clone());
//! let checkout = CheckoutOrchestrator::new(store, payments).with_currency(Currency::CAD);
//!
//! // Save a card tokenized by the browser
//! let card = cards.attach_card(&auth, "pm_card_visa").await?;
//!
//! // Charge it for two items priced from the catalog
//! let request = CheckoutRequest::new(vec![OrderItem::new(a, 2), OrderItem::new(b, 1)], card.payment_method_id);
//! let confirmation = checkout.checkout(&auth, &request).await?;
//! ```

pub mod card;
pub mod cards;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod product;
pub mod purchase;
pub mod reconcile;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports for convenience
pub use card::{CardId, NewStoredCard, PaymentMethodCard, StoredCard};
pub use cards::CardRegistry;
pub use checkout::CheckoutOrchestrator;
pub use error::{ErrorKind, ReconciliationGap, ShopError, ShopResult};
pub use gateway::{
    PaymentGateway, PaymentIntent, PaymentIntentRequest, PaymentIntentStatus, SharedPaymentGateway,
    SharedStore, StoreGateway,
};
pub use product::{Currency, Product, ProductId, ProductInput};
pub use purchase::{
    CheckoutRequest, NewPurchase, OrderItem, PaymentConfirmation, PricedLine, PricedOrder,
    Purchase, PurchaseHistoryItem, SaleRecord, SalesFilter,
};
pub use reconcile::{LoggingReconciliation, ReconciliationHook, SharedReconciliationHook};
pub use user::{
    validate_signup, AuthContext, CustomerProfile, NewUser, User, UserCredentials, UserId,
};
