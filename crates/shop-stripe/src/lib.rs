//! # shop-stripe
//!
//! Stripe implementation of the storefront `PaymentGateway`.
//!
//! Covers the four processor calls the storefront makes:
//!
//! 1. **Customers** - one Stripe customer per local user, created lazily
//! 2. **Attach** - bind a browser-tokenized payment method to that customer
//! 3. **Detach** - release a saved payment method
//! 4. **Payment intents** - create and confirm a card charge in one call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeGateway;
//! use shop_core::{PaymentGateway, PaymentIntentRequest, Currency};
//!
//! let stripe = StripeGateway::from_env()?;
//!
//! let customer = stripe.create_customer("ana@example.com").await?;
//! let card = stripe.attach_payment_method("pm_card_visa", &customer).await?;
//!
//! let request = PaymentIntentRequest::card(2200, Currency::CAD, customer, card.id);
//! let intent = stripe.create_payment_intent(&request).await?;
//! ```

pub mod config;
pub mod gateway;

// Re-exports
pub use config::StripeConfig;
pub use gateway::StripeGateway;
