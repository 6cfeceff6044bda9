//! # Card Types
//!
//! Stored credit cards mirror payment methods attached at the processor.

use crate::user::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local stored-card identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(i64);

impl CardId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Card metadata as reported by the processor after an attach
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentMethodCard {
    /// Processor payment method id (pm_...)
    pub id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: i32,
    pub exp_year: i32,
}

/// A card row owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCard {
    pub id: CardId,
    pub user_id: UserId,
    pub payment_method_id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: i32,
    pub exp_year: i32,
}

/// Insert payload for a card row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStoredCard {
    pub user_id: UserId,
    pub payment_method_id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: i32,
    pub exp_year: i32,
}

impl NewStoredCard {
    /// Build the row from processor-reported metadata only.
    pub fn from_processor(user_id: UserId, card: PaymentMethodCard) -> Self {
        Self {
            user_id,
            payment_method_id: card.id,
            brand: card.brand,
            last4: card.last4,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
        }
    }

    pub fn into_stored(self, id: CardId) -> StoredCard {
        StoredCard {
            id,
            user_id: self.user_id,
            payment_method_id: self.payment_method_id,
            brand: self.brand,
            last4: self.last4,
            exp_month: self.exp_month,
            exp_year: self.exp_year,
        }
    }
}
