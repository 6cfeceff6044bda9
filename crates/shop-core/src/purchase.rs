//! # Purchase Types
//!
//! Checkout requests, server-side pricing, and recorded purchase rows.

use crate::error::{ShopError, ShopResult};
use crate::product::{Currency, ProductId};
use crate::user::UserId;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One requested (product, quantity) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl OrderItem {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A checkout request as received from the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub payment_method_id: String,
}

impl CheckoutRequest {
    pub fn new(items: Vec<OrderItem>, payment_method_id: impl Into<String>) -> Self {
        Self {
            items,
            payment_method_id: payment_method_id.into(),
        }
    }

    /// Shape checks that need no store or processor access.
    pub fn validate(&self) -> ShopResult<()> {
        if self.items.is_empty() || self.payment_method_id.trim().is_empty() {
            return Err(ShopError::invalid(
                "items and payment_method_id are required",
            ));
        }
        if self.items.iter().any(|item| item.quantity <= 0) {
            return Err(ShopError::invalid("Quantity must be > 0"));
        }
        Ok(())
    }
}

/// A line priced from the current catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl PricedLine {
    /// Price one item; the subtotal uses checked 64-bit multiplication.
    pub fn price(item: OrderItem, unit_price_cents: i64) -> ShopResult<Self> {
        let subtotal_cents = unit_price_cents
            .checked_mul(i64::from(item.quantity))
            .ok_or_else(|| {
                ShopError::invalid(format!(
                    "Line total overflows for product {}",
                    item.product_id
                ))
            })?;

        Ok(Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price_cents,
            subtotal_cents,
        })
    }
}

/// All lines of one checkout with their running total
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PricedOrder {
    lines: Vec<PricedLine>,
    total_cents: i64,
}

impl PricedOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line, keeping the total in sync.
    pub fn push(&mut self, line: PricedLine) -> ShopResult<()> {
        self.total_cents = self
            .total_cents
            .checked_add(line.subtotal_cents)
            .ok_or_else(|| ShopError::invalid("Order total overflows"))?;
        self.lines.push(line);
        Ok(())
    }

    pub fn lines(&self) -> &[PricedLine] {
        &self.lines
    }

    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }

    /// Purchase rows for this order, all tagged with one payment intent.
    pub fn to_purchases(&self, user_id: UserId, payment_intent_id: &str) -> Vec<NewPurchase> {
        self.lines
            .iter()
            .map(|line| NewPurchase {
                user_id,
                product_id: line.product_id,
                quantity: line.quantity,
                total_price_cents: line.subtotal_cents,
                payment_intent_id: payment_intent_id.to_string(),
            })
            .collect()
    }
}

/// Insert payload for a purchase row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub total_price_cents: i64,
    pub payment_intent_id: String,
}

/// A recorded purchase row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub total_price_cents: i64,
    pub payment_intent_id: String,
    pub purchased_at: DateTime<Utc>,
}

/// Result of a successful checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentConfirmation {
    pub success: bool,
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: Currency,
    pub purchases: Vec<Purchase>,
}

/// One row of a user's purchase history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseHistoryItem {
    pub purchase_id: i64,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub total_price_cents: i64,
    pub purchased_at: DateTime<Utc>,
}

/// One row of the admin sales report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub purchase_id: i64,
    pub product_id: ProductId,
    pub product_name: String,
    pub user_id: UserId,
    pub username: String,
    pub quantity: i32,
    pub total_price_cents: i64,
    pub purchased_at: DateTime<Utc>,
}

/// Filters for the sales report; both dates are whole days (UTC)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub username: Option<String>,
}

impl SalesFilter {
    /// Parse query-string values. Empty strings count as absent.
    pub fn parse(from: Option<&str>, to: Option<&str>, username: Option<&str>) -> ShopResult<Self> {
        let from = parse_day(from, "from")?;
        let to = parse_day(to, "to")?;
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from);

        Ok(Self { from, to, username })
    }

    /// Inclusive lower bound: midnight at the start of `from`.
    pub fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Exclusive upper bound: midnight after `to`, so the whole day is included.
    pub fn upper_bound(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.checked_add_signed(Duration::days(1)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Whether a sale falls inside this filter.
    pub fn matches(&self, purchased_at: DateTime<Utc>, username: &str) -> bool {
        self.lower_bound().map_or(true, |lo| purchased_at >= lo)
            && self.upper_bound().map_or(true, |hi| purchased_at < hi)
            && self.username.as_deref().map_or(true, |u| u == username)
    }
}

fn parse_day(value: Option<&str>, name: &str) -> ShopResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d").map(Some).map_err(|_| {
            ShopError::invalid(format!("Invalid '{}' date: use YYYY-MM-DD", name))
        }),
    }
}
