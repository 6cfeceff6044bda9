//! # Product Types
//!
//! Catalog types for the storefront. Prices are integer minor units
//! (cents); there is no floating point anywhere in pricing.

use crate::error::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported charge currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Returns the lowercase ISO 4217 code the processor expects
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::MXN => "mxn",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::CAD
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl FromStr for Currency {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            "jpy" => Ok(Currency::JPY),
            "cad" => Ok(Currency::CAD),
            "aud" => Ok(Currency::AUD),
            "chf" => Ok(Currency::CHF),
            "mxn" => Ok(Currency::MXN),
            other => Err(ShopError::Configuration(format!(
                "Unsupported currency: {}",
                other
            ))),
        }
    }
}

/// Catalog product identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A product in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Unit price in cents, always positive
    pub price_cents: i64,
}

/// Fields accepted when creating or replacing a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
}

impl ProductInput {
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price_cents,
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Name is required and the price must be a positive number of cents.
    pub fn validate(&self) -> ShopResult<()> {
        if self.name.trim().is_empty() || self.price_cents <= 0 {
            return Err(ShopError::invalid(
                "name and price_cents are required (price_cents > 0)",
            ));
        }
        Ok(())
    }

    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parsing() {
        assert_eq!("cad".parse::<Currency>().unwrap(), Currency::CAD);
        assert_eq!(" USD ".parse::<Currency>().unwrap(), Currency::USD);
        assert!("doubloons".parse::<Currency>().is_err());
        assert_eq!(Currency::default().as_str(), "cad");
        assert_eq!(Currency::EUR.to_string(), "EUR");
    }

    #[test]
    fn test_product_input_validation() {
        assert!(ProductInput::new("Tea", 450).validate().is_ok());
        assert!(ProductInput::new("", 450).validate().is_err());
        assert!(ProductInput::new("Tea", 0).validate().is_err());
        assert!(ProductInput::new("Tea", -5).validate().is_err());
    }

    #[test]
    fn test_product_builder() {
        let product = ProductInput::new("Kettle", 3999)
            .with_description("Stovetop kettle")
            .into_product(ProductId::new(3));

        assert_eq!(product.id, ProductId::new(3));
        assert_eq!(product.description, "Stovetop kettle");
        assert_eq!(product.price_cents, 3999);
    }

    #[test]
    fn test_product_id_json_is_plain_number() {
        let json = serde_json::to_string(&ProductId::new(999)).unwrap();
        assert_eq!(json, "999");
    }
}
