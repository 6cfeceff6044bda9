//! # User Types
//!
//! Local user accounts and the authenticated identity threaded through
//! card and checkout operations.

use crate::error::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity established by the authentication layer.
///
/// Produced once per request and passed explicitly into every operation
/// that acts on behalf of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
}

impl AuthContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// A registered user (public view, no credential)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Signup payload after password hashing
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Stored login material for a user, looked up by email
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}

/// What the card registry needs to know about a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfile {
    pub email: String,
    /// Processor customer id, absent until the first card is attached
    pub customer_id: Option<String>,
}

impl CustomerProfile {
    /// Customer id, treating an empty string the same as a missing one.
    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Validate signup fields; all three are required.
pub fn validate_signup(username: &str, email: &str, password: &str) -> ShopResult<()> {
    if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(ShopError::invalid(
            "username, email, and password are required",
        ));
    }
    Ok(())
}
