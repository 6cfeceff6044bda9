//! # Storefront Error Types
//!
//! Typed error handling for the storefront core.
//! All gateway and component operations return `Result<T, ShopError>`.

use crate::card::CardId;
use crate::user::UserId;
use std::fmt;
use thiserror::Error;

/// Coarse error taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request, unknown product, or a processor-rejected card/charge
    InvalidInput,
    /// Missing or invalid identity
    Unauthorized,
    /// Missing user, card, or product
    NotFound,
    /// Store or processor communication failure
    Internal,
}

/// Processor-side state left behind when the matching local write failed.
///
/// None of these are repaired automatically; they are handed to a
/// [`ReconciliationHook`](crate::reconcile::ReconciliationHook) for
/// out-of-band repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationGap {
    /// Customer created at the processor but not saved on the user row
    OrphanedCustomer { user_id: UserId, customer_id: String },

    /// Payment method attached at the processor but no card row written
    OrphanedAttachment {
        user_id: UserId,
        payment_method_id: String,
    },

    /// Payment method detached at the processor but the card row survived
    OrphanedDetach {
        user_id: UserId,
        card_id: CardId,
        payment_method_id: String,
    },

    /// Charge captured but the purchase rows were rolled back
    UnrecordedCharge {
        user_id: UserId,
        payment_intent_id: String,
        amount_cents: i64,
    },

    /// Intent left processing or authorized; funds may still move with no rows
    PendingCharge {
        user_id: UserId,
        payment_intent_id: String,
        amount_cents: i64,
        status: String,
    },

    /// Processor charged a different amount than the priced order
    AmountMismatch {
        user_id: UserId,
        payment_intent_id: String,
        expected_cents: i64,
        charged_cents: i64,
    },
}

impl ReconciliationGap {
    /// Short machine-friendly label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationGap::OrphanedCustomer { .. } => "orphaned_customer",
            ReconciliationGap::OrphanedAttachment { .. } => "orphaned_attachment",
            ReconciliationGap::OrphanedDetach { .. } => "orphaned_detach",
            ReconciliationGap::UnrecordedCharge { .. } => "unrecorded_charge",
            ReconciliationGap::PendingCharge { .. } => "pending_charge",
            ReconciliationGap::AmountMismatch { .. } => "amount_mismatch",
        }
    }

    /// The local user the gap belongs to.
    pub fn user_id(&self) -> UserId {
        match self {
            ReconciliationGap::OrphanedCustomer { user_id, .. }
            | ReconciliationGap::OrphanedAttachment { user_id, .. }
            | ReconciliationGap::OrphanedDetach { user_id, .. }
            | ReconciliationGap::UnrecordedCharge { user_id, .. }
            | ReconciliationGap::PendingCharge { user_id, .. }
            | ReconciliationGap::AmountMismatch { user_id, .. } => *user_id,
        }
    }
}

impl fmt::Display for ReconciliationGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationGap::OrphanedCustomer {
                user_id,
                customer_id,
            } => write!(f, "customer {} for user {} not persisted", customer_id, user_id),
            ReconciliationGap::OrphanedAttachment {
                user_id,
                payment_method_id,
            } => write!(
                f,
                "payment method {} attached for user {} but not stored",
                payment_method_id, user_id
            ),
            ReconciliationGap::OrphanedDetach {
                user_id,
                card_id,
                payment_method_id,
            } => write!(
                f,
                "payment method {} detached but card {} of user {} not deleted",
                payment_method_id, card_id, user_id
            ),
            ReconciliationGap::UnrecordedCharge {
                user_id,
                payment_intent_id,
                amount_cents,
            } => write!(
                f,
                "charge {} of {} cents for user {} not recorded",
                payment_intent_id, amount_cents, user_id
            ),
            ReconciliationGap::PendingCharge {
                user_id,
                payment_intent_id,
                amount_cents,
                status,
            } => write!(
                f,
                "charge {} of {} cents for user {} left {} with no purchase rows",
                payment_intent_id, amount_cents, user_id, status
            ),
            ReconciliationGap::AmountMismatch {
                user_id,
                payment_intent_id,
                expected_cents,
                charged_cents,
            } => write!(
                f,
                "charge {} for user {} captured {} cents, order totals {} cents",
                payment_intent_id, user_id, charged_cents, expected_cents
            ),
        }
    }
}

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Entity does not exist (or is not owned by the caller)
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint hit (duplicate email, username, payment method)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Processor refused the request (bad token, declined card, ...)
    #[error("{provider} rejected the request: {message}")]
    ProviderRejected { provider: String, message: String },

    /// Payment intent was created but did not reach `succeeded`
    #[error("Payment not confirmed: intent {payment_intent_id} is {status}")]
    PaymentNotConfirmed {
        payment_intent_id: String,
        status: String,
    },

    /// Processor answered with a server-side failure
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with the processor
    #[error("Network error: {0}")]
    Network(String),

    /// Relational store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Processor and store disagree after a partial failure
    #[error("Reconciliation required ({}): {gap}", .gap.label())]
    Reconciliation { gap: ReconciliationGap },

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ShopError::InvalidInput(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ShopError::NotFound(what.into())
    }

    /// Map this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShopError::InvalidInput(_)
            | ShopError::Conflict(_)
            | ShopError::ProviderRejected { .. }
            | ShopError::PaymentNotConfirmed { .. } => ErrorKind::InvalidInput,
            ShopError::Unauthorized(_) | ShopError::Forbidden(_) => ErrorKind::Unauthorized,
            ShopError::NotFound(_) => ErrorKind::NotFound,
            ShopError::ProviderError { .. }
            | ShopError::Network(_)
            | ShopError::Database(_)
            | ShopError::Configuration(_)
            | ShopError::Serialization(_)
            | ShopError::Reconciliation { .. }
            | ShopError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::InvalidInput(_) => 400,
            ShopError::Unauthorized(_) => 401,
            ShopError::Forbidden(_) => 403,
            ShopError::NotFound(_) => 404,
            ShopError::Conflict(_) => 409,
            ShopError::ProviderRejected { .. } => 400,
            ShopError::PaymentNotConfirmed { .. } => 400,
            ShopError::ProviderError { .. } => 502,
            ShopError::Network(_) => 503,
            ShopError::Database(_) => 500,
            ShopError::Configuration(_) => 500,
            ShopError::Serialization(_) => 500,
            ShopError::Reconciliation { .. } => 500,
            ShopError::Internal(_) => 500,
        }
    }

    /// Message safe to return to an HTTP client.
    ///
    /// Internal failures collapse to a generic text; the detail goes to logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias for storefront operations
pub type ShopResult<T> = Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ShopError::invalid("x").kind(), ErrorKind::InvalidInput);
        assert_eq!(
            ShopError::ProviderRejected {
                provider: "stripe".into(),
                message: "card declined".into()
            }
            .kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(ShopError::Forbidden("admin".into()).kind(), ErrorKind::Unauthorized);
        assert_eq!(ShopError::not_found("Card").kind(), ErrorKind::NotFound);
        assert_eq!(ShopError::Network("timeout".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ShopError::invalid("test").status_code(), 400);
        assert_eq!(ShopError::not_found("Product 7").status_code(), 404);
        assert_eq!(ShopError::Conflict("email".into()).status_code(), 409);
        assert_eq!(
            ShopError::Reconciliation {
                gap: ReconciliationGap::UnrecordedCharge {
                    user_id: UserId::new(1),
                    payment_intent_id: "pi_1".into(),
                    amount_cents: 2200,
                }
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn test_public_message_hides_internal_detail() {
        let err = ShopError::Database("relation \"purchases\" does not exist".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = ShopError::invalid("Product not found: 999");
        assert!(err.public_message().contains("999"));
    }

    #[test]
    fn test_reconciliation_display() {
        let err = ShopError::Reconciliation {
            gap: ReconciliationGap::OrphanedCustomer {
                user_id: UserId::new(4),
                customer_id: "cus_9".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("orphaned_customer"));
        assert!(text.contains("cus_9"));
    }
}
