//! # Card Registry
//!
//! Keeps one processor customer per local user and mirrors attached
//! payment methods as local card rows.
//!
//! Side effects always run processor-first, then local. A local write
//! failing after the processor call succeeded is reported as a
//! [`ReconciliationGap`] rather than rolled back at the processor.

use crate::card::{CardId, NewStoredCard, StoredCard};
use crate::error::{ReconciliationGap, ShopError, ShopResult};
use crate::gateway::{SharedPaymentGateway, SharedStore};
use crate::reconcile::{raise, LoggingReconciliation, SharedReconciliationHook};
use crate::user::{AuthContext, UserId};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Attaches and detaches payment cards for authenticated users.
#[derive(Clone)]
pub struct CardRegistry {
    store: SharedStore,
    payments: SharedPaymentGateway,
    reconcile: SharedReconciliationHook,
}

impl CardRegistry {
    pub fn new(store: SharedStore, payments: SharedPaymentGateway) -> Self {
        Self {
            store,
            payments,
            reconcile: Arc::new(LoggingReconciliation),
        }
    }

    /// Builder: replace the default logging reconciliation hook
    pub fn with_reconciliation_hook(mut self, hook: SharedReconciliationHook) -> Self {
        self.reconcile = hook;
        self
    }

    /// Attach a payment method token to the user's processor customer and
    /// store the resulting card.
    ///
    /// Creates the processor customer on the user's first attach.
    #[instrument(skip(self, auth, payment_method_id), fields(user_id = %auth.user_id))]
    pub async fn attach_card(
        &self,
        auth: &AuthContext,
        payment_method_id: &str,
    ) -> ShopResult<StoredCard> {
        let token = payment_method_id.trim();
        if token.is_empty() {
            return Err(ShopError::invalid("payment_method_id is required"));
        }

        let user_id = auth.user_id;
        let profile = self
            .store
            .customer_profile(user_id)
            .await?
            .ok_or_else(|| ShopError::not_found("User"))?;

        let customer_id = match profile.customer_id() {
            Some(existing) => existing.to_string(),
            None => self.establish_customer(user_id, &profile.email).await?,
        };

        let card = self
            .payments
            .attach_payment_method(token, &customer_id)
            .await
            .map_err(|e| {
                warn!("Failed to attach payment method {}: {}", token, e);
                e
            })?;

        let new_card = NewStoredCard::from_processor(user_id, card);

        match self.store.insert_card(&new_card).await {
            Ok(stored) => {
                info!(
                    "Stored card {} ({} ending {}) for user {}",
                    stored.id, stored.brand, stored.last4, user_id
                );
                Ok(stored)
            }
            // Already mirrored locally; the processor attach was a no-op for us.
            Err(e @ ShopError::Conflict(_)) => Err(e),
            Err(e) => {
                error!(
                    "Failed to insert card row: {} (user_id={}, pm={}, brand={}, last4={}, exp={}/{})",
                    e,
                    user_id,
                    new_card.payment_method_id,
                    new_card.brand,
                    new_card.last4,
                    new_card.exp_month,
                    new_card.exp_year
                );
                Err(raise(
                    self.reconcile.as_ref(),
                    ReconciliationGap::OrphanedAttachment {
                        user_id,
                        payment_method_id: new_card.payment_method_id,
                    },
                ))
            }
        }
    }

    /// Detach a card at the processor, then delete the local row.
    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    pub async fn detach_card(&self, auth: &AuthContext, card_id: CardId) -> ShopResult<()> {
        let user_id = auth.user_id;
        let card = self
            .store
            .find_card(user_id, card_id)
            .await?
            .ok_or_else(|| ShopError::not_found("Credit card"))?;

        self.payments
            .detach_payment_method(&card.payment_method_id)
            .await
            .map_err(|e| {
                warn!("Failed to detach payment method {}: {}", card.payment_method_id, e);
                e
            })?;

        match self.store.delete_card(user_id, card_id).await {
            Ok(0) => Err(ShopError::not_found("Credit card")),
            Ok(_) => {
                info!("Detached card {} for user {}", card_id, user_id);
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to delete card row {} after detaching {}: {}",
                    card_id, card.payment_method_id, e
                );
                Err(raise(
                    self.reconcile.as_ref(),
                    ReconciliationGap::OrphanedDetach {
                        user_id,
                        card_id,
                        payment_method_id: card.payment_method_id,
                    },
                ))
            }
        }
    }

    /// Cards currently on file for the user.
    pub async fn list_cards(&self, auth: &AuthContext) -> ShopResult<Vec<StoredCard>> {
        self.store.list_cards(auth.user_id).await
    }

    /// Create the processor customer and save its id on the user row.
    ///
    /// If a concurrent request saved a customer first, that one wins and
    /// the customer created here is reported as orphaned.
    async fn establish_customer(&self, user_id: UserId, email: &str) -> ShopResult<String> {
        let customer_id = self.payments.create_customer(email).await.map_err(|e| {
            error!("Failed to create {} customer: {}", self.payments.provider_name(), e);
            e
        })?;
        debug!("Created customer {} for user {}", customer_id, user_id);

        match self.store.set_customer_id(user_id, &customer_id).await {
            Ok(true) => Ok(customer_id),
            Ok(false) => {
                self.reconcile.report(&ReconciliationGap::OrphanedCustomer {
                    user_id,
                    customer_id,
                });
                let profile = self
                    .store
                    .customer_profile(user_id)
                    .await?
                    .ok_or_else(|| ShopError::not_found("User"))?;
                profile
                    .customer_id()
                    .map(String::from)
                    .ok_or_else(|| ShopError::Internal("customer id vanished".to_string()))
            }
            Err(e) => {
                error!("Failed to save customer {} on user {}: {}", customer_id, user_id, e);
                Err(raise(
                    self.reconcile.as_ref(),
                    ReconciliationGap::OrphanedCustomer {
                        user_id,
                        customer_id,
                    },
                ))
            }
        }
    }
}
