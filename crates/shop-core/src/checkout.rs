//! # Checkout Orchestrator
//!
//! Prices a multi-item order from the current catalog, charges it with a
//! single confirmed payment intent, then records one purchase row per line
//! in a single transaction.
//!
//! Ordering is fixed: validate, resolve customer, price, charge, record.
//! A purchase row therefore never exists without a confirmed charge. The
//! inverse (charge captured, rows rolled back) is reported as an
//! [`ReconciliationGap::UnrecordedCharge`] and never refunded inline.
//! Intents left `processing` or `requires_capture` write no rows and are
//! reported as [`ReconciliationGap::PendingCharge`].

use crate::error::{ReconciliationGap, ShopError, ShopResult};
use crate::gateway::{PaymentIntentRequest, SharedPaymentGateway, SharedStore};
use crate::product::Currency;
use crate::purchase::{CheckoutRequest, OrderItem, PaymentConfirmation, PricedLine, PricedOrder};
use crate::reconcile::{raise, LoggingReconciliation, SharedReconciliationHook};
use crate::user::AuthContext;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Runs checkouts against a store and a payment processor.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    store: SharedStore,
    payments: SharedPaymentGateway,
    currency: Currency,
    reconcile: SharedReconciliationHook,
}

impl CheckoutOrchestrator {
    pub fn new(store: SharedStore, payments: SharedPaymentGateway) -> Self {
        Self {
            store,
            payments,
            currency: Currency::default(),
            reconcile: Arc::new(LoggingReconciliation),
        }
    }

    /// Builder: set the charge currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Builder: replace the default logging reconciliation hook
    pub fn with_reconciliation_hook(mut self, hook: SharedReconciliationHook) -> Self {
        self.reconcile = hook;
        self
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Charge the user's card for every item and record the purchase.
    #[instrument(
        skip(self, auth, request),
        fields(user_id = %auth.user_id, items = request.items.len())
    )]
    pub async fn checkout(
        &self,
        auth: &AuthContext,
        request: &CheckoutRequest,
    ) -> ShopResult<PaymentConfirmation> {
        request.validate()?;

        let user_id = auth.user_id;
        let profile = self
            .store
            .customer_profile(user_id)
            .await?
            .ok_or_else(|| ShopError::not_found("User"))?;

        let customer_id = profile
            .customer_id()
            .ok_or_else(|| {
                ShopError::invalid("No Stripe customer on file. Add a credit card first.")
            })?
            .to_string();

        let order = self.price(&request.items).await?;

        let intent_request = PaymentIntentRequest::card(
            order.total_cents(),
            self.currency,
            customer_id,
            request.payment_method_id.trim(),
        );

        info!(
            "Charging {} {} for {} line(s)",
            order.total_cents(),
            self.currency,
            order.lines().len()
        );

        let intent = self
            .payments
            .create_payment_intent(&intent_request)
            .await
            .map_err(|e| {
                warn!("Charge of {} cents failed: {}", order.total_cents(), e);
                e
            })?;

        if !intent.status.is_confirmed() {
            warn!(
                "Payment intent {} not confirmed: status={}",
                intent.id,
                intent.status.as_str()
            );
            if intent.status.may_move_funds() {
                return Err(raise(
                    self.reconcile.as_ref(),
                    ReconciliationGap::PendingCharge {
                        user_id,
                        payment_intent_id: intent.id,
                        amount_cents: order.total_cents(),
                        status: intent.status.as_str().to_string(),
                    },
                ));
            }
            return Err(ShopError::PaymentNotConfirmed {
                payment_intent_id: intent.id,
                status: intent.status.as_str().to_string(),
            });
        }

        if intent.amount_cents != order.total_cents() {
            error!(
                "Intent {} charged {} cents, order totals {} cents",
                intent.id,
                intent.amount_cents,
                order.total_cents()
            );
            self.reconcile.report(&ReconciliationGap::AmountMismatch {
                user_id,
                payment_intent_id: intent.id.clone(),
                expected_cents: order.total_cents(),
                charged_cents: intent.amount_cents,
            });
        }

        let rows = order.to_purchases(user_id, &intent.id);
        let purchases = match self.store.record_purchases(&rows).await {
            Ok(purchases) => purchases,
            Err(e) => {
                error!(
                    "Failed to record {} purchase row(s) for intent {} ({} cents): {}",
                    rows.len(),
                    intent.id,
                    order.total_cents(),
                    e
                );
                return Err(raise(
                    self.reconcile.as_ref(),
                    ReconciliationGap::UnrecordedCharge {
                        user_id,
                        payment_intent_id: intent.id,
                        amount_cents: order.total_cents(),
                    },
                ));
            }
        };

        info!(
            "Checkout complete: intent={}, rows={}, total={}",
            intent.id,
            purchases.len(),
            order.total_cents()
        );

        Ok(PaymentConfirmation {
            success: true,
            payment_intent_id: intent.id,
            amount_cents: intent.amount_cents,
            currency: self.currency,
            purchases,
        })
    }

    /// Look up every unit price and accumulate the order total.
    async fn price(&self, items: &[OrderItem]) -> ShopResult<PricedOrder> {
        let mut order = PricedOrder::new();

        for item in items {
            let unit_price = self
                .store
                .product_price(item.product_id)
                .await?
                .ok_or_else(|| {
                    ShopError::invalid(format!("Product not found: {}", item.product_id))
                })?;

            let line = PricedLine::price(*item, unit_price)?;
            debug!(
                "Priced product {} x{} = {}",
                line.product_id, line.quantity, line.subtotal_cents
            );
            order.push(line)?;
        }

        Ok(order)
    }
}
