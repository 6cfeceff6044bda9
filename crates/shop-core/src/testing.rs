//! # Test Doubles
//!
//! An in-memory [`StoreGateway`] and a scripted [`PaymentGateway`] that
//! record every call. Enabled for this crate's tests and, through the
//! `testing` feature, for tests in dependent crates.

use crate::card::{CardId, NewStoredCard, PaymentMethodCard, StoredCard};
use crate::error::{ReconciliationGap, ShopError, ShopResult};
use crate::gateway::{
    PaymentGateway, PaymentIntent, PaymentIntentRequest, PaymentIntentStatus, StoreGateway,
};
use crate::product::{Product, ProductId, ProductInput};
use crate::purchase::{NewPurchase, Purchase, PurchaseHistoryItem, SaleRecord, SalesFilter};
use crate::reconcile::ReconciliationHook;
use crate::user::{CustomerProfile, NewUser, User, UserCredentials, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// In-memory store
// =============================================================================

/// Store operations that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
    SetCustomerId,
    InsertCard,
    DeleteCard,
    RecordPurchases,
}

#[derive(Debug, Clone)]
struct UserRow {
    username: String,
    email: String,
    password_hash: String,
    customer_id: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    users: BTreeMap<UserId, UserRow>,
    admins: HashSet<UserId>,
    cards: BTreeMap<CardId, StoredCard>,
    products: BTreeMap<ProductId, Product>,
    purchases: Vec<Purchase>,
    next_id: i64,
    faults: HashSet<StoreFault>,
    price_lookups: usize,
    clock: Option<DateTime<Utc>>,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, fault: StoreFault) -> ShopResult<()> {
        if self.faults.contains(&fault) {
            return Err(ShopError::Database(format!("injected failure: {:?}", fault)));
        }
        Ok(())
    }
}

/// Thread-safe in-memory store with fault injection
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user with a placeholder password hash.
    pub fn seed_user(&self, username: &str, email: &str) -> UserId {
        let mut state = lock(&self.state);
        let id = UserId::new(state.next_id());
        state.users.insert(
            id,
            UserRow {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: String::new(),
                customer_id: None,
            },
        );
        id
    }

    pub fn seed_customer_id(&self, user_id: UserId, customer_id: &str) {
        if let Some(row) = lock(&self.state).users.get_mut(&user_id) {
            row.customer_id = Some(customer_id.to_string());
        }
    }

    pub fn seed_product(&self, name: &str, price_cents: i64) -> ProductId {
        let mut state = lock(&self.state);
        let id = ProductId::new(state.next_id());
        state
            .products
            .insert(id, ProductInput::new(name, price_cents).into_product(id));
        id
    }

    pub fn grant_admin(&self, user_id: UserId) {
        lock(&self.state).admins.insert(user_id);
    }

    /// Make every subsequent call of this kind fail with a database error.
    pub fn arm(&self, fault: StoreFault) {
        lock(&self.state).faults.insert(fault);
    }

    pub fn disarm(&self, fault: StoreFault) {
        lock(&self.state).faults.remove(&fault);
    }

    /// Fix the timestamp given to newly recorded purchases.
    pub fn set_clock(&self, now: DateTime<Utc>) {
        lock(&self.state).clock = Some(now);
    }

    /// Every recorded purchase row, in insertion order.
    pub fn purchases(&self) -> Vec<Purchase> {
        lock(&self.state).purchases.clone()
    }

    /// Number of product price lookups served.
    pub fn price_lookups(&self) -> usize {
        lock(&self.state).price_lookups
    }
}

#[async_trait]
impl StoreGateway for InMemoryStore {
    async fn create_user(&self, user: &NewUser) -> ShopResult<User> {
        let mut state = lock(&self.state);
        let taken = state
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username);
        if taken {
            return Err(ShopError::Conflict("Email or username already taken".to_string()));
        }

        let id = UserId::new(state.next_id());
        state.users.insert(
            id,
            UserRow {
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                customer_id: None,
            },
        );

        Ok(User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
        })
    }

    async fn credentials_by_email(&self, email: &str) -> ShopResult<Option<UserCredentials>> {
        let state = lock(&self.state);
        Ok(state
            .users
            .iter()
            .find(|(_, u)| u.email == email)
            .map(|(id, u)| UserCredentials {
                id: *id,
                username: u.username.clone(),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn customer_profile(&self, user_id: UserId) -> ShopResult<Option<CustomerProfile>> {
        let state = lock(&self.state);
        Ok(state.users.get(&user_id).map(|u| CustomerProfile {
            email: u.email.clone(),
            customer_id: u.customer_id.clone(),
        }))
    }

    async fn set_customer_id(&self, user_id: UserId, customer_id: &str) -> ShopResult<bool> {
        let mut state = lock(&self.state);
        state.check(StoreFault::SetCustomerId)?;
        match state.users.get_mut(&user_id) {
            Some(row) if row.customer_id.as_deref().map_or(true, str::is_empty) => {
                row.customer_id = Some(customer_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn is_admin(&self, user_id: UserId) -> ShopResult<bool> {
        Ok(lock(&self.state).admins.contains(&user_id))
    }

    async fn insert_card(&self, card: &NewStoredCard) -> ShopResult<StoredCard> {
        let mut state = lock(&self.state);
        state.check(StoreFault::InsertCard)?;
        if state
            .cards
            .values()
            .any(|c| c.payment_method_id == card.payment_method_id)
        {
            return Err(ShopError::Conflict("Credit card already on file".to_string()));
        }

        let stored = card.clone().into_stored(CardId::new(state.next_id()));
        state.cards.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_card(&self, user_id: UserId, card_id: CardId) -> ShopResult<Option<StoredCard>> {
        let state = lock(&self.state);
        Ok(state
            .cards
            .get(&card_id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn delete_card(&self, user_id: UserId, card_id: CardId) -> ShopResult<u64> {
        let mut state = lock(&self.state);
        state.check(StoreFault::DeleteCard)?;
        let owned = state
            .cards
            .get(&card_id)
            .map_or(false, |c| c.user_id == user_id);
        if owned {
            state.cards.remove(&card_id);
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn list_cards(&self, user_id: UserId) -> ShopResult<Vec<StoredCard>> {
        let state = lock(&self.state);
        Ok(state
            .cards
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn product_price(&self, product_id: ProductId) -> ShopResult<Option<i64>> {
        let mut state = lock(&self.state);
        state.price_lookups += 1;
        Ok(state.products.get(&product_id).map(|p| p.price_cents))
    }

    async fn list_products(&self) -> ShopResult<Vec<Product>> {
        Ok(lock(&self.state).products.values().cloned().collect())
    }

    async fn create_product(&self, input: &ProductInput) -> ShopResult<Product> {
        let mut state = lock(&self.state);
        let id = ProductId::new(state.next_id());
        let product = input.clone().into_product(id);
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        input: &ProductInput,
    ) -> ShopResult<Option<Product>> {
        let mut state = lock(&self.state);
        Ok(state.products.get_mut(&product_id).map(|p| {
            *p = input.clone().into_product(product_id);
            p.clone()
        }))
    }

    async fn delete_product(&self, product_id: ProductId) -> ShopResult<bool> {
        Ok(lock(&self.state).products.remove(&product_id).is_some())
    }

    async fn record_purchases(&self, purchases: &[NewPurchase]) -> ShopResult<Vec<Purchase>> {
        let mut state = lock(&self.state);
        state.check(StoreFault::RecordPurchases)?;

        // Validate every row before writing any, mirroring a rolled-back transaction.
        for row in purchases {
            if !state.products.contains_key(&row.product_id) {
                return Err(ShopError::Database(format!(
                    "foreign key violation: product {}",
                    row.product_id
                )));
            }
        }

        let now = state.clock.unwrap_or_else(Utc::now);
        let mut recorded = Vec::with_capacity(purchases.len());
        for row in purchases {
            recorded.push(Purchase {
                id: state.next_id(),
                user_id: row.user_id,
                product_id: row.product_id,
                quantity: row.quantity,
                total_price_cents: row.total_price_cents,
                payment_intent_id: row.payment_intent_id.clone(),
                purchased_at: now,
            });
        }
        state.purchases.extend(recorded.iter().cloned());
        Ok(recorded)
    }

    async fn purchase_history(&self, user_id: UserId) -> ShopResult<Vec<PurchaseHistoryItem>> {
        let state = lock(&self.state);
        let mut history: Vec<PurchaseHistoryItem> = state
            .purchases
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| {
                state.products.get(&p.product_id).map(|product| PurchaseHistoryItem {
                    purchase_id: p.id,
                    product_id: p.product_id,
                    product_name: product.name.clone(),
                    quantity: p.quantity,
                    total_price_cents: p.total_price_cents,
                    purchased_at: p.purchased_at,
                })
            })
            .collect();
        history.sort_by(|a, b| {
            b.purchased_at
                .cmp(&a.purchased_at)
                .then(b.purchase_id.cmp(&a.purchase_id))
        });
        Ok(history)
    }

    async fn sales(&self, filter: &SalesFilter) -> ShopResult<Vec<SaleRecord>> {
        let state = lock(&self.state);
        let mut sales: Vec<SaleRecord> = state
            .purchases
            .iter()
            .filter_map(|p| {
                let product = state.products.get(&p.product_id)?;
                let user = state.users.get(&p.user_id)?;
                filter
                    .matches(p.purchased_at, &user.username)
                    .then(|| SaleRecord {
                        purchase_id: p.id,
                        product_id: p.product_id,
                        product_name: product.name.clone(),
                        user_id: p.user_id,
                        username: user.username.clone(),
                        quantity: p.quantity,
                        total_price_cents: p.total_price_cents,
                        purchased_at: p.purchased_at,
                    })
            })
            .collect();
        sales.sort_by(|a, b| {
            b.purchased_at
                .cmp(&a.purchased_at)
                .then(b.purchase_id.cmp(&a.purchase_id))
        });
        Ok(sales)
    }
}

// =============================================================================
// Scripted processor
// =============================================================================

/// A processor call as observed by [`ScriptedProcessor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorCall {
    CreateCustomer { email: String },
    Attach { payment_method_id: String, customer_id: String },
    Detach { payment_method_id: String },
    PaymentIntent(PaymentIntentRequest),
}

#[derive(Debug)]
struct ProcessorState {
    calls: Vec<ProcessorCall>,
    customers: usize,
    intents: usize,
    attached: HashMap<String, String>,
    card_details: HashMap<String, PaymentMethodCard>,
    rejected: HashMap<String, String>,
    decline: Option<String>,
    intent_status: PaymentIntentStatus,
    charged_amount: Option<i64>,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            customers: 0,
            intents: 0,
            attached: HashMap::new(),
            card_details: HashMap::new(),
            rejected: HashMap::new(),
            decline: None,
            intent_status: PaymentIntentStatus::Succeeded,
            charged_amount: None,
        }
    }
}

/// Processor double that behaves like a permissive test-mode account
#[derive(Debug, Default)]
pub struct ScriptedProcessor {
    state: Mutex<ProcessorState>,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Card metadata reported when `payment_method_id` is attached.
    pub fn set_card_details(
        &self,
        payment_method_id: &str,
        brand: &str,
        last4: &str,
        exp_month: i32,
        exp_year: i32,
    ) {
        lock(&self.state).card_details.insert(
            payment_method_id.to_string(),
            PaymentMethodCard {
                id: payment_method_id.to_string(),
                brand: brand.to_string(),
                last4: last4.to_string(),
                exp_month,
                exp_year,
            },
        );
    }

    /// Reject attaching `payment_method_id` with the given message.
    pub fn reject_payment_method(&self, payment_method_id: &str, message: &str) {
        lock(&self.state)
            .rejected
            .insert(payment_method_id.to_string(), message.to_string());
    }

    /// Decline every subsequent charge.
    pub fn decline_charges(&self, message: &str) {
        lock(&self.state).decline = Some(message.to_string());
    }

    /// Status returned for subsequently created intents.
    pub fn set_intent_status(&self, status: PaymentIntentStatus) {
        lock(&self.state).intent_status = status;
    }

    /// Report `amount_cents` on created intents instead of the requested amount.
    pub fn set_charged_amount(&self, amount_cents: i64) {
        lock(&self.state).charged_amount = Some(amount_cents);
    }

    /// Drop a payment method as if detached out-of-band.
    pub fn forget(&self, payment_method_id: &str) {
        lock(&self.state).attached.remove(payment_method_id);
    }

    /// Customer the payment method is attached to, if any.
    pub fn attached_to(&self, payment_method_id: &str) -> Option<String> {
        lock(&self.state).attached.get(payment_method_id).cloned()
    }

    pub fn calls(&self) -> Vec<ProcessorCall> {
        lock(&self.state).calls.clone()
    }

    pub fn customer_creations(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| matches!(c, ProcessorCall::CreateCustomer { .. }))
            .count()
    }

    pub fn intent_requests(&self) -> Vec<PaymentIntentRequest> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                ProcessorCall::PaymentIntent(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn rejected(message: impl Into<String>) -> ShopError {
        ShopError::ProviderRejected {
            provider: "scripted".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedProcessor {
    async fn create_customer(&self, email: &str) -> ShopResult<String> {
        let mut state = lock(&self.state);
        state.calls.push(ProcessorCall::CreateCustomer {
            email: email.to_string(),
        });
        state.customers += 1;
        Ok(format!("cus_scripted_{}", state.customers))
    }

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> ShopResult<PaymentMethodCard> {
        let mut state = lock(&self.state);
        state.calls.push(ProcessorCall::Attach {
            payment_method_id: payment_method_id.to_string(),
            customer_id: customer_id.to_string(),
        });

        if let Some(message) = state.rejected.get(payment_method_id) {
            return Err(Self::rejected(message.clone()));
        }
        if let Some(owner) = state.attached.get(payment_method_id) {
            if owner != customer_id {
                return Err(Self::rejected(format!(
                    "The payment method {} is already attached to another customer",
                    payment_method_id
                )));
            }
        }

        state
            .attached
            .insert(payment_method_id.to_string(), customer_id.to_string());

        Ok(state
            .card_details
            .get(payment_method_id)
            .cloned()
            .unwrap_or_else(|| PaymentMethodCard {
                id: payment_method_id.to_string(),
                brand: "visa".to_string(),
                last4: "4242".to_string(),
                exp_month: 12,
                exp_year: 2030,
            }))
    }

    async fn detach_payment_method(&self, payment_method_id: &str) -> ShopResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(ProcessorCall::Detach {
            payment_method_id: payment_method_id.to_string(),
        });
        match state.attached.remove(payment_method_id) {
            Some(_) => Ok(()),
            None => Err(Self::rejected(format!(
                "The payment method {} is not attached to a customer",
                payment_method_id
            ))),
        }
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> ShopResult<PaymentIntent> {
        let mut state = lock(&self.state);
        state.calls.push(ProcessorCall::PaymentIntent(request.clone()));

        if let Some(message) = &state.decline {
            return Err(Self::rejected(message.clone()));
        }

        state.intents += 1;
        Ok(PaymentIntent {
            id: format!("pi_scripted_{}", state.intents),
            status: state.intent_status,
            amount_cents: state.charged_amount.unwrap_or(request.amount_cents),
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

// =============================================================================
// Recording reconciliation hook
// =============================================================================

/// Collects reported gaps for assertions
#[derive(Debug, Default)]
pub struct RecordingHook {
    gaps: Mutex<Vec<ReconciliationGap>>,
}

impl RecordingHook {
    pub fn gaps(&self) -> Vec<ReconciliationGap> {
        lock(&self.gaps).clone()
    }
}

impl ReconciliationHook for RecordingHook {
    fn report(&self, gap: &ReconciliationGap) {
        lock(&self.gaps).push(gap.clone());
    }
}
