//! In-memory collaborators for tests and local development.
//!
//! Each fake implements one collaborator trait over a mutex-guarded state
//! and records the calls made against it so tests can assert on them.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: nothing is persisted
//! - Identity session tokens are simply user ids

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use furnimart_core::{
    ContactUpdate, CustomerId, CustomerRecord, EmailAddressId, IdentityUserId, NewOrder, OrderId,
    PaymentOutcome, ProductId, RateId, SellerId, ShipmentLabel, ShippingRate, TrackingStatus,
    TransactionId, VerificationStatus,
};

use crate::catalog::{CatalogError, CatalogProduct, CatalogStore, OrderStatusUpdate, order_document_id};
use crate::identity::{IdentityEmail, IdentityError, IdentityProfile, IdentityProvider, ProfileUpdate};
use crate::payments::{CaptureRequest, PaymentError, PaymentProcessor};
use crate::shipping::{RateRequest, ShippingCarrier, ShippingError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(service: &str) -> String {
    format!("{service} unavailable")
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CatalogState {
    products: Vec<CatalogProduct>,
    sellers: Vec<SellerId>,
    customers: Vec<CustomerRecord>,
    orders: Vec<(OrderId, NewOrder)>,
    statuses: HashMap<OrderId, OrderStatusUpdate>,
    customer_writes: usize,
    fail_products: bool,
    fail_orders: bool,
}

/// In-memory catalog store.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// List a product. Its seller, if any, is registered too.
    #[must_use]
    pub fn with_product(self, product: CatalogProduct) -> Self {
        {
            let mut state = lock(&self.state);
            if let Some(seller) = &product.seller_id
                && !state.sellers.contains(seller)
            {
                state.sellers.push(seller.clone());
            }
            state.products.push(product);
        }
        self
    }

    #[must_use]
    pub fn with_seller(self, seller: impl Into<SellerId>) -> Self {
        lock(&self.state).sellers.push(seller.into());
        self
    }

    #[must_use]
    pub fn with_customer(self, record: CustomerRecord) -> Self {
        lock(&self.state).customers.push(record);
        self
    }

    /// Make product lookups fail until switched back.
    pub fn fail_product_lookups(&self, fail: bool) {
        lock(&self.state).fail_products = fail;
    }

    /// Make order writes fail until switched back.
    pub fn fail_order_writes(&self, fail: bool) {
        lock(&self.state).fail_orders = fail;
    }

    /// Change a product's stock level.
    pub fn set_inventory(&self, id: &ProductId, inventory: Option<u32>) {
        if let Some(product) = lock(&self.state).products.iter_mut().find(|p| &p.id == id) {
            product.inventory = inventory;
        }
    }

    #[must_use]
    pub fn customers(&self) -> Vec<CustomerRecord> {
        lock(&self.state).customers.clone()
    }

    /// Number of customer creates and saves.
    #[must_use]
    pub fn customer_writes(&self) -> usize {
        lock(&self.state).customer_writes
    }

    #[must_use]
    pub fn orders(&self) -> Vec<NewOrder> {
        lock(&self.state).orders.iter().map(|(_, o)| o.clone()).collect()
    }

    #[must_use]
    pub fn order_status(&self, id: &OrderId) -> Option<OrderStatusUpdate> {
        lock(&self.state).statuses.get(id).cloned()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError> {
        let state = lock(&self.state);
        if state.fail_products {
            return Err(CatalogError::Api {
                status: 503,
                message: unavailable("catalog"),
            });
        }
        Ok(state
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn find_customer_by_mobile(
        &self,
        mobile: &str,
    ) -> Result<Option<CustomerRecord>, CatalogError> {
        Ok(lock(&self.state)
            .customers
            .iter()
            .find(|c| c.mobile == mobile)
            .cloned())
    }

    async fn find_customer_by_identity(
        &self,
        identity_id: &IdentityUserId,
    ) -> Result<Option<CustomerRecord>, CatalogError> {
        Ok(lock(&self.state)
            .customers
            .iter()
            .find(|c| c.identity_provider_id.as_ref() == Some(identity_id))
            .cloned())
    }

    async fn customer_exists(&self, id: &CustomerId) -> Result<bool, CatalogError> {
        Ok(lock(&self.state).customers.iter().any(|c| &c.id == id))
    }

    async fn create_customer(&self, update: ContactUpdate) -> Result<CustomerRecord, CatalogError> {
        let record = CustomerRecord::create(
            CustomerId::new(format!("user-{}", Uuid::new_v4().simple())),
            update,
        );
        let mut state = lock(&self.state);
        state.customers.push(record.clone());
        state.customer_writes += 1;
        Ok(record)
    }

    async fn save_customer(&self, record: &CustomerRecord) -> Result<(), CatalogError> {
        let mut state = lock(&self.state);
        let Some(existing) = state.customers.iter_mut().find(|c| c.id == record.id) else {
            return Err(CatalogError::NotFound(record.id.to_string()));
        };
        *existing = record.clone();
        state.customer_writes += 1;
        Ok(())
    }

    async fn existing_sellers(&self, ids: &[SellerId]) -> Result<Vec<SellerId>, CatalogError> {
        let state = lock(&self.state);
        Ok(ids
            .iter()
            .filter(|id| state.sellers.contains(id))
            .cloned()
            .collect())
    }

    async fn write_order(&self, order: &NewOrder) -> Result<OrderId, CatalogError> {
        let mut state = lock(&self.state);
        if state.fail_orders {
            return Err(CatalogError::Api {
                status: 503,
                message: unavailable("catalog"),
            });
        }
        let id = order_document_id(order);
        if !state.orders.iter().any(|(existing, _)| existing == &id) {
            state.orders.push((id.clone(), order.clone()));
        }
        Ok(id)
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        update: &OrderStatusUpdate,
    ) -> Result<(), CatalogError> {
        let mut state = lock(&self.state);
        if !state.orders.iter().any(|(existing, _)| existing == id) {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        state.statuses.insert(id.clone(), update.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct IdentityState {
    profiles: Vec<IdentityProfile>,
    next_email: usize,
    profile_updates: Vec<(IdentityUserId, ProfileUpdate)>,
    verifications_sent: usize,
}

impl IdentityState {
    fn profile_mut(&mut self, user_id: &IdentityUserId) -> Result<&mut IdentityProfile, IdentityError> {
        self.profiles
            .iter_mut()
            .find(|p| &p.user_id == user_id)
            .ok_or_else(|| IdentityError::Api {
                status: 404,
                message: format!("user {user_id} not found"),
            })
    }

    fn add_email(&mut self, user_id: &IdentityUserId, address: &str, verification: VerificationStatus) -> Result<EmailAddressId, IdentityError> {
        self.next_email += 1;
        let id = EmailAddressId::new(format!("idn_email_{}", self.next_email));
        let profile = self.profile_mut(user_id)?;
        profile.emails.push(IdentityEmail {
            id: id.clone(),
            address: address.to_owned(),
            verification,
        });
        Ok(id)
    }
}

/// In-memory identity provider. A user's session token is its user id.
#[derive(Debug, Default)]
pub struct InMemoryIdentity {
    state: Mutex<IdentityState>,
}

impl InMemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user whose primary email is `email`.
    #[must_use]
    pub fn with_user(self, user_id: &str, email: &str, verification: VerificationStatus) -> Self {
        self.register(user_id, email, verification);
        self
    }

    pub fn register(&self, user_id: &str, email: &str, verification: VerificationStatus) {
        let mut state = lock(&self.state);
        let user_id = IdentityUserId::new(user_id);
        state.profiles.push(IdentityProfile {
            user_id: user_id.clone(),
            first_name: None,
            last_name: None,
            primary_email_id: None,
            emails: Vec::new(),
            phones: Vec::new(),
        });
        if let Ok(id) = state.add_email(&user_id, email, verification)
            && let Ok(profile) = state.profile_mut(&user_id)
        {
            profile.primary_email_id = Some(id);
        }
    }

    /// Attach a further, non-primary email to an existing user.
    #[must_use]
    pub fn with_email(self, user_id: &str, email: &str, verification: VerificationStatus) -> Self {
        let _ = lock(&self.state).add_email(&IdentityUserId::new(user_id), email, verification);
        self
    }

    /// Mark an address as verified, as if the shopper entered the code.
    pub fn verify(&self, address: &str) {
        let mut state = lock(&self.state);
        for email in state.profiles.iter_mut().flat_map(|p| p.emails.iter_mut()) {
            if email.address.eq_ignore_ascii_case(address) {
                email.verification = VerificationStatus::Verified;
            }
        }
    }

    #[must_use]
    pub fn last_profile_update(&self) -> Option<ProfileUpdate> {
        lock(&self.state)
            .profile_updates
            .last()
            .map(|(_, update)| update.clone())
    }

    #[must_use]
    pub fn verifications_sent(&self) -> usize {
        lock(&self.state).verifications_sent
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn resolve_session(&self, session_token: &str) -> Result<IdentityProfile, IdentityError> {
        lock(&self.state)
            .profiles
            .iter()
            .find(|p| !session_token.is_empty() && p.user_id.as_str() == session_token)
            .cloned()
            .ok_or(IdentityError::InvalidSession)
    }

    async fn update_profile(
        &self,
        user_id: &IdentityUserId,
        update: &ProfileUpdate,
    ) -> Result<(), IdentityError> {
        let mut state = lock(&self.state);
        let profile = state.profile_mut(user_id)?;
        profile.first_name = Some(update.first_name.clone());
        profile.last_name = Some(update.last_name.clone());
        state.profile_updates.push((user_id.clone(), update.clone()));
        Ok(())
    }

    async fn create_email(
        &self,
        user_id: &IdentityUserId,
        address: &str,
    ) -> Result<EmailAddressId, IdentityError> {
        lock(&self.state).add_email(user_id, address, VerificationStatus::Unverified)
    }

    async fn prepare_verification(&self, email_id: &EmailAddressId) -> Result<(), IdentityError> {
        let mut state = lock(&self.state);
        let known = state
            .profiles
            .iter()
            .flat_map(|p| p.emails.iter())
            .any(|e| &e.id == email_id);
        if !known {
            return Err(IdentityError::Api {
                status: 404,
                message: format!("email {email_id} not found"),
            });
        }
        state.verifications_sent += 1;
        Ok(())
    }

    async fn set_primary_email(
        &self,
        user_id: &IdentityUserId,
        email_id: &EmailAddressId,
    ) -> Result<(), IdentityError> {
        let mut state = lock(&self.state);
        let profile = state.profile_mut(user_id)?;
        profile.primary_email_id = Some(email_id.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// How [`InMemoryPayments`] answers the next captures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PaymentBehavior {
    #[default]
    Approve,
    Decline(String),
    /// The processor cannot be reached.
    Unavailable,
}

#[derive(Debug, Default)]
struct PaymentsState {
    behavior: PaymentBehavior,
    captures: Vec<CaptureRequest>,
}

/// In-memory payment processor.
#[derive(Debug, Default)]
pub struct InMemoryPayments {
    state: Mutex<PaymentsState>,
}

impl InMemoryPayments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behavior(&self, behavior: PaymentBehavior) {
        lock(&self.state).behavior = behavior;
    }

    /// Every capture request received, in order.
    #[must_use]
    pub fn captures(&self) -> Vec<CaptureRequest> {
        lock(&self.state).captures.clone()
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPayments {
    async fn capture(&self, request: &CaptureRequest) -> Result<PaymentOutcome, PaymentError> {
        let mut state = lock(&self.state);
        state.captures.push(request.clone());
        let transaction_id = TransactionId::new(format!("pi_fake_{}", state.captures.len()));
        match &state.behavior {
            PaymentBehavior::Approve => Ok(PaymentOutcome::success(transaction_id, request.amount)),
            PaymentBehavior::Decline(reason) => Ok(PaymentOutcome::declined(
                transaction_id,
                request.amount,
                reason.clone(),
            )),
            PaymentBehavior::Unavailable => Err(PaymentError::Api {
                status: 503,
                message: unavailable("payments"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Shipping
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ShippingState {
    rates: Vec<ShippingRate>,
    quotes: Vec<RateRequest>,
    labels: Vec<(RateId, ShipmentLabel)>,
    fail_quotes: bool,
    fail_labels: bool,
}

/// In-memory shipping carrier.
#[derive(Debug, Default)]
pub struct InMemoryShipping {
    state: Mutex<ShippingState>,
}

impl InMemoryShipping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a rate on every quote.
    #[must_use]
    pub fn with_rate(self, id: &str, amount: Decimal) -> Self {
        lock(&self.state).rates.push(ShippingRate {
            id: RateId::new(id),
            carrier_name: "USPS".to_string(),
            service_level_name: format!("Service {id}"),
            amount,
            currency: "USD".to_string(),
            estimated_transit_days: 3,
        });
        self
    }

    pub fn fail_quotes(&self, fail: bool) {
        lock(&self.state).fail_quotes = fail;
    }

    pub fn fail_labels(&self, fail: bool) {
        lock(&self.state).fail_labels = fail;
    }

    /// Every quote request received, in order.
    #[must_use]
    pub fn quotes(&self) -> Vec<RateRequest> {
        lock(&self.state).quotes.clone()
    }

    /// Rate ids that labels were bought for.
    #[must_use]
    pub fn labels(&self) -> Vec<RateId> {
        lock(&self.state).labels.iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl ShippingCarrier for InMemoryShipping {
    async fn quote(&self, request: &RateRequest) -> Result<Vec<ShippingRate>, ShippingError> {
        let mut state = lock(&self.state);
        state.quotes.push(request.clone());
        if state.fail_quotes {
            return Err(ShippingError::Api {
                status: 503,
                message: unavailable("shipping"),
            });
        }
        if state.rates.is_empty() {
            return Err(ShippingError::NoRates);
        }
        Ok(state.rates.clone())
    }

    async fn purchase_label(&self, rate_id: &RateId) -> Result<ShipmentLabel, ShippingError> {
        let mut state = lock(&self.state);
        if state.fail_labels {
            return Err(ShippingError::LabelFailed("carrier rejected the rate".to_string()));
        }
        let label = ShipmentLabel {
            tracking_number: format!("TRK{:04}", state.labels.len() + 1),
            label_url: format!("https://labels.example.com/{rate_id}.pdf"),
        };
        state.labels.push((rate_id.clone(), label.clone()));
        Ok(label)
    }

    async fn track(
        &self,
        carrier: &str,
        tracking_number: &str,
    ) -> Result<TrackingStatus, ShippingError> {
        let state = lock(&self.state);
        if !state
            .labels
            .iter()
            .any(|(_, label)| label.tracking_number == tracking_number)
        {
            return Err(ShippingError::NotFound);
        }
        Ok(TrackingStatus {
            carrier: carrier.to_owned(),
            tracking_number: tracking_number.to_owned(),
            status: "PRE_TRANSIT".to_string(),
            status_details: None,
            eta: None,
        })
    }
}
