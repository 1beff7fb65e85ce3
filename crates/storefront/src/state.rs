//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::catalog::{CatalogClient, CatalogError};
use crate::checkout::{Checkout, CheckoutSettings, Collaborators, SubmissionGuard};
use crate::config::StorefrontConfig;
use crate::identity::{IdentityClient, IdentityError};
use crate::payments::{PaymentError, PaymentsClient};
use crate::shipping::{ShippingClient, ShippingError, ShippingParty};

/// Error building the collaborator clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("catalog client: {0}")]
    Catalog(#[from] CatalogError),
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
    #[error("payments client: {0}")]
    Payments(#[from] PaymentError),
    #[error("shipping client: {0}")]
    Shipping(#[from] ShippingError),
}

/// Handler state: configuration, the session pool and the checkout
/// orchestrator. Clones share one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    checkout: Checkout,
}

impl AppState {
    /// Create application state with HTTP clients for every collaborator.
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client fails to build.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let timeout = config.http_timeout;
        let collaborators = Collaborators {
            catalog: Arc::new(CatalogClient::new(&config.catalog, timeout)?),
            identity: Arc::new(IdentityClient::new(&config.identity, timeout)?),
            payments: Arc::new(PaymentsClient::new(&config.payments, timeout)?),
            shipping: Arc::new(ShippingClient::new(&config.shipping, timeout)?),
        };
        Ok(Self::with_collaborators(config, pool, collaborators))
    }

    /// Create application state around existing collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: StorefrontConfig,
        pool: PgPool,
        collaborators: Collaborators,
    ) -> Self {
        let settings = CheckoutSettings {
            origin: ShippingParty::from(&config.shipping.origin),
            parcel: config.shipping.parcel.clone(),
            customer_match: config.checkout.customer_match,
        };
        Self {
            inner: Arc::new(AppStateInner {
                checkout: Checkout::with_guard(
                    collaborators,
                    settings,
                    SubmissionGuard::for_call_timeout(config.http_timeout),
                ),
                config,
                pool,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }
}
