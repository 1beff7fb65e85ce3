//! End-to-end tests for the FurniMart storefront API.
//!
//! [`TestApp`] drives the real router with `tower::ServiceExt::oneshot`,
//! keeping the session cookie between requests like a browser would.
//! Sessions live in a `MemoryStore` and every collaborator is an in-memory
//! fake, so no database or network is needed.
//!
//! ```bash
//! cargo test -p furnimart-integration-tests
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use furnimart_core::{ProductId, SellerId, VerificationStatus};
use furnimart_storefront::catalog::CatalogProduct;
use furnimart_storefront::checkout::Collaborators;
use furnimart_storefront::checkout::memory::{
    InMemoryCatalog, InMemoryIdentity, InMemoryPayments, InMemoryShipping,
};
use furnimart_storefront::config::{
    CatalogConfig, CheckoutConfig, IdentityConfig, ParcelDefaults, PaymentsConfig, ShippingConfig,
    ShippingOrigin, StorefrontConfig,
};
use furnimart_storefront::middleware::session_layer;
use furnimart_storefront::state::AppState;

/// Shared secret accepted by the order status webhook in tests.
pub const WEBHOOK_SECRET: &str = "whsec-q8Vd2mLr7XnT4pKz9sJb3HcYw6Fg";

/// Identity session token of the seeded, verified shopper.
pub const SHOPPER_TOKEN: &str = "user_a";

/// Seeded product: $20.00 from a known seller.
pub const TABLE: &str = "table";

/// A response status with its JSON body (`Value::Null` when empty).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// The storefront router plus handles on its collaborators.
pub struct TestApp {
    router: Router,
    cookie: Option<String>,
    pub catalog: Arc<InMemoryCatalog>,
    pub identity: Arc<InMemoryIdentity>,
    pub payments: Arc<InMemoryPayments>,
    pub shipping: Arc<InMemoryShipping>,
}

impl TestApp {
    /// A storefront with one product, one verified shopper and two rates
    /// (standard $5.00, express $30.00).
    ///
    /// # Panics
    ///
    /// Panics if the lazy database pool cannot be configured.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shipping(
            InMemoryShipping::new()
                .with_rate("rate_std", Decimal::new(500, 2))
                .with_rate("rate_exp", Decimal::from(30)),
        )
    }

    /// Same seed data with a custom shipping fake.
    ///
    /// # Panics
    ///
    /// Panics if the lazy database pool cannot be configured.
    #[must_use]
    pub fn with_shipping(shipping: InMemoryShipping) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new().with_product(CatalogProduct {
            id: ProductId::new(TABLE),
            title: "Dining Table".to_string(),
            price: Decimal::new(2000, 2),
            weight: Some(Decimal::from(15)),
            seller_id: Some(SellerId::new("seller-1")),
            inventory: Some(10),
        }));
        let identity = Arc::new(InMemoryIdentity::new().with_user(
            SHOPPER_TOKEN,
            "sana@example.pk",
            VerificationStatus::Verified,
        ));
        let payments = Arc::new(InMemoryPayments::new());
        let shipping = Arc::new(shipping);

        // Never connects: only the readiness probe touches the pool.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/furnimart_test")
            .expect("lazy pool");

        let state = AppState::with_collaborators(
            test_config(),
            pool,
            Collaborators {
                catalog: catalog.clone(),
                identity: identity.clone(),
                payments: payments.clone(),
                shipping: shipping.clone(),
            },
        );
        let router = furnimart_storefront::router(state, session_layer(MemoryStore::default(), false));

        Self {
            router,
            cookie: None,
            catalog,
            identity,
            payments,
            shipping,
        }
    }

    /// Send a request, carrying the session cookie across calls.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body is not JSON.
    pub async fn send(
        &mut self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router");

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE)
            && let Ok(raw) = set_cookie.to_str()
            && let Some(pair) = raw.split(';').next()
        {
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse { status, body }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, &[]).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body), &[]).await
    }

    /// POST without a body.
    pub async fn post_empty(&mut self, uri: &str) -> TestResponse {
        self.send(Method::POST, uri, None, &[]).await
    }

    /// Add `quantity` dining tables at the shopper-visible price.
    pub async fn add_table(&mut self, quantity: u32) -> TestResponse {
        self.post(
            "/cart/add",
            json!({
                "productId": TABLE,
                "title": "Dining Table",
                "unitPrice": "20.00",
                "quantity": quantity,
                "sellerId": "seller-1",
            }),
        )
        .await
    }

    /// Fill the cart, submit details, load rates, pick standard shipping and
    /// continue. Leaves the checkout at `payment`.
    ///
    /// # Panics
    ///
    /// Panics if any step is refused.
    pub async fn checkout_to_payment(&mut self) {
        assert_eq!(self.add_table(2).await.status, StatusCode::OK);
        let details = self.post("/checkout/details", shipping_details()).await;
        assert_eq!(details.status, StatusCode::OK, "{:?}", details.body);
        assert_eq!(self.get("/checkout/rates").await.status, StatusCode::OK);
        let selected = self
            .post("/checkout/rates/select", json!({ "rateId": "rate_std" }))
            .await;
        assert_eq!(selected.status, StatusCode::OK, "{:?}", selected.body);
        assert_eq!(
            self.post_empty("/checkout/continue").await.status,
            StatusCode::OK
        );
    }

    /// Pay as `token` with a test card.
    pub async fn pay(&mut self, token: &str) -> TestResponse {
        let authorization = format!("Bearer {token}");
        self.send(
            Method::POST,
            "/checkout/pay",
            Some(json!({ "paymentMethod": "pm_card_visa" })),
            &[("authorization", authorization.as_str())],
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete shipping details form.
#[must_use]
pub fn shipping_details() -> Value {
    json!({
        "name": "Sana Malik",
        "email": "sana@example.pk",
        "mobile": "0300-1111111",
        "street": "12 Mall Road",
        "city": "Lahore",
        "postalCode": "54000",
        "country": "PK",
    })
}

/// Read a money amount from a JSON string or number.
///
/// # Panics
///
/// Panics if the value is not a decimal.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/furnimart_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        catalog: CatalogConfig {
            project_url: "http://catalog.invalid".to_string(),
            dataset: "test".to_string(),
            api_version: "2024-01-01".to_string(),
            token: SecretString::from("catalog-token"),
        },
        identity: IdentityConfig {
            api_url: "http://identity.invalid".to_string(),
            secret_key: SecretString::from("identity-key"),
        },
        payments: PaymentsConfig {
            api_url: "http://payments.invalid".to_string(),
            secret_key: SecretString::from("payments-key"),
            currency: "usd".to_string(),
        },
        shipping: ShippingConfig {
            api_url: "http://shipping.invalid".to_string(),
            api_key: SecretString::from("shipping-key"),
            origin: ShippingOrigin {
                name: "FurniMart Warehouse".to_string(),
                street: "215 Clayton St".to_string(),
                city: "San Francisco".to_string(),
                state: "CA".to_string(),
                zip: "94117".to_string(),
                country: "US".to_string(),
                phone: "+1 555 341 9393".to_string(),
                email: "warehouse@furnimart.example".to_string(),
            },
            parcel: ParcelDefaults::default(),
        },
        checkout: CheckoutConfig::default(),
        http_timeout: Duration::from_secs(5),
        order_webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}
