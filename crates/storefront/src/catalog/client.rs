//! HTTP client for the catalog store's query and mutation API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use furnimart_core::{
    ContactUpdate, CustomerId, CustomerRecord, IdentityUserId, NewOrder, OrderId, ProductId,
    SellerId,
};

use super::documents::{
    CustomerDocument, CustomerFields, MutateResponse, OrderDocument, ProductDocument,
    QueryResponse,
};
use super::{CatalogError, CatalogProduct, CatalogStore, OrderStatusUpdate, order_document_id};
use crate::config::CatalogConfig;

const PRODUCTS_QUERY: &str = r#"*[_type == "products" && _id in $ids]{_id, title, price, weight, "sellerId": seller._ref, inventory}"#;
const CUSTOMER_BY_MOBILE_QUERY: &str = r#"*[_type == "user" && mobile == $mobile][0]"#;
const CUSTOMER_BY_IDENTITY_QUERY: &str = r#"*[_type == "user" && clerkId == $clerkId][0]"#;
const CUSTOMER_EXISTS_QUERY: &str = r#"count(*[_type == "user" && _id == $id]) > 0"#;
const SELLERS_QUERY: &str = r#"*[_type == "seller" && _id in $ids]._id"#;

/// Client for the catalog store.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    query_url: String,
    mutate_url: String,
    token: String,
}

impl CatalogClient {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CatalogConfig, timeout: std::time::Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base = format!(
            "{}/v{}/data",
            config.project_url.trim_end_matches('/'),
            config.api_version
        );

        Ok(Self {
            inner: Arc::new(CatalogClientInner {
                client,
                query_url: format!("{base}/query/{}", config.dataset),
                mutate_url: format!("{base}/mutate/{}", config.dataset),
                token: config.token.expose_secret().to_string(),
            }),
        })
    }

    /// Run a GROQ query. Parameters are JSON-encoded as `$name` query arguments.
    async fn query<T: DeserializeOwned>(
        &self,
        groq: &str,
        params: &[(&str, Value)],
    ) -> Result<T, CatalogError> {
        let mut query: Vec<(String, String)> = vec![("query".to_string(), groq.to_string())];
        query.extend(
            params
                .iter()
                .map(|(name, value)| (format!("${name}"), value.to_string())),
        );

        let response = self
            .inner
            .client
            .get(&self.inner.query_url)
            .bearer_auth(&self.inner.token)
            .query(&query)
            .send()
            .await?;

        let envelope: QueryResponse<T> = Self::parse(response).await?;
        Ok(envelope.result)
    }

    /// Submit a mutation transaction and return the per-mutation results.
    async fn mutate<T: DeserializeOwned>(
        &self,
        mutations: Value,
    ) -> Result<MutateResponse<T>, CatalogError> {
        let response = self
            .inner
            .client
            .post(&self.inner.mutate_url)
            .bearer_auth(&self.inner.token)
            .query(&[("returnIds", "true"), ("returnDocuments", "true")])
            .json(&json!({ "mutations": mutations }))
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CatalogError> {
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(truncate(&body)));
        }
        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&body),
                "Catalog API returned non-success status"
            );
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, body = %truncate(&body), "Failed to parse catalog response");
            CatalogError::Parse(e.to_string())
        })
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}

fn id_list<T: AsRef<str>>(ids: &[T]) -> Value {
    Value::Array(ids.iter().map(|id| Value::from(id.as_ref())).collect())
}

fn set_fields<T: Serialize>(fields: &T) -> Result<Value, CatalogError> {
    serde_json::to_value(fields).map_err(|e| CatalogError::Parse(e.to_string()))
}

#[async_trait]
impl CatalogStore for CatalogClient {
    #[instrument(skip(self), fields(count = ids.len()))]
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError> {
        let docs: Vec<ProductDocument> = self.query(PRODUCTS_QUERY, &[("ids", id_list(ids))]).await?;
        debug!(found = docs.len(), "Fetched catalog products");
        Ok(docs.into_iter().map(CatalogProduct::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_customer_by_mobile(
        &self,
        mobile: &str,
    ) -> Result<Option<CustomerRecord>, CatalogError> {
        let doc: Option<CustomerDocument> = self
            .query(CUSTOMER_BY_MOBILE_QUERY, &[("mobile", Value::from(mobile))])
            .await?;
        Ok(doc.map(CustomerRecord::from))
    }

    #[instrument(skip(self))]
    async fn find_customer_by_identity(
        &self,
        identity_id: &IdentityUserId,
    ) -> Result<Option<CustomerRecord>, CatalogError> {
        let doc: Option<CustomerDocument> = self
            .query(
                CUSTOMER_BY_IDENTITY_QUERY,
                &[("clerkId", Value::from(identity_id.as_str()))],
            )
            .await?;
        Ok(doc.map(CustomerRecord::from))
    }

    #[instrument(skip(self))]
    async fn customer_exists(&self, id: &CustomerId) -> Result<bool, CatalogError> {
        self.query(CUSTOMER_EXISTS_QUERY, &[("id", Value::from(id.as_str()))])
            .await
    }

    #[instrument(skip(self, update), fields(identity_id = %update.identity_provider_id))]
    async fn create_customer(&self, update: ContactUpdate) -> Result<CustomerRecord, CatalogError> {
        // The id is assigned by the store; the placeholder only shapes the fields.
        let draft = CustomerRecord::create(CustomerId::new(""), update);
        let mut document = set_fields(&CustomerFields::from_record(&draft))?;
        if let Value::Object(map) = &mut document {
            map.insert("_type".to_string(), Value::from("user"));
        }

        let response: MutateResponse<CustomerDocument> =
            self.mutate(json!([{ "create": document }])).await?;
        let result = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::Parse("create returned no results".to_string()))?;

        tracing::info!(customer_id = %result.id, "Created customer");
        Ok(result.document.map_or_else(
            || CustomerRecord {
                id: CustomerId::new(result.id.clone()),
                ..draft
            },
            CustomerRecord::from,
        ))
    }

    #[instrument(skip(self, record), fields(customer_id = %record.id))]
    async fn save_customer(&self, record: &CustomerRecord) -> Result<(), CatalogError> {
        let fields = set_fields(&CustomerFields::from_record(record))?;
        let _: MutateResponse<Value> = self
            .mutate(json!([{ "patch": { "id": record.id.as_str(), "set": fields } }]))
            .await?;
        tracing::info!("Updated customer");
        Ok(())
    }

    #[instrument(skip(self), fields(count = ids.len()))]
    async fn existing_sellers(&self, ids: &[SellerId]) -> Result<Vec<SellerId>, CatalogError> {
        let found: Vec<String> = self.query(SELLERS_QUERY, &[("ids", id_list(ids))]).await?;
        Ok(found.into_iter().map(SellerId::new).collect())
    }

    #[instrument(skip(self, order), fields(attempt_id = %order.attempt_id))]
    async fn write_order(&self, order: &NewOrder) -> Result<OrderId, CatalogError> {
        let id = order_document_id(order);
        let document = set_fields(&OrderDocument::new(id.as_str(), order, Utc::now()))?;

        let _: MutateResponse<Value> = self
            .mutate(json!([{ "createIfNotExists": document }]))
            .await?;

        tracing::info!(order_id = %id, "Wrote order");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn update_order_status(
        &self,
        id: &OrderId,
        update: &OrderStatusUpdate,
    ) -> Result<(), CatalogError> {
        let mut set = serde_json::Map::new();
        if let Some(status) = update.status {
            set.insert("status".to_string(), Value::from(status.as_str()));
        }
        if let Some(payment_status) = update.payment_status {
            set.insert("paymentStatus".to_string(), Value::from(payment_status.as_str()));
        }

        let _: MutateResponse<Value> = self
            .mutate(json!([{ "patch": { "id": id.as_str(), "set": set } }]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use furnimart_core::{
        CheckoutAttemptId, Email, OrderLine, PaymentOutcome, PostalAddress, ShippingAddress,
        TransactionId,
    };

    use super::*;

    fn client(server: &MockServer) -> CatalogClient {
        let config = CatalogConfig {
            project_url: server.uri(),
            dataset: "production".to_string(),
            api_version: "2024-01-01".to_string(),
            token: SecretString::from("sk_catalog_token"),
        };
        CatalogClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn new_order() -> NewOrder {
        NewOrder {
            attempt_id: CheckoutAttemptId::generate(),
            customer_id: CustomerId::new("user-1"),
            seller_ids: vec![SellerId::new("seller-1")],
            line_items: vec![OrderLine {
                product_id: ProductId::new("chair"),
                title: "Chair".to_string(),
                quantity: 2,
                unit_price: Decimal::from(20),
                seller_id: SellerId::new("seller-1"),
            }],
            shipping_address: ShippingAddress {
                name: "Sana Malik".to_string(),
                email: Email::parse("sana@example.pk").unwrap(),
                mobile: "0300-1111111".to_string(),
                street: "1 Mall Rd".to_string(),
                city: "Lahore".to_string(),
                state: None,
                postal_code: "54000".to_string(),
                country: "PK".to_string(),
            },
            payment: PaymentOutcome::success(TransactionId::new("pi_1"), Decimal::from(45)),
            shipping_cost: Decimal::from(5),
            grand_total: Decimal::from(45),
        }
    }

    #[tokio::test]
    async fn test_products_query_sends_ids_as_json_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2024-01-01/data/query/production"))
            .and(query_param("$ids", r#"["chair","table"]"#))
            .and(header("authorization", "Bearer sk_catalog_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"_id": "chair", "title": "Chair", "price": 20, "sellerId": "seller-1", "inventory": 4}]
            })))
            .mount(&server)
            .await;

        let products = client(&server)
            .products(&[ProductId::new("chair"), ProductId::new("table")])
            .await
            .unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].seller_id, Some(SellerId::new("seller-1")));
        assert_eq!(products[0].inventory, Some(4));
    }

    #[tokio::test]
    async fn test_missing_customer_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2024-01-01/data/query/production"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null})))
            .mount(&server)
            .await;

        let found = client(&server)
            .find_customer_by_mobile("0300-1111111")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_customer_uses_returned_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2024-01-01/data/mutate/production"))
            .and(body_partial_json(json!({"mutations": [{"create": {"_type": "user", "mobile": "0300-1"}}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transactionId": "tx1",
                "results": [{"id": "user-9", "operation": "create", "document": {
                    "_id": "user-9", "clerkId": "user_abc", "name": "Sana", "email": "s@example.pk",
                    "mobile": "0300-1", "address": {"street": "1", "city": "Lahore", "state": "", "postalCode": "54000", "country": "PK"},
                    "addressHistory": [], "previousPhones": [], "previousEmails": []
                }}]
            })))
            .mount(&server)
            .await;

        let update = ContactUpdate {
            identity_provider_id: IdentityUserId::new("user_abc"),
            name: "Sana".to_string(),
            email: "s@example.pk".to_string(),
            mobile: "0300-1".to_string(),
            address: PostalAddress::default(),
        };
        let record = client(&server).create_customer(update).await.unwrap();
        assert_eq!(record.id, CustomerId::new("user-9"));
    }

    #[tokio::test]
    async fn test_write_order_is_create_if_not_exists_with_attempt_id() {
        let server = MockServer::start().await;
        let order = new_order();
        let expected_id = order_document_id(&order);

        Mock::given(method("POST"))
            .and(path("/v2024-01-01/data/mutate/production"))
            .and(body_partial_json(json!({"mutations": [{"createIfNotExists": {
                "_id": expected_id.as_str(),
                "_type": "order",
                "total": 45.0,
                "paymentStatus": "paid",
                "customer": {"_type": "reference", "_ref": "user-1"}
            }}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transactionId": "tx2",
                "results": [{"id": expected_id.as_str(), "operation": "create"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server).write_order(&order).await.unwrap();
        assert_eq!(id, expected_id);
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server)
            .update_order_status(
                &OrderId::new("order-1"),
                &OrderStatusUpdate {
                    status: None,
                    payment_status: Some(furnimart_core::PaymentStatus::Paid),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "nope"})))
            .mount(&server)
            .await;

        let err = client(&server).existing_sellers(&[SellerId::new("s1")]).await.unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}
