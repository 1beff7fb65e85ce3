//! HTTP client for the shipping provider's REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use furnimart_core::{RateId, ShipmentLabel, ShippingRate, TrackingStatus};

use super::{RateRequest, ShippingCarrier, ShippingError, ShippingParty};
use crate::config::ShippingConfig;

/// Tracking number reported when the provider does not return one.
const UNKNOWN_TRACKING: &str = "N/A";

#[derive(Debug, Serialize)]
struct ShipmentBody<'a> {
    address_from: &'a ShippingParty,
    address_to: &'a ShippingParty,
    parcels: [ParcelBody<'a>; 1],
    #[serde(rename = "async")]
    run_async: bool,
}

#[derive(Debug, Serialize)]
struct ParcelBody<'a> {
    length: Decimal,
    width: Decimal,
    height: Decimal,
    distance_unit: &'a str,
    weight: Decimal,
    mass_unit: &'a str,
}

#[derive(Debug, Deserialize)]
struct ShipmentResponse {
    #[serde(default)]
    rates: Vec<RateResponse>,
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    object_id: String,
    provider: String,
    servicelevel: ServiceLevel,
    amount: Decimal,
    currency: String,
    #[serde(default)]
    estimated_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ServiceLevel {
    #[serde(default)]
    name: String,
}

impl From<RateResponse> for ShippingRate {
    fn from(rate: RateResponse) -> Self {
        Self {
            id: RateId::new(rate.object_id),
            carrier_name: rate.provider,
            service_level_name: rate.servicelevel.name,
            amount: rate.amount,
            currency: rate.currency,
            estimated_transit_days: rate.estimated_days.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    status: String,
    #[serde(default)]
    tracking_number: Option<String>,
    #[serde(default)]
    label_url: Option<String>,
    #[serde(default)]
    messages: Vec<ProviderMessage>,
}

#[derive(Debug, Deserialize)]
struct ProviderMessage {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    carrier: String,
    tracking_number: String,
    #[serde(default)]
    eta: Option<DateTime<Utc>>,
    #[serde(default)]
    tracking_status: Option<TrackStatusResponse>,
}

#[derive(Debug, Deserialize)]
struct TrackStatusResponse {
    status: String,
    #[serde(default)]
    status_details: Option<String>,
}

/// Client for the shipping provider.
#[derive(Clone)]
pub struct ShippingClient {
    inner: Arc<ShippingClientInner>,
}

struct ShippingClientInner {
    client: reqwest::Client,
    api_url: String,
}

impl ShippingClient {
    /// Create a new shipping client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ShippingConfig, timeout: Duration) -> Result<Self, ShippingError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("ShippoToken {}", config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| ShippingError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ShippingClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ShippingError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ShippingError::NotFound);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Shipping API returned non-success status");
            return Err(ShippingError::Api {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ShippingError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ShippingCarrier for ShippingClient {
    #[instrument(skip(self, request), fields(weight = %request.parcel.weight))]
    async fn quote(&self, request: &RateRequest) -> Result<Vec<ShippingRate>, ShippingError> {
        let parcel = &request.parcel;
        let body = ShipmentBody {
            address_from: &request.origin,
            address_to: &request.destination,
            parcels: [ParcelBody {
                length: parcel.length,
                width: parcel.width,
                height: parcel.height,
                distance_unit: &parcel.distance_unit,
                weight: parcel.weight,
                mass_unit: &parcel.mass_unit,
            }],
            run_async: false,
        };

        let response = self
            .inner
            .client
            .post(format!("{}/shipments/", self.inner.api_url))
            .json(&body)
            .send()
            .await?;
        let shipment: ShipmentResponse = Self::parse(response).await?;

        if shipment.rates.is_empty() {
            tracing::warn!("Shipping provider returned no rates");
            return Err(ShippingError::NoRates);
        }
        Ok(shipment.rates.into_iter().map(ShippingRate::from).collect())
    }

    #[instrument(skip(self))]
    async fn purchase_label(&self, rate_id: &RateId) -> Result<ShipmentLabel, ShippingError> {
        let response = self
            .inner
            .client
            .post(format!("{}/transactions/", self.inner.api_url))
            .json(&serde_json::json!({
                "rate": rate_id.as_str(),
                "label_file_type": "PDF",
                "async": false,
            }))
            .send()
            .await?;
        let transaction: TransactionResponse = Self::parse(response).await?;

        if transaction.status != "SUCCESS" {
            let reason = transaction
                .messages
                .into_iter()
                .map(|m| m.text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ShippingError::LabelFailed(if reason.is_empty() {
                transaction.status
            } else {
                reason
            }));
        }

        Ok(ShipmentLabel {
            tracking_number: transaction
                .tracking_number
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNKNOWN_TRACKING.to_string()),
            label_url: transaction
                .label_url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| UNKNOWN_TRACKING.to_string()),
        })
    }

    #[instrument(skip(self))]
    async fn track(
        &self,
        carrier: &str,
        tracking_number: &str,
    ) -> Result<TrackingStatus, ShippingError> {
        let mut url = reqwest::Url::parse(&self.inner.api_url)
            .map_err(|e| ShippingError::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ShippingError::Parse("shipping API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["tracks", carrier, tracking_number]);

        let response = self.inner.client.get(url).send().await?;
        let track: TrackResponse = Self::parse(response).await?;

        let (status, status_details) = track.tracking_status.map_or_else(
            || ("UNKNOWN".to_string(), None),
            |s| (s.status, s.status_details),
        );
        Ok(TrackingStatus {
            carrier: track.carrier,
            tracking_number: track.tracking_number,
            status,
            status_details,
            eta: track.eta,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use furnimart_core::Parcel;

    use super::*;
    use crate::config::{ParcelDefaults, ShippingOrigin};

    fn client(server: &MockServer) -> ShippingClient {
        let config = ShippingConfig {
            api_url: server.uri(),
            api_key: SecretString::from("shippo_test_key"),
            origin: ShippingOrigin {
                name: "FurniMart Warehouse".to_string(),
                street: "Plot 4, Sundar Industrial Estate".to_string(),
                city: "Lahore".to_string(),
                state: "Punjab".to_string(),
                zip: "54000".to_string(),
                country: "PK".to_string(),
                phone: "042-1111111".to_string(),
                email: "warehouse@furnimart.pk".to_string(),
            },
            parcel: ParcelDefaults::default(),
        };
        ShippingClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn party(name: &str) -> ShippingParty {
        ShippingParty {
            name: name.to_string(),
            street1: "1 Mall Rd".to_string(),
            city: "Lahore".to_string(),
            state: String::new(),
            zip: "54000".to_string(),
            country: "PK".to_string(),
            phone: "0300-1111111".to_string(),
            email: "a@example.pk".to_string(),
        }
    }

    fn rate_request() -> RateRequest {
        RateRequest {
            origin: party("Warehouse"),
            destination: party("Sana"),
            parcel: Parcel {
                length: Decimal::from(10),
                width: Decimal::from(8),
                height: Decimal::from(4),
                distance_unit: "in".to_string(),
                weight: Decimal::from(7),
                mass_unit: "lb".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_quote_returns_rates_in_provider_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/shipments/"))
            .and(header("authorization", "ShippoToken shippo_test_key"))
            .and(body_partial_json(json!({
                "async": false,
                "parcels": [{"weight": "7", "mass_unit": "lb", "length": "10"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "object_id": "shp_1",
                "rates": [
                    {"object_id": "rate_b", "provider": "DHL", "servicelevel": {"name": "Express"}, "amount": "30.00", "currency": "USD", "estimated_days": 1},
                    {"object_id": "rate_a", "provider": "USPS", "servicelevel": {"name": "Ground"}, "amount": "5.00", "currency": "USD", "estimated_days": null}
                ]
            })))
            .mount(&server)
            .await;

        let rates = client(&server).quote(&rate_request()).await.unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].id, RateId::new("rate_b"));
        assert_eq!(rates[1].amount, Decimal::from(5));
        assert_eq!(rates[1].estimated_transit_days, 0);
    }

    #[tokio::test]
    async fn test_zero_rates_is_no_rates_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/shipments/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"rates": []})))
            .mount(&server)
            .await;

        let err = client(&server).quote(&rate_request()).await.unwrap_err();
        assert!(matches!(err, ShippingError::NoRates));
    }

    #[tokio::test]
    async fn test_purchase_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions/"))
            .and(body_partial_json(json!({"rate": "rate_a", "label_file_type": "PDF"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "SUCCESS",
                "tracking_number": "9400111899223",
                "label_url": "https://labels.example/9400111899223.pdf",
                "messages": []
            })))
            .mount(&server)
            .await;

        let label = client(&server).purchase_label(&RateId::new("rate_a")).await.unwrap();
        assert_eq!(label.tracking_number, "9400111899223");
    }

    #[tokio::test]
    async fn test_label_error_status_carries_provider_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "ERROR",
                "messages": [{"text": "Rate expired"}]
            })))
            .mount(&server)
            .await;

        let err = client(&server).purchase_label(&RateId::new("rate_a")).await.unwrap_err();
        assert!(matches!(err, ShippingError::LabelFailed(ref m) if m == "Rate expired"));
    }

    #[tokio::test]
    async fn test_track_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tracks/usps/9400111899223"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "carrier": "usps",
                "tracking_number": "9400111899223",
                "eta": "2026-10-20T12:00:00Z",
                "tracking_status": {"status": "TRANSIT", "status_details": "Arrived at facility"}
            })))
            .mount(&server)
            .await;

        let status = client(&server).track("usps", "9400111899223").await.unwrap();
        assert_eq!(status.status, "TRANSIT");
        assert_eq!(status.status_details.as_deref(), Some("Arrived at facility"));
        assert!(status.eta.is_some());
    }

    #[tokio::test]
    async fn test_unknown_shipment_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).track("usps", "missing").await.unwrap_err();
        assert!(matches!(err, ShippingError::NotFound));
    }
}
