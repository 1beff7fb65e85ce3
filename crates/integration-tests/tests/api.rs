//! Health probes, order status webhook and shipment tracking.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use furnimart_core::{OrderId, OrderStatus, PaymentStatus};
use furnimart_integration_tests::{SHOPPER_TOKEN, TestApp, WEBHOOK_SECRET};

/// Complete a checkout and return the confirmed order id.
async fn place_order(app: &mut TestApp) -> String {
    app.checkout_to_payment().await;
    let paid = app.pay(SHOPPER_TOKEN).await;
    assert_eq!(paid.status, StatusCode::OK);
    paid.body["confirmation"]["orderId"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn post_status(app: &mut TestApp, secret: Option<&str>, body: Value) -> StatusCode {
    let headers: Vec<(&str, &str)> = secret
        .map(|s| vec![("x-webhook-secret", s)])
        .unwrap_or_default();
    app.send(Method::POST, "/api/orders/status", Some(body), &headers)
        .await
        .status
}

#[tokio::test]
async fn test_liveness() {
    let mut app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Value::String("ok".to_string()));
}

#[tokio::test]
async fn test_order_status_webhook_updates_order() {
    let mut app = TestApp::new();
    let order_id = place_order(&mut app).await;

    let status = post_status(
        &mut app,
        Some(WEBHOOK_SECRET),
        json!({ "orderId": order_id, "status": "shipped", "paymentStatus": "paid" }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stored = app.catalog.order_status(&OrderId::new(order_id)).unwrap();
    assert_eq!(stored.status, Some(OrderStatus::Shipped));
    assert_eq!(stored.payment_status, Some(PaymentStatus::Paid));
}

#[tokio::test]
async fn test_order_status_webhook_rejects_bad_secret() {
    let mut app = TestApp::new();
    let order_id = place_order(&mut app).await;
    let body = json!({ "orderId": order_id, "status": "shipped" });

    assert_eq!(
        post_status(&mut app, None, body.clone()).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        post_status(&mut app, Some("not-the-secret"), body).await,
        StatusCode::UNAUTHORIZED
    );
    assert!(app.catalog.order_status(&OrderId::new(order_id)).is_none());
}

#[tokio::test]
async fn test_order_status_webhook_validates_body() {
    let mut app = TestApp::new();
    let order_id = place_order(&mut app).await;

    assert_eq!(
        post_status(&mut app, Some(WEBHOOK_SECRET), json!({ "orderId": order_id })).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        post_status(
            &mut app,
            Some(WEBHOOK_SECRET),
            json!({ "orderId": "order-unknown", "status": "shipped" }),
        )
        .await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_tracking_for_purchased_label() {
    let mut app = TestApp::new();
    place_order(&mut app).await;

    let tracked = app.get("/api/track/usps/TRK0001").await;
    assert_eq!(tracked.status, StatusCode::OK);
    assert_eq!(tracked.body["trackingNumber"], "TRK0001");
    assert_eq!(tracked.body["status"], "PRE_TRANSIT");

    let unknown = app.get("/api/track/usps/TRK9999").await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}
