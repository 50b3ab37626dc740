//! PayPal adapter tests against a mock HTTP server.

use booking::{CaptureStatus, GatewayError, PayPalConfig, PayPalGateway, PaymentGateway};
use chrono::Utc;
use domain::{BookingReference, Money};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "A21AAtest-token";

fn gateway(server: &MockServer) -> PayPalGateway {
    PayPalGateway::new(PayPalConfig {
        client_id: "client-id".to_string(),
        secret: "client-secret".to_string(),
        base_url: server.uri(),
        return_url: "https://hostel.test/payments/success".to_string(),
        cancel_url: "https://hostel.test/payments/cancel".to_string(),
    })
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_order_returns_approval_link() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    let reference = BookingReference::generate(Utc::now());
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_partial_json(json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": reference.as_str(),
                "amount": { "currency_code": "USD", "value": "354.00" }
            }],
            "application_context": {
                "return_url": "https://hostel.test/payments/success"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "5O190127TN364715T",
            "status": "CREATED",
            "links": [
                { "href": "https://api.sandbox.paypal.com/v2/checkout/orders/5O190127TN364715T", "rel": "self", "method": "GET" },
                { "href": "https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T", "rel": "approve", "method": "GET" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = gateway(&server)
        .create_order(Money::from_major(354), "USD", &reference)
        .await
        .unwrap();

    assert_eq!(order.order_id, "5O190127TN364715T");
    assert_eq!(
        order.approval_url.as_deref(),
        Some("https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T")
    );
}

#[tokio::test]
async fn test_token_is_cached_between_calls() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-1",
            "links": []
        })))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let reference = BookingReference::generate(Utc::now());
    for _ in 0..2 {
        let order = gateway
            .create_order(Money::from_major(20), "USD", &reference)
            .await
            .unwrap();
        assert_eq!(order.approval_url, None);
    }
}

#[tokio::test]
async fn test_capture_reads_first_capture() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-1/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-1",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "BK-20300601120000-ABC123",
                "payments": {
                    "captures": [{
                        "id": "3C679366HH908993F",
                        "status": "COMPLETED",
                        "amount": { "currency_code": "USD", "value": "354.00" }
                    }]
                }
            }]
        })))
        .mount(&server)
        .await;

    let captured = gateway(&server).capture_order("ORDER-1").await.unwrap();
    assert_eq!(captured.capture_id, "3C679366HH908993F");
    assert_eq!(captured.status, CaptureStatus::Completed);
    assert_eq!(captured.amount, Some(Money::from_major(354)));
}

#[tokio::test]
async fn test_capture_pending_is_not_settled() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-2/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-2",
            "status": "COMPLETED",
            "purchase_units": [{
                "payments": {
                    "captures": [{ "id": "CAP-2", "status": "PENDING" }]
                }
            }]
        })))
        .mount(&server)
        .await;

    let captured = gateway(&server).capture_order("ORDER-2").await.unwrap();
    assert_eq!(captured.status, CaptureStatus::Pending);
    assert!(!captured.status.is_settled());
    assert_eq!(captured.amount, None);
}

#[tokio::test]
async fn test_unapproved_order_maps_to_not_approved() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-3/capture"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "details": [{
                "issue": "ORDER_NOT_APPROVED",
                "description": "Payer has not yet approved the Order for payment."
            }]
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).capture_order("ORDER-3").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotApproved(_)));
}

#[tokio::test]
async fn test_refund_and_already_refunded() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/payments/captures/CAP-1/refund"))
        .and(body_partial_json(json!({
            "amount": { "currency_code": "USD", "value": "354.00" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "1JU08902781691411",
            "status": "COMPLETED"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/payments/captures/CAP-9/refund"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "details": [{ "issue": "CAPTURE_FULLY_REFUNDED" }]
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let refund = gateway
        .refund("CAP-1", Money::from_major(354), "USD")
        .await
        .unwrap();
    assert_eq!(refund.refund_id, "1JU08902781691411");
    assert_eq!(refund.status, "COMPLETED");

    let err = gateway
        .refund("CAP-9", Money::from_major(354), "USD")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyRefunded(_)));
}

#[tokio::test]
async fn test_server_errors_mean_unavailable() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .create_order(Money::from_major(10), "USD", &BookingReference::generate(Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)));
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Client Authentication failed"
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).capture_order("ORDER-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)));
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected_locally() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    let err = gateway(&server)
        .create_order(Money::zero(), "USD", &BookingReference::generate(Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::InvalidAmount(Money::zero()));
}
