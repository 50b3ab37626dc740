//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use booking::{BookingConfig, BookingOrchestrator, InMemoryNotifier, InMemoryPaymentGateway};
use chrono::{Days, Utc};
use common::UserId;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    orchestrator: Arc<BookingOrchestrator>,
    gateway: InMemoryPaymentGateway,
    notifier: InMemoryNotifier,
}

fn setup() -> TestApp {
    setup_with(BookingConfig::default())
}

fn setup_with(config: BookingConfig) -> TestApp {
    let gateway = InMemoryPaymentGateway::new();
    let notifier = InMemoryNotifier::new();
    let orchestrator = Arc::new(BookingOrchestrator::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(gateway.clone()),
        Arc::new(notifier.clone()),
        config,
    ));
    let state = Arc::new(AppState {
        orchestrator: orchestrator.clone(),
        storage: "memory",
        payment_gateway: "simulated",
    });
    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        orchestrator,
        gateway,
        notifier,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn add_room(&self, number: &str, capacity: u32) -> String {
        let (status, room) = self
            .send(
                "POST",
                "/rooms",
                Some(UserId::new()),
                Some(json!({
                    "roomNumber": number,
                    "roomType": "ac",
                    "pricePerNightCents": 10_000,
                    "capacity": capacity
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        room["id"].as_str().unwrap().to_string()
    }

    async fn register(&self, name: &str) -> UserId {
        let user = UserId::new();
        let (status, _) = self
            .send(
                "POST",
                "/residents",
                Some(user),
                Some(json!({ "name": name, "email": format!("{}@example.com", name.to_lowercase()) })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        user
    }

    async fn book(&self, user: UserId, room_id: &str, starts_in: u64, nights: u64) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/bookings",
            Some(user),
            Some(booking_body(room_id, starts_in, nights)),
        )
        .await
    }
}

fn booking_body(room_id: &str, starts_in: u64, nights: u64) -> Value {
    let today = Utc::now().date_naive();
    json!({
        "roomId": room_id,
        "checkInDate": (today + Days::new(starts_in)).to_string(),
        "checkOutDate": (today + Days::new(starts_in + nights)).to_string(),
        "guests": { "adults": 1 }
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = api::create_app(
        api::create_default_state(BookingConfig::default()),
        get_metrics_handle(),
    );
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "memory");
    assert_eq!(json["paymentGateway"], "simulated");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_booking_requires_user_header() {
    let t = setup();
    let room_id = t.add_room("101", 2).await;

    let (status, json) = t
        .send("POST", "/bookings", None, Some(booking_body(&room_id, 5, 2)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Missing X-User-Id header");
}

#[tokio::test]
async fn test_full_booking_and_payment_flow() {
    let t = setup();
    let room_id = t.add_room("101", 2).await;
    let user = t.register("Meera").await;

    let (status, created) = t.book(user, &room_id, 10, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["totalPrice"], 35_400);
    assert_eq!(created["currency"], "USD");
    let booking_id = created["bookingId"].as_str().unwrap().to_string();
    let reference = created["bookingReference"].as_str().unwrap().to_string();

    let (_, room) = t.send("GET", &format!("/rooms/{room_id}"), None, None).await;
    assert_eq!(room["bedRemaining"], 1);

    let (status, order) = t
        .send(
            "POST",
            "/payments/orders",
            Some(user),
            Some(json!({ "bookingId": booking_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["amount"], 35_400);
    let order_id = order["orderId"].as_str().unwrap().to_string();

    let (status, booking) = t
        .send(
            "POST",
            "/payments/capture",
            Some(user),
            Some(json!({ "bookingId": booking_id, "externalOrderId": order_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["payment"]["status"], "paid");
    assert_eq!(t.notifier.sent().len(), 2);

    let (status, fetched) = t
        .send("GET", &format!("/bookings/{reference}"), Some(user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["reference"], reference.as_str());

    let (status, listed) = t.send("GET", "/bookings", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, cancelled) = t
        .send("POST", &format!("/bookings/{reference}/cancel"), Some(user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, room) = t.send("GET", &format!("/rooms/{room_id}"), None, None).await;
    assert_eq!(room["bedRemaining"], 2);
}

#[tokio::test]
async fn test_other_users_booking_is_not_found() {
    let t = setup();
    let room_id = t.add_room("101", 2).await;
    let owner = t.register("Meera").await;
    let stranger = t.register("Arjun").await;

    let (_, created) = t.book(owner, &room_id, 5, 2).await;
    let reference = created["bookingReference"].as_str().unwrap();

    let (status, _) = t
        .send("GET", &format!("/bookings/{reference}"), Some(stranger), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send("POST", &format!("/bookings/{reference}/cancel"), Some(stranger), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send(
            "POST",
            "/payments/orders",
            Some(stranger),
            Some(json!({ "bookingId": created["bookingId"] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_and_conflict_statuses() {
    let t = setup();
    let room_id = t.add_room("101", 4).await;
    let user = t.register("Meera").await;

    let (status, json) = t
        .send(
            "POST",
            "/bookings",
            Some(user),
            Some(json!({
                "roomId": room_id,
                "checkInDate": "2020-01-01",
                "checkOutDate": "2020-01-03",
                "guests": { "adults": 1 }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("Invalid dates"));

    let (status, _) = t.book(user, &room_id, 5, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, json) = t.book(user, &room_id, 6, 3).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["message"].as_str().unwrap().contains("Overlapping"));

    let (status, _) = t
        .send(
            "POST",
            "/residents",
            Some(user),
            Some(json!({ "name": "Meera", "email": "meera@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_input_is_bad_request() {
    let t = setup();
    let user = t.register("Meera").await;

    let (status, json) = t
        .send("POST", "/bookings", Some(user), Some(json!({ "roomId": 7 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].is_string());

    let (status, _) = t.send("GET", "/rooms/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send("GET", "/bookings/not-a-reference", Some(user), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_room_and_missing_profile() {
    let t = setup();
    let room_id = t.add_room("101", 2).await;
    let user = t.register("Meera").await;

    let (status, _) = t
        .book(user, &uuid::Uuid::new_v4().to_string(), 5, 2)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = t.book(UserId::new(), &room_id, 5, 2).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["message"].as_str().unwrap().contains("No resident profile"));
}

#[tokio::test]
async fn test_gateway_failure_is_bad_gateway() {
    let t = setup();
    let room_id = t.add_room("101", 2).await;
    let user = t.register("Meera").await;
    let (_, created) = t.book(user, &room_id, 5, 2).await;
    let booking_id = created["bookingId"].clone();

    let (_, order) = t
        .send(
            "POST",
            "/payments/orders",
            Some(user),
            Some(json!({ "bookingId": booking_id })),
        )
        .await;

    t.gateway.set_fail_on_capture(true);
    let (status, json) = t
        .send(
            "POST",
            "/payments/capture",
            Some(user),
            Some(json!({ "bookingId": booking_id, "externalOrderId": order["orderId"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["message"], "Payment provider request failed");

    let reference = created["bookingReference"].as_str().unwrap();
    let (_, booking) = t
        .send("GET", &format!("/bookings/{reference}"), Some(user), None)
        .await;
    assert_eq!(booking["status"], "pending");
}

#[tokio::test]
async fn test_list_rooms_filters_available() {
    let t = setup();
    let single = t.add_room("100", 1).await;
    t.add_room("200", 2).await;
    let user = t.register("Meera").await;
    t.book(user, &single, 5, 1).await;

    let (_, all) = t.send("GET", "/rooms", None, None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, available) = t.send("GET", "/rooms?available=true", None, None).await;
    let available = available.as_array().unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0]["roomNumber"], "200");
}

#[tokio::test]
async fn test_refund_cancels_confirmed_booking() {
    let t = setup();
    let room_id = t.add_room("101", 2).await;
    let user = t.register("Meera").await;
    let (_, created) = t.book(user, &room_id, 10, 2).await;
    let booking_id = created["bookingId"].clone();
    let reference = created["bookingReference"].as_str().unwrap().to_string();

    let (_, order) = t
        .send(
            "POST",
            "/payments/orders",
            Some(user),
            Some(json!({ "bookingId": booking_id })),
        )
        .await;
    t.send(
        "POST",
        "/payments/capture",
        Some(user),
        Some(json!({ "bookingId": booking_id, "externalOrderId": order["orderId"] })),
    )
    .await;

    let (status, refunded) = t
        .send("POST", &format!("/bookings/{reference}/refund"), Some(user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["status"], "cancelled");
    assert_eq!(refunded["payment"]["status"], "refunded");
    assert_eq!(t.gateway.refund_calls(), 1);

    let (status, _) = t
        .send("POST", &format!("/bookings/{reference}/refund"), Some(user), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_expiry_sweeper_releases_unpaid_bookings() {
    let t = setup_with(BookingConfig {
        payment_window: chrono::Duration::zero(),
        ..BookingConfig::default()
    });
    let room_id = t.add_room("101", 1).await;
    let user = t.register("Meera").await;
    let (_, created) = t.book(user, &room_id, 5, 2).await;
    let reference = created["bookingReference"].as_str().unwrap().to_string();

    let sweeper = api::spawn_expiry_sweeper(t.orchestrator.clone(), Duration::from_millis(10));

    let mut booking = Value::Null;
    for _ in 0..100 {
        (_, booking) = t
            .send("GET", &format!("/bookings/{reference}"), Some(user), None)
            .await;
        if booking["status"] == "cancelled" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sweeper.abort();

    assert_eq!(booking["status"], "cancelled");
    assert_eq!(booking["payment"]["status"], "failed");
    let (_, room) = t.send("GET", &format!("/rooms/{room_id}"), None, None).await;
    assert_eq!(room["bedRemaining"], 1);
}
