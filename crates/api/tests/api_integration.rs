//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

use api::rate_limit::RateLimiter;

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

fn setup() -> axum::Router {
    setup_with_limiter(RateLimiter::per_minute(1000)).0
}

fn setup_with_limiter(limiter: RateLimiter) -> (axum::Router, Arc<api::DefaultAppState>) {
    let (state, _consumer, _bus, _saga_store) = api::create_default_state();
    let app = api::create_app(state.clone(), get_metrics_handle(), limiter);
    (app, state)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_order_body() -> serde_json::Value {
    serde_json::json!({
        "items": [{
            "product_name": "Widget",
            "quantity": 2,
            "unit_price_cents": 2550
        }]
    })
}

async fn create_order(app: &axum::Router) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/orders", create_order_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order_returns_pending_with_total() {
    let app = setup();

    let order = create_order(&app).await;
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["total_cents"], 5100);
    assert_eq!(order["items"][0]["product_name"], "Widget");
}

#[tokio::test]
async fn test_create_order_with_no_items_is_rejected() {
    let app = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "items": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_order_roundtrip() {
    let app = setup();

    let created = create_order(&app).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .oneshot(get_request(&format!("/orders/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = body_json(response).await;
    assert_eq!(order["id"], created["id"]);
    assert_eq!(order["total_cents"], 5100);
}

#[tokio::test]
async fn test_get_unknown_order_is_404() {
    let app = setup();

    let response = app
        .oneshot(get_request(&format!("/orders/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_order_id_is_400() {
    let app = setup();

    let response = app
        .oneshot(get_request("/orders/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_with_status_filter() {
    let app = setup();

    create_order(&app).await;
    create_order(&app).await;

    let response = app
        .clone()
        .oneshot(get_request("/orders?status=Pending"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let orders = body_json(response).await;
    assert_eq!(orders.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get_request("/orders?status=Shipped"))
        .await
        .unwrap();
    let orders = body_json(response).await;
    assert!(orders.as_array().unwrap().is_empty());

    let response = app
        .oneshot(get_request("/orders?status=Bogus"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_is_only_legal_while_pending() {
    let app = setup();

    let created = create_order(&app).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/cancel"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;
    assert_eq!(order["status"], "Cancelled");

    // A second cancel hits a terminal order
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/cancel"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_status_walks_the_lifecycle() {
    let app = setup();

    let created = create_order(&app).await;
    let id = created["id"].as_str().unwrap();

    for next in ["Processing", "Shipped", "Delivered"] {
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/orders/{id}/status"),
                serde_json::json!({ "status": next }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let order = body_json(response).await;
        assert_eq!(order["status"], next);
    }
}

#[tokio::test]
async fn test_update_status_rejects_illegal_jump() {
    let app = setup();

    let created = create_order(&app).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/orders/{id}/status"),
            serde_json::json!({ "status": "Delivered" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/orders/{id}/status"),
            serde_json::json!({ "status": "Teleported" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_saga_status_tracks_order() {
    let app = setup();

    let created = create_order(&app).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get_request(&format!("/orders/{id}/saga")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let saga = body_json(response).await;
    assert_eq!(saga["order_id"], created["id"]);
    assert_eq!(saga["status"], "Started");

    // Cancelling the order moves its saga into compensation
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{id}/cancel"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(get_request(&format!("/orders/{id}/saga")))
        .await
        .unwrap();
    let saga = body_json(response).await;
    assert_eq!(saga["status"], "Compensating");
}

#[tokio::test]
async fn test_saga_status_for_unknown_order_is_404() {
    let app = setup();

    let response = app
        .oneshot(get_request(&format!(
            "/orders/{}/saga",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_rejects_after_budget() {
    let (app, _state) = setup_with_limiter(RateLimiter::new(2, Duration::from_secs(60)));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-user-id", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Rate limit exceeded");

    // Another client still has budget
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-user-id", "bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let app = setup();

    // Generate some traffic first
    create_order(&app).await;

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
