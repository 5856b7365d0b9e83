//! Router-level tests: status codes, error bodies, and callback literals.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt as _; // for oneshot()

use common::{wechat_callback, Backend};
use mall_server::http;

fn app(backend: &Backend) -> Router {
    http::router(Arc::new(backend.app_state()))
}

async fn send(app: &Router, method: Method, uri: &str, user: Option<i64>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

fn json_of(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn order_body(product_id: i64, quantity: i64) -> Value {
    json!({
        "items": [{ "product_id": product_id, "quantity": quantity }],
        "receiver_name": "Li Lei",
        "receiver_phone": "13800138000",
        "receiver_address": "1 Nanjing Rd, Shanghai"
    })
}

#[tokio::test]
async fn order_and_payment_round_trip() {
    let backend = Backend::sqlite().await;
    let user = backend.user("alice").await;
    let mug = backend.product("Ceramic Mug", 9_900, 5).await;
    let app = app(&backend);

    let (status, body) = send(&app, Method::POST, "/api/v1/orders", Some(user), Some(order_body(mug, 1))).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_of(&body);
    assert_eq!(created["total_amount"], "99.00");
    assert_eq!(created["pay_amount"], "99.00");
    let order_id = created["order_id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/payments",
        Some(user),
        Some(json!({ "order_id": order_id, "method": "wechat" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let intent = json_of(&body);
    let payment_no = intent["payment_no"].as_str().unwrap().to_string();
    assert_eq!(intent["provider_params"]["trade_type"], "JSAPI");

    let callback = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/payment/wechat/callback")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(wechat_callback(&payment_no, true, 9_900)))
        .unwrap();
    let response = app.clone().oneshot(callback).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let literal = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&literal[..], b"SUCCESS");

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/payments/{}", payment_no), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let view = json_of(&body);
    assert_eq!(view["status"], "success");
    assert_eq!(view["amount"], "99.00");
    assert_eq!(view["method"], "wechat");

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/orders/{}", order_id), Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["order"]["status"], "awaiting_shipment");
}

#[tokio::test]
async fn errors_carry_codes_and_status() {
    let backend = Backend::memory();
    let alice = backend.user("alice").await;
    let bob = backend.user("bob").await;
    let mug = backend.product("Ceramic Mug", 9_900, 1).await;
    let app = app(&backend);

    let (status, _) = send(&app, Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::POST, "/api/v1/orders", Some(alice), Some(order_body(mug, 2))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json_of(&body)["code"], "INSUFFICIENT_STOCK");

    let (status, body) = send(&app, Method::POST, "/api/v1/orders", Some(alice), Some(order_body(mug, 1))).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = json_of(&body)["order_id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/orders/{}", order_id), Some(bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json_of(&body)["code"], "ACCESS_DENIED");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/payments",
        Some(alice),
        Some(json!({ "order_id": order_id, "method": "paypal" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body)["code"], "UNSUPPORTED_METHOD");

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/orders/{}/confirm", order_id), Some(alice), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json_of(&body)["code"], "INVALID_STATE");

    let (status, body) = send(&app, Method::GET, "/api/v1/orders/424242", Some(alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_of(&body)["code"], "NOT_FOUND");
}

#[tokio::test]
async fn cancel_and_admin_routes() {
    let backend = Backend::memory();
    let alice = backend.user("alice").await;
    let mug = backend.product("Ceramic Mug", 9_900, 3).await;
    let app = app(&backend);

    let (_, body) = send(&app, Method::POST, "/api/v1/orders", Some(alice), Some(order_body(mug, 2))).await;
    let order_id = json_of(&body)["order_id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/products/{}/stock", mug), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["stock"], 1);

    let (status, body) = send(&app, Method::PUT, &format!("/api/v1/orders/{}/cancel", order_id), Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["status"], "cancelled");

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/products/{}/stock", mug), None, None).await;
    assert_eq!(json_of(&body)["stock"], 3);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/admin/orders/{}/status", order_id),
        None,
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["status"], "shipped");

    let (status, body) = send(&app, Method::GET, "/api/v1/orders?status=shipped", Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["total"], 1);
}

#[tokio::test]
async fn bad_callbacks_get_failure_literals() {
    let backend = Backend::memory();
    let app = app(&backend);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/payment/alipay/callback")
        .body(Body::from("{\"out_trade_no\":\"PAY1\"}"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let literal = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&literal[..], b"failure");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/payment/wechat/callback")
        .body(Body::from(wechat_callback("PAY-unknown", true, 100)))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let literal = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&literal[..], b"FAIL");
}

#[tokio::test]
async fn health_reports_database() {
    let backend = Backend::sqlite().await;
    let app = app(&backend);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}
