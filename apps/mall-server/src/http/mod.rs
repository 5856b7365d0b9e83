//! # HTTP Surface
//!
//! Thin axum handlers over the services. Authentication happens upstream;
//! the authenticated user arrives in `X-User-Id`.
//!
//! ## Routes
//! ```text
//! POST /api/v1/orders                          create order
//! GET  /api/v1/orders                          list own orders
//! GET  /api/v1/orders/{id}                     order + lines + payments
//! PUT  /api/v1/orders/{id}/cancel              cancel pending order
//! PUT  /api/v1/orders/{id}/confirm             confirm receipt
//! GET  /api/v1/orders/{id}/payments            payment attempts
//! PUT  /api/v1/admin/orders/{id}/status        set status (trusted)
//! GET  /api/v1/products/{id}/stock             stock snapshot (?sku_id=)
//!
//! POST /api/v1/payments                        create payment intent
//! GET  /api/v1/payments/{payment_no}           payment status
//! PUT  /api/v1/payments/{payment_no}/cancel    cancel pending payment
//!
//! POST /api/v1/payment/wechat/callback         SUCCESS | FAIL
//! POST /api/v1/payment/alipay/callback         success | failure
//!
//! GET  /health
//! ```

pub mod extract;
pub mod orders;
pub mod payments;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/cancel", put(orders::cancel_order))
        .route("/orders/{id}/confirm", put(orders::confirm_receipt))
        .route("/orders/{id}/payments", get(orders::list_order_payments))
        .route("/admin/orders/{id}/status", put(orders::update_status))
        .route("/products/{id}/stock", get(orders::stock_level))
        .route("/payments", post(payments::create_payment))
        .route("/payments/{payment_no}", get(payments::get_payment))
        .route("/payments/{payment_no}/cancel", put(payments::cancel_payment))
        .route("/payment/wechat/callback", post(payments::wechat_callback))
        .route("/payment/alipay/callback", post(payments::alipay_callback));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health_handler))
        .with_state(state)
}

/// [`router`] with request tracing and a per-request timeout.
pub fn app(state: Arc<AppState>, request_timeout: Duration) -> Router {
    router(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.is_healthy().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
    }
}
