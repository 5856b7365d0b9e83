//! Payment endpoints and provider callbacks.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mall_core::{Payment, PaymentMethod, PaymentStatus};

use super::extract::CurrentUser;
use crate::error::ApiError;
use crate::services::{CallbackAck, PaymentIntent};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: i64,
    /// `wechat` or `alipay`.
    pub method: String,
}

/// Response of the payment status endpoints.
#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub payment_no: String,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub amount: String,
    pub trade_no: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentView {
    fn from(payment: Payment) -> Self {
        PaymentView {
            amount: payment.amount().to_decimal_string(),
            payment_no: payment.payment_no,
            status: payment.status,
            method: payment.method,
            trade_no: payment.trade_no,
            paid_at: payment.paid_at,
        }
    }
}

pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentIntent>), ApiError> {
    let method: PaymentMethod = request.method.parse()?;
    let intent = state
        .payments
        .create_payment(user_id, request.order_id, method)
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_no): Path<String>,
) -> Result<Json<PaymentView>, ApiError> {
    Ok(Json(state.payments.get_status(&payment_no).await?.into()))
}

pub async fn cancel_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_no): Path<String>,
) -> Result<Json<PaymentView>, ApiError> {
    Ok(Json(state.payments.cancel_payment(&payment_no).await?.into()))
}

pub async fn wechat_callback(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, &'static str) {
    ack_response(state.callbacks.handle(PaymentMethod::Wechat, &body).await)
}

pub async fn alipay_callback(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, &'static str) {
    ack_response(state.callbacks.handle(PaymentMethod::Alipay, &body).await)
}

fn ack_response(ack: CallbackAck) -> (StatusCode, &'static str) {
    let status = if ack.accepted {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, ack.body)
}
