//! Order endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mall_core::{Order, OrderStatus, Payment};

use super::extract::CurrentUser;
use crate::error::ApiError;
use crate::services::{CreateOrderRequest, OrderDetail, OrderPage};
use crate::state::AppState;

/// Response of `POST /api/v1/orders`.
#[derive(Debug, Serialize)]
pub struct OrderCreated {
    pub order_id: i64,
    pub order_no: String,
    pub total_amount: String,
    pub pay_amount: String,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    #[serde(default)]
    pub sku_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StockLevel {
    pub product_id: i64,
    pub sku_id: Option<i64>,
    pub stock: i64,
}

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreated>), ApiError> {
    debug!(user_id, lines = request.items.len(), "create_order");
    let order = state.orders.create_order(user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderCreated {
            order_id: order.id,
            total_amount: order.total_amount().to_decimal_string(),
            pay_amount: order.pay_amount().to_decimal_string(),
            order_no: order.order_no,
        }),
    ))
}

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderPage>, ApiError> {
    let page = state
        .orders
        .list_orders(user_id, query.status, query.page, query.page_size)
        .await?;
    Ok(Json(page))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetail>, ApiError> {
    Ok(Json(state.orders.get_order_detail(user_id, order_id).await?))
}

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.cancel_order(user_id, order_id).await?))
}

pub async fn confirm_receipt(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.confirm_receipt(user_id, order_id).await?))
}

pub async fn list_order_payments(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.payments.list_payments(user_id, order_id).await?))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.update_status(order_id, request.status).await?))
}

pub async fn stock_level(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Query(query): Query<StockQuery>,
) -> Result<Json<StockLevel>, ApiError> {
    let stock = state.orders.stock_level(product_id, query.sku_id).await?;
    Ok(Json(StockLevel {
        product_id,
        sku_id: query.sku_id,
        stock,
    }))
}
