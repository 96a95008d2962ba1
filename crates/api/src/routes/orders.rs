//! Order placement, query and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{
    Order, OrderId, OrderItem, OrderLine, OrderStatus, OrderWithItems, PlaceOrder, ProductId,
};
use serde::{Deserialize, Serialize};
use store::{Page, PageRequest, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Actor;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub customer_id: i64,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub price_at_purchase_cents: i64,
}

#[derive(Serialize)]
pub struct OrderSummary {
    pub id: i64,
    pub customer_id: i64,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub order_id: i64,
    pub status: OrderStatus,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id.as_i64(),
            product_id: item.product_id.as_i64(),
            quantity: item.quantity,
            price_at_purchase_cents: item.price_at_purchase.cents(),
        }
    }
}

impl From<OrderWithItems> for OrderResponse {
    fn from(placed: OrderWithItems) -> Self {
        let OrderWithItems { order, items } = placed;
        Self {
            id: order.id.as_i64(),
            customer_id: order.customer_id.as_i64(),
            status: order.status,
            total_cents: order.total_amount.cents(),
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.as_i64(),
            customer_id: order.customer_id.as_i64(),
            status: order.status,
            total_cents: order.total_amount.cents(),
            created_at: order.created_at,
        }
    }
}

impl From<Order> for OrderStatusResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id.as_i64(),
            status: order.status,
        }
    }
}

// -- Handlers --

/// POST /orders — place an order for the calling customer.
#[tracing::instrument(skip(state, req), fields(customer_id = %actor.id))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let lines = req
        .items
        .iter()
        .map(|item| OrderLine::new(ProductId::new(item.product_id), item.quantity))
        .collect();

    let placed = state
        .orders
        .place_order(PlaceOrder::new(actor.id, lines))
        .await?;

    Ok((StatusCode::CREATED, Json(placed.into())))
}

/// GET /orders — list orders visible to the caller.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Page<OrderSummary>>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let page = PageRequest::from_params(params.page, params.limit)?;

    let orders = state.orders.list_orders(&actor, status, page).await?;
    Ok(Json(orders.map(OrderSummary::from)))
}

/// GET /orders/{id} — load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(&actor, OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/confirm — confirm a pending order (admin).
#[tracing::instrument(skip(state))]
pub async fn confirm<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    Actor(actor).require_admin()?;

    let order = state.orders.confirm_order(&actor, OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/cancel — cancel an order and restore its stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order = state.orders.cancel_order(&actor, OrderId::new(id)).await?;
    Ok(Json(order.into()))
}
