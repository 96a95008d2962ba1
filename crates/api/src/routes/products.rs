//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{Money, NewProduct, Product, ProductId, ProductUpdate};
use serde::{Deserialize, Serialize};
use store::{Page, Store};

use super::PageParams;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Actor;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
    pub stock_quantity: i32,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub is_active: Option<bool>,
}

impl From<UpdateProductRequest> for ProductUpdate {
    fn from(req: UpdateProductRequest) -> Self {
        ProductUpdate {
            name: req.name,
            price: req.price_cents.map(Money::from_cents),
            stock_quantity: req.stock_quantity,
            is_active: req.is_active,
        }
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name,
            price_cents: product.price.cents(),
            stock_quantity: product.stock_quantity,
            is_active: product.is_active,
            created_at: product.created_at,
        }
    }
}

// -- Handlers --

/// POST /products — add a product to the catalog (admin).
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .catalog
        .create_product(
            &actor,
            NewProduct::new(
                req.name,
                Money::from_cents(req.price_cents),
                req.stock_quantity,
            ),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products — list the catalog, ordered by id.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<ProductResponse>>, ApiError> {
    let page = state.catalog.list_products(params.to_request()?).await?;
    Ok(Json(page.map(ProductResponse::from)))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(ProductId::new(id)).await?;
    Ok(Json(product.into()))
}

/// PATCH /products/{id} — partial update (admin).
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .catalog
        .update_product(&actor, ProductId::new(id), req.into())
        .await?;
    Ok(Json(product.into()))
}
