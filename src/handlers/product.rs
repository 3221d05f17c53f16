//! 商品目录 HTTP 处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::AppError,
    middleware::AppState,
    models::product::{Product, ProductInput},
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Product {} not found", id))
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.product_store.list().await?))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, AppError> {
    state
        .product_store
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.product_store.create(input).await?;
    tracing::info!(product_id = product.id, name = %product.name, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .product_store
        .update(id, input)
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(product_id = id, "Product updated");

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.product_store.delete(id).await? {
        return Err(not_found(id));
    }
    tracing::info!(product_id = id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}
